//! XML Node representation
//!
//! Nodes live in a `Document` arena and refer to each other by `NodeId`.
//! Sibling lists are forward-only: there is a `next` link but no `prev`.

use std::fmt;

/// Compact node identifier (index into the document arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Arena index of this node
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Type of XML node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Document root
    Document,
    /// Element node
    Element,
    /// Text content
    Text,
    /// CDATA section
    CData,
    /// Comment
    Comment,
    /// Processing instruction
    ProcessingInstruction,
}

/// An XML node in the arena
///
/// String fields are ids into the owning document's `StringPool`; 0 means
/// "no string".
#[derive(Debug, Clone)]
pub struct XmlNode {
    /// Type of this node
    pub kind: NodeKind,
    /// Parent node (None for the document node and for detached nodes)
    pub parent: Option<NodeId>,
    /// First child node
    pub first_child: Option<NodeId>,
    /// Last child node, kept so appends do not walk the child list
    pub last_child: Option<NodeId>,
    /// Next sibling
    pub next: Option<NodeId>,
    /// Local name (elements) or target (processing instructions)
    pub name_id: u32,
    /// Namespace prefix
    pub prefix_id: u32,
    /// Namespace URI
    pub namespace_id: u32,
    /// Character data of text, CDATA, comment and PI nodes
    pub content_id: u32,
    /// Attributes in declaration order
    pub attributes: Vec<XmlAttribute>,
    /// Namespace declarations made on this element
    pub ns_defs: Vec<NsDef>,
    /// Line in the parse origin, 0 when unknown
    pub line: u32,
}

impl XmlNode {
    fn new(kind: NodeKind) -> Self {
        XmlNode {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            next: None,
            name_id: 0,
            prefix_id: 0,
            namespace_id: 0,
            content_id: 0,
            attributes: Vec::new(),
            ns_defs: Vec::new(),
            line: 0,
        }
    }

    /// Create a new document root node
    pub fn document() -> Self {
        Self::new(NodeKind::Document)
    }

    /// Create a new element node
    pub fn element(name_id: u32) -> Self {
        XmlNode {
            name_id,
            ..Self::new(NodeKind::Element)
        }
    }

    /// Create a new text node
    pub fn text(content_id: u32) -> Self {
        XmlNode {
            content_id,
            ..Self::new(NodeKind::Text)
        }
    }

    /// Create a new CDATA node
    pub fn cdata(content_id: u32) -> Self {
        XmlNode {
            content_id,
            ..Self::new(NodeKind::CData)
        }
    }

    /// Create a new comment node
    pub fn comment(content_id: u32) -> Self {
        XmlNode {
            content_id,
            ..Self::new(NodeKind::Comment)
        }
    }

    /// Create a processing instruction node
    pub fn processing_instruction(target_id: u32, data_id: u32) -> Self {
        XmlNode {
            name_id: target_id,
            content_id: data_id,
            ..Self::new(NodeKind::ProcessingInstruction)
        }
    }

    /// Check if this is an element node
    #[inline]
    pub fn is_element(&self) -> bool {
        self.kind == NodeKind::Element
    }

    /// Text and CDATA both count as text for text/tail collection
    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self.kind, NodeKind::Text | NodeKind::CData)
    }

    /// Check if this node has children
    #[inline]
    pub fn has_children(&self) -> bool {
        self.first_child.is_some()
    }
}

/// Stored attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    /// Local name
    pub name_id: u32,
    /// Namespace prefix, 0 if unprefixed
    pub prefix_id: u32,
    /// Namespace URI, 0 if un-namespaced
    pub namespace_id: u32,
    /// Value
    pub value_id: u32,
}

impl XmlAttribute {
    pub fn new(name_id: u32, value_id: u32) -> Self {
        XmlAttribute {
            name_id,
            prefix_id: 0,
            namespace_id: 0,
            value_id,
        }
    }
}

/// Namespace declaration (`xmlns:prefix="uri"`, prefix 0 for the default)
///
/// A default declaration with `uri_id` 0 undeclares the default namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NsDef {
    pub prefix_id: u32,
    pub uri_id: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_creation() {
        let doc = XmlNode::document();
        assert_eq!(doc.kind, NodeKind::Document);
        assert!(doc.parent.is_none());
        assert!(!doc.has_children());
    }

    #[test]
    fn test_element_node() {
        let elem = XmlNode::element(1);
        assert!(elem.is_element());
        assert_eq!(elem.name_id, 1);
        assert_eq!(elem.line, 0);
    }

    #[test]
    fn test_cdata_counts_as_text() {
        assert!(XmlNode::cdata(2).is_text());
        assert!(XmlNode::text(2).is_text());
        assert!(!XmlNode::comment(2).is_text());
    }
}
