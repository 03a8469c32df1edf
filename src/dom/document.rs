//! XML Document - Arena-based DOM representation
//!
//! The tree the proxy layer views. Nodes are stored in an arena and refer
//! to each other by `NodeId`:
//! - forward-only sibling links (`next`), no previous pointer
//! - string interning for names, values and character data
//! - freed slots stay empty, so a stale `NodeId` never aliases a new node

use std::cell::RefCell;
use std::rc::Rc;

use super::builder;
use super::node::{NodeId, NodeKind, NsDef, XmlAttribute, XmlNode};
use super::strings::StringPool;
use crate::error::Result;

/// A document shared between its owner and the proxies viewing it
pub type SharedDocument = Rc<RefCell<Document>>;

/// An XML document stored in arena format
#[derive(Debug)]
pub struct Document {
    /// Arena of nodes, `None` once freed
    nodes: Vec<Option<XmlNode>>,
    /// Interned strings
    pub(crate) strings: StringPool,
    /// Number of allocated, not yet freed nodes
    live: usize,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document holding only the document node
    pub fn new() -> Self {
        Document {
            nodes: vec![Some(XmlNode::document())],
            strings: StringPool::new(),
            live: 1,
        }
    }

    /// Parse an XML document (lenient mode)
    ///
    /// Mismatched end tags, unclosed elements and undeclared prefixes are
    /// recovered from instead of rejected.
    pub fn parse(input: &str) -> Result<Self> {
        builder::build(input, false)
    }

    /// Parse an XML document in strict mode
    pub fn parse_strict(input: &str) -> Result<Self> {
        builder::build(input, true)
    }

    /// Wrap the document for sharing with proxies
    pub fn into_shared(self) -> SharedDocument {
        Rc::new(RefCell::new(self))
    }

    // Traversal primitives

    /// The document node (always index 0)
    #[inline]
    pub fn document_node(&self) -> NodeId {
        NodeId(0)
    }

    /// First element child of the document node
    pub fn root_element(&self) -> Option<NodeId> {
        self.element_children(self.document_node()).next()
    }

    /// Get a node by ID, `None` if it was freed
    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&XmlNode> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut XmlNode> {
        self.nodes.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Check that `id` refers to a live node
    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Kind of a live node
    #[inline]
    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.node(id).map(|n| n.kind)
    }

    /// Check if `id` is a live element
    #[inline]
    pub fn is_element(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(XmlNode::is_element)
    }

    #[inline]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.first_child
    }

    #[inline]
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.last_child
    }

    #[inline]
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.next
    }

    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    /// Line number in the parse origin, `None` if unknown
    pub fn line(&self, id: NodeId) -> Option<u32> {
        self.node(id).map(|n| n.line).filter(|&line| line > 0)
    }

    /// Iterate over all children of a node
    pub fn children(&self, id: NodeId) -> ChildIter<'_> {
        ChildIter {
            doc: self,
            next: self.first_child(id),
        }
    }

    /// Iterate over element children only
    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id).filter(|&c| self.is_element(c))
    }

    /// Sibling immediately before `id`, found by re-walking the parent's
    /// child list. O(number of preceding siblings).
    pub fn previous_node(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let mut prev = None;
        for child in self.children(parent) {
            if child == id {
                return prev;
            }
            prev = Some(child);
        }
        None
    }

    /// Number of live nodes, the document node included
    pub fn node_count(&self) -> usize {
        self.live
    }

    // Names

    /// Local name of an element (or PI target)
    pub fn local_name(&self, id: NodeId) -> Option<&str> {
        self.strings.get_non_empty(self.node(id)?.name_id)
    }

    /// Namespace prefix of an element
    pub fn prefix(&self, id: NodeId) -> Option<&str> {
        self.strings.get_non_empty(self.node(id)?.prefix_id)
    }

    /// Character data of a text, CDATA, comment or PI node
    pub fn content(&self, id: NodeId) -> Option<&str> {
        self.strings.get(self.node(id)?.content_id)
    }

    /// Qualified name in `{uri}local` notation
    pub fn qualified_name(&self, id: NodeId) -> Option<String> {
        let node = self.node(id)?;
        Some(self.format_name(node.namespace_id, node.name_id))
    }

    /// Qualified name of an attribute in `{uri}local` notation
    pub fn attribute_name(&self, attr: &XmlAttribute) -> String {
        self.format_name(attr.namespace_id, attr.name_id)
    }

    fn format_name(&self, namespace_id: u32, name_id: u32) -> String {
        let local = self.strings.get(name_id).unwrap_or_default();
        match self.strings.get_non_empty(namespace_id) {
            Some(uri) => format!("{{{}}}{}", uri, local),
            None => local.to_string(),
        }
    }

    // Node creation

    pub(crate) fn alloc(&mut self, node: XmlNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(node));
        self.live += 1;
        id
    }

    /// Create a detached, un-namespaced element
    pub fn create_element(&mut self, local_name: &str) -> NodeId {
        let name_id = self.strings.intern(local_name);
        self.alloc(XmlNode::element(name_id))
    }

    /// Create a detached element in namespace `uri`, declaring `prefix`
    /// (or the default namespace) on it
    pub fn create_element_ns(&mut self, local_name: &str, prefix: Option<&str>, uri: &str) -> NodeId {
        let id = self.create_element(local_name);
        let prefix_id = prefix.map_or(0, |p| self.strings.intern(p));
        let uri_id = self.strings.intern(uri);
        if let Some(node) = self.node_mut(id) {
            node.prefix_id = prefix_id;
            node.namespace_id = uri_id;
            node.ns_defs.push(NsDef { prefix_id, uri_id });
        }
        id
    }

    /// Create a detached text node
    pub fn create_text(&mut self, text: &str) -> NodeId {
        let content_id = self.strings.intern(text);
        self.alloc(XmlNode::text(content_id))
    }

    // Linking primitives

    /// Append `child` as the last child of `parent`.
    ///
    /// `child` must be detached; its `next` link is cleared, so a caller
    /// that needs the nodes following it must read them first.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        let Some(last) = self.node(parent).map(|p| p.last_child) else {
            return;
        };
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
            node.next = None;
        } else {
            return;
        }
        match last {
            Some(last) => {
                if let Some(prev) = self.node_mut(last) {
                    prev.next = Some(child);
                }
            }
            None => {
                if let Some(p) = self.node_mut(parent) {
                    p.first_child = Some(child);
                }
            }
        }
        if let Some(p) = self.node_mut(parent) {
            p.last_child = Some(child);
        }
    }

    /// Insert the detached node `child` as the first child of `parent`
    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        let Some(first) = self.node(parent).map(|p| p.first_child) else {
            return;
        };
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
            node.next = first;
        } else {
            return;
        }
        if let Some(p) = self.node_mut(parent) {
            p.first_child = Some(child);
            if first.is_none() {
                p.last_child = Some(child);
            }
        }
    }

    /// Splice the detached node `sibling` in directly after `node`
    pub fn add_next_sibling(&mut self, node: NodeId, sibling: NodeId) {
        let Some((parent, next)) = self.node(node).map(|n| (n.parent, n.next)) else {
            return;
        };
        if let Some(s) = self.node_mut(sibling) {
            s.parent = parent;
            s.next = next;
        } else {
            return;
        }
        if let Some(n) = self.node_mut(node) {
            n.next = Some(sibling);
        }
        if let Some(parent) = parent {
            if let Some(p) = self.node_mut(parent) {
                if p.last_child == Some(node) {
                    p.last_child = Some(sibling);
                }
            }
        }
    }

    /// Detach `id` from its parent and siblings, keeping its subtree
    pub fn unlink(&mut self, id: NodeId) {
        let Some((parent, next)) = self.node(id).map(|n| (n.parent, n.next)) else {
            return;
        };
        if let Some(parent) = parent {
            let prev = self.previous_node(id);
            match prev {
                Some(prev) => {
                    if let Some(p) = self.node_mut(prev) {
                        p.next = next;
                    }
                }
                None => {
                    if let Some(p) = self.node_mut(parent) {
                        p.first_child = next;
                    }
                }
            }
            if let Some(p) = self.node_mut(parent) {
                if p.last_child == Some(id) {
                    p.last_child = prev;
                }
            }
        }
        if let Some(node) = self.node_mut(id) {
            node.parent = None;
            node.next = None;
        }
    }

    /// Unlink `id` and free it together with all its descendants.
    ///
    /// Returns the number of nodes freed. The document node cannot be freed.
    pub fn free_subtree(&mut self, id: NodeId) -> usize {
        if id == self.document_node() || !self.contains(id) {
            return 0;
        }
        self.unlink(id);

        let mut freed = 0;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get_mut(current.index()).and_then(Option::take) else {
                continue;
            };
            freed += 1;
            let mut child = node.first_child;
            while let Some(c) = child {
                stack.push(c);
                child = self.next(c);
            }
        }
        self.live -= freed;
        freed
    }

    /// Replace the run of text nodes at the start of `id`'s children.
    ///
    /// The old run is freed; `Some` inserts one new text node as the first
    /// child. Element children and their tails are untouched.
    ///
    /// The replaced text stays interned; see `StringPool`.
    pub fn set_leading_text(&mut self, id: NodeId, text: Option<&str>) {
        if !self.contains(id) {
            return;
        }
        while let Some(first) = self.first_child(id) {
            if !self.node(first).is_some_and(XmlNode::is_text) {
                break;
            }
            self.free_subtree(first);
        }
        if let Some(text) = text {
            let node = self.create_text(text);
            self.prepend_child(id, node);
        }
    }
}

/// Iterator over the child nodes of one node
pub struct ChildIter<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl<'a> Iterator for ChildIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.next(current);
        Some(current)
    }
}
