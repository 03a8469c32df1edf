//! Node copy and splice
//!
//! Copies follow append-with-tail semantics: the text run that follows a
//! node travels with it. A copy is taken in two steps:
//!
//! 1. `Detached::capture` snapshots the node, its subtree and its tail run
//!    into owned data, so the source document is no longer borrowed.
//! 2. `materialize` rebuilds the snapshot in the destination arena, with the
//!    tail hung off the copy as a detached `next` chain.
//!
//! `append_copy` then links the copy under a new parent and moves the tail
//! in behind it, because `add_child` clears `next`. Copying within a single
//! document (even an ancestor into its own descendant) is safe since the
//! snapshot is complete before the first mutation.

use std::collections::HashMap;

use super::document::Document;
use super::namespace::{ns, search_ns, search_ns_by_href};
use super::node::{NodeId, NodeKind, NsDef, XmlAttribute, XmlNode};

/// Owned attribute of a `NodeSnapshot`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrSnapshot {
    pub name: String,
    pub prefix: Option<String>,
    pub namespace: Option<String>,
    pub value: String,
}

/// Owned, document-independent copy of one node.
///
/// Subtrees are stored flat in pre-order; `parent` indexes into the same
/// list, so capturing, rebuilding and dropping never recurse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub kind: NodeKind,
    /// Local name, or the target of a processing instruction
    pub name: String,
    pub prefix: Option<String>,
    pub namespace: Option<String>,
    /// Text, comment or PI data
    pub content: String,
    pub attributes: Vec<AttrSnapshot>,
    /// `(prefix, uri)`; a `None` prefix is the default namespace and an
    /// empty uri undeclares it
    pub ns_defs: Vec<(Option<String>, String)>,
    pub line: u32,
    /// Position of the parent snapshot; `None` for a subtree root
    pub parent: Option<usize>,
}

impl NodeSnapshot {
    fn take(doc: &Document, id: NodeId, parent: Option<usize>) -> Option<Self> {
        let node = doc.node(id)?;
        let text = |sid: u32| doc.strings.get(sid).unwrap_or_default().to_string();
        let opt = |sid: u32| doc.strings.get_non_empty(sid).map(str::to_string);

        Some(NodeSnapshot {
            kind: node.kind,
            name: text(node.name_id),
            prefix: opt(node.prefix_id),
            namespace: opt(node.namespace_id),
            content: text(node.content_id),
            attributes: node
                .attributes
                .iter()
                .map(|attr| AttrSnapshot {
                    name: text(attr.name_id),
                    prefix: opt(attr.prefix_id),
                    namespace: opt(attr.namespace_id),
                    value: text(attr.value_id),
                })
                .collect(),
            ns_defs: node
                .ns_defs
                .iter()
                .map(|def| (opt(def.prefix_id), text(def.uri_id)))
                .collect(),
            line: node.line,
            parent,
        })
    }

    /// Allocate this node alone in `doc`, detached
    fn build(&self, doc: &mut Document) -> NodeId {
        let prefix_id = self.prefix.as_deref().map_or(0, |p| doc.strings.intern(p));
        let namespace_id = self.namespace.as_deref().map_or(0, |u| doc.strings.intern(u));
        let attributes: Vec<XmlAttribute> = self
            .attributes
            .iter()
            .map(|attr| XmlAttribute {
                name_id: doc.strings.intern(&attr.name),
                prefix_id: attr.prefix.as_deref().map_or(0, |p| doc.strings.intern(p)),
                namespace_id: attr.namespace.as_deref().map_or(0, |u| doc.strings.intern(u)),
                value_id: doc.strings.intern(&attr.value),
            })
            .collect();
        let ns_defs: Vec<NsDef> = self
            .ns_defs
            .iter()
            .map(|(prefix, uri)| NsDef {
                prefix_id: prefix.as_deref().map_or(0, |p| doc.strings.intern(p)),
                uri_id: doc.strings.intern(uri),
            })
            .collect();

        let name_id = doc.strings.intern(&self.name);
        let content_id = doc.strings.intern(&self.content);
        let mut node = match self.kind {
            NodeKind::Document | NodeKind::Element => XmlNode::element(name_id),
            NodeKind::Text => XmlNode::text(content_id),
            NodeKind::CData => XmlNode::cdata(content_id),
            NodeKind::Comment => XmlNode::comment(content_id),
            NodeKind::ProcessingInstruction => XmlNode::processing_instruction(name_id, content_id),
        };
        node.prefix_id = prefix_id;
        node.namespace_id = namespace_id;
        node.attributes = attributes;
        node.ns_defs = ns_defs;
        node.line = self.line;
        doc.alloc(node)
    }

    /// Whether this node names `prefix` on itself or an attribute
    fn uses_prefix(&self, prefix: Option<&str>) -> bool {
        if self.kind != NodeKind::Element {
            return false;
        }
        let element_uses = match prefix {
            None => self.prefix.is_none() && self.namespace.is_some(),
            Some(_) => self.prefix.as_deref() == prefix,
        };
        element_uses || prefix.is_some() && self.attributes.iter().any(|a| a.prefix.as_deref() == prefix)
    }
}

/// A captured node together with its tail run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detached {
    pub node: NodeSnapshot,
    /// Descendants in pre-order. A `parent` of 0 is `node`, and `i + 1`
    /// is `descendants[i]`.
    pub descendants: Vec<NodeSnapshot>,
    pub tail: Vec<NodeSnapshot>,
}

impl Detached {
    /// Snapshot `id` and the text run following it. `None` for a freed id or
    /// the document node.
    pub fn capture(doc: &Document, id: NodeId) -> Option<Self> {
        if doc.kind(id)? == NodeKind::Document {
            return None;
        }

        let mut nodes: Vec<NodeSnapshot> = Vec::new();
        let mut stack: Vec<(NodeId, Option<usize>)> = vec![(id, None)];
        let mut children: Vec<NodeId> = Vec::new();
        while let Some((current, parent)) = stack.pop() {
            let Some(snapshot) = NodeSnapshot::take(doc, current, parent) else {
                continue;
            };
            let index = nodes.len();
            nodes.push(snapshot);
            children.clear();
            children.extend(doc.children(current));
            stack.extend(children.iter().rev().map(|&c| (c, Some(index))));
        }
        let mut nodes = nodes.into_iter();
        let mut node = nodes.next()?;
        let descendants: Vec<NodeSnapshot> = nodes.collect();

        // Namespaces bound above the captured node must travel with it
        let mut in_scope: Vec<NsDef> = Vec::new();
        let mut ancestor = doc.parent(id);
        while let Some(a) = ancestor {
            if let Some(n) = doc.node(a) {
                for def in &n.ns_defs {
                    if !in_scope.iter().any(|d| d.prefix_id == def.prefix_id) {
                        in_scope.push(*def);
                    }
                }
            }
            ancestor = doc.parent(a);
        }
        for def in in_scope {
            let prefix = doc.strings.get_non_empty(def.prefix_id).map(str::to_string);
            let used = node.uses_prefix(prefix.as_deref())
                || descendants.iter().any(|n| n.uses_prefix(prefix.as_deref()));
            let shadowed = node.ns_defs.iter().any(|(p, _)| *p == prefix);
            if used && !shadowed && def.uri_id != 0 {
                let uri = doc.strings.get(def.uri_id).unwrap_or_default().to_string();
                node.ns_defs.push((prefix, uri));
            }
        }

        let mut tail = Vec::new();
        let mut current = doc.next(id);
        while let Some(t) = current {
            if !doc.node(t).is_some_and(XmlNode::is_text) {
                break;
            }
            if let Some(snapshot) = NodeSnapshot::take(doc, t, None) {
                tail.push(snapshot);
            }
            current = doc.next(t);
        }

        Some(Detached {
            node,
            descendants,
            tail,
        })
    }
}

/// Rebuild a captured node in `doc`.
///
/// The copy is returned detached, with its tail linked as a `next` chain
/// that has no parent.
pub fn materialize(doc: &mut Document, detached: &Detached) -> NodeId {
    let id = detached.node.build(doc);
    let mut built: Vec<NodeId> = Vec::with_capacity(detached.descendants.len() + 1);
    built.push(id);
    for snapshot in &detached.descendants {
        let child = snapshot.build(doc);
        // pre-order keeps siblings in document order
        if let Some(&parent) = snapshot.parent.and_then(|p| built.get(p)) {
            doc.add_child(parent, child);
        }
        built.push(child);
    }
    let mut anchor = id;
    for snapshot in &detached.tail {
        let t = snapshot.build(doc);
        doc.add_next_sibling(anchor, t);
        anchor = t;
    }
    id
}

/// Deep-copy `id` (with its tail) from `src` into `dst`, detached
pub fn copy_node_to_doc(src: &Document, id: NodeId, dst: &mut Document) -> Option<NodeId> {
    let detached = Detached::capture(src, id)?;
    Some(materialize(dst, &detached))
}

/// Move the text run starting at `tail` to directly after `after`
pub fn move_tail(doc: &mut Document, tail: Option<NodeId>, after: NodeId) {
    let mut current = tail;
    let mut anchor = after;
    while let Some(t) = current {
        if !doc.node(t).is_some_and(XmlNode::is_text) {
            break;
        }
        current = doc.next(t);
        doc.unlink(t);
        doc.add_next_sibling(anchor, t);
        anchor = t;
    }
}

/// Materialize `detached` as the last child of `parent`, tail included.
/// Returns the copy's id.
pub fn append_copy(doc: &mut Document, parent: NodeId, detached: &Detached) -> NodeId {
    let copy = materialize(doc, detached);
    // add_child clears `next`; pick the tail up first
    let tail = doc.next(copy);
    doc.add_child(parent, copy);
    move_tail(doc, tail, copy);
    reconcile_namespaces(doc, copy);
    copy
}

/// Make every element and attribute under `root` resolve to the namespace
/// it carries, in its current position.
///
/// A binding already in scope is reused. Otherwise the prefix is declared on
/// `root` when nothing above binds it, or on the node itself when it clashes.
pub fn reconcile_namespaces(doc: &mut Document, root: NodeId) {
    let mut scope = Scope::new(doc, root);
    let mut stack = vec![(root, 0usize)];
    while let Some((id, depth)) = stack.pop() {
        let Some(node) = doc.node(id) else {
            continue;
        };
        let is_element = node.is_element();
        scope.enter(depth, &node.ns_defs);

        if is_element && !scope.resolves(doc, id) {
            reconcile_element(doc, root, id);
            scope.rebuild(doc, root, id, depth);
        }

        let first = stack.len();
        let mut child = doc.first_child(id);
        while let Some(c) = child {
            stack.push((c, depth + 1));
            child = doc.next(c);
        }
        stack[first..].reverse();
    }
}

/// Declarations in scope along the current path of a reconcile walk
struct Scope {
    /// `(depth below root, declaration)`, innermost last
    frames: Vec<(usize, NsDef)>,
    /// Bindings above `root`; the walk never changes them
    outer: HashMap<u32, Option<u32>>,
    above: Option<NodeId>,
    xml_prefix: Option<u32>,
}

impl Scope {
    fn new(doc: &Document, root: NodeId) -> Self {
        Scope {
            frames: Vec::new(),
            outer: HashMap::new(),
            above: doc.parent(root),
            xml_prefix: doc.strings.lookup("xml"),
        }
    }

    fn enter(&mut self, depth: usize, defs: &[NsDef]) {
        while self.frames.last().is_some_and(|&(d, _)| d >= depth) {
            self.frames.pop();
        }
        self.frames.extend(defs.iter().map(|&def| (depth, def)));
    }

    /// Reload the path `root..=id` after declarations were added to it
    fn rebuild(&mut self, doc: &Document, root: NodeId, id: NodeId, depth: usize) {
        let mut path = Vec::with_capacity(depth + 1);
        let mut current = Some(id);
        while let Some(c) = current {
            path.push(c);
            if c == root {
                break;
            }
            current = doc.parent(c);
        }
        self.frames.clear();
        for (offset, &node) in path.iter().rev().enumerate() {
            if let Some(n) = doc.node(node) {
                self.frames.extend(n.ns_defs.iter().map(|&def| (offset, def)));
            }
        }
    }

    fn lookup(&mut self, doc: &Document, prefix_id: u32) -> Option<u32> {
        if prefix_id != 0 && Some(prefix_id) == self.xml_prefix {
            return doc.strings.lookup(ns::XML);
        }
        if let Some(&(_, def)) = self.frames.iter().rev().find(|(_, def)| def.prefix_id == prefix_id) {
            return Some(def.uri_id);
        }
        let above = self.above;
        *self
            .outer
            .entry(prefix_id)
            .or_insert_with(|| above.and_then(|a| search_ns(doc, a, prefix_id)))
    }

    /// Whether element `id` and its attributes already resolve correctly
    fn resolves(&mut self, doc: &Document, id: NodeId) -> bool {
        let Some(node) = doc.node(id) else {
            return true;
        };
        let element_ok = if node.namespace_id == 0 {
            self.lookup(doc, 0).map_or(true, |uri| uri == 0)
        } else {
            self.lookup(doc, node.prefix_id) == Some(node.namespace_id)
        };
        element_ok
            && node.attributes.iter().all(|attr| {
                attr.namespace_id == 0
                    || (attr.prefix_id != 0 && self.lookup(doc, attr.prefix_id) == Some(attr.namespace_id))
            })
    }
}

fn reconcile_element(doc: &mut Document, root: NodeId, id: NodeId) {
    let Some((prefix_id, namespace_id)) = doc.node(id).map(|n| (n.prefix_id, n.namespace_id)) else {
        return;
    };

    if namespace_id == 0 {
        // An un-namespaced element must not fall into an inherited default
        if search_ns(doc, id, 0).is_some_and(|uri| uri != 0) {
            push_def(doc, id, 0, 0);
        }
    } else if search_ns(doc, id, prefix_id) != Some(namespace_id) {
        let bound = bind(doc, root, id, prefix_id, namespace_id, true);
        if let Some(node) = doc.node_mut(id) {
            node.prefix_id = bound;
        }
    }

    let count = doc.node(id).map_or(0, |n| n.attributes.len());
    for index in 0..count {
        let Some((prefix_id, namespace_id)) = doc
            .node(id)
            .and_then(|n| n.attributes.get(index))
            .map(|a| (a.prefix_id, a.namespace_id))
        else {
            continue;
        };
        if namespace_id == 0 {
            continue;
        }
        if prefix_id != 0 && search_ns(doc, id, prefix_id) == Some(namespace_id) {
            continue;
        }
        let bound = bind(doc, root, id, prefix_id, namespace_id, false);
        if let Some(attr) = doc.node_mut(id).and_then(|n| n.attributes.get_mut(index)) {
            attr.prefix_id = bound;
        }
    }
}

/// Find or declare a prefix for `uri_id` usable at `id`. Returns the prefix.
fn bind(doc: &mut Document, root: NodeId, id: NodeId, prefix_id: u32, uri_id: u32, allow_default: bool) -> u32 {
    if doc.strings.get(uri_id) == Some(ns::XML) {
        return doc.strings.intern("xml");
    }
    if let Some(existing) = search_ns_by_href(doc, id, uri_id, allow_default) {
        return existing;
    }

    if prefix_id != 0 || allow_default {
        if search_ns(doc, root, prefix_id).is_none() {
            push_def(doc, root, prefix_id, uri_id);
            return prefix_id;
        }
        let declared_here = doc
            .node(id)
            .is_some_and(|n| n.ns_defs.iter().any(|d| d.prefix_id == prefix_id));
        if !declared_here {
            push_def(doc, id, prefix_id, uri_id);
            return prefix_id;
        }
    }

    let mut counter = 0usize;
    let fresh = loop {
        let candidate = format!("ns{}", counter);
        let candidate_id = doc.strings.intern(&candidate);
        if search_ns(doc, id, candidate_id).is_none() {
            break candidate_id;
        }
        counter += 1;
    };
    push_def(doc, id, fresh, uri_id);
    fresh
}

fn push_def(doc: &mut Document, id: NodeId, prefix_id: u32, uri_id: u32) {
    if let Some(node) = doc.node_mut(id) {
        node.ns_defs.retain(|d| d.prefix_id != prefix_id);
        node.ns_defs.push(NsDef { prefix_id, uri_id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::collect::{collect_text, next_element};
    use crate::dom::namespace::search_ns;

    fn uri_of(doc: &Document, id: NodeId, prefix: Option<&str>) -> Option<String> {
        let prefix_id = match prefix {
            Some(p) => doc.strings.lookup(p)?,
            None => 0,
        };
        search_ns(doc, id, prefix_id).and_then(|u| doc.strings.get(u)).map(str::to_string)
    }

    #[test]
    fn test_copy_across_documents() {
        let src = Document::parse("<r>\n<a k=\"v\">x<b/>y</a>after<c/></r>").unwrap();
        let r = src.root_element().unwrap();
        let a = next_element(&src, src.first_child(r)).unwrap();

        let mut dst = Document::parse("<d/>").unwrap();
        let copy = copy_node_to_doc(&src, a, &mut dst).unwrap();

        assert_eq!(dst.qualified_name(copy).as_deref(), Some("a"));
        assert_eq!(dst.line(copy), Some(2));
        assert_eq!(crate::dom::collect::find_attribute(&dst, copy, "k"), Some("v"));
        assert_eq!(collect_text(&dst, dst.first_child(copy)).as_deref(), Some("x"));
        assert_eq!(dst.children(copy).count(), 3);
        // tail hangs off the detached copy
        assert_eq!(collect_text(&dst, dst.next(copy)).as_deref(), Some("after"));
        assert_eq!(dst.parent(copy), None);

        // source untouched
        assert_eq!(collect_text(&src, src.next(a)).as_deref(), Some("after"));
    }

    #[test]
    fn test_append_moves_tail_behind_copy() {
        let src = Document::parse("<r><a/>t1<![CDATA[t2]]><!--c--><b/></r>").unwrap();
        let r = src.root_element().unwrap();
        let a = src.first_child(r).unwrap();
        let detached = Detached::capture(&src, a).unwrap();
        assert_eq!(detached.tail.len(), 2);

        let mut dst = Document::parse("<d><x/>keep</d>").unwrap();
        let d = dst.root_element().unwrap();
        let copy = append_copy(&mut dst, d, &detached);

        assert_eq!(dst.parent(copy), Some(d));
        assert_eq!(collect_text(&dst, dst.next(copy)).as_deref(), Some("t1t2"));
        // the copy and its two tail nodes land at the end
        let children: Vec<_> = dst.children(d).collect();
        assert_eq!(children.len(), 5);
        assert_eq!(children[2], copy);
        assert_eq!(dst.last_child(d), Some(children[4]));
        for child in children {
            assert_eq!(dst.parent(child), Some(d));
        }
    }

    #[test]
    fn test_append_into_own_descendant() {
        let mut doc = Document::parse("<r><a><b/></a></r>").unwrap();
        let r = doc.root_element().unwrap();
        let a = doc.first_child(r).unwrap();
        let b = doc.first_child(a).unwrap();

        let detached = Detached::capture(&doc, a).unwrap();
        let copy = append_copy(&mut doc, b, &detached);

        assert_eq!(doc.parent(copy), Some(b));
        assert_eq!(doc.qualified_name(copy).as_deref(), Some("a"));
        let inner = doc.first_child(copy).unwrap();
        assert_eq!(doc.qualified_name(inner).as_deref(), Some("b"));
        assert_eq!(doc.first_child(inner), None);
    }

    #[test]
    fn test_inherited_prefix_travels_with_copy() {
        let src = Document::parse(r#"<r xmlns:p="urn:p"><p:a p:k="v"><p:b/></p:a></r>"#).unwrap();
        let r = src.root_element().unwrap();
        let a = src.first_child(r).unwrap();

        let mut dst = Document::parse("<d/>").unwrap();
        let d = dst.root_element().unwrap();
        let detached = Detached::capture(&src, a).unwrap();
        let copy = append_copy(&mut dst, d, &detached);

        assert_eq!(dst.qualified_name(copy).as_deref(), Some("{urn:p}a"));
        assert_eq!(uri_of(&dst, copy, Some("p")).as_deref(), Some("urn:p"));
        assert_eq!(dst.node(copy).unwrap().ns_defs.len(), 1);
        let b = dst.first_child(copy).unwrap();
        assert!(dst.node(b).unwrap().ns_defs.is_empty());
        assert_eq!(dst.prefix(b), Some("p"));
    }

    #[test]
    fn test_prefix_clash_in_destination() {
        let src = Document::parse(r#"<p:a xmlns:p="urn:p"/>"#).unwrap();
        let a = src.root_element().unwrap();
        let mut dst = Document::parse(r#"<d xmlns:p="urn:other"><x/></d>"#).unwrap();
        let d = dst.root_element().unwrap();
        let x = dst.first_child(d).unwrap();

        let detached = Detached::capture(&src, a).unwrap();
        let copy = append_copy(&mut dst, x, &detached);

        assert_eq!(dst.qualified_name(copy).as_deref(), Some("{urn:p}a"));
        let prefix = dst.prefix(copy).map(str::to_string);
        assert_eq!(uri_of(&dst, copy, prefix.as_deref()).as_deref(), Some("urn:p"));
        // destination bindings are untouched
        assert_eq!(uri_of(&dst, x, Some("p")).as_deref(), Some("urn:other"));
    }

    #[test]
    fn test_default_namespace_reconciled() {
        let src = Document::parse(r#"<r xmlns="urn:d"><a><b/></a><c xmlns=""/></r>"#).unwrap();
        let r = src.root_element().unwrap();
        let a = src.first_child(r).unwrap();
        let c = src.next(a).unwrap();

        let mut dst = Document::parse(r#"<d xmlns="urn:x"/>"#).unwrap();
        let d = dst.root_element().unwrap();

        let a_copy = append_copy(&mut dst, d, &Detached::capture(&src, a).unwrap());
        assert_eq!(uri_of(&dst, a_copy, None).as_deref(), Some("urn:d"));
        let b = dst.first_child(a_copy).unwrap();
        assert_eq!(dst.qualified_name(b).as_deref(), Some("{urn:d}b"));
        assert_eq!(uri_of(&dst, b, None).as_deref(), Some("urn:d"));

        // an un-namespaced element may not inherit urn:x
        let c_copy = append_copy(&mut dst, d, &Detached::capture(&src, c).unwrap());
        assert_eq!(dst.qualified_name(c_copy).as_deref(), Some("c"));
        assert_eq!(search_ns(&dst, c_copy, 0), Some(0));
    }

    #[test]
    fn test_copy_deeply_nested_subtree() {
        let depth = 50_000;
        let xml = format!("<r>{}{}</r>", "<a>".repeat(depth), "</a>".repeat(depth));
        let src = Document::parse(&xml).unwrap();
        let a = src.first_child(src.root_element().unwrap()).unwrap();

        let detached = Detached::capture(&src, a).unwrap();
        assert_eq!(detached.descendants.len(), depth - 1);

        let mut dst = Document::parse("<d/>").unwrap();
        let d = dst.root_element().unwrap();
        let copy = append_copy(&mut dst, d, &detached);

        let mut levels = 0;
        let mut current = Some(copy);
        while let Some(c) = current {
            levels += 1;
            current = dst.first_child(c);
        }
        assert_eq!(levels, depth);
        assert_eq!(dst.parent(copy), Some(d));
    }

    #[test]
    fn test_capture_keeps_sibling_order() {
        let src = Document::parse("<r><a><b>1</b><c><d/></c>2<e/></a></r>").unwrap();
        let a = src.first_child(src.root_element().unwrap()).unwrap();
        let mut dst = Document::parse("<x/>").unwrap();
        let x = dst.root_element().unwrap();
        let copy = append_copy(&mut dst, x, &Detached::capture(&src, a).unwrap());

        let names: Vec<_> = dst
            .children(copy)
            .map(|c| {
                if dst.is_element(c) {
                    dst.qualified_name(c).unwrap()
                } else {
                    dst.content(c).unwrap().to_string()
                }
            })
            .collect();
        assert_eq!(names, vec!["b", "c", "2", "e"]);
        let c = dst.children(copy).nth(1).unwrap();
        assert_eq!(dst.qualified_name(dst.first_child(c).unwrap()).as_deref(), Some("d"));
    }

    #[test]
    fn test_capture_rejects_document_node() {
        let doc = Document::parse("<r/>").unwrap();
        assert!(Detached::capture(&doc, doc.document_node()).is_none());
    }
}
