//! Read-Only Element Proxy
//!
//! A handle to one element of a cohort's subtree. Every accessor checks the
//! slot first and fails with `InvalidProxy` once the cohort is released.
//! Navigation never caches: each call registers a fresh proxy with the same
//! registry.

use std::fmt;
use std::ops::{Bound, RangeBounds};
use std::rc::Rc;

use indexmap::IndexMap;

use super::iter::Children;
use super::registry::{ProxySlot, SourceProxy};
use super::{Capabilities, Proxy};
use crate::dom::collect::{
    attribute_items, attribute_names, attribute_values, collect_text, find_attribute,
    has_element_child, next_element, previous_element,
};
use crate::dom::{Document, NodeId, SharedDocument};
use crate::error::{Error, Result};

/// Read-only view of one element
#[derive(Clone)]
pub struct ElementProxy {
    source: Rc<SourceProxy>,
    slot: Rc<ProxySlot>,
}

impl ElementProxy {
    pub(crate) fn new(source: Rc<SourceProxy>, slot: Rc<ProxySlot>) -> Self {
        ElementProxy { source, slot }
    }

    /// A new proxy for `node` in this proxy's cohort
    pub(crate) fn spawn(&self, node: NodeId) -> ElementProxy {
        let slot = self.source.register(node);
        ElementProxy::new(Rc::clone(&self.source), slot)
    }

    pub(crate) fn source(&self) -> &Rc<SourceProxy> {
        &self.source
    }

    pub(crate) fn with_node<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Document, NodeId) -> R,
    {
        self.source.with_node(&self.slot, f)
    }

    /// Whether this node is the top of the cohort's subtree
    fn is_subtree_root(&self, id: NodeId) -> bool {
        self.source.root_node() == Some(id)
    }

    // Identity

    pub fn node_id(&self) -> Result<NodeId> {
        self.with_node(|_, id| id)
    }

    pub fn is_valid(&self) -> bool {
        self.with_node(|_, _| ()).is_ok()
    }

    /// Same live node of the same document. Invalid proxies match nothing.
    pub fn is_same_node(&self, other: &ElementProxy) -> bool {
        match (self.node_id(), other.node_id()) {
            (Ok(a), Ok(b)) => a == b && Rc::ptr_eq(self.document(), other.document()),
            _ => false,
        }
    }

    /// Whether both proxies belong to the same cohort
    pub fn same_cohort(&self, other: &ElementProxy) -> bool {
        Rc::ptr_eq(&self.source, &other.source)
    }

    pub fn document(&self) -> &SharedDocument {
        self.source.document()
    }

    // Read accessors

    /// Qualified tag name, `{uri}local` when namespaced
    pub fn tag(&self) -> Result<String> {
        self.with_node(|doc, id| doc.qualified_name(id).unwrap_or_default())
    }

    /// Text before the first non-text child
    pub fn text(&self) -> Result<Option<String>> {
        self.with_node(|doc, id| collect_text(doc, doc.first_child(id)))
    }

    /// Text after this element, before the next non-text sibling
    pub fn tail(&self) -> Result<Option<String>> {
        self.with_node(|doc, id| collect_text(doc, doc.next(id)))
    }

    /// Snapshot of the attributes in declaration order
    pub fn attrib(&self) -> Result<IndexMap<String, String>> {
        self.with_node(|doc, id| attribute_items(doc, id).into_iter().collect())
    }

    pub fn prefix(&self) -> Result<Option<String>> {
        self.with_node(|doc, id| doc.prefix(id).map(str::to_string))
    }

    /// Line the element started on, `None` when unknown
    pub fn sourceline(&self) -> Result<Option<u32>> {
        self.with_node(|doc, id| doc.line(id))
    }

    /// Attribute value by `local` or `{uri}local` name
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_node(|doc, id| find_attribute(doc, id, key).map(str::to_string))
    }

    pub fn get_or(&self, key: &str, default: &str) -> Result<String> {
        Ok(self.get(key)?.unwrap_or_else(|| default.to_string()))
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        self.with_node(attribute_names)
    }

    pub fn values(&self) -> Result<Vec<String>> {
        self.with_node(attribute_values)
    }

    pub fn items(&self) -> Result<Vec<(String, String)>> {
        self.with_node(attribute_items)
    }

    // Element children

    /// Number of element children
    pub fn len(&self) -> Result<usize> {
        self.with_node(|doc, id| doc.element_children(id).count())
    }

    /// True iff there is at least one element child
    pub fn has_children(&self) -> Result<bool> {
        self.with_node(has_element_child)
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.has_children().map(|has| !has)
    }

    /// Element child at `index`; negative indices count from the end
    pub fn child(&self, index: isize) -> Result<ElementProxy> {
        let found = self.with_node(|doc, id| {
            let position = if index < 0 {
                let len = doc.element_children(id).count();
                len.checked_sub(index.unsigned_abs())
            } else {
                Some(index.unsigned_abs())
            };
            position
                .and_then(|p| doc.element_children(id).nth(p))
                .ok_or_else(|| Error::IndexOutOfRange {
                    index,
                    len: doc.element_children(id).count(),
                })
        })??;
        Ok(self.spawn(found))
    }

    /// Element children with positions in `range`, clamped to the count
    pub fn slice<R: RangeBounds<usize>>(&self, range: R) -> Result<Vec<ElementProxy>> {
        let start = match range.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s.saturating_add(1),
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&e) => Some(e.saturating_add(1)),
            Bound::Excluded(&e) => Some(e),
            Bound::Unbounded => None,
        };
        let take = end.map_or(usize::MAX, |e| e.saturating_sub(start));
        let ids: Vec<NodeId> = self.with_node(|doc, id| {
            doc.element_children(id).skip(start).take(take).collect()
        })?;
        Ok(ids.into_iter().map(|id| self.spawn(id)).collect())
    }

    /// Lazy iterator over element children
    pub fn iter(&self) -> Children {
        Children::new(self.clone())
    }

    /// All element children in document order
    pub fn children(&self) -> Result<Vec<ElementProxy>> {
        self.slice(..)
    }

    /// Element children, optionally filtered by exact tag and reversed
    pub fn iter_children(&self, tag: Option<&str>, reversed: bool) -> Result<Vec<ElementProxy>> {
        let mut ids: Vec<NodeId> = self.with_node(|doc, id| {
            doc.element_children(id)
                .filter(|&child| tag.is_none_or(|t| doc.qualified_name(child).as_deref() == Some(t)))
                .collect()
        })?;
        if reversed {
            ids.reverse();
        }
        Ok(ids.into_iter().map(|id| self.spawn(id)).collect())
    }

    // Navigation

    /// Parent element, `None` at the subtree root or under a non-element
    pub fn parent(&self) -> Result<Option<ElementProxy>> {
        let parent = self.with_node(|doc, id| {
            if self.is_subtree_root(id) {
                return None;
            }
            doc.parent(id).filter(|&p| doc.is_element(p))
        })?;
        Ok(parent.map(|p| self.spawn(p)))
    }

    /// Next element sibling, skipping text, comments and PIs
    pub fn next_sibling(&self) -> Result<Option<ElementProxy>> {
        let next = self.with_node(|doc, id| {
            if self.is_subtree_root(id) {
                return None;
            }
            next_element(doc, doc.next(id))
        })?;
        Ok(next.map(|n| self.spawn(n)))
    }

    /// Previous element sibling. Walks forward from the parent's first child.
    pub fn previous_sibling(&self) -> Result<Option<ElementProxy>> {
        let previous = self.with_node(|doc, id| {
            if self.is_subtree_root(id) {
                return None;
            }
            previous_element(doc, id)
        })?;
        Ok(previous.map(|p| self.spawn(p)))
    }
}

impl Proxy for ElementProxy {
    fn element(&self) -> &ElementProxy {
        self
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::READ_ONLY
    }
}

impl IntoIterator for &ElementProxy {
    type Item = Result<ElementProxy>;
    type IntoIter = Children;

    fn into_iter(self) -> Children {
        self.iter()
    }
}

impl fmt::Debug for ElementProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ElementProxy");
        match self.slot.get() {
            super::NodeRef::Live(id) => s.field("node", &id),
            super::NodeRef::Invalidated => s.field("node", &"invalidated"),
        };
        s.finish()
    }
}
