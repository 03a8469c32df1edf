//! Proxy Registry
//!
//! A `SourceProxy` is the root of one cohort: the slot of the subtree's top
//! element plus weak references to every slot handed out while navigating
//! from it. Invalidating the registry flips every live slot to
//! `NodeRef::Invalidated` in one pass, so no proxy in the cohort can reach
//! the document afterwards.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::dom::{Document, NodeId, SharedDocument};
use crate::error::{Error, Result};

/// Dependents are only pruned once the list reaches this many entries
const COMPACT_THRESHOLD: usize = 64;

/// Tagged node reference held by every proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRef {
    Live(NodeId),
    Invalidated,
}

/// One proxy's node reference, shared between the proxy and the registry
#[derive(Debug)]
pub struct ProxySlot {
    node: Cell<NodeRef>,
}

impl ProxySlot {
    fn new(node: NodeId) -> Self {
        ProxySlot {
            node: Cell::new(NodeRef::Live(node)),
        }
    }

    pub fn get(&self) -> NodeRef {
        self.node.get()
    }

    /// The live node, or `InvalidProxy`
    pub fn node(&self) -> Result<NodeId> {
        match self.node.get() {
            NodeRef::Live(id) => Ok(id),
            NodeRef::Invalidated => Err(Error::InvalidProxy),
        }
    }

    fn invalidate(&self) {
        self.node.set(NodeRef::Invalidated);
    }
}

/// Registry shared by every proxy of one cohort
#[derive(Debug)]
pub struct SourceProxy {
    document: SharedDocument,
    root: Rc<ProxySlot>,
    dependents: RefCell<Vec<Weak<ProxySlot>>>,
    compact_at: Cell<usize>,
}

impl SourceProxy {
    /// Start a cohort rooted at `node`. The root's own slot is the first
    /// dependent.
    pub fn new(document: SharedDocument, node: NodeId) -> Rc<Self> {
        let root = Rc::new(ProxySlot::new(node));
        debug!(root = %node, "created proxy cohort");
        Rc::new(SourceProxy {
            document,
            dependents: RefCell::new(vec![Rc::downgrade(&root)]),
            root,
            compact_at: Cell::new(COMPACT_THRESHOLD),
        })
    }

    pub fn document(&self) -> &SharedDocument {
        &self.document
    }

    /// Slot of the cohort's top element
    pub fn root_slot(&self) -> &Rc<ProxySlot> {
        &self.root
    }

    /// Top element of the cohort's subtree, or `None` once invalidated
    pub fn root_node(&self) -> Option<NodeId> {
        self.root.node().ok()
    }

    pub fn is_invalidated(&self) -> bool {
        self.root.get() == NodeRef::Invalidated
    }

    /// Hand out a new slot for `node`, tracked for invalidation.
    ///
    /// A registry that was already invalidated returns an invalidated slot.
    pub fn register(&self, node: NodeId) -> Rc<ProxySlot> {
        let slot = Rc::new(ProxySlot::new(node));
        if self.is_invalidated() {
            slot.invalidate();
            return slot;
        }

        let mut dependents = self.dependents.borrow_mut();
        if dependents.len() >= self.compact_at.get() {
            let before = dependents.len();
            dependents.retain(|weak| weak.strong_count() > 0);
            self.compact_at
                .set((dependents.len() * 2).max(COMPACT_THRESHOLD));
            trace!(
                before,
                after = dependents.len(),
                "pruned dropped proxies"
            );
        }
        dependents.push(Rc::downgrade(&slot));
        slot
    }

    /// Run `f` against the document and the live node of `slot`
    pub fn with_node<F, R>(&self, slot: &ProxySlot, f: F) -> Result<R>
    where
        F: FnOnce(&Document, NodeId) -> R,
    {
        let id = slot.node()?;
        let doc = self.document.try_borrow()?;
        if !doc.contains(id) {
            return Err(Error::InvalidProxy);
        }
        Ok(f(&doc, id))
    }

    /// Invalidate every proxy of the cohort and clear the dependent list.
    /// Returns how many live proxies were invalidated.
    pub fn invalidate(&self) -> usize {
        let dependents = std::mem::take(&mut *self.dependents.borrow_mut());
        let mut invalidated = 0;
        for slot in dependents.iter().filter_map(Weak::upgrade) {
            slot.invalidate();
            invalidated += 1;
        }
        // The root slot is held strongly and is always reached above
        self.root.invalidate();
        debug!(invalidated, "invalidated proxy cohort");
        invalidated
    }

    /// Tracked entries, including ones whose proxy was already dropped
    pub fn dependent_count(&self) -> usize {
        self.dependents.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> Rc<SourceProxy> {
        let doc = Document::parse("<r><a/></r>").unwrap();
        let root = doc.root_element().unwrap();
        SourceProxy::new(doc.into_shared(), root)
    }

    #[test]
    fn test_root_is_first_dependent() {
        let source = source();
        assert_eq!(source.dependent_count(), 1);
        assert!(source.root_node().is_some());
    }

    #[test]
    fn test_invalidate_reaches_every_slot() {
        let source = source();
        let root = source.root_node().unwrap();
        let slots: Vec<_> = (0..10).map(|_| source.register(root)).collect();

        assert_eq!(source.invalidate(), 11);
        assert!(slots.iter().all(|s| s.get() == NodeRef::Invalidated));
        assert!(source.is_invalidated());
        assert_eq!(source.dependent_count(), 0);
        assert_eq!(source.with_node(&slots[0], |_, id| id), Err(Error::InvalidProxy));
    }

    #[test]
    fn test_register_after_invalidate() {
        let source = source();
        let root = source.root_node().unwrap();
        source.invalidate();
        let late = source.register(root);
        assert_eq!(late.get(), NodeRef::Invalidated);
        assert_eq!(source.dependent_count(), 0);
    }

    #[test]
    fn test_dropped_proxies_are_pruned() {
        let source = source();
        let root = source.root_node().unwrap();
        let kept = source.register(root);
        for _ in 0..(COMPACT_THRESHOLD * 3) {
            drop(source.register(root));
        }
        assert!(source.dependent_count() < COMPACT_THRESHOLD * 3);

        source.invalidate();
        assert_eq!(kept.get(), NodeRef::Invalidated);
    }

    #[test]
    fn test_with_node_rejects_freed_node() {
        let source = source();
        let root = source.root_node().unwrap();
        let a = source.document().borrow().first_child(root).unwrap();
        let slot = source.register(a);
        source.document().borrow_mut().free_subtree(a);
        assert_eq!(source.with_node(&slot, |_, id| id), Err(Error::InvalidProxy));
    }
}
