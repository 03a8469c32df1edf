//! Root Element Proxy
//!
//! The proxy that starts a cohort. An owning root frees its subtree exactly
//! once, on `release()` or on drop, and invalidates every proxy of the
//! cohort with it. A borrowed root only invalidates.

use std::cell::Cell;
use std::ops::Deref;
use std::rc::Rc;

use tracing::{debug, warn};

use super::append::AppendOnlyProxy;
use super::element::ElementProxy;
use super::registry::SourceProxy;
use super::{Capabilities, Proxy};
use crate::dom::{Document, NodeId, SharedDocument};
use crate::error::{Error, Result};

/// Root of a proxy cohort
pub struct RootProxy {
    element: ElementProxy,
    owns_subtree: bool,
    released: Cell<bool>,
}

impl RootProxy {
    /// Own the subtree at `node`. Dropping the root frees it.
    pub fn new(document: SharedDocument, node: NodeId) -> Result<Self> {
        RootProxy::create(document, node, true)
    }

    /// Track a subtree owned elsewhere. Releasing only invalidates.
    pub fn borrowed(document: SharedDocument, node: NodeId) -> Result<Self> {
        RootProxy::create(document, node, false)
    }

    /// Parse `xml` (lenient) and own its root element
    pub fn parse(xml: &str) -> Result<Self> {
        let doc = Document::parse(xml)?;
        let root = doc
            .root_element()
            .ok_or_else(|| Error::parse("Document has no root element", 1))?;
        RootProxy::new(doc.into_shared(), root)
    }

    fn create(document: SharedDocument, node: NodeId, owns_subtree: bool) -> Result<Self> {
        if !document.try_borrow()?.is_element(node) {
            return Err(Error::invalid_argument(format!(
                "node {} is not a live element",
                node
            )));
        }
        let source = SourceProxy::new(document, node);
        let slot = Rc::clone(source.root_slot());
        Ok(RootProxy {
            element: ElementProxy::new(source, slot),
            owns_subtree,
            released: Cell::new(false),
        })
    }

    pub fn owns_subtree(&self) -> bool {
        self.owns_subtree
    }

    /// Free the subtree (when owned) and invalidate the whole cohort.
    ///
    /// Idempotent; returns the number of nodes freed, 0 after the first call.
    pub fn release(&self) -> usize {
        if self.released.replace(true) {
            return 0;
        }
        let source = self.element.source();
        let mut freed = 0;
        if self.owns_subtree {
            if let Some(node) = source.root_node() {
                match source.document().try_borrow_mut() {
                    Ok(mut doc) => freed = doc.free_subtree(node),
                    Err(_) => warn!(root = %node, "document busy, subtree not freed"),
                }
            }
        }
        let invalidated = source.invalidate();
        debug!(freed, invalidated, owned = self.owns_subtree, "released root proxy");
        freed
    }

    /// Append-only proxy for the root element
    pub fn append_only(&self) -> Result<AppendOnlyProxy> {
        let node = self.element.node_id()?;
        Ok(AppendOnlyProxy::new(self.element.spawn(node)))
    }

    /// Append-only proxy for an element of this cohort
    pub fn append_only_at(&self, proxy: &ElementProxy) -> Result<AppendOnlyProxy> {
        self.element.node_id()?;
        if !self.element.same_cohort(proxy) {
            return Err(Error::invalid_argument("proxy belongs to another cohort"));
        }
        let node = proxy.node_id()?;
        Ok(AppendOnlyProxy::new(self.element.spawn(node)))
    }
}

impl Deref for RootProxy {
    type Target = ElementProxy;

    fn deref(&self) -> &ElementProxy {
        &self.element
    }
}

impl Proxy for RootProxy {
    fn element(&self) -> &ElementProxy {
        &self.element
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            owns_subtree: self.owns_subtree,
            mutable: false,
        }
    }
}

impl Drop for RootProxy {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for RootProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootProxy")
            .field("element", &self.element)
            .field("owns_subtree", &self.owns_subtree)
            .field("released", &self.released.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_frees_once() {
        let root = RootProxy::parse("<r><a/><b>t</b></r>").unwrap();
        let doc = Rc::clone(root.document());
        assert_eq!(root.release(), 4);
        assert_eq!(root.release(), 0);
        assert!(doc.borrow().root_element().is_none());
        assert_eq!(root.tag(), Err(Error::InvalidProxy));
    }

    #[test]
    fn test_drop_releases() {
        let root = RootProxy::parse("<r><a/></r>").unwrap();
        let child = root.child(0).unwrap();
        let doc = Rc::clone(root.document());
        drop(root);
        assert!(!child.is_valid());
        assert_eq!(doc.borrow().node_count(), 1);
    }

    #[test]
    fn test_owning_root_inside_document() {
        let doc = Document::parse("<r><keep/><gone><x/></gone>tail</r>")
            .unwrap()
            .into_shared();
        let (r, gone) = {
            let d = doc.borrow();
            let r = d.root_element().unwrap();
            let x = (r, d.element_children(r).nth(1).unwrap()); x
        };
        let root = RootProxy::new(Rc::clone(&doc), gone).unwrap();
        assert!(root.parent().unwrap().is_none());
        assert!(root.next_sibling().unwrap().is_none());
        assert_eq!(root.tail().unwrap().as_deref(), Some("tail"));

        assert_eq!(root.release(), 2);
        let d = doc.borrow();
        assert_eq!(d.element_children(r).count(), 1);
        assert!(d.contains(r));
    }

    #[test]
    fn test_borrowed_root_frees_nothing() {
        let doc = Document::parse("<r><a/></r>").unwrap().into_shared();
        let r = doc.borrow().root_element().unwrap();
        let root = RootProxy::borrowed(Rc::clone(&doc), r).unwrap();
        assert!(!root.capabilities().owns_subtree);
        let a = root.child(0).unwrap();

        assert_eq!(root.release(), 0);
        assert!(!a.is_valid());
        assert!(doc.borrow().contains(r));
    }

    #[test]
    fn test_rejects_non_element() {
        let doc = Document::parse("<r>text</r>").unwrap().into_shared();
        let text = {
            let d = doc.borrow();
            d.first_child(d.root_element().unwrap()).unwrap()
        };
        assert!(matches!(
            RootProxy::new(Rc::clone(&doc), text),
            Err(Error::InvalidArgument(_))
        ));
        let document_node = doc.borrow().document_node();
        assert!(RootProxy::new(doc, document_node).is_err());
        assert!(matches!(RootProxy::parse(""), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_append_only_at_checks_cohort() {
        let root = RootProxy::parse("<r><a/></r>").unwrap();
        let other = RootProxy::parse("<o/>").unwrap();
        let a = root.child(0).unwrap();

        let appender = root.append_only_at(&a).unwrap();
        assert!(appender.is_same_node(&a));
        assert!(matches!(
            root.append_only_at(&other),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_release_while_document_borrowed() {
        let root = RootProxy::parse("<r/>").unwrap();
        let doc = Rc::clone(root.document());
        let guard = doc.borrow();
        assert_eq!(root.release(), 0);
        assert!(!root.is_valid());
        drop(guard);
    }
}
