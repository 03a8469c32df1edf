//! Lazy element-child iteration

use std::iter::FusedIterator;

use super::element::ElementProxy;
use crate::dom::collect::next_element;
use crate::dom::NodeId;
use crate::error::Result;

/// Element children of one proxy, produced one at a time.
///
/// Each step re-reads the document, so children appended during iteration
/// are seen. If the cohort is invalidated mid-way the next step yields one
/// `Err(InvalidProxy)` and iteration ends; a busy document ends it the same
/// way with `Err(DocumentBusy)`.
pub struct Children {
    parent: ElementProxy,
    /// Last child yielded; `None` before the first step
    current: Option<NodeId>,
    done: bool,
}

impl Children {
    pub(crate) fn new(parent: ElementProxy) -> Self {
        Children {
            parent,
            current: None,
            done: false,
        }
    }
}

impl Iterator for Children {
    type Item = Result<ElementProxy>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let current = self.current;
        let step = self.parent.with_node(|doc, id| match current {
            None => next_element(doc, doc.first_child(id)),
            Some(prev) if doc.contains(prev) => next_element(doc, doc.next(prev)),
            Some(_) => None,
        });
        match step {
            Ok(Some(child)) => {
                self.current = Some(child);
                Some(Ok(self.parent.spawn(child)))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl FusedIterator for Children {}
