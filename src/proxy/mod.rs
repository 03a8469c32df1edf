//! Proxy Module - invalidating views over document nodes
//!
//! Three handle types share one read contract:
//! - `ElementProxy`: read accessors and navigation
//! - `RootProxy`: starts a cohort and, when owning, frees its subtree
//! - `AppendOnlyProxy`: may append copied elements and replace leading text
//!
//! Every proxy reached by navigating from a root shares that root's
//! `SourceProxy`. Releasing the root invalidates all of them at once.

pub mod append;
pub mod element;
pub mod iter;
pub mod registry;
pub mod root;

pub use append::AppendOnlyProxy;
pub use element::ElementProxy;
pub use iter::Children;
pub use registry::{NodeRef, SourceProxy};
pub use root::RootProxy;

use crate::dom::{NodeId, SharedDocument};
use crate::error::{Error, Result};

/// What a proxy variant is allowed to do beyond reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Frees its subtree when released
    pub owns_subtree: bool,
    /// May append children and replace leading text
    pub mutable: bool,
}

impl Capabilities {
    pub const READ_ONLY: Capabilities = Capabilities {
        owns_subtree: false,
        mutable: false,
    };
    pub const APPEND_ONLY: Capabilities = Capabilities {
        owns_subtree: false,
        mutable: true,
    };
}

/// Common surface of the proxy variants
pub trait Proxy {
    /// The read-only element view
    fn element(&self) -> &ElementProxy;

    fn capabilities(&self) -> Capabilities;
}

/// Anything `AppendOnlyProxy::append` can copy from
pub trait NodeSource {
    /// Document and element node to copy.
    ///
    /// `InvalidArgument` if there is no valid element behind this handle,
    /// `DocumentBusy` if its document cannot be read right now.
    fn source_node(&self) -> Result<(SharedDocument, NodeId)>;
}

fn not_an_element() -> Error {
    Error::invalid_argument("append source is not a valid element")
}

fn element_source(proxy: &ElementProxy) -> Result<(SharedDocument, NodeId)> {
    match proxy.with_node(|doc, id| doc.is_element(id).then_some(id)) {
        Ok(Some(id)) => Ok((SharedDocument::clone(proxy.document()), id)),
        Err(Error::DocumentBusy) => Err(Error::DocumentBusy),
        Ok(None) | Err(_) => Err(not_an_element()),
    }
}

impl NodeSource for ElementProxy {
    fn source_node(&self) -> Result<(SharedDocument, NodeId)> {
        element_source(self)
    }
}

impl NodeSource for RootProxy {
    fn source_node(&self) -> Result<(SharedDocument, NodeId)> {
        element_source(self)
    }
}

impl NodeSource for AppendOnlyProxy {
    fn source_node(&self) -> Result<(SharedDocument, NodeId)> {
        element_source(self)
    }
}

impl<T: NodeSource + ?Sized> NodeSource for &T {
    fn source_node(&self) -> Result<(SharedDocument, NodeId)> {
        (**self).source_node()
    }
}

/// Plain handle to an element of a shared document, outside any cohort
#[derive(Debug, Clone)]
pub struct ElementRef {
    document: SharedDocument,
    node: NodeId,
}

impl ElementRef {
    pub fn new(document: SharedDocument, node: NodeId) -> Self {
        ElementRef { document, node }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }
}

impl NodeSource for ElementRef {
    fn source_node(&self) -> Result<(SharedDocument, NodeId)> {
        if !self.document.try_borrow()?.is_element(self.node) {
            return Err(not_an_element());
        }
        Ok((SharedDocument::clone(&self.document), self.node))
    }
}
