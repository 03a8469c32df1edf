//! xmlview - Invalidating proxy views over an arena XML document
//!
//! Layers:
//! A: Loader (lenient and strict) building an arena `Document`
//! B: Text/attribute collection and cross-document node copy (`dom`)
//! C: Proxy cohorts: read-only, root and append-only handles (`proxy`)
//!
//! A `RootProxy` owns a subtree. Every proxy reached from it shares one
//! registry, and releasing the root (explicitly or by dropping it) frees the
//! subtree and invalidates the whole cohort. Access through an invalidated
//! proxy is an `Error::InvalidProxy`, never a stale read.
//!
//! ```
//! use xmlview::{Error, RootProxy};
//!
//! let root = RootProxy::parse("<list><item n=\"1\"/>tail</list>")?;
//! let item = root.child(0)?;
//! assert_eq!(item.get("n")?.as_deref(), Some("1"));
//! assert_eq!(item.tail()?.as_deref(), Some("tail"));
//!
//! root.release();
//! assert_eq!(item.tag(), Err(Error::InvalidProxy));
//! # Ok::<(), Error>(())
//! ```

mod core;
pub mod dom;
pub mod error;
pub mod proxy;
pub mod qname;

pub use dom::{Document, NodeId, NodeKind, SharedDocument};
pub use error::{Error, Result};
pub use proxy::{
    AppendOnlyProxy, Capabilities, Children, ElementProxy, ElementRef, NodeSource, Proxy,
    RootProxy,
};
pub use qname::{QName, TextValue};
