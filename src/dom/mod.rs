//! DOM Module - Arena-based XML Document
//!
//! The tree the proxies view:
//! - Arena allocation for nodes, addressed by `NodeId` (u32) indices
//! - Freed slots are never reused, so a stale id fails lookup
//! - String interning for names, text and namespace URIs
//! - Namespace resolution for loading and for copied subtrees

pub(crate) mod builder;
pub mod collect;
pub mod copy;
pub mod document;
pub mod namespace;
pub mod node;
pub mod strings;

pub use copy::{append_copy, copy_node_to_doc, Detached};
pub use document::{Document, SharedDocument};
pub use node::{NodeId, NodeKind, NsDef, XmlAttribute, XmlNode};
pub use strings::StringPool;
