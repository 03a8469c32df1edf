//! Namespace Resolution
//!
//! Two halves:
//! - a stack-based resolver used while loading a document, and
//! - tree lookups over `NsDef` declarations for nodes already in the arena.

use super::document::Document;
use super::node::{NodeId, NsDef};
use super::strings::StringPool;

/// Well-known namespace URIs
pub mod ns {
    pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
    pub const XMLNS: &str = "http://www.w3.org/2000/xmlns/";
}

/// Namespace binding (prefix -> URI)
#[derive(Debug, Clone)]
struct NsBinding {
    prefix_id: u32,
    uri_id: u32,
    depth: usize,
}

/// Stack-based namespace resolver
#[derive(Debug)]
pub struct NamespaceResolver {
    /// Stack of namespace bindings
    bindings: Vec<NsBinding>,
    /// Current element depth
    depth: usize,
    /// Pre-interned prefix IDs
    xml_prefix_id: u32,
    xmlns_prefix_id: u32,
}

impl NamespaceResolver {
    /// Create a new namespace resolver with pre-declared xml and xmlns namespaces
    pub fn new(strings: &mut StringPool) -> Self {
        let xml_prefix_id = strings.intern("xml");
        let xmlns_prefix_id = strings.intern("xmlns");
        let xml_uri_id = strings.intern(ns::XML);
        let xmlns_uri_id = strings.intern(ns::XMLNS);

        NamespaceResolver {
            bindings: vec![
                NsBinding {
                    prefix_id: xml_prefix_id,
                    uri_id: xml_uri_id,
                    depth: 0,
                },
                NsBinding {
                    prefix_id: xmlns_prefix_id,
                    uri_id: xmlns_uri_id,
                    depth: 0,
                },
            ],
            depth: 0,
            xml_prefix_id,
            xmlns_prefix_id,
        }
    }

    /// Enter a new element scope
    pub fn push_scope(&mut self) {
        self.depth += 1;
    }

    /// Leave an element scope, removing any bindings declared in it
    pub fn pop_scope(&mut self) {
        while let Some(binding) = self.bindings.last() {
            if binding.depth < self.depth {
                break;
            }
            self.bindings.pop();
        }
        self.depth = self.depth.saturating_sub(1);
    }

    /// Declare a namespace binding for the current scope
    ///
    /// Returns false for attempts to rebind `xml` or `xmlns`.
    pub fn declare(&mut self, prefix_id: u32, uri_id: u32) -> bool {
        if prefix_id == self.xml_prefix_id || prefix_id == self.xmlns_prefix_id {
            return false;
        }

        self.bindings.push(NsBinding {
            prefix_id,
            uri_id,
            depth: self.depth,
        });
        true
    }

    /// Declare the default namespace for current scope
    pub fn declare_default(&mut self, uri_id: u32) {
        self.declare(0, uri_id);
    }

    /// Resolve a prefix to a namespace URI ID
    ///
    /// A default namespace undeclared with `xmlns=""` resolves to `Some(0)`.
    pub fn resolve(&self, prefix_id: u32) -> Option<u32> {
        self.bindings
            .iter()
            .rev()
            .find(|binding| binding.prefix_id == prefix_id)
            .map(|binding| binding.uri_id)
    }

    /// Resolve the default namespace
    pub fn resolve_default(&self) -> Option<u32> {
        self.resolve(0).filter(|&uri| uri != 0)
    }
}

/// Resolve `prefix_id` against the declarations on `node` and its ancestors.
///
/// `Some(0)` means the default namespace is explicitly undeclared. The `xml`
/// prefix is always bound.
pub fn search_ns(doc: &Document, node: NodeId, prefix_id: u32) -> Option<u32> {
    if prefix_id != 0 && doc.strings.get(prefix_id) == Some("xml") {
        return doc.strings.lookup(ns::XML);
    }

    let mut current = Some(node);
    while let Some(id) = current {
        let n = doc.node(id)?;
        if let Some(def) = n.ns_defs.iter().find(|def| def.prefix_id == prefix_id) {
            return Some(def.uri_id);
        }
        current = n.parent;
    }
    None
}

/// Find a prefix in scope at `node` that is bound to `uri_id`.
///
/// Declarations shadowed by a closer redeclaration of the same prefix are
/// skipped, and so is the default namespace unless `allow_default` (it
/// cannot qualify attributes).
pub fn search_ns_by_href(doc: &Document, node: NodeId, uri_id: u32, allow_default: bool) -> Option<u32> {
    if uri_id == 0 {
        return None;
    }

    let mut current = Some(node);
    while let Some(id) = current {
        let n = doc.node(id)?;
        for def in &n.ns_defs {
            if def.uri_id == uri_id
                && (allow_default || def.prefix_id != 0)
                && search_ns(doc, node, def.prefix_id) == Some(uri_id)
            {
                return Some(def.prefix_id);
            }
        }
        current = n.parent;
    }
    None
}

/// Find a prefix for `uri` in scope at `node`, declaring a fresh `nsN`
/// prefix on `node` when none exists. Returns the prefix id (0 for default).
///
/// The XML namespace always maps to the reserved `xml` prefix.
pub fn find_or_declare_ns(doc: &mut Document, node: NodeId, uri: &str) -> u32 {
    if uri == ns::XML {
        return doc.strings.intern("xml");
    }
    let uri_id = doc.strings.intern(uri);
    if let Some(prefix_id) = search_ns_by_href(doc, node, uri_id, true) {
        return prefix_id;
    }

    let mut counter = 0usize;
    let prefix_id = loop {
        let candidate = format!("ns{}", counter);
        match doc.strings.lookup(&candidate) {
            None => break doc.strings.intern(&candidate),
            Some(id) if search_ns(doc, node, id).is_none() => break id,
            Some(_) => counter += 1,
        }
    };

    if let Some(n) = doc.node_mut(node) {
        n.ns_defs.push(NsDef { prefix_id, uri_id });
    }
    prefix_id
}
