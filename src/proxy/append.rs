//! Append-Only Element Proxy
//!
//! Read-only everywhere except two operations: appending deep copies of
//! other elements (with their tail text) and replacing the leading text.

use std::ops::Deref;

use tracing::debug;

use super::element::ElementProxy;
use super::{Capabilities, NodeSource, Proxy};
use crate::dom::copy::{append_copy, Detached};
use crate::dom::namespace::find_or_declare_ns;
use crate::error::{Error, Result};
use crate::qname::TextValue;

/// Element proxy that may grow its children
#[derive(Debug, Clone)]
pub struct AppendOnlyProxy {
    element: ElementProxy,
}

impl AppendOnlyProxy {
    pub(crate) fn new(element: ElementProxy) -> Self {
        AppendOnlyProxy { element }
    }

    /// Append a deep copy of `other`, followed by a copy of its tail text.
    ///
    /// `other` may live in any document, this one included; it is never
    /// modified. Returns a proxy for the new child.
    pub fn append<S: NodeSource + ?Sized>(&self, other: &S) -> Result<ElementProxy> {
        let parent = self.element.node_id()?;
        let (source_doc, source_node) = other.source_node()?;

        let detached = {
            let doc = source_doc.try_borrow()?;
            Detached::capture(&doc, source_node)
        }
        .ok_or_else(|| Error::invalid_argument("append source is not a valid element"))?;

        let copy = {
            let mut doc = self.element.document().try_borrow_mut()?;
            append_copy(&mut doc, parent, &detached)
        };
        debug!(parent = %parent, copy = %copy, tail = detached.tail.len(), "appended copy");
        Ok(self.element.spawn(copy))
    }

    /// Append each element in order. Appends made before a failure stay.
    pub fn extend<I>(&self, elements: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: NodeSource,
    {
        for element in elements {
            self.append(&element)?;
        }
        Ok(())
    }

    /// Replace the leading text run. Element children, their tails and this
    /// element's own tail are untouched.
    ///
    /// Each distinct value is interned in the document's string pool for the
    /// document's lifetime.
    pub fn set_text(&self, value: impl Into<TextValue>) -> Result<()> {
        let id = self.element.node_id()?;
        let mut doc = self.element.document().try_borrow_mut()?;
        let text = match value.into() {
            TextValue::Text(text) => text,
            TextValue::QName(name) => match name.namespace() {
                Some(uri) => {
                    let prefix_id = find_or_declare_ns(&mut doc, id, uri);
                    match doc.strings.get_non_empty(prefix_id) {
                        Some(prefix) => format!("{}:{}", prefix, name.local_name()),
                        None => name.local_name().to_string(),
                    }
                }
                None => name.local_name().to_string(),
            },
        };
        doc.set_leading_text(id, Some(&text));
        Ok(())
    }

    /// Remove the leading text run
    pub fn clear_text(&self) -> Result<()> {
        let id = self.element.node_id()?;
        self.element.document().try_borrow_mut()?.set_leading_text(id, None);
        Ok(())
    }
}

impl Deref for AppendOnlyProxy {
    type Target = ElementProxy;

    fn deref(&self) -> &ElementProxy {
        &self.element
    }
}

impl Proxy for AppendOnlyProxy {
    fn element(&self) -> &ElementProxy {
        &self.element
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::APPEND_ONLY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::{ElementRef, RootProxy};
    use crate::qname::QName;
    use std::rc::Rc;

    #[test]
    fn test_append_from_other_document() {
        let target = RootProxy::parse("<list><item/></list>").unwrap();
        let source = RootProxy::parse("<src><entry id=\"7\">body<sub/></entry>after<next/></src>").unwrap();
        let entry = source.child(0).unwrap();

        let appender = target.append_only().unwrap();
        let copy = appender.append(&entry).unwrap();

        assert_eq!(target.len().unwrap(), 2);
        assert!(target.child(1).unwrap().is_same_node(&copy));
        assert_eq!(copy.get("id").unwrap().as_deref(), Some("7"));
        assert_eq!(copy.text().unwrap().as_deref(), Some("body"));
        assert_eq!(copy.len().unwrap(), 1);
        assert_eq!(copy.tail().unwrap().as_deref(), Some("after"));

        // the source keeps its own tail and structure
        assert_eq!(entry.tail().unwrap().as_deref(), Some("after"));
        assert_eq!(source.len().unwrap(), 2);
    }

    #[test]
    fn test_append_invalid_source() {
        let target = RootProxy::parse("<t/>").unwrap();
        let appender = target.append_only().unwrap();

        let source = RootProxy::parse("<s><a/></s>").unwrap();
        let a = source.child(0).unwrap();
        source.release();
        assert!(matches!(appender.append(&a), Err(Error::InvalidArgument(_))));

        let doc = crate::dom::Document::parse("<r>text</r>").unwrap().into_shared();
        let text = {
            let d = doc.borrow();
            d.first_child(d.root_element().unwrap()).unwrap()
        };
        let handle = ElementRef::new(Rc::clone(&doc), text);
        assert!(matches!(appender.append(&handle), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_append_through_invalid_proxy() {
        let target = RootProxy::parse("<t/>").unwrap();
        let appender = target.append_only().unwrap();
        let source = RootProxy::parse("<s/>").unwrap();
        target.release();
        assert_eq!(appender.append(&*source).unwrap_err(), Error::InvalidProxy);
        assert_eq!(appender.set_text("x").unwrap_err(), Error::InvalidProxy);
    }

    #[test]
    fn test_extend_keeps_earlier_appends() {
        let target = RootProxy::parse("<t/>").unwrap();
        let appender = target.append_only().unwrap();
        let source = RootProxy::parse("<s><a/><b/><c/></s>").unwrap();
        let children = source.children().unwrap();

        appender.extend(&children).unwrap();
        assert_eq!(target.len().unwrap(), 3);

        let dead = RootProxy::parse("<d/>").unwrap();
        let dead_el: ElementProxy = (*dead).clone();
        dead.release();
        let batch = vec![children[0].clone(), dead_el, children[1].clone()];
        assert!(appender.extend(&batch).is_err());
        assert_eq!(target.len().unwrap(), 4);
    }

    #[test]
    fn test_set_text_leaves_children_and_tail() {
        let root = RootProxy::parse("<r><e>old<![CDATA[er]]><k/>ktail</e>etail</r>").unwrap();
        let e = root.child(0).unwrap();
        let appender = root.append_only_at(&e).unwrap();

        appender.set_text("new").unwrap();
        assert_eq!(e.text().unwrap().as_deref(), Some("new"));
        assert_eq!(e.tail().unwrap().as_deref(), Some("etail"));
        let k = e.child(0).unwrap();
        assert_eq!(k.tail().unwrap().as_deref(), Some("ktail"));

        appender.clear_text().unwrap();
        assert_eq!(e.text().unwrap(), None);
        assert_eq!(e.len().unwrap(), 1);
    }

    #[test]
    fn test_set_text_qname() {
        let root = RootProxy::parse(r#"<r xmlns:x="urn:x"><e/></r>"#).unwrap();
        let e = root.child(0).unwrap();
        let appender = root.append_only_at(&e).unwrap();

        appender.set_text(QName::parse("{urn:x}value").unwrap()).unwrap();
        assert_eq!(e.text().unwrap().as_deref(), Some("x:value"));

        appender.set_text(QName::parse("{urn:new}other").unwrap()).unwrap();
        assert_eq!(e.text().unwrap().as_deref(), Some("ns0:other"));

        appender.set_text(QName::parse("plain").unwrap()).unwrap();
        assert_eq!(e.text().unwrap().as_deref(), Some("plain"));
    }

    #[test]
    fn test_append_deeply_nested_element() {
        let depth = 50_000;
        let xml = format!("<r>{}{}</r>", "<a>".repeat(depth), "</a>".repeat(depth));
        let source = RootProxy::parse(&xml).unwrap();
        let target = RootProxy::parse("<t/>").unwrap();

        let copy = target.append_only().unwrap().append(&source.child(0).unwrap()).unwrap();
        assert_eq!(copy.tag().unwrap(), "a");
        assert_eq!(target.len().unwrap(), 1);
        assert_eq!(copy.len().unwrap(), 1);

        // freeing the deep copy must not recurse either
        assert_eq!(target.release(), depth + 1);
    }

    #[test]
    fn test_busy_target_document() {
        let target = RootProxy::parse("<t>old</t>").unwrap();
        let appender = target.append_only().unwrap();
        let source = RootProxy::parse("<s/>").unwrap();
        let doc = Rc::clone(target.document());

        {
            let _guard = doc.borrow();
            assert_eq!(appender.append(&*source).unwrap_err(), Error::DocumentBusy);
            assert_eq!(appender.set_text("new").unwrap_err(), Error::DocumentBusy);
            assert_eq!(appender.clear_text().unwrap_err(), Error::DocumentBusy);
        }
        assert_eq!(target.text().unwrap().as_deref(), Some("old"));
        assert_eq!(target.len().unwrap(), 0);

        {
            let _guard = source.document().borrow_mut();
            assert_eq!(appender.append(&*source).unwrap_err(), Error::DocumentBusy);
        }
        appender.append(&*source).unwrap();
        appender.set_text("new").unwrap();
        assert_eq!(target.len().unwrap(), 1);
        assert_eq!(target.text().unwrap().as_deref(), Some("new"));
    }

    #[test]
    fn test_capabilities() {
        let root = RootProxy::parse("<r/>").unwrap();
        let appender = root.append_only().unwrap();
        assert!(appender.capabilities().mutable);
        assert!(!appender.capabilities().owns_subtree);
        assert!(root.capabilities().owns_subtree);
    }
}
