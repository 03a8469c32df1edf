//! Attribute/Text Collector
//!
//! Read helpers the proxies build their accessors on:
//! - text runs (`text` starts at the first child, `tail` at `next`)
//! - attribute names, values and pairs in declaration order
//! - attribute lookup by plain or `{uri}local` name

use super::document::Document;
use super::node::{NodeId, XmlNode};

/// What `collect_attributes` extracts from each attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrMode {
    Names,
    Values,
    Items,
}

/// One collected attribute, shaped by `AttrMode`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collected {
    Name(String),
    Value(String),
    Item(String, String),
}

/// Concatenate the run of text and CDATA nodes starting at `start`.
///
/// The run ends at the first node of any other kind. Returns `None` when
/// `start` is not a text node at all.
pub fn collect_text(doc: &Document, start: Option<NodeId>) -> Option<String> {
    let mut current = start;
    let mut result: Option<String> = None;
    while let Some(id) = current {
        let node = doc.node(id)?;
        if !node.is_text() {
            break;
        }
        let chunk = doc.strings.get(node.content_id).unwrap_or_default();
        result.get_or_insert_with(String::new).push_str(chunk);
        current = node.next;
    }
    result
}

/// Collect a node's attributes in declaration order
pub fn collect_attributes(doc: &Document, id: NodeId, mode: AttrMode) -> Vec<Collected> {
    let Some(node) = doc.node(id) else {
        return Vec::new();
    };
    node.attributes
        .iter()
        .map(|attr| {
            let value = || doc.strings.get(attr.value_id).unwrap_or_default().to_string();
            match mode {
                AttrMode::Names => Collected::Name(doc.attribute_name(attr)),
                AttrMode::Values => Collected::Value(value()),
                AttrMode::Items => Collected::Item(doc.attribute_name(attr), value()),
            }
        })
        .collect()
}

/// Attribute names in `{uri}local` notation
pub fn attribute_names(doc: &Document, id: NodeId) -> Vec<String> {
    collect_attributes(doc, id, AttrMode::Names)
        .into_iter()
        .filter_map(|c| match c {
            Collected::Name(name) => Some(name),
            _ => None,
        })
        .collect()
}

/// Attribute values
pub fn attribute_values(doc: &Document, id: NodeId) -> Vec<String> {
    collect_attributes(doc, id, AttrMode::Values)
        .into_iter()
        .filter_map(|c| match c {
            Collected::Value(value) => Some(value),
            _ => None,
        })
        .collect()
}

/// (name, value) pairs
pub fn attribute_items(doc: &Document, id: NodeId) -> Vec<(String, String)> {
    collect_attributes(doc, id, AttrMode::Items)
        .into_iter()
        .filter_map(|c| match c {
            Collected::Item(name, value) => Some((name, value)),
            _ => None,
        })
        .collect()
}

/// Look up an attribute value by `local` or `{uri}local` key
pub fn find_attribute<'d>(doc: &'d Document, id: NodeId, key: &str) -> Option<&'d str> {
    let (uri, local) = match key.strip_prefix('{').and_then(|rest| rest.split_once('}')) {
        Some((uri, local)) => (Some(uri), local),
        None => (None, key),
    };
    let node = doc.node(id)?;
    let attr = node.attributes.iter().find(|attr| {
        doc.strings.get(attr.name_id) == Some(local)
            && doc.strings.get_non_empty(attr.namespace_id) == uri.filter(|u| !u.is_empty())
    })?;
    doc.strings.get(attr.value_id)
}

/// First element at or after `start` in a sibling chain
pub fn next_element(doc: &Document, start: Option<NodeId>) -> Option<NodeId> {
    let mut current = start;
    while let Some(id) = current {
        let node = doc.node(id)?;
        if node.is_element() {
            return Some(id);
        }
        current = node.next;
    }
    None
}

/// Whether `id` has any element child
pub fn has_element_child(doc: &Document, id: NodeId) -> bool {
    next_element(doc, doc.first_child(id)).is_some()
}

/// Element sibling before `id`, found by re-walking the parent's children.
/// O(number of preceding siblings).
pub fn previous_element(doc: &Document, id: NodeId) -> Option<NodeId> {
    let parent = doc.parent(id)?;
    let mut last_element = None;
    for child in doc.children(parent) {
        if child == id {
            return last_element;
        }
        if doc.node(child).is_some_and(XmlNode::is_element) {
            last_element = Some(child);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::parse(
            r#"<r xmlns:p="urn:p" b="2" p:a="1" c="3">lead<![CDATA[ing]]><!--c-->after<x/>tail<?pi?><y/></r>"#,
        )
        .unwrap()
    }

    #[test]
    fn test_collect_text_stops_at_non_text() {
        let doc = doc();
        let r = doc.root_element().unwrap();
        assert_eq!(collect_text(&doc, doc.first_child(r)).as_deref(), Some("leading"));

        let x = next_element(&doc, doc.first_child(r)).unwrap();
        assert_eq!(collect_text(&doc, doc.next(x)).as_deref(), Some("tail"));
        assert_eq!(collect_text(&doc, doc.first_child(x)), None);
    }

    #[test]
    fn test_attributes_in_declaration_order() {
        let doc = doc();
        let r = doc.root_element().unwrap();
        assert_eq!(attribute_names(&doc, r), vec!["b", "{urn:p}a", "c"]);
        assert_eq!(attribute_values(&doc, r), vec!["2", "1", "3"]);
        assert_eq!(
            attribute_items(&doc, r)[1],
            ("{urn:p}a".to_string(), "1".to_string())
        );
    }

    #[test]
    fn test_find_attribute() {
        let doc = doc();
        let r = doc.root_element().unwrap();
        assert_eq!(find_attribute(&doc, r, "b"), Some("2"));
        assert_eq!(find_attribute(&doc, r, "{urn:p}a"), Some("1"));
        assert_eq!(find_attribute(&doc, r, "a"), None);
        assert_eq!(find_attribute(&doc, r, "{}b"), Some("2"));
    }

    #[test]
    fn test_element_scans() {
        let doc = doc();
        let r = doc.root_element().unwrap();
        let x = next_element(&doc, doc.first_child(r)).unwrap();
        let y = next_element(&doc, doc.next(x)).unwrap();
        assert_eq!(previous_element(&doc, y), Some(x));
        assert_eq!(previous_element(&doc, x), None);
        assert!(has_element_child(&doc, r));
        assert!(!has_element_child(&doc, x));
    }
}
