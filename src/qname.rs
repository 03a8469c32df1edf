//! Qualified names as text values
//!
//! A `QName` assigned as element text is stored in its prefixed form
//! (`prefix:local`), which needs a namespace binding in scope at the node.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Namespace-qualified name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    namespace: Option<String>,
    local: String,
}

impl QName {
    /// Build from parts. An empty namespace is the same as none.
    pub fn new(namespace: Option<&str>, local: &str) -> Result<Self> {
        if local.is_empty() {
            return Err(Error::invalid_argument("QName local name is empty"));
        }
        if local.contains(['{', '}', ':']) {
            return Err(Error::invalid_argument(format!("invalid QName local name: {}", local)));
        }
        Ok(QName {
            namespace: namespace.filter(|ns| !ns.is_empty()).map(str::to_string),
            local: local.to_string(),
        })
    }

    /// Parse `{uri}local` or plain `local`
    pub fn parse(text: &str) -> Result<Self> {
        match text.strip_prefix('{') {
            Some(rest) => {
                let (uri, local) = rest
                    .split_once('}')
                    .ok_or_else(|| Error::invalid_argument(format!("unterminated namespace in QName: {}", text)))?;
                QName::new(Some(uri), local)
            }
            None => QName::new(None, text),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn local_name(&self) -> &str {
        &self.local
    }
}

impl FromStr for QName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        QName::parse(s)
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local),
            None => f.write_str(&self.local),
        }
    }
}

/// Value accepted when replacing an element's leading text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextValue {
    Text(String),
    QName(QName),
}

impl From<&str> for TextValue {
    fn from(text: &str) -> Self {
        TextValue::Text(text.to_string())
    }
}

impl From<String> for TextValue {
    fn from(text: String) -> Self {
        TextValue::Text(text)
    }
}

impl From<QName> for TextValue {
    fn from(name: QName) -> Self {
        TextValue::QName(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let q: QName = "{urn:x}item".parse().unwrap();
        assert_eq!(q.namespace(), Some("urn:x"));
        assert_eq!(q.local_name(), "item");
        assert_eq!(q.to_string(), "{urn:x}item");

        let plain = QName::parse("item").unwrap();
        assert_eq!(plain.namespace(), None);
        assert_eq!(QName::parse("{}item").unwrap(), plain);
    }

    #[test]
    fn test_invalid() {
        assert!(matches!(QName::parse(""), Err(Error::InvalidArgument(_))));
        assert!(matches!(QName::parse("{urn:x}"), Err(Error::InvalidArgument(_))));
        assert!(matches!(QName::parse("{urn:x"), Err(Error::InvalidArgument(_))));
        assert!(matches!(QName::parse("p:x"), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_text_value_conversions() {
        assert_eq!(TextValue::from("a"), TextValue::Text("a".into()));
        let q = QName::new(Some("urn:x"), "v").unwrap();
        assert_eq!(TextValue::from(q.clone()), TextValue::QName(q));
    }
}
