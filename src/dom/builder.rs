//! Document loader
//!
//! Builds a `Document` from tokenizer output: links nodes into the arena,
//! resolves namespace prefixes through a `NamespaceResolver` and records the
//! source line of every node.

use tracing::debug;

use super::document::Document;
use super::namespace::NamespaceResolver;
use super::node::{NodeId, NsDef, XmlAttribute, XmlNode};
use crate::core::tokenizer::{Attribute, Token, Tokenizer};
use crate::error::{Error, Result};

/// Split `prefix:local` at the first colon
fn split_name(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) if !prefix.is_empty() && !local.is_empty() => (Some(prefix), local),
        _ => (None, name),
    }
}

struct TreeBuilder<'a> {
    doc: Document,
    /// Open elements with the raw tag name they were opened with
    stack: Vec<(NodeId, &'a str)>,
    resolver: NamespaceResolver,
    strict: bool,
    seen_root: bool,
}

pub(crate) fn build(input: &str, strict: bool) -> Result<Document> {
    let mut tokenizer = if strict {
        Tokenizer::new_strict(input)
    } else {
        Tokenizer::new(input)
    };

    let mut doc = Document::new();
    let resolver = NamespaceResolver::new(&mut doc.strings);
    let mut builder = TreeBuilder {
        doc,
        stack: Vec::new(),
        resolver,
        strict,
        seen_root: false,
    };

    while let Some(token) = tokenizer.next_token() {
        let (token, line) = token?;
        builder.handle(token, line)?;
    }
    let line = tokenizer.line();
    builder.finish(line)
}

impl<'a> TreeBuilder<'a> {
    fn fail<T>(&self, message: impl Into<String>, line: u32) -> Result<T> {
        Err(Error::parse(message, line))
    }

    fn parent(&self) -> NodeId {
        self.stack
            .last()
            .map_or(self.doc.document_node(), |&(id, _)| id)
    }

    fn append(&mut self, mut node: XmlNode, line: u32) -> NodeId {
        node.line = line;
        let id = self.doc.alloc(node);
        let parent = self.parent();
        self.doc.add_child(parent, id);
        id
    }

    fn handle(&mut self, token: Token<'a>, line: u32) -> Result<()> {
        match token {
            Token::StartTag {
                name,
                attributes,
                empty,
            } => self.start_element(name, attributes, empty, line),
            Token::EndTag { name } => self.end_element(name, line),
            Token::Text(text) => {
                if self.stack.is_empty() {
                    if self.strict && !text.trim().is_empty() {
                        return self.fail("Text content not allowed at document level", line);
                    }
                    return Ok(());
                }
                let content_id = self.doc.strings.intern(&text);
                self.append(XmlNode::text(content_id), line);
                Ok(())
            }
            Token::CData(text) => {
                if self.stack.is_empty() {
                    if self.strict {
                        return self.fail("CDATA section not allowed at document level", line);
                    }
                    return Ok(());
                }
                let content_id = self.doc.strings.intern(text);
                self.append(XmlNode::cdata(content_id), line);
                Ok(())
            }
            Token::Comment(text) => {
                let content_id = self.doc.strings.intern(text);
                self.append(XmlNode::comment(content_id), line);
                Ok(())
            }
            Token::ProcessingInstruction { target, data } => {
                let target_id = self.doc.strings.intern(target);
                let data_id = self.doc.strings.intern(data);
                self.append(XmlNode::processing_instruction(target_id, data_id), line);
                Ok(())
            }
            Token::XmlDeclaration | Token::DocType => Ok(()),
        }
    }

    /// Resolve a prefixed name to (name_id, prefix_id, namespace_id).
    ///
    /// An undeclared prefix is an error in strict mode; lenient mode keeps
    /// the whole `prefix:local` string as an un-namespaced local name.
    fn resolve_name(&mut self, raw: &str, is_attribute: bool, line: u32) -> Result<(u32, u32, u32)> {
        let (prefix, local) = split_name(raw);
        match prefix {
            Some(prefix) => {
                let prefix_id = self.doc.strings.intern(prefix);
                match self.resolver.resolve(prefix_id) {
                    Some(uri_id) if uri_id != 0 => {
                        Ok((self.doc.strings.intern(local), prefix_id, uri_id))
                    }
                    _ if self.strict => {
                        self.fail(format!("Undeclared namespace prefix: {}", prefix), line)
                    }
                    _ => Ok((self.doc.strings.intern(raw), 0, 0)),
                }
            }
            None => {
                let namespace_id = if is_attribute {
                    0
                } else {
                    self.resolver.resolve_default().unwrap_or(0)
                };
                Ok((self.doc.strings.intern(local), 0, namespace_id))
            }
        }
    }

    fn start_element(
        &mut self,
        name: &'a str,
        attributes: Vec<Attribute<'a>>,
        empty: bool,
        line: u32,
    ) -> Result<()> {
        if self.stack.is_empty() {
            if self.seen_root && self.strict {
                return self.fail("Document has multiple root elements", line);
            }
            self.seen_root = true;
        }

        self.resolver.push_scope();

        // Namespace declarations first, so attributes and the element
        // itself resolve against them
        let mut ns_defs = Vec::new();
        for attr in &attributes {
            let prefix = if attr.name == "xmlns" {
                ""
            } else if let Some(prefix) = attr.name.strip_prefix("xmlns:") {
                prefix
            } else {
                continue;
            };
            let prefix_id = self.doc.strings.intern(prefix);
            let uri_id = self.doc.strings.intern(&attr.value);
            if prefix_id != 0 && uri_id == 0 && self.strict {
                return self.fail(format!("Empty namespace URI for prefix {}", prefix), line);
            }
            if !self.resolver.declare(prefix_id, uri_id) {
                if self.strict {
                    return self.fail(format!("Cannot redeclare reserved prefix {}", prefix), line);
                }
                continue;
            }
            ns_defs.push(NsDef { prefix_id, uri_id });
        }

        let (name_id, prefix_id, namespace_id) = self.resolve_name(name, false, line)?;
        let mut node = XmlNode::element(name_id);
        node.prefix_id = prefix_id;
        node.namespace_id = namespace_id;
        node.ns_defs = ns_defs;

        for attr in &attributes {
            if attr.name == "xmlns" || attr.name.starts_with("xmlns:") {
                continue;
            }
            let (name_id, prefix_id, namespace_id) = self.resolve_name(attr.name, true, line)?;
            if self.strict
                && node
                    .attributes
                    .iter()
                    .any(|a| a.name_id == name_id && a.namespace_id == namespace_id)
            {
                return self.fail(format!("Duplicate attribute: {}", attr.name), line);
            }
            node.attributes.push(XmlAttribute {
                name_id,
                prefix_id,
                namespace_id,
                value_id: self.doc.strings.intern(&attr.value),
            });
        }

        let id = self.append(node, line);
        if empty {
            self.resolver.pop_scope();
        } else {
            self.stack.push((id, name));
        }
        Ok(())
    }

    fn end_element(&mut self, name: &str, line: u32) -> Result<()> {
        if self.strict {
            return match self.stack.pop() {
                Some((_, open)) if open == name => {
                    self.resolver.pop_scope();
                    Ok(())
                }
                Some((_, open)) => {
                    self.fail(format!("Tag mismatch: <{}> closed with </{}>", open, name), line)
                }
                None => self.fail(
                    format!("Unexpected end tag: </{}> without matching start tag", name),
                    line,
                ),
            };
        }

        // Lenient: close everything up to the matching open tag, or ignore
        // an end tag that matches nothing
        if let Some(depth) = self.stack.iter().rposition(|&(_, open)| open == name) {
            while self.stack.len() > depth {
                self.stack.pop();
                self.resolver.pop_scope();
            }
        }
        Ok(())
    }

    fn finish(self, line: u32) -> Result<Document> {
        if self.strict {
            if let Some(&(_, open)) = self.stack.first() {
                return self.fail(format!("Unclosed tag: <{}>", open), line);
            }
            if !self.seen_root {
                return self.fail("Document has no root element", line);
            }
        }
        debug!(
            nodes = self.doc.node_count(),
            strict = self.strict,
            "parsed document"
        );
        Ok(self.doc)
    }
}
