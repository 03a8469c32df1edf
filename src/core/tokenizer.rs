//! XML Tokenizer
//!
//! Pull-parser style tokenizer over a `Scanner`. Every token carries the
//! line it starts on.
//!
//! Lenient mode never fails: malformed markup is either skipped or handed
//! back as text. Strict mode reports the first well-formedness error.

use super::entities::{decode_text, decode_text_strict};
use super::scanner::{is_name_start_char, Scanner};
use std::borrow::Cow;

/// A parsed attribute, value entity-decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute<'a> {
    pub name: &'a str,
    pub value: Cow<'a, str>,
}

/// A parsed XML token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// `<name attrs...>` or `<name attrs.../>`
    StartTag {
        name: &'a str,
        attributes: Vec<Attribute<'a>>,
        empty: bool,
    },
    /// `</name>`
    EndTag { name: &'a str },
    /// Text content between tags
    Text(Cow<'a, str>),
    /// CDATA section content
    CData(&'a str),
    /// Comment content
    Comment(&'a str),
    /// `<?target data?>`
    ProcessingInstruction { target: &'a str, data: &'a str },
    /// `<?xml ...?>`
    XmlDeclaration,
    /// `<!DOCTYPE ...>`
    DocType,
}

/// Tokenizer error: message plus the line it was detected on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub line: u32,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: u32) -> Self {
        ParseError {
            message: message.into(),
            line,
        }
    }
}

/// Pull tokenizer
pub struct Tokenizer<'a> {
    scanner: Scanner<'a>,
    strict: bool,
}

impl<'a> Tokenizer<'a> {
    /// Create a new tokenizer (lenient mode)
    pub fn new(input: &'a str) -> Self {
        Tokenizer {
            scanner: Scanner::new(input),
            strict: false,
        }
    }

    /// Create a new tokenizer in strict mode
    pub fn new_strict(input: &'a str) -> Self {
        Tokenizer {
            scanner: Scanner::new(input),
            strict: true,
        }
    }

    /// Line of the current position
    pub fn line(&mut self) -> u32 {
        self.scanner.line()
    }

    /// Get the next token and the line it starts on
    pub fn next_token(&mut self) -> Option<Result<(Token<'a>, u32), ParseError>> {
        if self.scanner.is_eof() {
            return None;
        }
        let line = self.scanner.line();
        let token = if self.scanner.peek() == Some(b'<') {
            self.markup(line)
        } else {
            self.text(line)
        };
        Some(token.map(|t| (t, line)))
    }

    fn error<T>(&self, message: &str, line: u32) -> Result<T, ParseError> {
        Err(ParseError::new(message, line))
    }

    fn text(&mut self, line: u32) -> Result<Token<'a>, ParseError> {
        let start = self.scanner.position();
        let end = self
            .scanner
            .find_byte(b'<')
            .unwrap_or(start + self.scanner.remaining().len());
        self.scanner.set_position(end);
        let raw = self.scanner.slice(start, end);
        self.decode(raw, line).map(Token::Text)
    }

    fn decode(&self, raw: &'a str, line: u32) -> Result<Cow<'a, str>, ParseError> {
        if self.strict {
            decode_text_strict(raw).map_err(|msg| ParseError::new(msg, line))
        } else {
            Ok(decode_text(raw))
        }
    }

    /// Consume everything up to `terminator`, returning the enclosed slice
    fn delimited(&mut self, open: usize, terminator: &str, what: &str, line: u32) -> Result<&'a str, ParseError> {
        self.scanner.advance(open);
        let start = self.scanner.position();
        match self.scanner.find(terminator) {
            Some(end) => {
                self.scanner.set_position(end + terminator.len());
                Ok(self.scanner.slice(start, end))
            }
            None if self.strict => self.error(&format!("Unterminated {}", what), line),
            None => {
                let rest = self.scanner.remaining();
                self.scanner.set_position(start + rest.len());
                Ok(rest)
            }
        }
    }

    fn markup(&mut self, line: u32) -> Result<Token<'a>, ParseError> {
        if self.scanner.starts_with("<!--") {
            return self.delimited(4, "-->", "comment", line).map(Token::Comment);
        }
        if self.scanner.starts_with("<![CDATA[") {
            return self.delimited(9, "]]>", "CDATA section", line).map(Token::CData);
        }
        if self.scanner.starts_with("<!") {
            return match self.scanner.find_doctype_end() {
                Some(end) => {
                    self.scanner.set_position(end + 1);
                    Ok(Token::DocType)
                }
                None => self.unterminated_tag(line),
            };
        }
        if self.scanner.starts_with("<?") {
            let body = self.delimited(2, "?>", "processing instruction", line)?;
            let (target, data) = match body.find(|c: char| c.is_ascii_whitespace()) {
                Some(split) => (&body[..split], body[split..].trim_start()),
                None => (body, ""),
            };
            if target.eq_ignore_ascii_case("xml") {
                return Ok(Token::XmlDeclaration);
            }
            return Ok(Token::ProcessingInstruction { target, data });
        }
        if self.scanner.starts_with("</") {
            let start = self.scanner.position();
            let Some(end) = self.scanner.find_byte(b'>') else {
                return self.unterminated_tag(line);
            };
            self.scanner.set_position(end + 1);
            let name = self.scanner.slice(start + 2, end).trim();
            if name.is_empty() && self.strict {
                return self.error("Empty end tag", line);
            }
            return Ok(Token::EndTag { name });
        }
        self.start_tag(line)
    }

    /// A tag that never closes: an error in strict mode, text otherwise
    fn unterminated_tag(&mut self, line: u32) -> Result<Token<'a>, ParseError> {
        if self.strict {
            return self.error("Unterminated tag", line);
        }
        let rest = self.scanner.remaining();
        self.scanner.advance(rest.len());
        Ok(Token::Text(Cow::Borrowed(rest)))
    }

    fn start_tag(&mut self, line: u32) -> Result<Token<'a>, ParseError> {
        let tag_start = self.scanner.position();
        let starts_name = self
            .scanner
            .remaining()
            .as_bytes()
            .get(1)
            .is_some_and(|&b| is_name_start_char(b));
        if !starts_name {
            if self.strict {
                return self.error("Invalid element name", line);
            }
            // A stray '<' is kept as character data
            self.scanner.advance(1);
            let end = self
                .scanner
                .find_byte(b'<')
                .unwrap_or(tag_start + 1 + self.scanner.remaining().len());
            self.scanner.set_position(end);
            return Ok(Token::Text(Cow::Borrowed(self.scanner.slice(tag_start, end))));
        }

        let Some(tag_end) = self.scanner.find_tag_end_quoted() else {
            return self.unterminated_tag(line);
        };

        self.scanner.advance(1);
        let name = self.scanner.read_name().unwrap_or_default();
        let mut attributes = Vec::new();
        let mut empty = false;

        loop {
            self.scanner.skip_whitespace();
            if self.scanner.position() >= tag_end {
                break;
            }
            if self.scanner.starts_with("/>") && self.scanner.position() + 1 == tag_end {
                empty = true;
                break;
            }
            let Some(attr_name) = self.scanner.read_name() else {
                if self.strict {
                    return self.error("Malformed attribute", line);
                }
                self.scanner.advance(1);
                continue;
            };
            self.scanner.skip_whitespace();
            if self.scanner.peek() != Some(b'=') {
                if self.strict {
                    return self.error(&format!("Attribute {} has no value", attr_name), line);
                }
                attributes.push(Attribute {
                    name: attr_name,
                    value: Cow::Borrowed(""),
                });
                continue;
            }
            self.scanner.advance(1);
            self.scanner.skip_whitespace();
            let quote = match self.scanner.peek() {
                Some(q @ (b'"' | b'\'')) => q,
                _ => {
                    if self.strict {
                        return self.error("Attribute value must be quoted", line);
                    }
                    self.scanner.set_position(tag_end);
                    break;
                }
            };
            self.scanner.advance(1);
            let value_start = self.scanner.position();
            let value_end = self.scanner.find_byte(quote).unwrap_or(tag_end).min(tag_end);
            let raw = self.scanner.slice(value_start, value_end);
            self.scanner.set_position(value_end + 1);

            if self.strict && attributes.iter().any(|a: &Attribute<'_>| a.name == attr_name) {
                return self.error(&format!("Duplicate attribute: {}", attr_name), line);
            }
            attributes.push(Attribute {
                name: attr_name,
                value: self.decode(raw, line)?,
            });
        }

        self.scanner.set_position(tag_end + 1);
        Ok(Token::StartTag {
            name,
            attributes,
            empty,
        })
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Result<(Token<'a>, u32), ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token<'_>> {
        Tokenizer::new(input).map(|t| t.unwrap().0).collect()
    }

    #[test]
    fn test_simple_element() {
        let toks = tokens("<root>hello</root>");
        assert_eq!(toks.len(), 3);
        assert!(matches!(&toks[0], Token::StartTag { name: "root", empty: false, .. }));
        assert_eq!(toks[1], Token::Text(Cow::Borrowed("hello")));
        assert_eq!(toks[2], Token::EndTag { name: "root" });
    }

    #[test]
    fn test_empty_element_with_attributes() {
        let toks = tokens(r#"<div id="main" class='a &amp; b'/>"#);
        let Token::StartTag { name, attributes, empty } = &toks[0] else {
            panic!("expected start tag");
        };
        assert_eq!(*name, "div");
        assert!(*empty);
        assert_eq!(attributes[0].name, "id");
        assert_eq!(attributes[0].value, "main");
        assert_eq!(attributes[1].value, "a & b");
    }

    #[test]
    fn test_gt_inside_attribute() {
        let toks = tokens(r#"<a title="x > y">t</a>"#);
        let Token::StartTag { attributes, .. } = &toks[0] else {
            panic!("expected start tag");
        };
        assert_eq!(attributes[0].value, "x > y");
        assert_eq!(toks[1], Token::Text(Cow::Borrowed("t")));
    }

    #[test]
    fn test_misc_markup() {
        let toks = tokens("<?xml version=\"1.0\"?><!DOCTYPE r><r><!-- c --><![CDATA[<x>]]><?pi some data?></r>");
        assert_eq!(toks[0], Token::XmlDeclaration);
        assert_eq!(toks[1], Token::DocType);
        assert_eq!(toks[3], Token::Comment(" c "));
        assert_eq!(toks[4], Token::CData("<x>"));
        assert_eq!(
            toks[5],
            Token::ProcessingInstruction {
                target: "pi",
                data: "some data"
            }
        );
    }

    #[test]
    fn test_lines() {
        let lines: Vec<u32> = Tokenizer::new("<a>\n  <b/>\n\n  <c/>\n</a>")
            .map(|t| t.unwrap().1)
            .collect();
        // <a>, ws, <b/>, ws, <c/>, ws, </a>
        assert_eq!(lines, vec![1, 1, 2, 2, 4, 4, 5]);
    }

    #[test]
    fn test_lenient_stray_lt() {
        let toks = tokens("<a>1 < 2</a>");
        assert_eq!(toks[1], Token::Text(Cow::Borrowed("1 ")));
        assert_eq!(toks[2], Token::Text(Cow::Borrowed("< 2")));
    }

    #[test]
    fn test_strict_errors() {
        let mut t = Tokenizer::new_strict("<a x=1/>");
        assert!(t.next_token().unwrap().is_err());

        let mut t = Tokenizer::new_strict("<a x='1' x='2'/>");
        let err = t.next_token().unwrap().unwrap_err();
        assert_eq!(err.message, "Duplicate attribute: x");

        let mut t = Tokenizer::new_strict("<!-- open");
        assert!(t.next_token().unwrap().is_err());
    }
}
