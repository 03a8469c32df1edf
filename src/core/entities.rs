//! XML Entity Decoding
//!
//! Handles decoding of XML entities:
//! - Built-in entities: &lt; &gt; &amp; &quot; &apos;
//! - Numeric character references: &#123; &#x7B;
//!
//! Uses Cow for zero-copy when no entities are present.

use memchr::memchr;
use std::borrow::Cow;

/// Decode text content, handling entity references
///
/// Returns Borrowed if no entities present (zero-copy),
/// returns Owned if entities were decoded. Unknown entities are kept as-is.
#[inline]
pub fn decode_text(input: &str) -> Cow<'_, str> {
    if memchr(b'&', input.as_bytes()).is_none() {
        return Cow::Borrowed(input);
    }
    match decode_entities(input, false) {
        Ok(decoded) => Cow::Owned(decoded),
        Err(_) => Cow::Borrowed(input),
    }
}

/// Decode text content in strict mode
///
/// Returns Err if a character reference is malformed or names a character
/// that is not allowed in XML 1.0.
pub fn decode_text_strict(input: &str) -> Result<Cow<'_, str>, &'static str> {
    if memchr(b'&', input.as_bytes()).is_none() {
        return Ok(Cow::Borrowed(input));
    }
    decode_entities(input, true).map(Cow::Owned)
}

fn decode_entities(input: &str, strict: bool) -> Result<String, &'static str> {
    let bytes = input.as_bytes();
    let mut result = String::with_capacity(input.len());
    let mut pos = 0;

    while pos < bytes.len() {
        let Some(amp_pos) = memchr(b'&', &bytes[pos..]) else {
            result.push_str(&input[pos..]);
            break;
        };
        result.push_str(&input[pos..pos + amp_pos]);
        pos += amp_pos;

        let Some(semi_offset) = memchr(b';', &bytes[pos..]) else {
            // No semicolon found, keep the ampersand
            result.push('&');
            pos += 1;
            continue;
        };

        let entity = &input[pos + 1..pos + semi_offset];
        match decode_entity(entity, strict)? {
            Some(c) => {
                result.push(c);
                pos += semi_offset + 1;
            }
            None => {
                result.push('&');
                pos += 1;
            }
        }
    }

    Ok(result)
}

/// Decode a single entity (without & and ;)
fn decode_entity(entity: &str, strict: bool) -> Result<Option<char>, &'static str> {
    if let Some(numeric) = entity.strip_prefix('#') {
        return match decode_numeric_entity(numeric) {
            Some(c) if !strict || is_valid_xml_char(c as u32) => Ok(Some(c)),
            _ if strict => Err("Invalid character reference"),
            _ => Ok(None),
        };
    }

    Ok(match entity {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => None,
    })
}

/// Decode a numeric character reference (text after `&#`)
fn decode_numeric_entity(entity: &str) -> Option<char> {
    let codepoint = match entity.strip_prefix(|c: char| c == 'x' || c == 'X') {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => entity.parse::<u32>().ok()?,
    };
    char::from_u32(codepoint)
}

/// Check if a code point is a valid XML 1.0 Char
/// Char ::= #x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]
#[inline]
pub fn is_valid_xml_char(codepoint: u32) -> bool {
    matches!(codepoint,
        0x9 | 0xA | 0xD |
        0x20..=0xD7FF |
        0xE000..=0xFFFD |
        0x10000..=0x10FFFF
    )
}
