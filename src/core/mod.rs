//! Core XML parsing primitives
//!
//! The building blocks of the document loader:
//! - Scanner: delimiter detection using memchr
//! - Tokenizer: pull tokenizer with lenient and strict modes
//! - Entities: XML entity decoding with Cow (zero-copy when possible)

pub mod entities;
pub mod scanner;
pub mod tokenizer;
