//! Error types
//!
//! Every failure the proxy layer can report. Absent parents, siblings and
//! attributes are `Ok(None)`, never an error.

use std::cell::{BorrowError, BorrowMutError};

use thiserror::Error;

use crate::core::tokenizer::ParseError;

/// Errors returned by documents and proxies
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The proxy's cohort was released; its node may no longer exist
    #[error("proxy is no longer valid: its subtree has been released")]
    InvalidProxy,

    /// Positional element-child access outside `[-len, len)`
    #[error("child index {index} out of range for {len} element children")]
    IndexOutOfRange { index: isize, len: usize },

    /// The shared document is borrowed elsewhere for the duration of the call
    #[error("document is already borrowed")]
    DocumentBusy,

    /// An argument was not a usable element or proxy
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The loader rejected its input
    #[error("parse error at line {line}: {message}")]
    Parse { message: String, line: u32 },
}

impl Error {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    pub(crate) fn parse(message: impl Into<String>, line: u32) -> Self {
        Error::Parse {
            message: message.into(),
            line,
        }
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::Parse {
            message: err.message,
            line: err.line,
        }
    }
}

impl From<BorrowError> for Error {
    fn from(_: BorrowError) -> Self {
        Error::DocumentBusy
    }
}

impl From<BorrowMutError> for Error {
    fn from(_: BorrowMutError) -> Self {
        Error::DocumentBusy
    }
}

/// Crate result alias
pub type Result<T, E = Error> = std::result::Result<T, E>;
