//! Error Types
//!
//! This module defines the error type shared by every layer of the container.
//!
//! ## Error Categories
//!
//! - `Io`: the underlying byte source/sink failed
//! - `Format`: header hash mismatch, corrupt codec frame, impossible field values
//! - `Truncated`: the underlying stream ended inside a frame or chunk
//! - `Limit`: a size or count exceeds a configured maximum
//! - `Usage`: a precondition was violated (e.g. write after close)
//!
//! ## Latching
//!
//! Streams latch their first error and return it from every subsequent
//! operation, including `close`. Because `std::io::Error` is not `Clone`,
//! `Error` carries a manual `Clone` implementation that preserves the I/O
//! error kind and message, which is all a latched failure needs.
//!
//! ## Usage
//!
//! All fallible operations return `Result<T>`, aliased to
//! `Result<T, Error>`, so errors propagate cleanly with `?`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid data: {0}")]
    Format(String),

    #[error("unexpected end of data: {0}")]
    Truncated(String),

    #[error("limit exceeded: {0}")]
    Limit(String),

    #[error("invalid use: {0}")]
    Usage(String),
}

/// Discriminant of [`Error`], for callers that dispatch on the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Format,
    Truncated,
    Limit,
    Usage,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::Format(_) => ErrorKind::Format,
            Error::Truncated(_) => ErrorKind::Truncated,
            Error::Limit(_) => ErrorKind::Limit,
            Error::Usage(_) => ErrorKind::Usage,
        }
    }

    /// Whether a reader may attempt resynchronization after this error.
    ///
    /// Only data-level corruption and truncation are recoverable; I/O
    /// failures and misuse are not.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Format(_) | Error::Truncated(_))
    }
}

impl Clone for Error {
    fn clone(&self) -> Self {
        match self {
            Error::Io(e) => Error::Io(std::io::Error::new(e.kind(), e.to_string())),
            Error::Format(msg) => Error::Format(msg.clone()),
            Error::Truncated(msg) => Error::Truncated(msg.clone()),
            Error::Limit(msg) => Error::Limit(msg.clone()),
            Error::Usage(msg) => Error::Usage(msg.clone()),
        }
    }
}
