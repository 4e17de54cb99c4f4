//! Core types for the ribbon record container.
//!
//! This crate holds the foundations shared by every layer of the container:
//!
//! - [`error`]: the `Error`/`Result` types with the five semantic error
//!   categories (I/O, format, truncation, limit, usage)
//! - [`varint`]: unsigned LEB128 varints for record sizes
//! - [`hash`]: the format's keyed 64-bit integrity hash
//! - [`chain`]: `Chain`, a splittable sequence of immutable byte blocks
//!
//! The container itself (byte streams, codecs, chunks, blocks, record
//! reader/writer) lives in the `ribbon` crate.

pub mod chain;
pub mod error;
pub mod hash;
pub mod varint;

pub use chain::Chain;
pub use error::{Error, ErrorKind, Result};
