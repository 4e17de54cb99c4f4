//! Byte-Stream Abstractions
//!
//! Three stream shapes feed the container:
//!
//! - [`Sink`]: a forward byte destination with a buffered fast path
//! - [`Source`]: a forward byte origin exposing a readable window
//! - [`BackwardWriter`]: a destination written back to front, so encoders
//!   can prepend length prefixes computed after their bodies
//!
//! Concrete implementations: [`ChainWriter`]/[`ChainReader`] over in-memory
//! chains, and [`IoWriter`]/[`IoReader`] over `std::io` (files and the
//! like). Codec streams in [`crate::codec`] wrap any of them.
//!
//! Streams latch their first error: after a failure every operation
//! reports it again without side effects, and `close` reports it one
//! final time.

mod backward;
mod chain_writer;
mod io;
mod sink;
mod source;

pub use backward::BackwardWriter;
pub use chain_writer::ChainWriter;
pub use io::{IoReader, IoWriter};
pub use sink::{FlushKind, Sink};
pub use source::{read_to_end, ChainReader, Source};

pub(crate) use sink::{Health, DEFAULT_BUFFER_SIZE, MAX_BYTES_TO_COPY};
