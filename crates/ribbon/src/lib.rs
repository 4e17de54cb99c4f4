//! ribbon: a record container
//!
//! ribbon stores sequences of opaque byte records in a chunked, block-framed
//! file format built for large analytic and ML datasets: readers seek to
//! arbitrary record positions, skip quickly, and survive mid-file
//! corruption; writers keep throughput high by encoding chunks on a worker
//! pool without changing a single output byte.
//!
//! ## Architecture Overview
//!
//! ```text
//! write path                          read path
//! ──────────                          ─────────
//! records                             file source (IoReader)
//!    │                                   │
//!    ▼                                   ▼
//! RecordWriter ── batches ──┐         BlockReader ── strips/validates
//!    │                      │            │            block headers
//!    ▼                      │            ▼
//! SimpleEncoder (× N        │         chunk = header + body
//! pool workers, reordered   │            │
//! back into sequence)       │            ▼
//!    │                      │         DecodedChunk ── records
//!    ▼                      │            │
//! chunks ── BlockWriter ────┘            ▼
//!    │      (64 KiB block framing)    RecordReader ── positions,
//!    ▼                                               seeks, recovery
//! file sink (IoWriter)
//! ```
//!
//! ## Main Components
//!
//! - [`records::RecordWriter`] / [`records::RecordReader`]: the top-level
//!   API; write records, read them back, seek by [`records::RecordPosition`]
//! - [`chunk`]: the 40-byte hash-authenticated chunk header, the payload
//!   encoder/decoder, and the [`chunk::ChunkEncoder`] seam for external
//!   (columnar) encoders
//! - [`block`]: 64 KiB block framing with per-block resynchronization
//!   headers, which is what makes O(1) alignment and corruption recovery
//!   work
//! - [`codec`]: streaming compression (brotli, zstd, zlib, lz4) as
//!   sink/source wrappers
//! - [`bytes`]: the byte-stream layer of buffered sinks and sources, the
//!   backward writer, and std::io adapters
//!
//! ## Reading and writing
//!
//! ```ignore
//! use ribbon::codec::Compression;
//! use ribbon::records::{ReaderOptions, RecordReader, RecordWriter, WriterOptions};
//!
//! let mut writer = RecordWriter::create(
//!     std::fs::File::create("data.ribbon")?,
//!     WriterOptions {
//!         compression: Compression::Brotli(6),
//!         parallelism: 4,
//!         ..Default::default()
//!     },
//! )?;
//! for record in records {
//!     writer.write_record(record)?;
//! }
//! writer.close()?;
//!
//! let mut reader = RecordReader::open(
//!     std::fs::File::open("data.ribbon")?,
//!     ReaderOptions::default(),
//! )?;
//! while let Some(record) = reader.next_record()? {
//!     // ...
//! }
//! ```
//!
//! ## Integrity
//!
//! Every chunk header, chunk body, and block header is covered by a keyed
//! 64-bit hash. A flipped byte in a chunk body costs that chunk only;
//! block headers let a reader resynchronize to the next chunk boundary
//! from any file offset.

pub mod block;
pub mod bytes;
pub mod chunk;
pub mod codec;
pub mod records;

pub use ribbon_core::{Chain, Error, ErrorKind, Result};

pub use bytes::{FlushKind, IoReader, IoWriter, Sink, Source};
pub use codec::Compression;
pub use records::{ReaderOptions, RecordPosition, RecordReader, RecordWriter, WriterOptions};
