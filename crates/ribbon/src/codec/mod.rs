//! Codec Streams
//!
//! Compression in the container is stream-shaped: a [`CompressingWriter`]
//! is a [`Sink`] that forwards compressed bytes to the sink it wraps, and a
//! [`DecompressingReader`] is a [`Source`] yielding decompressed bytes from
//! the source it wraps. Each owns its codec engine and translates engine
//! results into stream-level errors:
//!
//! - engine produced bytes: OK
//! - clean zero read: end of frame (further reads report end of stream)
//! - engine hit end of input mid-frame: `Truncated`
//! - engine rejected its input: `Format`
//!
//! ## Supported codecs
//!
//! | codec | level range | crate |
//! |-------|-------------|-------|
//! | brotli | 0..=11 | `brotli` |
//! | zstd | 1..=22 | `zstd` |
//! | zlib | 0..=9 | `flate2` |
//! | lz4 | (frame default) | `lz4_flex` |
//!
//! Levels are validated when options are constructed, not at the format
//! level: a reader only needs the tag byte recorded next to the data.

mod reader;
mod writer;

pub use reader::DecompressingReader;
pub use writer::CompressingWriter;

use std::io;

use ribbon_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::bytes::{FlushKind, Sink, Source};

/// Compression applied to chunk payload sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compression {
    None,
    /// Brotli at the given quality (0..=11).
    Brotli(u32),
    /// Zstandard at the given level (1..=22).
    Zstd(i32),
    /// Zlib at the given level (0..=9).
    Zlib(u32),
    /// LZ4 frame format (no level parameter).
    Lz4,
}

impl Default for Compression {
    fn default() -> Self {
        Compression::None
    }
}

pub(crate) const TAG_NONE: u8 = 0;
pub(crate) const TAG_BROTLI: u8 = b'b';
pub(crate) const TAG_ZSTD: u8 = b'z';
pub(crate) const TAG_ZLIB: u8 = b'g';
pub(crate) const TAG_LZ4: u8 = b'4';

impl Compression {
    /// Checks the level against the codec's accepted range.
    pub fn validate(&self) -> Result<()> {
        match self {
            Compression::None | Compression::Lz4 => Ok(()),
            Compression::Brotli(level) => {
                if *level <= 11 {
                    Ok(())
                } else {
                    Err(Error::Usage(format!(
                        "brotli quality {} out of range 0..=11",
                        level
                    )))
                }
            }
            Compression::Zstd(level) => {
                if (1..=22).contains(level) {
                    Ok(())
                } else {
                    Err(Error::Usage(format!(
                        "zstd level {} out of range 1..=22",
                        level
                    )))
                }
            }
            Compression::Zlib(level) => {
                if *level <= 9 {
                    Ok(())
                } else {
                    Err(Error::Usage(format!(
                        "zlib level {} out of range 0..=9",
                        level
                    )))
                }
            }
        }
    }

    /// Tag byte recorded in chunk bodies.
    pub(crate) fn tag(&self) -> u8 {
        match self {
            Compression::None => TAG_NONE,
            Compression::Brotli(_) => TAG_BROTLI,
            Compression::Zstd(_) => TAG_ZSTD,
            Compression::Zlib(_) => TAG_ZLIB,
            Compression::Lz4 => TAG_LZ4,
        }
    }

    /// Decoder-side mapping from a tag byte. Levels are a writer concern;
    /// decoders get the codec's default.
    pub(crate) fn from_tag(tag: u8) -> Result<Compression> {
        match tag {
            TAG_NONE => Ok(Compression::None),
            TAG_BROTLI => Ok(Compression::Brotli(0)),
            TAG_ZSTD => Ok(Compression::Zstd(1)),
            TAG_ZLIB => Ok(Compression::Zlib(0)),
            TAG_LZ4 => Ok(Compression::Lz4),
            other => Err(Error::Format(format!(
                "unknown compression tag 0x{:02x}",
                other
            ))),
        }
    }
}

// ---------------------------------------------------------------------
// std::io bridging for the codec engines
// ---------------------------------------------------------------------

/// `io::Write` over a [`Sink`], so codec encoders can push into it.
#[derive(Debug)]
pub(crate) struct SinkIo<D: Sink>(pub(crate) D);

impl<D: Sink> io::Write for SinkIo<D> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf).map_err(into_io)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush(FlushKind::Sync).map_err(into_io)
    }
}

/// `io::Read` over a [`Source`], so codec decoders can pull from it.
#[derive(Debug)]
pub(crate) struct SourceIo<S: Source>(pub(crate) S);

impl<S: Source> io::Read for SourceIo<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = {
            let window = self.0.fill().map_err(into_io)?;
            if window.is_empty() {
                if self.0.hope_for_more() {
                    return Err(io::Error::new(
                        io::ErrorKind::WouldBlock,
                        "no compressed data available yet",
                    ));
                }
                return Ok(0);
            }
            let n = window.len().min(buf.len());
            buf[..n].copy_from_slice(&window[..n]);
            n
        };
        self.0.consume(n);
        Ok(n)
    }
}

/// Wraps a stream error so it can round-trip through an `io::Error`.
pub(crate) fn into_io(e: Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

/// Maps an engine-reported `io::Error` back to a stream error. Errors that
/// originated in our own streams are unwrapped. Anything else came from
/// the codec engine itself, so it is a data-level complaint: end-of-input
/// inside a frame is `Truncated`, every other engine error is `Format`.
pub(crate) fn from_io(e: io::Error) -> Error {
    if e.get_ref().map_or(false, |inner| inner.is::<Error>()) {
        let inner = e.into_inner().expect("checked above");
        return *inner.downcast::<Error>().expect("checked above");
    }
    match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            Error::Truncated("compressed stream ends inside a frame".to_string())
        }
        _ => Error::Format(format!("corrupt compressed data: {}", e)),
    }
}
