//! Record Writer
//!
//! `RecordWriter` is the write-side entry point of the container. It
//! accumulates records into a pending chunk sized by a byte budget, and
//! emits chunks either inline (`parallelism = 0`) or through the encoder
//! pool, which keeps the output byte-identical while spreading the
//! encoding work over worker threads.
//!
//! ## Example Usage
//!
//! ```ignore
//! use ribbon::records::{RecordWriter, WriterOptions};
//! use ribbon::codec::Compression;
//!
//! let file = std::fs::File::create("data.ribbon")?;
//! let mut writer = RecordWriter::create(
//!     file,
//!     WriterOptions {
//!         compression: Compression::Zstd(3),
//!         parallelism: 4,
//!         ..Default::default()
//!     },
//! )?;
//!
//! for record in records {
//!     writer.write_record(&record)?;
//! }
//! writer.close()?;
//! ```
//!
//! ## Close semantics
//!
//! `close` is a barrier: the pending chunk is encoded and written, the
//! pool (if any) is drained and joined, the downstream sink is closed,
//! and any latched failure is reported. Dropping a writer without closing
//! releases the threads but does not guarantee buffered records reach the
//! sink.

use serde::{Deserialize, Serialize};

use ribbon_core::{Error, Result};

use crate::block::BlockWriter;
use crate::bytes::{FlushKind, IoWriter, Sink, DEFAULT_BUFFER_SIZE};
use crate::chunk::{ChunkEncoder, SimpleEncoder};
use crate::codec::Compression;

use super::pool::EncoderPool;
use super::position::RecordPosition;

/// Write-side options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriterOptions {
    /// Compression applied to chunk payload sections.
    #[serde(default)]
    pub compression: Compression,

    /// Working-buffer size for the byte sink. Must be positive.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Advisory total-size hint forwarded to codecs that can use one.
    #[serde(default)]
    pub size_hint: Option<u64>,

    /// Encoder workers. Zero encodes synchronously on the caller's thread.
    #[serde(default)]
    pub parallelism: usize,

    /// Columnar payload encoding. Produced by an external encoder; this
    /// build only validates the flag.
    #[serde(default)]
    pub transpose: bool,

    /// Pending-chunk byte budget: a chunk is closed once its raw contents
    /// reach this size. Must be positive.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            compression: Compression::default(),
            buffer_size: default_buffer_size(),
            size_hint: None,
            parallelism: 0,
            transpose: false,
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_chunk_size() -> u64 {
    1 << 20 // 1 MiB
}

impl WriterOptions {
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(Error::Usage("buffer_size must be positive".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(Error::Usage("chunk_size must be positive".to_string()));
        }
        self.compression.validate()
    }
}

enum Inner<D: Sink + Send + 'static> {
    Sync(BlockWriter<D>),
    Parallel(EncoderPool<D>),
    Closed,
}

/// Writes records into the chunked container format.
pub struct RecordWriter<D: Sink + Send + 'static> {
    inner: Inner<D>,
    pending: SimpleEncoder,
    compression: Compression,
    size_hint: Option<u64>,
    chunk_size: u64,
    records_written: u64,
}

impl<W: std::io::Write + Send + 'static> RecordWriter<IoWriter<W>> {
    /// Opens a writer over anything `io::Write`, using the options'
    /// buffer size.
    pub fn create(dest: W, options: WriterOptions) -> Result<Self> {
        let buffer_size = options.buffer_size;
        Self::new(IoWriter::with_buffer_size(dest, buffer_size), options)
    }
}

impl<D: Sink + Send + 'static> RecordWriter<D> {
    pub fn new(dest: D, options: WriterOptions) -> Result<Self> {
        options.validate()?;
        if options.transpose {
            return Err(Error::Usage(
                "columnar chunk encoding is produced by an external encoder; \
                 feed its chunks through BlockWriter::write_chunk"
                    .to_string(),
            ));
        }
        let block_writer = BlockWriter::new(dest)?;
        let inner = if options.parallelism == 0 {
            Inner::Sync(block_writer)
        } else {
            Inner::Parallel(EncoderPool::new(block_writer, options.parallelism)?)
        };
        Ok(Self {
            inner,
            pending: SimpleEncoder::new(options.compression, options.size_hint),
            compression: options.compression,
            size_hint: options.size_hint,
            chunk_size: options.chunk_size,
            records_written: 0,
        })
    }

    /// Appends one record. The record lands in the pending chunk; chunks
    /// are emitted when the byte budget fills, on `flush`, and on `close`.
    pub fn write_record(&mut self, record: impl AsRef<[u8]>) -> Result<()> {
        if matches!(self.inner, Inner::Closed) {
            return Err(Error::Usage("writer is closed".to_string()));
        }
        self.pending.add_record(record.as_ref())?;
        self.records_written += 1;
        if self.pending.pending_bytes() >= self.chunk_size {
            self.flush_pending()?;
        }
        Ok(())
    }

    fn flush_pending(&mut self) -> Result<()> {
        if self.pending.num_records() == 0 {
            return Ok(());
        }
        tracing::debug!(
            records = self.pending.num_records(),
            bytes = self.pending.pending_bytes(),
            "closing pending chunk"
        );
        match &mut self.inner {
            Inner::Sync(writer) => {
                let chunk = self.pending.encode()?;
                writer.write_chunk(&chunk)
            }
            Inner::Parallel(pool) => {
                let filled = std::mem::replace(
                    &mut self.pending,
                    SimpleEncoder::new(self.compression, self.size_hint),
                );
                pool.submit(filled)
            }
            Inner::Closed => Err(Error::Usage("writer is closed".to_string())),
        }
    }

    /// Emits the pending chunk and flushes the sink stack. With
    /// `FlushKind::Sync` this drains the encoder pool first, so every
    /// record written so far is readable downstream.
    pub fn flush(&mut self, kind: FlushKind) -> Result<()> {
        self.flush_pending()?;
        match &mut self.inner {
            Inner::Sync(writer) => writer.flush(kind),
            Inner::Parallel(pool) => pool.flush(kind),
            Inner::Closed => Err(Error::Usage("writer is closed".to_string())),
        }
    }

    /// Position of the next record. Chunk begins are unknowable while
    /// earlier chunks are still being encoded, so this is only available
    /// in synchronous mode.
    pub fn pos(&self) -> Result<RecordPosition> {
        match &self.inner {
            Inner::Sync(writer) => {
                RecordPosition::new(writer.pos(), self.pending.num_records())
            }
            Inner::Parallel(_) => Err(Error::Usage(
                "positions are not available while encoding in parallel".to_string(),
            )),
            Inner::Closed => Err(Error::Usage("writer is closed".to_string())),
        }
    }

    /// Records accepted so far.
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Closes the writer: emits the pending chunk, drains and joins the
    /// pool, closes the downstream sink, and reports any latched failure.
    /// Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if matches!(self.inner, Inner::Closed) {
            return Ok(());
        }
        let flushed = self.flush_pending();
        let mut inner = std::mem::replace(&mut self.inner, Inner::Closed);
        let closed = match &mut inner {
            Inner::Sync(writer) => writer.close(),
            Inner::Parallel(pool) => pool.close(),
            Inner::Closed => Ok(()),
        };
        tracing::debug!(records = self.records_written, "record writer closed");
        flushed.and(closed)
    }

    /// Finishes writing and hands back the underlying sink, unclosed.
    pub fn into_inner(mut self) -> Result<D> {
        self.flush_pending()?;
        let inner = std::mem::replace(&mut self.inner, Inner::Closed);
        match inner {
            Inner::Sync(writer) => writer.into_inner(),
            Inner::Parallel(pool) => pool.into_inner(),
            Inner::Closed => Err(Error::Usage("writer is closed".to_string())),
        }
    }
}
