//! Std I/O Adapters
//!
//! `IoWriter` and `IoReader` connect the stream traits to `std::io`. The
//! container never touches file descriptors directly; anything implementing
//! `io::Write` (or `io::Read + io::Seek` for reading) can back a stream.

use std::io::{self, Read, Seek, SeekFrom, Write};

use ribbon_core::{Error, Result};

use super::sink::{FlushKind, Health, Sink, Window, DEFAULT_BUFFER_SIZE, MAX_BYTES_TO_COPY};

/// Buffered sink over an `io::Write`.
#[derive(Debug)]
pub struct IoWriter<W: Write> {
    dest: W,
    window: Window,
    pos: u64,
    health: Health,
}

impl<W: Write> IoWriter<W> {
    pub fn new(dest: W) -> Self {
        Self::with_buffer_size(dest, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(dest: W, buffer_size: usize) -> Self {
        Self {
            dest,
            window: Window::with_capacity(buffer_size.max(1)),
            pos: 0,
            health: Health::new(),
        }
    }

    fn drain_window(&mut self) -> Result<()> {
        if self.window.is_empty() {
            return Ok(());
        }
        let block = self.window.take();
        match self.dest.write_all(&block) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.health.fail(e.into())),
        }
    }

    fn write_through(&mut self, src: &[u8]) -> Result<()> {
        match self.dest.write_all(src) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.health.fail(e.into())),
        }
    }

    /// Drains buffers and returns the underlying writer without closing it.
    pub fn into_inner(mut self) -> Result<W> {
        self.health.check()?;
        self.drain_window()?;
        Ok(self.dest)
    }
}

impl<W: Write> Sink for IoWriter<W> {
    fn pos(&self) -> u64 {
        self.pos
    }

    fn healthy(&self) -> bool {
        self.health.healthy()
    }

    fn write(&mut self, src: &[u8]) -> Result<()> {
        self.health.check()?;
        if !self.window.try_copy(src) {
            self.drain_window()?;
            if src.len() > MAX_BYTES_TO_COPY {
                self.write_through(src)?;
            } else {
                self.window.copy_in(src);
            }
        }
        self.pos += src.len() as u64;
        Ok(())
    }

    fn flush(&mut self, kind: FlushKind) -> Result<()> {
        self.health.check()?;
        self.drain_window()?;
        if kind == FlushKind::Sync {
            if let Err(e) = self.dest.flush() {
                return Err(self.health.fail(e.into()));
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.health.is_closed() {
            return Ok(());
        }
        if self.health.healthy() {
            let _ = self.drain_window();
            if let Err(e) = self.dest.flush() {
                self.health.fail(e.into());
            }
        }
        self.health.finish_close()
    }
}

/// Buffered, seekable source over an `io::Read + io::Seek`.
#[derive(Debug)]
pub struct IoReader<R: Read + Seek> {
    src: R,
    buf: Vec<u8>,
    /// Consumed prefix of the buffered region.
    start: usize,
    /// Filled length of the buffer.
    end: usize,
    /// Absolute position of the next unconsumed byte.
    pos: u64,
    eof: bool,
    closed: bool,
}

impl<R: Read + Seek> IoReader<R> {
    pub fn new(src: R) -> Self {
        Self::with_buffer_size(src, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(src: R, buffer_size: usize) -> Self {
        Self {
            src,
            buf: vec![0u8; buffer_size.max(1)],
            start: 0,
            end: 0,
            pos: 0,
            eof: false,
            closed: false,
        }
    }

    pub fn into_inner(self) -> R {
        self.src
    }
}

impl<R: Read + Seek> crate::bytes::Source for IoReader<R> {
    fn pos(&self) -> u64 {
        self.pos
    }

    fn fill(&mut self) -> Result<&[u8]> {
        if self.closed {
            return Err(Error::Usage("source is closed".to_string()));
        }
        if self.start == self.end {
            if self.eof {
                return Ok(&[]);
            }
            self.start = 0;
            self.end = self.src.read(&mut self.buf)?;
            if self.end == 0 {
                self.eof = true;
                return Ok(&[]);
            }
        }
        Ok(&self.buf[self.start..self.end])
    }

    fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.end - self.start);
        self.start += n;
        self.pos += n as u64;
    }

    fn supports_seek(&self) -> bool {
        true
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if self.closed {
            return Err(Error::Usage("source is closed".to_string()));
        }
        // Forward seeks inside the buffered window just advance the cursor
        let buffered = (self.end - self.start) as u64;
        if pos >= self.pos && pos - self.pos <= buffered {
            self.start += (pos - self.pos) as usize;
            self.pos = pos;
            return Ok(());
        }
        self.src.seek(SeekFrom::Start(pos))?;
        self.start = 0;
        self.end = 0;
        self.pos = pos;
        self.eof = false;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Adapter used by tests and callers that already have an `io::Write`
/// producing into memory.
impl IoWriter<Vec<u8>> {
    pub fn for_vec() -> Self {
        Self::new(Vec::new())
    }
}

impl<T: AsRef<[u8]>> IoReader<io::Cursor<T>> {
    pub fn for_slice(data: T) -> Self {
        Self::new(io::Cursor::new(data))
    }
}
