//! Byte Sinks
//!
//! `Sink` is the forward byte-stream capability: accept bytes, flush, close,
//! and latch the first failure. Implementations keep a buffered window in
//! front of their slow path so that small writes are a plain `memcpy`; only
//! window overflow (or a large write, or a chain hand-off) reaches the
//! implementation-specific path.
//!
//! ## Health
//!
//! Every stream carries a [`Health`] latch. Once a stream has failed, every
//! subsequent operation returns the latched error without side effects, and
//! `close` reports it one final time. `close` is idempotent.

use ribbon_core::{Chain, Error, Result};

/// How far a flush must propagate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushKind {
    /// Drain in-process buffers into the downstream sink.
    Soft,
    /// Additionally ask a codec (if any) to emit a reader-visible restart
    /// point, and flush the downstream sink itself.
    Sync,
}

/// Destination of a byte stream.
///
/// `write` must accept the whole slice or fail; partial writes never
/// succeed silently. `close` terminates any codec frame, drains buffers,
/// and releases the downstream if owned.
pub trait Sink {
    /// Position of the next byte to write, counted from stream start.
    fn pos(&self) -> u64;

    /// Whether the stream has not latched an error and is not closed.
    fn healthy(&self) -> bool;

    fn write(&mut self, src: &[u8]) -> Result<()>;

    /// Writes a chain, taking ownership of its blocks. Implementations that
    /// can retain blocks do so without copying; the default copies.
    fn write_chain(&mut self, src: Chain) -> Result<()> {
        for block in src.blocks() {
            self.write(block)?;
        }
        Ok(())
    }

    fn flush(&mut self, kind: FlushKind) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}

impl<T: Sink + ?Sized> Sink for &mut T {
    fn pos(&self) -> u64 {
        (**self).pos()
    }
    fn healthy(&self) -> bool {
        (**self).healthy()
    }
    fn write(&mut self, src: &[u8]) -> Result<()> {
        (**self).write(src)
    }
    fn write_chain(&mut self, src: Chain) -> Result<()> {
        (**self).write_chain(src)
    }
    fn flush(&mut self, kind: FlushKind) -> Result<()> {
        (**self).flush(kind)
    }
    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

impl<T: Sink + ?Sized> Sink for Box<T> {
    fn pos(&self) -> u64 {
        (**self).pos()
    }
    fn healthy(&self) -> bool {
        (**self).healthy()
    }
    fn write(&mut self, src: &[u8]) -> Result<()> {
        (**self).write(src)
    }
    fn write_chain(&mut self, src: Chain) -> Result<()> {
        (**self).write_chain(src)
    }
    fn flush(&mut self, kind: FlushKind) -> Result<()> {
        (**self).flush(kind)
    }
    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Error latch shared by stream implementations.
///
/// The first failure is stored; later operations observe it through
/// [`Health::check`]. Attempts to fail an already-unhealthy stream are
/// ignored.
#[derive(Debug, Default)]
pub struct Health {
    error: Option<Error>,
    closed: bool,
}

impl Health {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn healthy(&self) -> bool {
        self.error.is_none() && !self.closed
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns the latched error, or a usage error after close.
    pub fn check(&self) -> Result<()> {
        if let Some(e) = &self.error {
            return Err(e.clone());
        }
        if self.closed {
            return Err(Error::Usage("stream is closed".to_string()));
        }
        Ok(())
    }

    /// Latches `error` if the stream is still healthy and returns the
    /// latched error either way.
    pub fn fail(&mut self, error: Error) -> Error {
        if self.error.is_none() {
            self.error = Some(error);
        }
        self.error.as_ref().expect("just latched").clone()
    }

    /// Marks the stream closed and reports the latched error, if any.
    /// Safe to call more than once.
    pub fn finish_close(&mut self) -> Result<()> {
        self.closed = true;
        match &self.error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

/// Writes at or below this size go through the buffered window; larger
/// writes are handed to the slow path whole, so downstreams can retain
/// them without a copy.
pub(crate) const MAX_BYTES_TO_COPY: usize = 1024;

/// Working-buffer size used when options do not override it.
pub(crate) const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// The buffered fast path in front of a sink's slow path.
///
/// Holds at most `cap` bytes. [`Window::try_copy`] is the window-fit check:
/// a successful call is the whole fast path, a `false` return routes the
/// write to the slow path.
#[derive(Debug)]
pub(crate) struct Window {
    buf: bytes::BytesMut,
    cap: usize,
}

impl Window {
    pub(crate) fn with_capacity(cap: usize) -> Self {
        Self {
            buf: bytes::BytesMut::with_capacity(cap),
            cap,
        }
    }

    pub(crate) fn available(&self) -> usize {
        self.cap.saturating_sub(self.buf.len())
    }

    pub(crate) fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Inline copy when the request fits the window and the copy threshold.
    pub(crate) fn try_copy(&mut self, src: &[u8]) -> bool {
        if src.len() <= self.available() && src.len() <= MAX_BYTES_TO_COPY {
            self.buf.extend_from_slice(src);
            true
        } else {
            false
        }
    }

    /// Copies unconditionally; for slow paths that already drained.
    pub(crate) fn copy_in(&mut self, src: &[u8]) {
        self.buf.extend_from_slice(src);
    }

    /// Drains the window into an immutable block.
    pub(crate) fn take(&mut self) -> bytes::Bytes {
        self.buf.split().freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---------------------------------------------------------------
    // Health latch
    // ---------------------------------------------------------------

    #[test]
    fn test_health_starts_healthy() {
        let health = Health::new();
        assert!(health.healthy());
        assert!(health.check().is_ok());
    }

    #[test]
    fn test_health_latches_first_error() {
        let mut health = Health::new();
        let first = health.fail(Error::Format("first".to_string()));
        assert!(matches!(first, Error::Format(_)));

        // A later failure does not replace the first
        let still_first = health.fail(Error::Usage("second".to_string()));
        assert!(matches!(still_first, Error::Format(_)));

        let err = health.check().unwrap_err();
        assert!(err.to_string().contains("first"));
    }

    #[test]
    fn test_health_close_reports_latched_error() {
        let mut health = Health::new();
        health.fail(Error::Truncated("gone".to_string()));
        assert!(health.finish_close().is_err());
        // Idempotent: still reports
        assert!(health.finish_close().is_err());
    }

    #[test]
    fn test_health_clean_close() {
        let mut health = Health::new();
        assert!(health.finish_close().is_ok());
        assert!(!health.healthy());
        let err = health.check().unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
    }

    // ---------------------------------------------------------------
    // Window
    // ---------------------------------------------------------------

    #[test]
    fn test_window_fast_path_fits() {
        let mut window = Window::with_capacity(16);
        assert!(window.try_copy(b"hello"));
        assert_eq!(window.buffered(), 5);
        assert_eq!(window.available(), 11);
    }

    #[test]
    fn test_window_rejects_overflow() {
        let mut window = Window::with_capacity(4);
        assert!(window.try_copy(b"abc"));
        assert!(!window.try_copy(b"de"));
        // Window contents unchanged on rejection
        assert_eq!(window.buffered(), 3);
    }

    #[test]
    fn test_window_rejects_large_copy() {
        let mut window = Window::with_capacity(MAX_BYTES_TO_COPY * 4);
        let big = vec![0u8; MAX_BYTES_TO_COPY + 1];
        assert!(!window.try_copy(&big));
    }

    #[test]
    fn test_window_take_drains() {
        let mut window = Window::with_capacity(16);
        window.try_copy(b"abcd");
        let block = window.take();
        assert_eq!(block.as_ref(), b"abcd");
        assert!(window.is_empty());
        assert_eq!(window.available(), 16);
    }
}
