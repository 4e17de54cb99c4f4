//! Chain Writer
//!
//! A sink that collects everything written into a [`Chain`]. Small writes
//! coalesce in the buffered window; large writes and chain hand-offs become
//! blocks of the output chain without copying.

use ribbon_core::{Chain, Result};

use super::sink::{FlushKind, Health, Sink, Window, DEFAULT_BUFFER_SIZE, MAX_BYTES_TO_COPY};

/// Collects written bytes into a chain.
#[derive(Debug)]
pub struct ChainWriter {
    dest: Chain,
    window: Window,
    pos: u64,
    health: Health,
}

impl ChainWriter {
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            dest: Chain::new(),
            window: Window::with_capacity(buffer_size.max(1)),
            pos: 0,
            health: Health::new(),
        }
    }

    fn drain_window(&mut self) {
        if !self.window.is_empty() {
            self.dest.append(self.window.take());
        }
    }

    /// Finishes the stream and returns the collected chain.
    pub fn into_chain(mut self) -> Result<Chain> {
        self.health.check()?;
        self.drain_window();
        Ok(self.dest)
    }
}

impl Default for ChainWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for ChainWriter {
    fn pos(&self) -> u64 {
        self.pos
    }

    fn healthy(&self) -> bool {
        self.health.healthy()
    }

    fn write(&mut self, src: &[u8]) -> Result<()> {
        self.health.check()?;
        if !self.window.try_copy(src) {
            // Slow path: publish the window, then either retain the slice
            // as its own block or restart the window with it.
            self.drain_window();
            if src.len() > MAX_BYTES_TO_COPY {
                self.dest.append(bytes::Bytes::copy_from_slice(src));
            } else {
                self.window.copy_in(src);
            }
        }
        self.pos += src.len() as u64;
        Ok(())
    }

    fn write_chain(&mut self, src: Chain) -> Result<()> {
        self.health.check()?;
        self.pos += src.size();
        if src.size() as usize <= MAX_BYTES_TO_COPY {
            // Tiny chains coalesce into the window like slices
            for block in src.blocks() {
                if !self.window.try_copy(block) {
                    self.drain_window();
                    self.window.copy_in(block);
                }
            }
            return Ok(());
        }
        self.drain_window();
        self.dest.append_chain(src);
        Ok(())
    }

    fn flush(&mut self, _kind: FlushKind) -> Result<()> {
        self.health.check()?;
        self.drain_window();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.health.is_closed() {
            return Ok(());
        }
        if self.health.healthy() {
            self.drain_window();
        }
        self.health.finish_close()
    }
}
