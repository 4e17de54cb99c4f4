//! Byte Sources
//!
//! `Source` is the reading mirror of `Sink`: a buffered window that callers
//! inspect with [`Source::fill`] and advance with [`Source::consume`].
//! An empty window from `fill` means no bytes are available right now:
//! end of stream, unless the source still hopes for more (a live tail).

use bytes::{Bytes, BytesMut};
use ribbon_core::{Chain, Error, Result};

/// Origin of a byte stream.
pub trait Source {
    /// Position of the next unconsumed byte, counted from stream start.
    fn pos(&self) -> u64;

    /// Returns the buffered window, refilling it first when empty. An empty
    /// slice means no data is available now: end of stream unless
    /// [`Source::hope_for_more`] holds.
    fn fill(&mut self) -> Result<&[u8]>;

    /// Advances past `n` bytes of the current window.
    ///
    /// # Panics
    ///
    /// May panic if `n` exceeds the bytes returned by the last `fill`.
    fn consume(&mut self, n: usize);

    /// Whether an empty window may become non-empty later (e.g. a file that
    /// is still being written). Sources over complete data return false.
    fn hope_for_more(&self) -> bool {
        false
    }

    fn supports_seek(&self) -> bool {
        false
    }

    /// Repositions the stream so that `pos()` equals `pos`.
    fn seek(&mut self, pos: u64) -> Result<()> {
        let _ = pos;
        Err(Error::Usage("seek is not supported by this source".to_string()))
    }

    fn close(&mut self) -> Result<()>;

    // ---- derived reads ----

    /// Reads exactly `dest.len()` bytes, failing with `Truncated` (naming
    /// `what`) if the stream ends first.
    fn read_exact(&mut self, dest: &mut [u8], what: &str) -> Result<()> {
        let mut filled = 0;
        while filled < dest.len() {
            let n = {
                let window = self.fill()?;
                if window.is_empty() {
                    return Err(Error::Truncated(format!(
                        "byte stream ends inside {} ({} of {} bytes read)",
                        what,
                        filled,
                        dest.len()
                    )));
                }
                let n = window.len().min(dest.len() - filled);
                dest[filled..filled + n].copy_from_slice(&window[..n]);
                n
            };
            self.consume(n);
            filled += n;
        }
        Ok(())
    }

    /// Reads exactly `n` bytes into a chain, preserving window granularity
    /// as block boundaries.
    fn read_chain(&mut self, n: u64, what: &str) -> Result<Chain> {
        let mut chain = Chain::new();
        let mut remaining = n;
        while remaining > 0 {
            let taken = {
                let window = self.fill()?;
                if window.is_empty() {
                    return Err(Error::Truncated(format!(
                        "byte stream ends inside {} ({} of {} bytes read)",
                        what,
                        n - remaining,
                        n
                    )));
                }
                let take = (window.len() as u64).min(remaining) as usize;
                chain.append(Bytes::copy_from_slice(&window[..take]));
                take
            };
            self.consume(taken);
            remaining -= taken as u64;
        }
        Ok(chain)
    }

    /// Skips `n` bytes, seeking when the source supports it.
    fn skip(&mut self, n: u64, what: &str) -> Result<()> {
        if self.supports_seek() {
            return self.seek(self.pos() + n);
        }
        let mut remaining = n;
        while remaining > 0 {
            let taken = {
                let window = self.fill()?;
                if window.is_empty() {
                    return Err(Error::Truncated(format!(
                        "byte stream ends inside {}",
                        what
                    )));
                }
                (window.len() as u64).min(remaining) as usize
            };
            self.consume(taken);
            remaining -= taken as u64;
        }
        Ok(())
    }
}

impl<T: Source + ?Sized> Source for &mut T {
    fn pos(&self) -> u64 {
        (**self).pos()
    }
    fn fill(&mut self) -> Result<&[u8]> {
        (**self).fill()
    }
    fn consume(&mut self, n: usize) {
        (**self).consume(n)
    }
    fn hope_for_more(&self) -> bool {
        (**self).hope_for_more()
    }
    fn supports_seek(&self) -> bool {
        (**self).supports_seek()
    }
    fn seek(&mut self, pos: u64) -> Result<()> {
        (**self).seek(pos)
    }
    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// A seekable source over an in-memory chain.
#[derive(Debug)]
pub struct ChainReader {
    blocks: Vec<Bytes>,
    /// Index of the block holding the cursor.
    block_idx: usize,
    /// Offset of the cursor within that block.
    offset: usize,
    pos: u64,
    size: u64,
    closed: bool,
}

impl ChainReader {
    pub fn new(chain: Chain) -> Self {
        let size = chain.size();
        Self {
            blocks: chain.into_blocks().into(),
            block_idx: 0,
            offset: 0,
            pos: 0,
            size,
            closed: false,
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Source for ChainReader {
    fn pos(&self) -> u64 {
        self.pos
    }

    fn fill(&mut self) -> Result<&[u8]> {
        if self.closed {
            return Err(Error::Usage("source is closed".to_string()));
        }
        while self.block_idx < self.blocks.len() {
            if self.offset < self.blocks[self.block_idx].len() {
                return Ok(&self.blocks[self.block_idx][self.offset..]);
            }
            self.block_idx += 1;
            self.offset = 0;
        }
        Ok(&[])
    }

    fn consume(&mut self, n: usize) {
        self.offset += n;
        self.pos += n as u64;
    }

    fn supports_seek(&self) -> bool {
        true
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if self.closed {
            return Err(Error::Usage("source is closed".to_string()));
        }
        // Seeking past the end is allowed, like a file: reads there
        // observe end of stream.
        if pos >= self.size {
            self.block_idx = self.blocks.len();
            self.offset = 0;
            self.pos = pos;
            return Ok(());
        }
        let mut remaining = pos;
        self.block_idx = 0;
        self.offset = 0;
        while self.block_idx < self.blocks.len() {
            let len = self.blocks[self.block_idx].len() as u64;
            if remaining < len {
                self.offset = remaining as usize;
                break;
            }
            remaining -= len;
            self.block_idx += 1;
        }
        self.pos = pos;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Convenience: reads the rest of a source into one contiguous buffer.
pub fn read_to_end<S: Source>(src: &mut S) -> Result<Bytes> {
    let mut out = BytesMut::new();
    loop {
        let n = {
            let window = src.fill()?;
            if window.is_empty() {
                break;
            }
            out.extend_from_slice(window);
            window.len()
        };
        src.consume(n);
    }
    Ok(out.freeze())
}
