//! Backward Writer
//!
//! Writes bytes back to front: each `write` prepends in front of everything
//! written so far. Encoders that frame variable-length data use this to
//! emit a body first and prepend its length prefix once the size is known,
//! as a plain copy into the descending window.
//!
//! Sequential prepending only: no random access, no flush. The result
//! materializes as a forward [`Chain`] via [`BackwardWriter::into_chain`],
//! which reverses the internal block list.

use bytes::{Bytes, BytesMut};
use ribbon_core::{Chain, Result};

use super::sink::{Health, MAX_BYTES_TO_COPY};

const INITIAL_BUFFER_SIZE: usize = 4 * 1024;
const MAX_BUFFER_SIZE: usize = 64 * 1024;

/// A sink whose cursor descends.
#[derive(Debug)]
pub struct BackwardWriter {
    /// Finished segments in production order: each later entry is logically
    /// *earlier* than the ones before it.
    blocks: Vec<Bytes>,
    /// Current buffer, filled from the end toward index 0.
    buf: BytesMut,
    /// Descending cursor: valid data occupies `buf[cursor..]`.
    cursor: usize,
    pos: u64,
    health: Health,
}

impl BackwardWriter {
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            buf: BytesMut::zeroed(INITIAL_BUFFER_SIZE),
            cursor: INITIAL_BUFFER_SIZE,
            pos: 0,
            health: Health::new(),
        }
    }

    /// Space remaining below the cursor.
    fn available(&self) -> usize {
        self.cursor
    }

    /// Position counter: grows by every byte prepended.
    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn healthy(&self) -> bool {
        self.health.healthy()
    }

    /// Publishes `buf[cursor..]` as a finished segment and issues a fresh,
    /// larger buffer. The slow path of `write`.
    fn push_down(&mut self) {
        let filled_from = self.cursor;
        let old_cap = self.buf.len();
        let new_cap = (old_cap * 2).clamp(INITIAL_BUFFER_SIZE, MAX_BUFFER_SIZE);
        let old = std::mem::replace(&mut self.buf, BytesMut::zeroed(new_cap));
        if filled_from < old_cap {
            self.blocks.push(old.freeze().slice(filled_from..));
        }
        self.cursor = new_cap;
    }

    /// Prepends `src` in front of everything written so far.
    pub fn write(&mut self, src: &[u8]) -> Result<()> {
        self.health.check()?;
        if src.len() <= self.available() && src.len() <= MAX_BYTES_TO_COPY {
            self.cursor -= src.len();
            self.buf[self.cursor..self.cursor + src.len()].copy_from_slice(src);
        } else {
            self.push_down();
            if src.len() > MAX_BYTES_TO_COPY || src.len() > self.available() {
                self.blocks.push(Bytes::copy_from_slice(src));
            } else {
                self.cursor -= src.len();
                self.buf[self.cursor..self.cursor + src.len()].copy_from_slice(src);
            }
        }
        self.pos += src.len() as u64;
        Ok(())
    }

    /// Prepends a whole chain, retaining its blocks without copying.
    pub fn write_chain(&mut self, src: Chain) -> Result<()> {
        self.health.check()?;
        self.pos += src.size();
        self.push_down();
        // The chain's blocks are logically contiguous; in the reversed
        // internal list they must appear last-block-first.
        let mut incoming: Vec<Bytes> = src.into_blocks().into();
        incoming.reverse();
        self.blocks.extend(incoming);
        Ok(())
    }

    /// Finishes the stream, reversing the block list into a forward chain.
    pub fn into_chain(mut self) -> Result<Chain> {
        self.health.check()?;
        self.push_down();
        let mut chain = Chain::new();
        for block in self.blocks.into_iter().rev() {
            chain.append(block);
        }
        Ok(chain)
    }
}

impl Default for BackwardWriter {
    fn default() -> Self {
        Self::new()
    }
}
