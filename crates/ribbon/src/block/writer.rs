//! Block Writer
//!
//! Lays already-encoded chunks into the physical block structure: chunk
//! bytes flow through back to back in logical space, and a block header is
//! interleaved at every 64 KiB physical boundary. This is also the feed-in
//! point for chunks encoded outside the container (the columnar path):
//! anything that can produce a [`Chunk`] can write it here.

use bytes::Bytes;
use ribbon_core::{Chain, Error, Result};

use crate::bytes::{FlushKind, Health, Sink};
use crate::chunk::Chunk;

use super::{is_block_boundary, remaining_in_block, BlockHeader};

/// Frames chunks into fixed-size blocks over a byte sink.
#[derive(Debug)]
pub struct BlockWriter<D: Sink> {
    dest: D,
    /// Logical position: chunk-stream bytes written so far.
    pos: u64,
    /// Begin of the last chunk written before the current one.
    previous_chunk_begin: u64,
    /// Extent of the chunk currently being written.
    current_chunk: Option<(u64, u64)>,
    health: Health,
}

impl<D: Sink> BlockWriter<D> {
    /// Wraps a sink positioned at the start of the file.
    pub fn new(dest: D) -> Result<Self> {
        if dest.pos() != 0 {
            return Err(Error::Usage(format!(
                "block framing must start at the beginning of the file, sink is at {}",
                dest.pos()
            )));
        }
        Ok(Self {
            dest,
            pos: 0,
            previous_chunk_begin: 0,
            current_chunk: None,
            health: Health::new(),
        })
    }

    /// Logical position where the next chunk will begin.
    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn healthy(&self) -> bool {
        self.health.healthy()
    }

    /// Writes one chunk, interleaving block headers as boundaries are
    /// crossed.
    pub fn write_chunk(&mut self, chunk: &Chunk) -> Result<()> {
        self.health.check()?;
        let begin = self.pos;
        let end = begin + chunk.size();
        self.current_chunk = Some((begin, end));

        let result = (|| {
            self.write_framed(Bytes::copy_from_slice(&chunk.header.serialize()))?;
            for block in chunk.data.blocks() {
                self.write_framed(block.clone())?;
            }
            Ok(())
        })();
        if let Err(e) = result {
            return Err(self.health.fail(e));
        }

        self.current_chunk = None;
        self.previous_chunk_begin = begin;
        debug_assert_eq!(self.pos, end);
        Ok(())
    }

    fn write_framed(&mut self, mut piece: Bytes) -> Result<()> {
        while !piece.is_empty() {
            if is_block_boundary(self.pos) {
                self.emit_block_header()?;
            }
            let room = remaining_in_block(self.pos).min(piece.len() as u64) as usize;
            let fragment = piece.split_to(room);
            self.dest.write_chain(Chain::from(fragment))?;
            self.pos += room as u64;
        }
        Ok(())
    }

    fn emit_block_header(&mut self) -> Result<()> {
        let (begin, end) = self
            .current_chunk
            .expect("block headers are emitted only while writing a chunk");
        // A chunk starting exactly at the boundary is the block's "next"
        // chunk (offset 0) but not its "previous" one; mid-chunk, the next
        // header is wherever this chunk ends.
        let (previous, next) = if self.pos == begin {
            (self.previous_chunk_begin, begin)
        } else {
            (begin, end)
        };
        let header = BlockHeader {
            previous_chunk_begin: previous,
            next_chunk_header_offset: next - self.pos,
        };
        self.dest.write(&header.serialize())
    }

    /// Flushes buffered bytes down the sink stack.
    pub fn flush(&mut self, kind: FlushKind) -> Result<()> {
        self.health.check()?;
        self.dest.flush(kind)
    }

    pub fn close(&mut self) -> Result<()> {
        if self.health.is_closed() {
            return Ok(());
        }
        if self.health.healthy() {
            if let Err(e) = self.dest.close() {
                self.health.fail(e);
            }
        } else {
            let _ = self.dest.close();
        }
        self.health.finish_close()
    }

    /// Returns the underlying sink without closing it.
    pub fn into_inner(self) -> Result<D> {
        self.health.check()?;
        Ok(self.dest)
    }
}
