//! Block Reader
//!
//! Reads the chunk stream back out of the block structure, validating and
//! stripping the interleaved block headers, and implements the seeking
//! side of the format: positioned jumps to a chunk, location of the chunk
//! covering a logical position, and resynchronization after corruption.
//!
//! ## Recovery
//!
//! Two failure granularities:
//!
//! - A chunk body that fails its hash under a *valid* chunk header costs
//!   exactly that chunk: the header authenticated `data_size`, so the
//!   stream is already positioned at the next chunk.
//! - A chunk header that fails to parse leaves the stream in garbage. The
//!   reader then seeks: advance to the next physical block boundary,
//!   validate the block header, follow its `next_chunk_header_offset`,
//!   and authenticate the candidate chunk header; on failure, advance one
//!   more block. End of file ends the search.

use ribbon_core::{Chain, Error, Result};

use crate::bytes::Source;
use crate::chunk::{Chunk, ChunkHeader, CHUNK_HEADER_SIZE};

use super::{
    is_block_boundary, logical_to_physical, remaining_in_block, BlockHeader, BLOCK_HEADER_SIZE,
    BLOCK_SIZE, USABLE_BLOCK_SIZE,
};

/// Reads chunks out of the block structure.
#[derive(Debug)]
pub struct BlockReader<S: Source> {
    src: S,
    /// Logical position of the next unread chunk-stream byte.
    pos: u64,
    /// Logical begin of the chunk most recently read (or sought to).
    chunk_begin: u64,
    /// A header-level failure left the stream in garbage; block-boundary
    /// seeking is required before further reads.
    needs_resync: bool,
    closed: bool,
}

impl<S: Source> BlockReader<S> {
    /// Wraps a source positioned at the start of the file.
    pub fn new(src: S) -> Result<Self> {
        if src.pos() != 0 {
            return Err(Error::Usage(format!(
                "block framing starts at the beginning of the file, source is at {}",
                src.pos()
            )));
        }
        Ok(Self {
            src,
            pos: 0,
            chunk_begin: 0,
            needs_resync: false,
            closed: false,
        })
    }

    /// Logical position of the next unread chunk-stream byte.
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Logical begin of the chunk most recently read.
    pub fn chunk_begin(&self) -> u64 {
        self.chunk_begin
    }

    pub fn supports_seek(&self) -> bool {
        self.src.supports_seek()
    }

    /// Reads the next chunk. `Ok(None)` is a clean end of file at a chunk
    /// boundary. Errors at the header level poison the stream until
    /// [`BlockReader::recover`]; a body-hash failure does not, since the
    /// stream is already past the bad chunk.
    pub fn read_chunk(&mut self) -> Result<Option<Chunk>> {
        if self.closed {
            return Err(Error::Usage("reader is closed".to_string()));
        }
        self.chunk_begin = self.pos;

        let mut header_bytes = [0u8; CHUNK_HEADER_SIZE as usize];
        match self.read_framed(&mut header_bytes, "chunk header") {
            Ok(true) => {}
            Ok(false) => return Ok(None),
            Err(e) => {
                self.needs_resync = true;
                return Err(e);
            }
        }
        let header = match ChunkHeader::parse(&header_bytes) {
            Ok(header) => header,
            Err(e) => {
                self.needs_resync = true;
                return Err(e);
            }
        };

        let data = match self.read_framed_chain(header.data_size(), "chunk body") {
            Ok(chain) => chain,
            Err(e) => {
                self.needs_resync = true;
                return Err(e);
            }
        };

        header.verify_data(&data)?;
        Ok(Some(Chunk { header, data }))
    }

    /// File offset to park the source at so that reading resumes at
    /// logical `pos`. At a block boundary the block header is still
    /// pending (the framed read consumes and validates it), so the seek
    /// targets the header, not the first chunk byte after it.
    fn physical_read_position(pos: u64) -> u64 {
        if is_block_boundary(pos) {
            (pos / USABLE_BLOCK_SIZE) * BLOCK_SIZE
        } else {
            logical_to_physical(pos)
        }
    }

    /// Positions the reader at a chunk boundary known from a record
    /// position or an index.
    pub fn seek_to_chunk(&mut self, begin: u64) -> Result<()> {
        if self.closed {
            return Err(Error::Usage("reader is closed".to_string()));
        }
        self.src.seek(Self::physical_read_position(begin))?;
        self.pos = begin;
        self.chunk_begin = begin;
        self.needs_resync = false;
        Ok(())
    }

    /// Finds the begin of the chunk whose extent covers logical position
    /// `target`, using the block header of the containing block and then
    /// walking chunk headers. Leaves the reader positioned at that chunk.
    /// Past the last chunk, returns the end-of-chunks position.
    pub fn find_chunk_containing(&mut self, target: u64) -> Result<u64> {
        if self.closed {
            return Err(Error::Usage("reader is closed".to_string()));
        }
        let boundary = (target / USABLE_BLOCK_SIZE) * BLOCK_SIZE;
        self.src.seek(boundary)?;
        let header = match self.read_raw_block_header()? {
            Some(header) => header,
            None => {
                return Err(Error::Format(format!(
                    "no block header at file offset {}",
                    boundary
                )))
            }
        };

        let block_logical = (boundary / BLOCK_SIZE) * USABLE_BLOCK_SIZE;
        let next = block_logical
            .checked_add(header.next_chunk_header_offset)
            .ok_or_else(|| Error::Format("block header offset overflows".to_string()))?;
        let mut begin = if next <= target {
            next
        } else {
            header.previous_chunk_begin
        };

        loop {
            self.seek_to_chunk(begin)?;
            let mut header_bytes = [0u8; CHUNK_HEADER_SIZE as usize];
            match self.read_framed(&mut header_bytes, "chunk header")? {
                true => {}
                false => {
                    // Ran off the end: `target` is at or past end of file
                    self.seek_to_chunk(begin)?;
                    return Ok(begin);
                }
            }
            let header = ChunkHeader::parse(&header_bytes)?;
            let end = begin + CHUNK_HEADER_SIZE + header.data_size();
            if target < end {
                self.seek_to_chunk(begin)?;
                return Ok(begin);
            }
            begin = end;
        }
    }

    /// Resynchronizes after a header-level failure. Returns `Ok(true)` when
    /// positioned at an authenticated chunk header (or when no resync was
    /// needed), `Ok(false)` when end of file was reached first.
    pub fn recover(&mut self) -> Result<bool> {
        if self.closed {
            return Err(Error::Usage("reader is closed".to_string()));
        }
        if !self.needs_resync {
            return Ok(true);
        }
        if !self.src.supports_seek() {
            return Ok(false);
        }

        let mut boundary = (self.src.pos() / BLOCK_SIZE + 1) * BLOCK_SIZE;
        loop {
            self.src.seek(boundary)?;
            let header = match self.read_raw_block_header() {
                Ok(Some(header)) => header,
                Ok(None) => return Ok(false),
                Err(_) => {
                    tracing::debug!(boundary, "invalid block header while resynchronizing");
                    boundary += BLOCK_SIZE;
                    continue;
                }
            };

            let block_logical = (boundary / BLOCK_SIZE) * USABLE_BLOCK_SIZE;
            let candidate = match block_logical.checked_add(header.next_chunk_header_offset) {
                Some(candidate) => candidate,
                None => {
                    boundary += BLOCK_SIZE;
                    continue;
                }
            };

            match self.probe_chunk_at(candidate) {
                Ok(true) => {
                    tracing::debug!(candidate, "resynchronized to chunk boundary");
                    self.seek_to_chunk(candidate)?;
                    return Ok(true);
                }
                Ok(false) => return Ok(false),
                Err(_) => {
                    boundary += BLOCK_SIZE;
                    continue;
                }
            }
        }
    }

    /// Whether an authenticated chunk header begins at logical `begin`.
    /// `Ok(false)` means clean end of file there.
    fn probe_chunk_at(&mut self, begin: u64) -> Result<bool> {
        self.src.seek(Self::physical_read_position(begin))?;
        self.pos = begin;
        let mut header_bytes = [0u8; CHUNK_HEADER_SIZE as usize];
        match self.read_framed(&mut header_bytes, "chunk header")? {
            true => {}
            false => return Ok(false),
        }
        ChunkHeader::parse(&header_bytes)?;
        Ok(true)
    }

    /// Reads `dest.len()` logical bytes, stripping and validating block
    /// headers. `Ok(false)` is a clean end of file before the first byte.
    fn read_framed(&mut self, dest: &mut [u8], what: &str) -> Result<bool> {
        let mut filled = 0;
        while filled < dest.len() {
            if is_block_boundary(self.pos) {
                match self.read_raw_block_header()? {
                    Some(_) => {}
                    None => {
                        if filled == 0 {
                            return Ok(false);
                        }
                        return Err(Error::Truncated(format!(
                            "file ends inside {}",
                            what
                        )));
                    }
                }
            }
            let room = remaining_in_block(self.pos).min((dest.len() - filled) as u64) as usize;
            let n = {
                let window = self.src.fill()?;
                if window.is_empty() {
                    if filled == 0 {
                        return Ok(false);
                    }
                    return Err(Error::Truncated(format!("file ends inside {}", what)));
                }
                let n = window.len().min(room);
                dest[filled..filled + n].copy_from_slice(&window[..n]);
                n
            };
            self.src.consume(n);
            self.pos += n as u64;
            filled += n;
        }
        Ok(true)
    }

    /// Reads `len` logical bytes into a chain; the body counterpart of
    /// [`BlockReader::read_framed`]. Any shortfall is truncation.
    fn read_framed_chain(&mut self, len: u64, what: &str) -> Result<Chain> {
        let mut chain = Chain::new();
        let mut remaining = len;
        while remaining > 0 {
            if is_block_boundary(self.pos) {
                match self.read_raw_block_header()? {
                    Some(_) => {}
                    None => {
                        return Err(Error::Truncated(format!(
                            "file ends inside {} ({} of {} bytes read)",
                            what,
                            len - remaining,
                            len
                        )))
                    }
                }
            }
            let room = remaining_in_block(self.pos).min(remaining);
            let taken = {
                let window = self.src.fill()?;
                if window.is_empty() {
                    return Err(Error::Truncated(format!(
                        "file ends inside {} ({} of {} bytes read)",
                        what,
                        len - remaining,
                        len
                    )));
                }
                let take = (window.len() as u64).min(room) as usize;
                chain.append(bytes::Bytes::copy_from_slice(&window[..take]));
                take
            };
            self.src.consume(taken);
            self.pos += taken as u64;
            remaining -= taken as u64;
        }
        Ok(chain)
    }

    /// Reads and authenticates the 24 physical header bytes at the current
    /// source position. `Ok(None)` is a clean end of file at the boundary.
    fn read_raw_block_header(&mut self) -> Result<Option<BlockHeader>> {
        let mut buf = [0u8; BLOCK_HEADER_SIZE as usize];
        let mut filled = 0;
        while filled < buf.len() {
            let n = {
                let window = self.src.fill()?;
                if window.is_empty() {
                    if filled == 0 {
                        return Ok(None);
                    }
                    return Err(Error::Truncated(
                        "file ends inside a block header".to_string(),
                    ));
                }
                let n = window.len().min(buf.len() - filled);
                buf[filled..filled + n].copy_from_slice(&window[..n]);
                n
            };
            self.src.consume(n);
            filled += n;
        }
        Ok(Some(BlockHeader::parse(&buf)?))
    }

    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.src.close()
    }
}
