//! Block Framing
//!
//! The file is a sequence of fixed 64 KiB physical blocks. Every block
//! begins with a 24-byte header that exists purely for resynchronization:
//! round any file offset down to a block, read its header, and you can
//! locate the nearest chunk header in O(1).
//!
//! ## Block header layout (24 bytes, little-endian)
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ header_hash (8)             hash of bytes 8..24      │
//! │ previous_chunk_begin (8)    last chunk starting at   │
//! │                             or before this block     │
//! │ next_chunk_header_offset (8) distance from this      │
//! │                             block's start to the     │
//! │                             next chunk header        │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Logical vs physical positions
//!
//! All positions in the format (chunk begins, the offsets above) are
//! *logical*: byte offsets into the stream of chunk bytes with block
//! headers stripped. A 64 KiB physical block carries 65 512 logical bytes.
//! The mapping is bijective, so a logical position always names an exact
//! file offset and vice versa. The first chunk of every file begins at
//! logical position 0 (physical offset 24, right after the first block
//! header).
//!
//! If a chunk header starts exactly at a block boundary the offset is 0;
//! if no chunk begins inside a block (the block is interior to a long
//! chunk) the offset points past the block's end.

mod reader;
mod writer;

pub use reader::BlockReader;
pub use writer::BlockWriter;

use bytes::{Buf, BufMut};
use ribbon_core::{hash, Error, Result};

/// Physical block size.
pub const BLOCK_SIZE: u64 = 1 << 16;

/// Serialized block header length.
pub const BLOCK_HEADER_SIZE: u64 = 24;

/// Chunk-stream bytes carried by one physical block.
pub const USABLE_BLOCK_SIZE: u64 = BLOCK_SIZE - BLOCK_HEADER_SIZE;

/// File offset of a logical chunk-stream position.
pub fn logical_to_physical(logical: u64) -> u64 {
    (logical / USABLE_BLOCK_SIZE) * BLOCK_SIZE
        + BLOCK_HEADER_SIZE
        + (logical % USABLE_BLOCK_SIZE)
}

/// Logical chunk-stream position of a file offset, or `None` for offsets
/// inside a block header.
pub fn physical_to_logical(physical: u64) -> Option<u64> {
    let within = physical % BLOCK_SIZE;
    if within < BLOCK_HEADER_SIZE {
        return None;
    }
    Some((physical / BLOCK_SIZE) * USABLE_BLOCK_SIZE + within - BLOCK_HEADER_SIZE)
}

/// Logical start of the block containing `logical`.
pub fn block_logical_begin(logical: u64) -> u64 {
    (logical / USABLE_BLOCK_SIZE) * USABLE_BLOCK_SIZE
}

/// Logical bytes left in the block at `logical`.
pub fn remaining_in_block(logical: u64) -> u64 {
    USABLE_BLOCK_SIZE - logical % USABLE_BLOCK_SIZE
}

/// Whether `logical` sits right after a block header.
pub fn is_block_boundary(logical: u64) -> bool {
    logical % USABLE_BLOCK_SIZE == 0
}

/// The per-block resynchronization header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Logical begin of the last chunk starting at or before this block's
    /// logical start.
    pub previous_chunk_begin: u64,
    /// Logical distance from this block's start to the next chunk header
    /// beginning at or after it.
    pub next_chunk_header_offset: u64,
}

impl BlockHeader {
    fn tail_bytes(&self) -> [u8; 16] {
        let mut buf = [0u8; 16];
        let mut cursor = &mut buf[..];
        cursor.put_u64_le(self.previous_chunk_begin);
        cursor.put_u64_le(self.next_chunk_header_offset);
        buf
    }

    pub fn serialize(&self) -> [u8; BLOCK_HEADER_SIZE as usize] {
        let mut buf = [0u8; BLOCK_HEADER_SIZE as usize];
        let tail = self.tail_bytes();
        buf[..8].copy_from_slice(&hash::hash_bytes(&tail).to_le_bytes());
        buf[8..].copy_from_slice(&tail);
        buf
    }

    /// Parses and authenticates a serialized block header.
    pub fn parse(bytes: &[u8; BLOCK_HEADER_SIZE as usize]) -> Result<Self> {
        let mut cursor = &bytes[..];
        let stored_hash = cursor.get_u64_le();
        let header = Self {
            previous_chunk_begin: cursor.get_u64_le(),
            next_chunk_header_offset: cursor.get_u64_le(),
        };
        if hash::hash_bytes(&header.tail_bytes()) != stored_hash {
            return Err(Error::Format("block header hash mismatch".to_string()));
        }
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---------------------------------------------------------------
    // Position arithmetic
    // ---------------------------------------------------------------

    #[test]
    fn test_first_logical_byte_follows_first_header() {
        assert_eq!(logical_to_physical(0), BLOCK_HEADER_SIZE);
    }

    #[test]
    fn test_mapping_is_bijective() {
        let samples = [
            0,
            1,
            USABLE_BLOCK_SIZE - 1,
            USABLE_BLOCK_SIZE,
            USABLE_BLOCK_SIZE + 1,
            USABLE_BLOCK_SIZE * 7 + 1234,
            u64::from(u32::MAX),
        ];
        for &logical in &samples {
            let physical = logical_to_physical(logical);
            assert_eq!(physical_to_logical(physical), Some(logical));
        }
    }

    #[test]
    fn test_header_offsets_have_no_logical_position() {
        for physical in 0..BLOCK_HEADER_SIZE {
            assert_eq!(physical_to_logical(physical), None);
            assert_eq!(physical_to_logical(BLOCK_SIZE + physical), None);
        }
    }

    #[test]
    fn test_second_block_starts_after_its_header() {
        // Logical USABLE_BLOCK_SIZE is the first byte of block 1
        assert_eq!(
            logical_to_physical(USABLE_BLOCK_SIZE),
            BLOCK_SIZE + BLOCK_HEADER_SIZE
        );
        assert!(is_block_boundary(USABLE_BLOCK_SIZE));
        assert!(is_block_boundary(0));
        assert!(!is_block_boundary(1));
    }

    #[test]
    fn test_remaining_in_block() {
        assert_eq!(remaining_in_block(0), USABLE_BLOCK_SIZE);
        assert_eq!(remaining_in_block(1), USABLE_BLOCK_SIZE - 1);
        assert_eq!(remaining_in_block(USABLE_BLOCK_SIZE - 1), 1);
        assert_eq!(remaining_in_block(USABLE_BLOCK_SIZE), USABLE_BLOCK_SIZE);
    }

    #[test]
    fn test_block_logical_begin() {
        assert_eq!(block_logical_begin(0), 0);
        assert_eq!(block_logical_begin(USABLE_BLOCK_SIZE - 1), 0);
        assert_eq!(block_logical_begin(USABLE_BLOCK_SIZE), USABLE_BLOCK_SIZE);
        assert_eq!(
            block_logical_begin(USABLE_BLOCK_SIZE * 3 + 17),
            USABLE_BLOCK_SIZE * 3
        );
    }

    // ---------------------------------------------------------------
    // Block header serialize / parse
    // ---------------------------------------------------------------

    #[test]
    fn test_block_header_roundtrip() {
        let header = BlockHeader {
            previous_chunk_begin: 12345,
            next_chunk_header_offset: 678,
        };
        let bytes = header.serialize();
        let parsed = BlockHeader::parse(&bytes).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_block_header_rejects_any_flip() {
        let header = BlockHeader {
            previous_chunk_begin: 1,
            next_chunk_header_offset: 2,
        };
        let good = header.serialize();
        for i in 0..good.len() {
            let mut bad = good;
            bad[i] ^= 0x80;
            assert!(
                BlockHeader::parse(&bad).is_err(),
                "flip at byte {} went unnoticed",
                i
            );
        }
    }

    #[test]
    fn test_block_header_rejects_zeroes() {
        // All-zero bytes (torn write) must not parse as a valid header
        let zeroes = [0u8; BLOCK_HEADER_SIZE as usize];
        assert!(BlockHeader::parse(&zeroes).is_err());
    }
}
