//! Chunk Format
//!
//! A chunk is the unit of record storage: a fixed 40-byte header followed
//! by an opaque body produced by a chunk encoder.
//!
//! ## Chunk layout
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │ Header (40 bytes, little-endian)              │
//! │ - header_hash (8)  hash of bytes 8..40        │
//! │ - data_size (8)    body length                │
//! │ - data_hash (8)    hash of the body           │
//! │ - num_records (8)  logical records inside     │
//! │ - decoded_data_size (8)  sum of record sizes  │
//! ├───────────────────────────────────────────────┤
//! │ Body (data_size bytes, self-described)        │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! `header_hash` authenticates the header itself, which is what lets a
//! reader trust `data_size` when skipping a chunk whose body failed its
//! hash, and what resynchronization uses to tell a real chunk header from
//! random bytes.

mod decoder;
mod encoder;

pub use decoder::DecodedChunk;
pub use encoder::{ChunkEncoder, SimpleEncoder};

use bytes::{Buf, BufMut};
use ribbon_core::{hash, Chain, Error, Result};

use crate::bytes::Sink;

/// Serialized header length.
pub const CHUNK_HEADER_SIZE: u64 = 40;

/// Body kind byte for record chunks produced by [`SimpleEncoder`].
pub(crate) const CHUNK_KIND_RECORDS: u8 = b'r';

/// The fixed 40-byte chunk header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    header_hash: u64,
    data_size: u64,
    data_hash: u64,
    num_records: u64,
    decoded_data_size: u64,
}

impl ChunkHeader {
    /// Builds the header for `data`, computing both hashes.
    pub fn new(data: &Chain, num_records: u64, decoded_data_size: u64) -> Self {
        let mut header = Self {
            header_hash: 0,
            data_size: data.size(),
            data_hash: hash::hash_chain(data),
            num_records,
            decoded_data_size,
        };
        header.header_hash = header.computed_hash();
        header
    }

    fn tail_bytes(&self) -> [u8; 32] {
        let mut buf = [0u8; 32];
        let mut cursor = &mut buf[..];
        cursor.put_u64_le(self.data_size);
        cursor.put_u64_le(self.data_hash);
        cursor.put_u64_le(self.num_records);
        cursor.put_u64_le(self.decoded_data_size);
        buf
    }

    fn computed_hash(&self) -> u64 {
        hash::hash_bytes(&self.tail_bytes())
    }

    pub fn serialize(&self) -> [u8; CHUNK_HEADER_SIZE as usize] {
        let mut buf = [0u8; CHUNK_HEADER_SIZE as usize];
        buf[..8].copy_from_slice(&self.header_hash.to_le_bytes());
        buf[8..].copy_from_slice(&self.tail_bytes());
        buf
    }

    /// Parses and authenticates a serialized header.
    pub fn parse(bytes: &[u8; CHUNK_HEADER_SIZE as usize]) -> Result<Self> {
        let mut cursor = &bytes[..];
        let header = Self {
            header_hash: cursor.get_u64_le(),
            data_size: cursor.get_u64_le(),
            data_hash: cursor.get_u64_le(),
            num_records: cursor.get_u64_le(),
            decoded_data_size: cursor.get_u64_le(),
        };
        if header.computed_hash() != header.header_hash {
            return Err(Error::Format("chunk header hash mismatch".to_string()));
        }
        Ok(header)
    }

    pub fn data_size(&self) -> u64 {
        self.data_size
    }

    pub fn num_records(&self) -> u64 {
        self.num_records
    }

    pub fn decoded_data_size(&self) -> u64 {
        self.decoded_data_size
    }

    /// Verifies a fully-read body against `data_size` and `data_hash`.
    pub fn verify_data(&self, data: &Chain) -> Result<()> {
        if data.size() != self.data_size {
            return Err(Error::Format(format!(
                "chunk body has {} bytes, header says {}",
                data.size(),
                self.data_size
            )));
        }
        if hash::hash_chain(data) != self.data_hash {
            return Err(Error::Format("chunk data hash mismatch".to_string()));
        }
        Ok(())
    }
}

/// A chunk: authenticated header plus opaque body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub header: ChunkHeader,
    pub data: Chain,
}

impl Chunk {
    pub fn new(data: Chain, num_records: u64, decoded_data_size: u64) -> Self {
        let header = ChunkHeader::new(&data, num_records, decoded_data_size);
        Self { header, data }
    }

    /// Total on-stream size: header plus body.
    pub fn size(&self) -> u64 {
        CHUNK_HEADER_SIZE + self.header.data_size
    }

    pub fn write_to<D: Sink>(&self, dest: &mut D) -> Result<()> {
        dest.write(&self.header.serialize())?;
        dest.write_chain(self.data.clone())
    }
}
