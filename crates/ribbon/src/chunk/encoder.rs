//! Chunk Encoding
//!
//! [`SimpleEncoder`] turns a batch of records into a chunk body:
//!
//! ```text
//! kind (1 byte, b'r')
//! compression tag (1 byte)
//! varint: length of the compressed sizes section
//! compressed sizes    (one varint per record, codec-framed)
//! compressed values   (concatenated record bytes, codec-framed,
//!                      running to the end of the body)
//! ```
//!
//! The two sections are compressed independently so a reader can decode
//! all record sizes without touching the values. The body is assembled
//! back to front with a [`BackwardWriter`]: values first, then sizes, then
//! the sizes-length varint that is only known once the sizes section is
//! compressed, then the two leading bytes.
//!
//! [`ChunkEncoder`] is the seam for alternative payload encodings; an
//! external columnar encoder produces [`Chunk`]s through the same
//! interface and feeds them to the block writer directly.

use bytes::BytesMut;
use ribbon_core::{varint, Chain, Error, Result};

use crate::bytes::{BackwardWriter, ChainWriter, Sink};
use crate::codec::{Compression, CompressingWriter};

use super::{Chunk, CHUNK_KIND_RECORDS};

/// Converts a batch of records into a chunk.
///
/// Implementations accumulate records, then produce a self-described chunk
/// body on [`ChunkEncoder::encode`], which also resets the encoder for the
/// next batch.
pub trait ChunkEncoder: Send {
    fn add_record(&mut self, record: &[u8]) -> Result<()>;

    /// Records accumulated since the last `encode`/`clear`.
    fn num_records(&self) -> u64;

    /// Raw bytes accumulated; the pending-chunk budget is checked
    /// against this.
    fn pending_bytes(&self) -> u64;

    /// Encodes the accumulated records into a chunk and resets.
    fn encode(&mut self) -> Result<Chunk>;

    fn clear(&mut self);
}

/// The record-stream chunk encoder: varint sizes plus concatenated values.
#[derive(Debug)]
pub struct SimpleEncoder {
    compression: Compression,
    size_hint: Option<u64>,
    /// Varint-encoded record sizes.
    sizes: BytesMut,
    /// Concatenated record bytes.
    values: ChainWriter,
    num_records: u64,
    decoded_data_size: u64,
}

impl SimpleEncoder {
    pub fn new(compression: Compression, size_hint: Option<u64>) -> Self {
        Self {
            compression,
            size_hint,
            sizes: BytesMut::new(),
            values: ChainWriter::new(),
            num_records: 0,
            decoded_data_size: 0,
        }
    }

    fn compress_section(&self, raw: Chain) -> Result<Chain> {
        if self.compression == Compression::None {
            return Ok(raw);
        }
        let mut writer =
            CompressingWriter::new(ChainWriter::new(), self.compression, self.size_hint)?;
        writer.write_chain(raw)?;
        writer.finish()?.into_chain()
    }
}

impl ChunkEncoder for SimpleEncoder {
    fn add_record(&mut self, record: &[u8]) -> Result<()> {
        let new_size = self
            .decoded_data_size
            .checked_add(record.len() as u64)
            .ok_or_else(|| Error::Limit("chunk decoded size exceeds u64".to_string()))?;
        varint::encode_u64(&mut self.sizes, record.len() as u64);
        self.values.write(record)?;
        self.num_records += 1;
        self.decoded_data_size = new_size;
        Ok(())
    }

    fn num_records(&self) -> u64 {
        self.num_records
    }

    fn pending_bytes(&self) -> u64 {
        self.decoded_data_size + self.sizes.len() as u64
    }

    fn encode(&mut self) -> Result<Chunk> {
        let sizes = std::mem::take(&mut self.sizes).freeze();
        let values = std::mem::replace(&mut self.values, ChainWriter::new()).into_chain()?;
        let num_records = std::mem::take(&mut self.num_records);
        let decoded_data_size = std::mem::take(&mut self.decoded_data_size);

        let compressed_sizes = self.compress_section(Chain::from(sizes))?;
        let compressed_values = self.compress_section(values)?;

        let mut sizes_len_prefix = BytesMut::with_capacity(varint::MAX_LEN);
        varint::encode_u64(&mut sizes_len_prefix, compressed_sizes.size());

        let mut body = BackwardWriter::new();
        body.write_chain(compressed_values)?;
        body.write_chain(compressed_sizes)?;
        body.write(&sizes_len_prefix)?;
        body.write(&[CHUNK_KIND_RECORDS, self.compression.tag()])?;

        Ok(Chunk::new(body.into_chain()?, num_records, decoded_data_size))
    }

    fn clear(&mut self) {
        self.sizes = BytesMut::new();
        self.values = ChainWriter::new();
        self.num_records = 0;
        self.decoded_data_size = 0;
    }
}
