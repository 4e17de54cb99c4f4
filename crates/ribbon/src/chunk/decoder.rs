//! Chunk Decoding
//!
//! [`DecodedChunk`] parses a chunk body back into records. Decoding
//! validates everything against the authenticated header: the record
//! count, the sum of record sizes, and `decoded_data_size` must all
//! agree, so a body that passed its hash but was produced incorrectly
//! still fails cleanly.
//!
//! Positioned reads rely on [`DecodedChunk::set_index`]: record starts are
//! precomputed as prefix sums, so skipping to an index is O(1).

use bytes::Bytes;
use ribbon_core::{varint, Chain, Error, Result};

use crate::bytes::{read_to_end, ChainReader, Source};
use crate::codec::{Compression, DecompressingReader};

use super::{ChunkHeader, CHUNK_KIND_RECORDS};

/// A chunk body decoded into its records.
#[derive(Debug)]
pub struct DecodedChunk {
    /// Start offset of each record in `values`; `num_records + 1` entries.
    offsets: Vec<usize>,
    values: Bytes,
    index: usize,
}

impl DecodedChunk {
    /// Decodes `body`, validating it against its (already authenticated)
    /// header.
    pub fn decode(header: &ChunkHeader, body: &Chain) -> Result<Self> {
        let mut src = ChainReader::new(body.clone());

        let mut lead = [0u8; 2];
        src.read_exact(&mut lead, "chunk body lead bytes")
            .map_err(truncation_is_corruption)?;
        if lead[0] != CHUNK_KIND_RECORDS {
            return Err(Error::Format(format!(
                "unknown chunk kind 0x{:02x}",
                lead[0]
            )));
        }
        let compression = Compression::from_tag(lead[1])?;

        let sizes_len = read_varint(&mut src).map_err(truncation_is_corruption)?;
        let prefix_len = src.pos();
        let remaining = body.size() - prefix_len;
        if sizes_len > remaining {
            return Err(Error::Format(format!(
                "sizes section of {} bytes exceeds chunk body ({} bytes left)",
                sizes_len, remaining
            )));
        }

        let (_, tail) = body.clone().split_at(prefix_len);
        let (sizes_section, values_section) = tail.split_at(sizes_len);

        let sizes_flat = decompress_section(compression, sizes_section)?;
        let num_records = header.num_records();
        let mut offsets = Vec::with_capacity((num_records.min(1 << 20) + 1) as usize);
        offsets.push(0usize);
        let mut cursor = sizes_flat.as_ref();
        let mut total: u64 = 0;
        for _ in 0..num_records {
            let size = varint::decode_u64(&mut cursor).map_err(truncation_is_corruption)?;
            total = total
                .checked_add(size)
                .ok_or_else(|| Error::Format("record sizes overflow u64".to_string()))?;
            let offset = usize::try_from(total)
                .map_err(|_| Error::Limit("chunk too large for this platform".to_string()))?;
            offsets.push(offset);
        }
        if !cursor.is_empty() {
            return Err(Error::Format(
                "sizes section has trailing bytes after the last record".to_string(),
            ));
        }
        if total != header.decoded_data_size() {
            return Err(Error::Format(format!(
                "record sizes sum to {} but header says {}",
                total,
                header.decoded_data_size()
            )));
        }

        let values = decompress_section(compression, values_section)?;
        if values.len() as u64 != total {
            return Err(Error::Format(format!(
                "values section decodes to {} bytes, record sizes say {}",
                values.len(),
                total
            )));
        }

        Ok(Self {
            offsets,
            values,
            index: 0,
        })
    }

    pub fn record_count(&self) -> u64 {
        (self.offsets.len() - 1) as u64
    }

    /// Index of the next record [`DecodedChunk::next_record`] will return.
    pub fn index(&self) -> u64 {
        self.index as u64
    }

    /// Fast-skips so the next record returned is `index`. An index equal to
    /// the record count positions past the last record.
    pub fn set_index(&mut self, index: u64) -> Result<()> {
        if index > self.record_count() {
            return Err(Error::Format(format!(
                "record index {} beyond chunk with {} records",
                index,
                self.record_count()
            )));
        }
        self.index = index as usize;
        Ok(())
    }

    /// Returns the next record, sliced zero-copy out of the decoded values.
    pub fn next_record(&mut self) -> Option<Bytes> {
        if self.index + 1 >= self.offsets.len() {
            return None;
        }
        let record = self
            .values
            .slice(self.offsets[self.index]..self.offsets[self.index + 1]);
        self.index += 1;
        Some(record)
    }
}

/// A codec frame that ends early inside a fully-read body is corruption,
/// not file truncation.
fn truncation_is_corruption(e: Error) -> Error {
    match e {
        Error::Truncated(msg) => Error::Format(msg),
        other => other,
    }
}

fn decompress_section(compression: Compression, section: Chain) -> Result<Bytes> {
    if compression == Compression::None {
        return Ok(section.to_bytes());
    }
    let mut reader = DecompressingReader::new(ChainReader::new(section), compression)?;
    read_to_end(&mut reader).map_err(truncation_is_corruption)
}

fn read_varint<S: Source>(src: &mut S) -> Result<u64> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    loop {
        let mut byte = [0u8; 1];
        src.read_exact(&mut byte, "varint")?;
        if shift == 63 && byte[0] > 1 {
            return Err(Error::Format("varint exceeds 64 bits".to_string()));
        }
        value |= ((byte[0] & 0x7F) as u64) << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
        if shift >= 64 {
            return Err(Error::Format("varint exceeds 64 bits".to_string()));
        }
    }
}
