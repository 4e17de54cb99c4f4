//! Record Reader
//!
//! `RecordReader` is the read-side entry point: sequential record reads,
//! `(chunk_begin, record_index)` position tracking, positioned seeks, and
//! optional recovery from mid-file corruption.
//!
//! ## Example Usage
//!
//! ```ignore
//! use ribbon::records::{RecordReader, ReaderOptions};
//!
//! let file = std::fs::File::open("data.ribbon")?;
//! let mut reader = RecordReader::open(file, ReaderOptions::default())?;
//!
//! while let Some(record) = reader.next_record()? {
//!     process(&record);
//! }
//!
//! // Jump straight to a record saved earlier
//! reader.seek(position)?;
//! let record = reader.next_record()?;
//! ```
//!
//! ## Recovery
//!
//! With `recovery` enabled, corruption confined to a chunk body costs
//! exactly that chunk; corrupted chunk headers engage block-boundary
//! resynchronization. Recovery that reaches end of file without finding a
//! valid chunk surfaces the original error. With `recovery` disabled the
//! first corruption is surfaced immediately.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use ribbon_core::{Error, Result};

use crate::block::BlockReader;
use crate::bytes::{IoReader, Source, DEFAULT_BUFFER_SIZE};
use crate::chunk::DecodedChunk;

use super::position::RecordPosition;

/// Read-side options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderOptions {
    /// Working-buffer size for the byte source. Must be positive.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Skip over corrupted regions instead of failing on them.
    #[serde(default)]
    pub recovery: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            recovery: false,
        }
    }
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

impl ReaderOptions {
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(Error::Usage("buffer_size must be positive".to_string()));
        }
        Ok(())
    }
}

struct CurrentChunk {
    begin: u64,
    decoded: DecodedChunk,
}

/// Reads records out of the chunked container format.
pub struct RecordReader<S: Source> {
    blocks: BlockReader<S>,
    current: Option<CurrentChunk>,
    last_pos: Option<RecordPosition>,
    recovery: bool,
    skipped_chunks: u64,
}

impl<R: std::io::Read + std::io::Seek> RecordReader<IoReader<R>> {
    /// Opens a reader over anything `io::Read + io::Seek`, using the
    /// options' buffer size.
    pub fn open(src: R, options: ReaderOptions) -> Result<Self> {
        let buffer_size = options.buffer_size;
        Self::new(IoReader::with_buffer_size(src, buffer_size), options)
    }
}

impl<S: Source> RecordReader<S> {
    pub fn new(src: S, options: ReaderOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            blocks: BlockReader::new(src)?,
            current: None,
            last_pos: None,
            recovery: options.recovery,
            skipped_chunks: 0,
        })
    }

    /// Returns the next record, or `None` at end of file.
    pub fn next_record(&mut self) -> Result<Option<Bytes>> {
        loop {
            if let Some(current) = &mut self.current {
                if let Some(record) = current.decoded.next_record() {
                    let index = current.decoded.index() - 1;
                    self.last_pos = Some(RecordPosition::new(current.begin, index)?);
                    return Ok(Some(record));
                }
                self.current = None;
            }
            if !self.load_next_chunk()? {
                return Ok(None);
            }
        }
    }

    fn load_next_chunk(&mut self) -> Result<bool> {
        loop {
            match self.blocks.read_chunk() {
                Ok(None) => return Ok(false),
                Ok(Some(chunk)) => match DecodedChunk::decode(&chunk.header, &chunk.data) {
                    Ok(decoded) => {
                        self.current = Some(CurrentChunk {
                            begin: self.blocks.chunk_begin(),
                            decoded,
                        });
                        return Ok(true);
                    }
                    // An undecodable body under a valid header: the stream
                    // is already at the next chunk.
                    Err(e) if self.recovery && e.is_recoverable() => {
                        self.skipped_chunks += 1;
                        tracing::debug!(
                            chunk_begin = self.blocks.chunk_begin(),
                            error = %e,
                            "skipping undecodable chunk"
                        );
                        continue;
                    }
                    Err(e) => return Err(e),
                },
                Err(e) if self.recovery && e.is_recoverable() => {
                    tracing::debug!(
                        chunk_begin = self.blocks.chunk_begin(),
                        error = %e,
                        "chunk read failed, attempting recovery"
                    );
                    match self.blocks.recover()? {
                        true => {
                            self.skipped_chunks += 1;
                            continue;
                        }
                        false => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Position of the next record to be returned. After the last record
    /// of a chunk this is `(chunk_begin, num_records)`, which seeks to the
    /// same place as the next chunk's first record.
    pub fn pos(&self) -> Result<RecordPosition> {
        match &self.current {
            Some(current) => RecordPosition::new(current.begin, current.decoded.index()),
            None => RecordPosition::new(self.blocks.pos(), 0),
        }
    }

    /// Position of the record most recently returned.
    pub fn last_pos(&self) -> Option<RecordPosition> {
        self.last_pos
    }

    /// Corrupted regions skipped by recovery so far: one per undecodable
    /// chunk, one per block-boundary resynchronization.
    pub fn skipped_chunks(&self) -> u64 {
        self.skipped_chunks
    }

    /// Jumps to an exact record position: seeks to the chunk, verifies its
    /// header, and fast-skips to the record index inside it.
    pub fn seek(&mut self, pos: RecordPosition) -> Result<()> {
        self.current = None;
        self.last_pos = None;
        self.blocks.seek_to_chunk(pos.chunk_begin())?;
        match self.blocks.read_chunk()? {
            None => {
                // End-of-file positions are valid seek targets
                if pos.record_index() == 0 {
                    Ok(())
                } else {
                    Err(Error::Format(format!(
                        "no chunk at position {}",
                        pos.chunk_begin()
                    )))
                }
            }
            Some(chunk) => {
                let mut decoded = DecodedChunk::decode(&chunk.header, &chunk.data)?;
                decoded.set_index(pos.record_index())?;
                self.current = Some(CurrentChunk {
                    begin: pos.chunk_begin(),
                    decoded,
                });
                Ok(())
            }
        }
    }

    /// Approximate seek by the order-preserving scalar: positions the
    /// reader at the record whose numeric position is closest at or after
    /// `numeric` (clamped into the chunk that covers it).
    pub fn seek_numeric(&mut self, numeric: u64) -> Result<()> {
        self.current = None;
        self.last_pos = None;
        let begin = self.blocks.find_chunk_containing(numeric)?;
        match self.blocks.read_chunk()? {
            None => Ok(()),
            Some(chunk) => {
                let mut decoded = DecodedChunk::decode(&chunk.header, &chunk.data)?;
                let index = (numeric - begin).min(decoded.record_count());
                decoded.set_index(index)?;
                self.current = Some(CurrentChunk { begin, decoded });
                Ok(())
            }
        }
    }

    pub fn close(&mut self) -> Result<()> {
        self.current = None;
        self.blocks.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytes::ChainReader;
    use crate::records::{RecordWriter, WriterOptions};
    use ribbon_core::Chain;

    fn write_file(options: WriterOptions, records: &[Vec<u8>]) -> Chain {
        let mut writer =
            RecordWriter::new(crate::bytes::ChainWriter::new(), options).unwrap();
        for record in records {
            writer.write_record(record).unwrap();
        }
        writer.into_inner().unwrap().into_chain().unwrap()
    }

    fn reader_over(chain: Chain) -> RecordReader<ChainReader> {
        RecordReader::new(ChainReader::new(chain), ReaderOptions::default()).unwrap()
    }

    fn sample_records(count: usize) -> Vec<Vec<u8>> {
        (0..count)
            .map(|i| format!("record-{:04}", i).into_bytes())
            .collect()
    }

    // ---------------------------------------------------------------
    // Sequential reads and positions
    // ---------------------------------------------------------------

    #[test]
    fn test_reads_records_in_order() {
        let records = sample_records(100);
        let chain = write_file(WriterOptions::default(), &records);
        let mut reader = reader_over(chain);
        for expected in &records {
            let record = reader.next_record().unwrap().unwrap();
            assert_eq!(record.as_ref(), expected.as_slice());
        }
        assert!(reader.next_record().unwrap().is_none());
        // Sticky EOF
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_single_chunk_positions_are_indices() {
        let records = sample_records(50);
        let chain = write_file(WriterOptions::default(), &records);
        let mut reader = reader_over(chain);
        for i in 0..records.len() as u64 {
            let pos = reader.pos().unwrap();
            assert_eq!(pos, RecordPosition::new(0, i).unwrap());
            assert_eq!(pos.numeric(), i);
            reader.next_record().unwrap().unwrap();
            assert_eq!(reader.last_pos().unwrap().numeric(), i);
        }
    }

    #[test]
    fn test_positions_across_chunks_are_monotone() {
        let records = sample_records(200);
        let chain = write_file(
            WriterOptions {
                chunk_size: 128,
                ..Default::default()
            },
            &records,
        );
        let mut reader = reader_over(chain);
        let mut previous: Option<RecordPosition> = None;
        let mut chunk_begins = std::collections::BTreeSet::new();
        while reader.next_record().unwrap().is_some() {
            let pos = reader.last_pos().unwrap();
            if let Some(prev) = previous {
                assert!(pos > prev, "{} not after {}", pos, prev);
            }
            chunk_begins.insert(pos.chunk_begin());
            previous = Some(pos);
        }
        assert!(chunk_begins.len() > 1, "expected several chunks");
    }

    // ---------------------------------------------------------------
    // Seeking
    // ---------------------------------------------------------------

    #[test]
    fn test_seek_to_recorded_positions() {
        let records = sample_records(300);
        let chain = write_file(
            WriterOptions {
                chunk_size: 256,
                ..Default::default()
            },
            &records,
        );

        // Collect position of every record
        let mut positions = Vec::new();
        {
            let mut reader = reader_over(chain.clone());
            loop {
                let pos = reader.pos().unwrap();
                match reader.next_record().unwrap() {
                    Some(_) => positions.push(pos),
                    None => break,
                }
            }
        }
        assert_eq!(positions.len(), records.len());

        let mut reader = reader_over(chain);
        for &i in &[0usize, 1, 57, 150, 299] {
            reader.seek(positions[i]).unwrap();
            let record = reader.next_record().unwrap().unwrap();
            assert_eq!(record.as_ref(), records[i].as_slice(), "record {}", i);
        }
    }

    #[test]
    fn test_seek_roundtrips_through_serialization() {
        let records = sample_records(100);
        let chain = write_file(
            WriterOptions {
                chunk_size: 200,
                ..Default::default()
            },
            &records,
        );
        let mut reader = reader_over(chain.clone());
        for _ in 0..42 {
            reader.next_record().unwrap().unwrap();
        }
        let pos = reader.pos().unwrap();
        let parsed = RecordPosition::parse(&pos.serialize()).unwrap();
        assert_eq!(parsed, pos);

        let mut other = reader_over(chain);
        other.seek(parsed).unwrap();
        let record = other.next_record().unwrap().unwrap();
        assert_eq!(record.as_ref(), records[42].as_slice());
    }

    #[test]
    fn test_seek_numeric_lands_on_record() {
        let records = sample_records(400);
        let chain = write_file(
            WriterOptions {
                chunk_size: 512,
                ..Default::default()
            },
            &records,
        );

        let mut positions = Vec::new();
        {
            let mut reader = reader_over(chain.clone());
            for _ in 0..records.len() {
                positions.push(reader.pos().unwrap());
                reader.next_record().unwrap().unwrap();
            }
        }

        let mut reader = reader_over(chain);
        for &i in &[0usize, 13, 200, 399] {
            reader.seek_numeric(positions[i].numeric()).unwrap();
            let record = reader.next_record().unwrap().unwrap();
            assert_eq!(record.as_ref(), records[i].as_slice(), "record {}", i);
        }
    }

    #[test]
    fn test_seek_to_end_position_reads_nothing() {
        let records = sample_records(10);
        let chain = write_file(WriterOptions::default(), &records);
        let mut reader = reader_over(chain.clone());
        while reader.next_record().unwrap().is_some() {}
        let end = reader.pos().unwrap();

        let mut other = reader_over(chain);
        other.seek(end).unwrap();
        assert!(other.next_record().unwrap().is_none());
    }

    #[test]
    fn test_seek_into_garbage_fails() {
        let records = sample_records(10);
        let chain = write_file(WriterOptions::default(), &records);
        let mut reader = reader_over(chain);
        let bogus = RecordPosition::new(7, 0).unwrap();
        assert!(reader.seek(bogus).is_err());
    }

    // ---------------------------------------------------------------
    // Options
    // ---------------------------------------------------------------

    #[test]
    fn test_zero_buffer_size_rejected() {
        let chain = write_file(WriterOptions::default(), &sample_records(1));
        let options = ReaderOptions {
            buffer_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            RecordReader::new(ChainReader::new(chain), options),
            Err(Error::Usage(_))
        ));
    }
}
