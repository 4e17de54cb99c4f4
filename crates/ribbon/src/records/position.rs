//! Record Positions
//!
//! A record is addressed by the logical begin of its chunk and its index
//! within that chunk. Positions serialize to 16 big-endian bytes so that
//! lexicographic byte order equals position order: sortable keys for
//! external indices.

use ribbon_core::{Error, Result};

/// Serialized length of a record position.
pub const SERIALIZED_LEN: usize = 16;

/// Identifies one record: `(chunk_begin, record_index)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RecordPosition {
    chunk_begin: u64,
    record_index: u64,
}

impl RecordPosition {
    /// Creates a position. The index may not overflow the numeric
    /// projection: `record_index <= u64::MAX - chunk_begin`.
    pub fn new(chunk_begin: u64, record_index: u64) -> Result<Self> {
        if record_index > u64::MAX - chunk_begin {
            return Err(Error::Limit(format!(
                "record index {} overflows position at chunk {}",
                record_index, chunk_begin
            )));
        }
        Ok(Self {
            chunk_begin,
            record_index,
        })
    }

    pub fn chunk_begin(&self) -> u64 {
        self.chunk_begin
    }

    pub fn record_index(&self) -> u64 {
        self.record_index
    }

    /// Order-preserving scalar projection, scaled between 0 and the file
    /// size. Distinct positions of a valid file have distinct values.
    pub fn numeric(&self) -> u64 {
        self.chunk_begin + self.record_index
    }

    /// 16 bytes, big-endian `chunk_begin` then big-endian `record_index`;
    /// lexicographic order equals position order.
    pub fn serialize(&self) -> [u8; SERIALIZED_LEN] {
        let mut buf = [0u8; SERIALIZED_LEN];
        buf[..8].copy_from_slice(&self.chunk_begin.to_be_bytes());
        buf[8..].copy_from_slice(&self.record_index.to_be_bytes());
        buf
    }

    pub fn parse(serialized: &[u8]) -> Result<Self> {
        if serialized.len() != SERIALIZED_LEN {
            return Err(Error::Format(format!(
                "serialized record position has {} bytes, expected {}",
                serialized.len(),
                SERIALIZED_LEN
            )));
        }
        let chunk_begin = u64::from_be_bytes(serialized[..8].try_into().expect("length checked"));
        let record_index = u64::from_be_bytes(serialized[8..].try_into().expect("length checked"));
        Self::new(chunk_begin, record_index)
    }
}

impl PartialOrd for RecordPosition {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RecordPosition {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.chunk_begin, self.record_index).cmp(&(other.chunk_begin, other.record_index))
    }
}

impl std::fmt::Display for RecordPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.chunk_begin, self.record_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_first_record() {
        let pos = RecordPosition::default();
        assert_eq!(pos.chunk_begin(), 0);
        assert_eq!(pos.record_index(), 0);
        assert_eq!(pos.numeric(), 0);
    }

    #[test]
    fn test_serialize_parse_roundtrip() {
        let samples = [
            (0, 0),
            (0, 999),
            (64, 0),
            (1 << 40, 12345),
            (u64::MAX - 5, 5),
        ];
        for &(begin, index) in &samples {
            let pos = RecordPosition::new(begin, index).unwrap();
            let parsed = RecordPosition::parse(&pos.serialize()).unwrap();
            assert_eq!(parsed, pos);
        }
    }

    #[test]
    fn test_overflowing_index_rejected() {
        assert!(matches!(
            RecordPosition::new(u64::MAX, 1),
            Err(Error::Limit(_))
        ));
        assert!(matches!(
            RecordPosition::new(u64::MAX - 5, 6),
            Err(Error::Limit(_))
        ));
    }

    #[test]
    fn test_parse_wrong_length_rejected() {
        assert!(matches!(
            RecordPosition::parse(&[0u8; 15]),
            Err(Error::Format(_))
        ));
        assert!(matches!(
            RecordPosition::parse(&[0u8; 17]),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn test_lexicographic_order_matches_position_order() {
        let mut positions = vec![
            RecordPosition::new(0, 0).unwrap(),
            RecordPosition::new(0, 1).unwrap(),
            RecordPosition::new(0, 300).unwrap(),
            RecordPosition::new(64, 0).unwrap(),
            RecordPosition::new(64, 2).unwrap(),
            RecordPosition::new(1 << 20, 7).unwrap(),
        ];
        for a in &positions {
            for b in &positions {
                assert_eq!(
                    a.cmp(b),
                    a.serialize().cmp(&b.serialize()),
                    "{} vs {}",
                    a,
                    b
                );
            }
        }
        // Sorting serialized forms sorts positions
        let mut serialized: Vec<[u8; 16]> = positions.iter().map(|p| p.serialize()).collect();
        serialized.sort();
        positions.sort();
        for (pos, bytes) in positions.iter().zip(&serialized) {
            assert_eq!(&pos.serialize(), bytes);
        }
    }

    #[test]
    fn test_numeric_is_monotone() {
        let a = RecordPosition::new(0, 999).unwrap();
        let b = RecordPosition::new(1040, 0).unwrap();
        assert!(a < b);
        assert!(a.numeric() < b.numeric());
    }

    #[test]
    fn test_display() {
        let pos = RecordPosition::new(64, 3).unwrap();
        assert_eq!(pos.to_string(), "64/3");
    }
}
