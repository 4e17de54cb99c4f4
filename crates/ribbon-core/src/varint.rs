//! Variable-length Integer Encoding
//!
//! Record sizes inside a chunk are stored as unsigned LEB128 varints: each
//! byte carries 7 bits of payload and a continuation flag, so small sizes
//! take a single byte instead of eight.
//!
//! Decoding validates as it goes, so it is safe on untrusted file
//! contents: malformed varints become `Format` errors rather than panics.

use bytes::{Buf, BufMut};

use crate::error::{Error, Result};

/// Maximum encoded length of a u64 varint.
pub const MAX_LEN: usize = 10;

/// Encode an unsigned integer as a varint.
pub fn encode_u64(buf: &mut impl BufMut, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;

        if value != 0 {
            byte |= 0x80; // Set continuation bit
        }

        buf.put_u8(byte);

        if value == 0 {
            break;
        }
    }
}

/// Number of bytes [`encode_u64`] emits for `value`.
pub fn encoded_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    std::cmp::max(1, (bits + 6) / 7)
}

/// Decode a varint, consuming its bytes from `buf`.
///
/// Fails with `Format` when the encoding exceeds 64 bits and with
/// `Truncated` when the buffer ends mid-varint.
pub fn decode_u64(buf: &mut impl Buf) -> Result<u64> {
    let mut value: u64 = 0;
    let mut shift = 0u32;

    loop {
        if !buf.has_remaining() {
            return Err(Error::Truncated("byte stream ends inside a varint".to_string()));
        }
        let byte = buf.get_u8();

        if shift == 63 && byte > 1 {
            return Err(Error::Format("varint exceeds 64 bits".to_string()));
        }
        value |= ((byte & 0x7F) as u64) << shift;

        if (byte & 0x80) == 0 {
            return Ok(value);
        }

        shift += 7;
        if shift >= 64 {
            return Err(Error::Format("varint exceeds 64 bits".to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn roundtrip(value: u64) -> u64 {
        let mut buf = BytesMut::new();
        encode_u64(&mut buf, value);
        assert_eq!(buf.len(), encoded_len(value));
        let mut cursor = buf.as_ref();
        decode_u64(&mut cursor).unwrap()
    }

    #[test]
    fn test_varint_zero() {
        assert_eq!(roundtrip(0), 0);
    }

    #[test]
    fn test_varint_small() {
        assert_eq!(roundtrip(5), 5);
        assert_eq!(roundtrip(127), 127);
    }

    #[test]
    fn test_varint_boundaries() {
        for shift in 0..9 {
            let boundary = 1u64 << (7 * (shift + 1));
            assert_eq!(roundtrip(boundary - 1), boundary - 1);
            assert_eq!(roundtrip(boundary), boundary);
        }
    }

    #[test]
    fn test_varint_max() {
        assert_eq!(roundtrip(u64::MAX), u64::MAX);
        assert_eq!(encoded_len(u64::MAX), MAX_LEN);
    }

    #[test]
    fn test_varint_lengths() {
        let mut buf = BytesMut::new();
        encode_u64(&mut buf, 127);
        assert_eq!(buf.len(), 1);

        let mut buf = BytesMut::new();
        encode_u64(&mut buf, 128);
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_decode_truncated() {
        // Continuation bit set but no following byte
        let mut cursor: &[u8] = &[0x80];
        let err = decode_u64(&mut cursor).unwrap_err();
        assert!(matches!(err, Error::Truncated(_)));
    }

    #[test]
    fn test_decode_empty() {
        let mut cursor: &[u8] = &[];
        let err = decode_u64(&mut cursor).unwrap_err();
        assert!(matches!(err, Error::Truncated(_)));
    }

    #[test]
    fn test_decode_overlong() {
        // 11 continuation bytes can never be a valid u64
        let mut cursor: &[u8] = &[0xFF; 11];
        let err = decode_u64(&mut cursor).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_decode_overflow_high_bits() {
        // 10 bytes whose final byte carries more than the single
        // remaining bit of a u64
        let mut cursor: &[u8] = &[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x02];
        let err = decode_u64(&mut cursor).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }
}
