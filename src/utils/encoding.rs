//! Variable-length integers and fixed-width helpers for the on-disk formats.
//!
//! A VarNum stores a `u32` in 1, 2, 4 or 5 bytes. The two high bits of the
//! first byte select the width:
//!
//! | prefix | bytes | range            |
//! |--------|-------|------------------|
//! | `00`   | 1     | `0..2^6`         |
//! | `01`   | 2     | `2^6..2^14`      |
//! | `10`   | 4     | `2^14..2^30`     |
//! | `11`   | 5     | `2^30..=u32::MAX`|
//!
//! The remaining bits and bytes hold the value big-endian. The 5-byte form
//! always starts with `0xC0`, so a first byte of `0xFF` never occurs and is
//! reserved as [`VARNUM_NIL`].

use crate::error::{IndexError, Result};

/// First byte marking "no value"; never produced by [`encode_varnum`].
pub const VARNUM_NIL: u8 = 0xFF;

/// Number of bytes [`encode_varnum`] will emit for `value`.
#[inline]
pub fn varnum_len(value: u32) -> usize {
    if value < 0x40 {
        1
    } else if value < 0x4000 {
        2
    } else if value < 0x4000_0000 {
        4
    } else {
        5
    }
}

/// Encode a u32 as a VarNum
pub fn encode_varnum(value: u32, buf: &mut Vec<u8>) {
    match varnum_len(value) {
        1 => buf.push(value as u8),
        2 => {
            buf.push(0x40 | (value >> 8) as u8);
            buf.push(value as u8);
        }
        4 => {
            buf.push(0x80 | (value >> 24) as u8);
            buf.push((value >> 16) as u8);
            buf.push((value >> 8) as u8);
            buf.push(value as u8);
        }
        _ => {
            buf.push(0xC0);
            buf.extend_from_slice(&value.to_be_bytes());
        }
    }
}

/// Decode a VarNum from a slice
/// Returns (value, bytes_consumed)
pub fn decode_varnum(buf: &[u8]) -> Result<(u32, usize)> {
    let first = *buf.first().ok_or_else(|| IndexError::truncated("varnum"))?;
    if first == VARNUM_NIL {
        return Err(IndexError::malformed("unexpected nil varnum"));
    }
    let width = match first >> 6 {
        0 => return Ok((first as u32, 1)),
        1 => 2,
        2 => 4,
        _ => 5,
    };
    if buf.len() < width {
        return Err(IndexError::truncated("varnum"));
    }
    let value = match width {
        2 => ((first as u32 & 0x3F) << 8) | buf[1] as u32,
        4 => {
            ((first as u32 & 0x3F) << 24)
                | (buf[1] as u32) << 16
                | (buf[2] as u32) << 8
                | buf[3] as u32
        }
        _ => u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]),
    };
    Ok((value, width))
}

/// Decode a VarNum at `offset` in `buf`, advancing the offset
#[inline]
pub fn read_varnum(buf: &[u8], offset: &mut usize) -> Result<u32> {
    let tail = buf
        .get(*offset..)
        .ok_or_else(|| IndexError::truncated("varnum"))?;
    let (value, consumed) = decode_varnum(tail)?;
    *offset += consumed;
    Ok(value)
}

/// Map a signed value onto an unsigned one so small magnitudes stay short
#[inline]
pub fn zigzag_encode(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

/// Inverse of [`zigzag_encode`]
#[inline]
pub fn zigzag_decode(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

/// Delta-encode an ascending list of u32s, prefixed by its length
pub fn delta_encode(values: &[u32], buf: &mut Vec<u8>) {
    encode_varnum(values.len() as u32, buf);
    let mut prev = 0u32;
    for &value in values {
        encode_varnum(value - prev, buf);
        prev = value;
    }
}

/// Decode a length-prefixed delta list starting at `offset`
pub fn delta_decode(buf: &[u8], offset: &mut usize) -> Result<Vec<u32>> {
    let count = read_varnum(buf, offset)? as usize;
    let mut result = Vec::with_capacity(count.min(buf.len()));
    let mut prev = 0u32;
    for _ in 0..count {
        let delta = read_varnum(buf, offset)?;
        prev = prev
            .checked_add(delta)
            .ok_or_else(|| IndexError::malformed("position list overflows u32"))?;
        result.push(prev);
    }
    Ok(result)
}

/// Write the low `width` bytes of `value` big-endian
#[inline]
pub fn put_fixed(buf: &mut Vec<u8>, value: u64, width: usize) {
    let bytes = value.to_be_bytes();
    buf.extend_from_slice(&bytes[8 - width..]);
}

/// Read a `width`-byte big-endian value from the front of `buf`
#[inline]
pub fn get_fixed(buf: &[u8], width: usize) -> Result<u64> {
    let bytes = buf
        .get(..width)
        .ok_or_else(|| IndexError::truncated("fixed-width value"))?;
    Ok(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
}

/// Largest offset representable in the 5-byte pointer fields
pub const MAX_POINTER: u64 = (1 << 40) - 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varnum_widths() {
        let cases = [
            (0u32, 1usize),
            (63, 1),
            (64, 2),
            (16383, 2),
            (16384, 4),
            ((1 << 30) - 1, 4),
            (1 << 30, 5),
            (u32::MAX, 5),
        ];
        for (value, width) in cases {
            let mut buf = Vec::new();
            encode_varnum(value, &mut buf);
            assert_eq!(buf.len(), width, "width of {value}");
            assert_eq!(varnum_len(value), width);
            assert_eq!(decode_varnum(&buf).unwrap(), (value, width));
        }
    }

    #[test]
    fn test_varnum_never_emits_nil() {
        for value in [u32::MAX, 0xFFFF_FFFE, 1 << 31, 0x3FFF_FFFF] {
            let mut buf = Vec::new();
            encode_varnum(value, &mut buf);
            assert_ne!(buf[0], VARNUM_NIL);
        }
        assert!(decode_varnum(&[VARNUM_NIL]).is_err());
    }

    #[test]
    fn test_varnum_truncated() {
        let mut buf = Vec::new();
        encode_varnum(70_000, &mut buf);
        assert!(matches!(
            decode_varnum(&buf[..2]),
            Err(IndexError::Storage(_))
        ));
        assert!(decode_varnum(&[]).is_err());
    }

    #[test]
    fn test_read_varnum_sequence() {
        let mut buf = Vec::new();
        for v in [5, 300, 70_000, 1 << 31] {
            encode_varnum(v, &mut buf);
        }
        let mut offset = 0;
        let decoded: Vec<u32> = (0..4).map(|_| read_varnum(&buf, &mut offset).unwrap()).collect();
        assert_eq!(decoded, vec![5, 300, 70_000, 1 << 31]);
        assert_eq!(offset, buf.len());
    }

    #[test]
    fn test_delta_encoding() {
        let values = vec![1, 5, 10, 15, 100, 1000, 1 << 31];
        let mut buf = Vec::new();
        delta_encode(&values, &mut buf);
        let mut offset = 0;
        let decoded = delta_decode(&buf, &mut offset).unwrap();
        assert_eq!(values, decoded);
        assert_eq!(offset, buf.len());
    }

    #[test]
    fn test_zigzag() {
        for v in [0, 1, -1, 63, -64, i32::MAX, i32::MIN] {
            assert_eq!(zigzag_decode(zigzag_encode(v)), v);
        }
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
    }

    #[test]
    fn test_fixed_width() {
        let mut buf = Vec::new();
        put_fixed(&mut buf, MAX_POINTER, 5);
        put_fixed(&mut buf, 0x0102_0304, 4);
        assert_eq!(buf.len(), 9);
        assert_eq!(get_fixed(&buf, 5).unwrap(), MAX_POINTER);
        assert_eq!(get_fixed(&buf[5..], 4).unwrap(), 0x0102_0304);
        assert!(get_fixed(&buf[7..], 4).is_err());
    }
}
