//! Position-list blobs.
//!
//! Value lists are a VarNum count followed by VarNum deltas of ascending
//! positions. Full-text lists group occurrences by text node:
//!
//! ```text
//! varnum(units)
//! per unit: varnum(pre delta) varnum(n) n * varnum(pos delta) [f32 score]
//! ```
//!
//! The score is present only when the index was built with scoring.

use crate::data::Pre;
use crate::error::{IndexError, Result};
use crate::index::Hit;
use crate::utils::encoding::{delta_decode, delta_encode, encode_varnum, read_varnum};

/// A token occurrence: text node position and token ordinal inside it
pub type Occurrence = (Pre, u32);

/// Size and location of a stored position list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    /// Number of positions (value index) or occurrences (full-text)
    pub size: u32,
    /// Byte offset of the list in its blob file
    pub pointer: u64,
}

/// Append a value list for ascending, distinct `pres`
pub fn encode_value_list(pres: &[Pre], buf: &mut Vec<u8>) {
    delta_encode(pres, buf);
}

/// Decode the value list at `offset`
pub fn decode_value_list(bytes: &[u8], offset: usize) -> Result<Vec<Pre>> {
    let mut offset = offset;
    delta_decode(bytes, &mut offset)
}

/// Count and first position of the value list at `offset`, without
/// decoding the rest
pub fn value_list_head(bytes: &[u8], offset: usize) -> Result<(u32, Option<Pre>)> {
    let mut offset = offset;
    let count = read_varnum(bytes, &mut offset)?;
    if count == 0 {
        return Ok((0, None));
    }
    let first = read_varnum(bytes, &mut offset)?;
    Ok((count, Some(first)))
}

/// Append a full-text list. `occurrences` must be sorted by position and
/// ordinal; `scores` holds one score per distinct position when present.
/// Returns the number of units written.
pub fn encode_ft_list(occurrences: &[Occurrence], scores: Option<&[f32]>, buf: &mut Vec<u8>) -> usize {
    let units: Vec<&[Occurrence]> = occurrences.chunk_by(|a, b| a.0 == b.0).collect();
    encode_varnum(units.len() as u32, buf);

    let mut prev_pre = 0;
    for (i, unit) in units.iter().enumerate() {
        let pre = unit[0].0;
        encode_varnum(pre - prev_pre, buf);
        prev_pre = pre;

        encode_varnum(unit.len() as u32, buf);
        let mut prev_pos = 0;
        for &(_, pos) in unit.iter() {
            encode_varnum(pos - prev_pos, buf);
            prev_pos = pos;
        }
        if let Some(scores) = scores {
            buf.extend_from_slice(&scores[i].to_be_bytes());
        }
    }
    units.len()
}

/// Decode the full-text list at `offset` into hits
pub fn decode_ft_list(bytes: &[u8], offset: usize, scored: bool) -> Result<Vec<Hit>> {
    let mut offset = offset;
    let units = read_varnum(bytes, &mut offset)?;
    let mut hits = Vec::with_capacity(units as usize);
    let mut pre = 0u32;

    for _ in 0..units {
        pre = pre
            .checked_add(read_varnum(bytes, &mut offset)?)
            .ok_or_else(|| IndexError::malformed("full-text position overflows u32"))?;
        let n = read_varnum(bytes, &mut offset)?;
        let first = hits.len();
        let mut pos = 0u32;
        for _ in 0..n {
            pos = pos.wrapping_add(read_varnum(bytes, &mut offset)?);
            hits.push(Hit {
                pre,
                pos,
                score: None,
            });
        }
        if scored {
            let raw = bytes
                .get(offset..offset + 4)
                .ok_or_else(|| IndexError::truncated("full-text score"))?;
            let score = f32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]);
            offset += 4;
            for hit in &mut hits[first..] {
                hit.score = Some(score);
            }
        }
    }
    Ok(hits)
}
