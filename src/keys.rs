//! Length-prefixed key encoding for LMDB storage.
//!
//! Keys are encoded as `[len1][bytes1][len2][bytes2]...`, optionally followed
//! by an 8-byte big-endian row id:
//! - `[target][actor][id]` → grant row, `[actor][target][id]` → reverse index
//! - `[group][member]` / `[member][group]` → membership, both directions
//!
//! Because each part carries its length, a prefix built from whole parts
//! never matches a longer fingerprint that merely shares leading bytes.

use byteorder::{BigEndian, ByteOrder};

/// Build a length-prefixed key from parts
///
/// Parts are fingerprints, at most `MAX_FINGERPRINT_LEN` bytes each.
#[inline]
pub fn build_key(parts: &[&str]) -> Vec<u8> {
    let total_len: usize = parts.iter().map(|p| 1 + p.len()).sum();
    let mut key = Vec::with_capacity(total_len + 8);
    for part in parts {
        debug_assert!(part.len() <= u8::MAX as usize);
        key.push(part.len() as u8);
        key.extend_from_slice(part.as_bytes());
    }
    key
}

/// Key of one grant row: two fingerprints and a row id
#[inline]
pub fn row_key(first: &str, second: &str, id: u64) -> Vec<u8> {
    let mut key = build_key(&[first, second]);
    let mut buf = [0u8; 8];
    BigEndian::write_u64(&mut buf, id);
    key.extend_from_slice(&buf);
    key
}

/// Split a row key into `(first, second, id)`
pub fn split_row_key(bytes: &[u8]) -> Option<(&str, &str, u64)> {
    let (first, i) = next_part(bytes, 0)?;
    let (second, i) = next_part(bytes, i)?;
    let tail = bytes.get(i..)?;
    if tail.len() != 8 {
        return None;
    }
    Some((first, second, BigEndian::read_u64(tail)))
}

/// Split a two-part key into `(first, second)`
pub fn split_pair_key(bytes: &[u8]) -> Option<(&str, &str)> {
    let (first, i) = next_part(bytes, 0)?;
    let (second, i) = next_part(bytes, i)?;
    (i == bytes.len()).then_some((first, second))
}

fn next_part(bytes: &[u8], i: usize) -> Option<(&str, usize)> {
    let len = *bytes.get(i)? as usize;
    let raw = bytes.get(i + 1..i + 1 + len)?;
    let part = std::str::from_utf8(raw).ok()?;
    Some((part, i + 1 + len))
}

// ============================================================================
// Tests
// ============================================================================
