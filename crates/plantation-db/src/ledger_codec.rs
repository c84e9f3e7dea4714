//! Binary encoding of a farm's storage ledger.
//!
//! The ledger is stored as an opaque blob in `farm_storage.ledger`. The layout
//! is versioned and length-prefixed; all integers are little-endian:
//!
//! ```text
//! u8   version (= 1)
//! u32  entry count
//! per entry:
//!   u16  material id length in bytes
//!   [u8] material id (UTF-8)
//!   u8   tier
//!   u32  quantity
//! ```
//!
//! Entries are written in key order, so equal ledgers encode to equal bytes.
//! Zero-quantity slots are not written.

use std::collections::BTreeMap;

use plantation_types::{MaterialId, StorageKey, Tier};

/// Current encoding version.
pub const LEDGER_VERSION: u8 = 1;

/// Errors decoding or encoding a ledger blob.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The blob is empty.
    #[error("empty ledger blob")]
    Empty,

    /// The version byte is not one this build understands.
    #[error("unknown ledger version {0}")]
    UnknownVersion(u8),

    /// The blob ended in the middle of a field.
    #[error("ledger blob truncated while reading {0}")]
    Truncated(&'static str),

    /// A tier byte is outside `1..=3`.
    #[error("invalid tier {0} in ledger blob")]
    InvalidTier(u8),

    /// A material id is not valid UTF-8.
    #[error("material id is not valid UTF-8")]
    InvalidUtf8,

    /// A material id is longer than `u16::MAX` bytes, or there are more
    /// entries than `u32::MAX`.
    #[error("ledger field too long to encode: {0}")]
    TooLong(&'static str),

    /// Bytes remain after the last entry.
    #[error("{0} trailing bytes after ledger entries")]
    TrailingBytes(usize),

    /// The same slot appears twice.
    #[error("duplicate ledger slot {0}")]
    DuplicateSlot(StorageKey),
}

/// Encode a ledger.
///
/// # Errors
///
/// Returns [`CodecError::TooLong`] if a material id does not fit a `u16`
/// length prefix.
pub fn encode(ledger: &BTreeMap<StorageKey, u32>) -> Result<Vec<u8>, CodecError> {
    let entries: Vec<(&StorageKey, u32)> = ledger
        .iter()
        .filter(|(_, qty)| **qty > 0)
        .map(|(key, qty)| (key, *qty))
        .collect();
    let count = u32::try_from(entries.len())
        .ok()
        .ok_or(CodecError::TooLong("entry count"))?;

    let mut out = Vec::with_capacity(entries.len().saturating_mul(16).saturating_add(5));
    out.push(LEDGER_VERSION);
    out.extend_from_slice(&count.to_le_bytes());
    for (key, qty) in entries {
        let id = key.material.as_str().as_bytes();
        let len = u16::try_from(id.len())
            .ok()
            .ok_or(CodecError::TooLong("material id"))?;
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(id);
        out.push(key.tier.get());
        out.extend_from_slice(&qty.to_le_bytes());
    }
    Ok(out)
}

/// Decode a ledger blob.
///
/// # Errors
///
/// Returns a [`CodecError`] for an empty, truncated, unknown-version or
/// otherwise malformed blob. Nothing is partially decoded.
pub fn decode(bytes: &[u8]) -> Result<BTreeMap<StorageKey, u32>, CodecError> {
    let (&version, rest) = bytes.split_first().ok_or(CodecError::Empty)?;
    if version != LEDGER_VERSION {
        return Err(CodecError::UnknownVersion(version));
    }
    let mut reader = Reader { rest };
    let count = u32::from_le_bytes(reader.take_array("entry count")?);

    let mut ledger = BTreeMap::new();
    for _ in 0..count {
        let len = u16::from_le_bytes(reader.take_array("material id length")?);
        let id = reader.take(usize::from(len), "material id")?;
        let id = std::str::from_utf8(id).ok().ok_or(CodecError::InvalidUtf8)?;
        let [tier] = reader.take_array::<1>("tier")?;
        let tier = Tier::new(tier).ok_or(CodecError::InvalidTier(tier))?;
        let qty = u32::from_le_bytes(reader.take_array("quantity")?);

        let key = StorageKey::new(MaterialId::new(id), tier);
        if ledger.contains_key(&key) {
            return Err(CodecError::DuplicateSlot(key));
        }
        if qty > 0 {
            ledger.insert(key, qty);
        }
    }

    if !reader.rest.is_empty() {
        return Err(CodecError::TrailingBytes(reader.rest.len()));
    }
    Ok(ledger)
}

/// Forward-only cursor over the blob.
struct Reader<'a> {
    rest: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], CodecError> {
        let (head, tail) = self
            .rest
            .split_at_checked(n)
            .ok_or(CodecError::Truncated(field))?;
        self.rest = tail;
        Ok(head)
    }

    fn take_array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], CodecError> {
        let head = self.take(N, field)?;
        <[u8; N]>::try_from(head)
            .ok()
            .ok_or(CodecError::Truncated(field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BTreeMap<StorageKey, u32> {
        let mut ledger = BTreeMap::new();
        ledger.insert(StorageKey::new("wheat", Tier::MIN), 120);
        ledger.insert(StorageKey::new("wheat", Tier::MAX), 3);
        ledger.insert(StorageKey::new("crystal_shard", Tier::MIN), 7);
        ledger
    }

    #[test]
    fn round_trip() {
        let ledger = sample();
        let bytes = encode(&ledger).unwrap_or_default();
        assert_eq!(decode(&bytes), Ok(ledger));
    }

    #[test]
    fn empty_ledger_encodes_header_only() {
        let bytes = encode(&BTreeMap::new()).unwrap_or_default();
        assert_eq!(bytes, vec![LEDGER_VERSION, 0, 0, 0, 0]);
        assert_eq!(decode(&bytes), Ok(BTreeMap::new()));
    }

    #[test]
    fn zero_slots_are_dropped() {
        let mut ledger = sample();
        ledger.insert(StorageKey::new("dust", Tier::MIN), 0);
        let bytes = encode(&ledger).unwrap_or_default();
        assert_eq!(decode(&bytes), Ok(sample()));
    }

    #[test]
    fn encoding_is_deterministic() {
        assert_eq!(encode(&sample()), encode(&sample()));
    }

    #[test]
    fn rejects_empty_and_unknown_version() {
        assert_eq!(decode(&[]), Err(CodecError::Empty));
        assert_eq!(decode(&[2, 0, 0, 0, 0]), Err(CodecError::UnknownVersion(2)));
    }

    #[test]
    fn rejects_every_truncation() {
        let bytes = encode(&sample()).unwrap_or_default();
        for cut in 1..bytes.len() {
            let prefix = bytes.get(..cut).unwrap_or_default();
            assert!(
                matches!(decode(prefix), Err(CodecError::Truncated(_))),
                "prefix of {cut} bytes decoded"
            );
        }
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut bytes = encode(&sample()).unwrap_or_default();
        bytes.push(0);
        assert_eq!(decode(&bytes), Err(CodecError::TrailingBytes(1)));
    }

    #[test]
    fn rejects_bad_tier() {
        // version, count = 1, len = 1, "a", tier 9, qty 1
        let bytes = [1, 1, 0, 0, 0, 1, 0, b'a', 9, 1, 0, 0, 0];
        assert_eq!(decode(&bytes), Err(CodecError::InvalidTier(9)));
    }

    #[test]
    fn rejects_duplicate_slots() {
        let bytes = [
            1, 2, 0, 0, 0, //
            1, 0, b'a', 1, 1, 0, 0, 0, //
            1, 0, b'a', 1, 2, 0, 0, 0,
        ];
        assert!(matches!(decode(&bytes), Err(CodecError::DuplicateSlot(_))));
    }
}
