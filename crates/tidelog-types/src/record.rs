use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entry::{EntryOp, LogEntry};
use crate::error::TypeError;
use crate::name::ObjectKey;
use crate::sequence::Sequence;

/// BLAKE3 digest of an object payload.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Digest the given payload.
    pub fn of(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 8 hex characters.
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            })?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.short_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blake3:{}", self.to_hex())
    }
}

/// Reconstructed state of one key, as of the last entry applied for it.
///
/// Deleted keys keep their record (with `deleted = true`) so that a later
/// replay of older entries cannot resurrect them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub key: ObjectKey,
    /// Sequence of the last entry applied for this key.
    pub last_sequence: Sequence,
    pub deleted: bool,
    /// Payload size in bytes; zero for tombstones.
    pub size: u64,
    /// Payload digest; `None` for tombstones.
    pub digest: Option<Digest>,
    /// Timestamp of the last entry applied for this key.
    pub modified: DateTime<Utc>,
}

impl ObjectRecord {
    /// The record a single entry produces on its own.
    pub fn from_entry(entry: &LogEntry) -> Self {
        let (deleted, size, digest) = match &entry.op {
            EntryOp::Put { payload } => (false, payload.len() as u64, Some(Digest::of(payload))),
            EntryOp::Delete => (true, 0, None),
        };
        Self {
            key: entry.key.clone(),
            last_sequence: entry.sequence,
            deleted,
            size,
            digest,
            modified: entry.timestamp,
        }
    }

    pub fn is_live(&self) -> bool {
        !self.deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::BucketName;

    fn entry(seq: u64, op: EntryOp) -> LogEntry {
        LogEntry {
            sequence: Sequence::new(seq),
            bucket: BucketName::new("b").unwrap(),
            key: ObjectKey::new("obj").unwrap(),
            op,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn put_record_carries_size_and_digest() {
        let record = ObjectRecord::from_entry(&entry(4, EntryOp::put(&b"hello"[..])));
        assert!(record.is_live());
        assert_eq!(record.size, 5);
        assert_eq!(record.digest, Some(Digest::of(b"hello")));
        assert_eq!(record.last_sequence, Sequence::new(4));
    }

    #[test]
    fn tombstone_record_is_not_live() {
        let record = ObjectRecord::from_entry(&entry(5, EntryOp::Delete));
        assert!(record.deleted);
        assert_eq!(record.size, 0);
        assert!(record.digest.is_none());
    }

    #[test]
    fn digest_hex_roundtrip() {
        let d = Digest::of(b"payload");
        assert_eq!(Digest::from_hex(&d.to_hex()).unwrap(), d);
        assert_eq!(d.short_hex().len(), 8);
        assert!(d.to_string().starts_with("blake3:"));
    }

    #[test]
    fn digest_from_hex_rejects_wrong_length() {
        assert_eq!(
            Digest::from_hex("abcd"),
            Err(TypeError::InvalidLength {
                expected: 32,
                actual: 2
            })
        );
        assert!(matches!(Digest::from_hex("zz"), Err(TypeError::InvalidHex(_))));
    }
}
