use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::name::{BucketName, ObjectKey};
use crate::sequence::Sequence;

/// Classification of a log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// The key now holds the entry's payload.
    Put,
    /// The key was deleted (a tombstone).
    Delete,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Put => "Put",
            Self::Delete => "Delete",
        };
        write!(f, "{s}")
    }
}

/// The operation carried by an entry. A payload exists iff the entry is a put.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryOp {
    Put { payload: Bytes },
    Delete,
}

impl EntryOp {
    pub fn put(payload: impl Into<Bytes>) -> Self {
        Self::Put {
            payload: payload.into(),
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Put { .. } => EntryKind::Put,
            Self::Delete => EntryKind::Delete,
        }
    }

    pub fn payload(&self) -> Option<&Bytes> {
        match self {
            Self::Put { payload } => Some(payload),
            Self::Delete => None,
        }
    }
}

/// A single immutable event in a bucket's log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Position in the bucket's log.
    pub sequence: Sequence,
    /// The bucket this entry belongs to.
    pub bucket: BucketName,
    /// The object key this entry affects.
    pub key: ObjectKey,
    /// Put or delete.
    pub op: EntryOp,
    /// Wall-clock time the entry was appended.
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn kind(&self) -> EntryKind {
        self.op.kind()
    }

    pub fn payload(&self) -> Option<&Bytes> {
        self.op.payload()
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self.op, EntryOp::Delete)
    }
}
