//! Foundation types for Tidelog.
//!
//! Tidelog is an object store whose only source of truth is an append-only
//! log per bucket. Every other Tidelog crate depends on `tidelog-types`.
//!
//! # Key Types
//!
//! - [`Sequence`]: Position of an entry in a bucket's log (starts at 1)
//! - [`Watermark`]: Highest sequence present in a log when it was observed
//! - [`BucketName`] / [`ObjectKey`]: Validated names
//! - [`LogEntry`]: An immutable put or delete event
//! - [`ObjectRecord`]: Per-key state reconstructed by replaying entries
//! - [`Digest`]: BLAKE3 digest of an object payload

pub mod entry;
pub mod error;
pub mod name;
pub mod record;
pub mod sequence;

pub use entry::{EntryKind, EntryOp, LogEntry};
pub use error::TypeError;
pub use name::{BucketName, ObjectKey};
pub use record::{Digest, ObjectRecord};
pub use sequence::{Sequence, Watermark};
