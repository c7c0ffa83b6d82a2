//! Object store facade for Tidelog.
//!
//! An [`ObjectStore`] is bound to one bucket of a [`LogStream`]. Puts and
//! deletes append entries; `list` runs an
//! [`EnumerationSession`](tidelog_watch::EnumerationSession) that replays the
//! bucket up to its watermark and returns the live objects, terminating even
//! when the bucket is empty or every object has been deleted.
//!
//! Every operation takes a deadline and never retries internally.

pub mod config;
pub mod error;
pub mod store;

pub use config::{DeletePolicy, StoreConfig, MAX_OPERATION_TIMEOUT_MS};
pub use error::{Operation, StoreError, StoreResult};
pub use store::ObjectStore;

pub use tidelog_stream::{FileLogStream, InMemoryLogStream, LogStream, SyncMode, WalConfig};
pub use tidelog_types::{BucketName, Digest, ObjectKey, ObjectRecord, Sequence, Watermark};
pub use tidelog_watch::Listing;
