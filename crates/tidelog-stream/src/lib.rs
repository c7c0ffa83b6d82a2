//! Log streams for Tidelog.
//!
//! A log stream holds one append-only log per bucket. Entries receive
//! gap-free sequences starting at 1 and are never rewritten; deletes are
//! recorded as tombstone entries. Consumers read a bucket by subscribing
//! from a sequence: history is delivered first, in order, followed by a
//! [`Delivery::CaughtUp`] marker and then live entries as they are appended.
//!
//! # Backends
//!
//! All backends implement the [`LogStream`] trait:
//!
//! - [`InMemoryLogStream`] -- process-local logs for tests and embedding
//! - [`FileLogStream`] -- the same logs made durable by a write-ahead log
//!   that is replayed on open

pub mod error;
pub mod file;
pub mod memory;
mod registry;
pub mod subscription;
pub mod traits;
pub mod wal;

pub use error::{StreamError, StreamResult};
pub use file::FileLogStream;
pub use memory::InMemoryLogStream;
pub use subscription::{Delivery, Subscription, SubscriptionId};
pub use traits::LogStream;
pub use wal::{SyncMode, WalConfig, WriteAheadLog};
