use async_trait::async_trait;

use tidelog_types::{BucketName, EntryOp, LogEntry, ObjectKey, Sequence, Watermark};

use crate::error::StreamResult;
use crate::subscription::Subscription;

/// Append-only, per-bucket log of put and delete entries.
///
/// All implementations must satisfy these invariants:
/// - Sequences within a bucket start at 1 and increase by one per append.
/// - Entries are immutable once appended and are delivered to subscribers in
///   sequence order, each exactly once.
/// - A subscription's historical deliveries and its live deliveries never
///   overlap or leave a hole.
/// - Failures are returned to the caller, never retried internally.
#[async_trait]
pub trait LogStream: Send + Sync {
    /// Append an entry for `key` and return the sequence it was assigned.
    async fn append(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        op: EntryOp,
    ) -> StreamResult<Sequence>;

    /// Highest sequence currently present in the bucket's log.
    ///
    /// Buckets that have never been written report [`Watermark::EMPTY`].
    async fn current_watermark(&self, bucket: &BucketName) -> StreamResult<Watermark>;

    /// Subscribe to the bucket's log starting at `from`.
    async fn subscribe(&self, bucket: &BucketName, from: Sequence) -> StreamResult<Subscription>;

    /// Release a subscription's backend registration.
    ///
    /// The default implementation releases the handle locally, which is
    /// sufficient for backends whose release hook does all the work.
    async fn unsubscribe(&self, mut subscription: Subscription) -> StreamResult<()> {
        subscription.release();
        Ok(())
    }

    /// The most recent entry for `key`, whether put or tombstone.
    async fn last_entry(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
    ) -> StreamResult<Option<LogEntry>>;
}
