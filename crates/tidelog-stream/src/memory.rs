use std::sync::Arc;

use async_trait::async_trait;

use tidelog_types::{BucketName, EntryOp, LogEntry, ObjectKey, Sequence, Watermark};

use crate::error::StreamResult;
use crate::registry::Registry;
use crate::subscription::Subscription;
use crate::traits::LogStream;

/// Process-local log stream.
///
/// Intended for tests and embedding. Entries live in memory for the lifetime
/// of the stream; cloning the stream shares the same logs.
#[derive(Clone)]
pub struct InMemoryLogStream {
    registry: Arc<Registry>,
}

impl InMemoryLogStream {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
        }
    }

    /// Names of every bucket that has been written or subscribed to.
    pub fn buckets(&self) -> Vec<BucketName> {
        self.registry.buckets()
    }

    /// Number of registered subscriptions on a bucket.
    pub fn subscriber_count(&self, bucket: &BucketName) -> usize {
        self.registry.subscriber_count(bucket)
    }

    /// Total number of entries across all buckets.
    pub fn entry_count(&self) -> usize {
        self.registry.entry_count()
    }

    /// Shut the stream down: open subscriptions see their channel close and
    /// every later call fails with [`StreamError::Shutdown`](crate::StreamError::Shutdown).
    pub fn shutdown(&self) {
        self.registry.shutdown();
    }
}

impl Default for InMemoryLogStream {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryLogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLogStream")
            .field("entry_count", &self.entry_count())
            .finish()
    }
}

#[async_trait]
impl LogStream for InMemoryLogStream {
    async fn append(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        op: EntryOp,
    ) -> StreamResult<Sequence> {
        let entry = self.registry.append_with(bucket, key, op, |_| Ok(()))?;
        Ok(entry.sequence)
    }

    async fn current_watermark(&self, bucket: &BucketName) -> StreamResult<Watermark> {
        self.registry.watermark(bucket)
    }

    async fn subscribe(&self, bucket: &BucketName, from: Sequence) -> StreamResult<Subscription> {
        self.registry.subscribe(bucket, from)
    }

    async fn last_entry(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
    ) -> StreamResult<Option<LogEntry>> {
        self.registry.last_entry(bucket, key)
    }
}
