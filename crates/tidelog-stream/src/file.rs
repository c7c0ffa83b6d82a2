use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use tidelog_types::{BucketName, EntryOp, LogEntry, ObjectKey, Sequence, Watermark};

use crate::error::StreamResult;
use crate::registry::Registry;
use crate::subscription::Subscription;
use crate::traits::LogStream;
use crate::wal::{WalConfig, WriteAheadLog};

/// Durable log stream: every entry is written to a [`WriteAheadLog`] before
/// it becomes visible to readers, and the WAL is replayed on open.
pub struct FileLogStream {
    registry: Arc<Registry>,
    wal: WriteAheadLog,
}

impl FileLogStream {
    /// Open (or create) the stream stored at `path`, recovering every bucket.
    pub fn open(path: &Path, config: WalConfig) -> StreamResult<Self> {
        let (wal, entries) = WriteAheadLog::open(path, config)?;
        let registry = Registry::new();

        let recovered = entries.len();
        for entry in entries {
            registry.restore(entry)?;
        }

        info!(path = %path.display(), recovered, "file log stream opened");
        Ok(Self { registry, wal })
    }

    pub fn buckets(&self) -> Vec<BucketName> {
        self.registry.buckets()
    }

    pub fn subscriber_count(&self, bucket: &BucketName) -> usize {
        self.registry.subscriber_count(bucket)
    }

    pub fn entry_count(&self) -> usize {
        self.registry.entry_count()
    }

    pub fn path(&self) -> &Path {
        self.wal.path()
    }

    pub fn shutdown(&self) {
        self.registry.shutdown();
    }
}

impl std::fmt::Debug for FileLogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileLogStream")
            .field("path", &self.wal.path())
            .field("entry_count", &self.entry_count())
            .finish()
    }
}

#[async_trait]
impl LogStream for FileLogStream {
    async fn append(
        &self,
        bucket: &BucketName,
        key: &ObjectKey,
        op: EntryOp,
    ) -> StreamResult<Sequence> {
        let entry = self
            .registry
            .append_with(bucket, key, op, |entry| self.wal.append(entry).map(|_| ()))?;
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
