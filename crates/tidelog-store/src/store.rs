use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info};

use tidelog_stream::{FileLogStream, InMemoryLogStream, LogStream, StreamResult};
use tidelog_types::{BucketName, EntryOp, LogEntry, ObjectKey, ObjectRecord, Sequence, Watermark};
use tidelog_watch::{EnumerationSession, Listing};

use crate::config::{DeletePolicy, StoreConfig};
use crate::error::{Operation, StoreError, StoreResult};

/// Object store bound to one bucket of a log stream.
///
/// Cheap to clone; clones share the stream. Calls are independent: any
/// number of `list` sessions may run alongside puts and deletes.
#[derive(Clone)]
pub struct ObjectStore {
    stream: Arc<dyn LogStream>,
    bucket: BucketName,
    config: StoreConfig,
}

impl ObjectStore {
    pub fn new(stream: Arc<dyn LogStream>, config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let bucket = config.bucket_name()?;
        info!(bucket = %bucket, policy = ?config.delete_policy, "object store ready");
        Ok(Self {
            stream,
            bucket,
            config,
        })
    }

    /// Store over a fresh process-local stream.
    pub fn in_memory(config: StoreConfig) -> StoreResult<Self> {
        Self::new(Arc::new(InMemoryLogStream::new()), config)
    }

    /// Store over the durable stream at `path`, recovering existing entries.
    pub fn open_file(path: &Path, config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let bucket = config.bucket_name()?;
        let stream = FileLogStream::open(path, config.wal.clone())
            .map_err(|e| StoreError::stream(Operation::Open, &bucket, e))?;
        Self::new(Arc::new(stream), config)
    }

    pub fn bucket(&self) -> &BucketName {
        &self.bucket
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn stream(&self) -> &Arc<dyn LogStream> {
        &self.stream
    }

    /// A deadline `operation_timeout` from now.
    pub fn deadline(&self) -> Instant {
        Instant::now() + self.config.operation_timeout()
    }

    /// Store `payload` under `key`. Returns the sequence of the put entry.
    pub async fn put(
        &self,
        key: &str,
        payload: impl Into<Bytes>,
        deadline: Instant,
    ) -> StoreResult<Sequence> {
        let key = ObjectKey::new(key)?;
        let payload = payload.into();
        let size = payload.len();
        let seq = self
            .bounded(
                Operation::Put,
                deadline,
                self.stream.append(&self.bucket, &key, EntryOp::put(payload)),
            )
            .await?;
        debug!(bucket = %self.bucket, key = %key, size, seq = %seq, "object put");
        Ok(seq)
    }

    /// Delete `key` by appending a tombstone. Returns the tombstone's sequence.
    ///
    /// Under [`DeletePolicy::Strict`] a key without a live object fails with
    /// [`StoreError::NotFound`].
    pub async fn delete(&self, key: &str, deadline: Instant) -> StoreResult<Sequence> {
        let key = ObjectKey::new(key)?;
        if self.config.delete_policy == DeletePolicy::Strict {
            self.live_entry(Operation::Delete, &key, deadline).await?;
        }
        let seq = self
            .bounded(
                Operation::Delete,
                deadline,
                self.stream.append(&self.bucket, &key, EntryOp::Delete),
            )
            .await?;
        debug!(bucket = %self.bucket, key = %key, seq = %seq, "object deleted");
        Ok(seq)
    }

    /// Payload of the live object at `key`.
    pub async fn get(&self, key: &str, deadline: Instant) -> StoreResult<Bytes> {
        let key = ObjectKey::new(key)?;
        let entry = self.live_entry(Operation::Get, &key, deadline).await?;
        match entry.op {
            EntryOp::Put { payload } => Ok(payload),
            EntryOp::Delete => Err(self.not_found(key)),
        }
    }

    /// Record of the live object at `key`.
    pub async fn info(&self, key: &str, deadline: Instant) -> StoreResult<ObjectRecord> {
        let key = ObjectKey::new(key)?;
        let entry = self.live_entry(Operation::Info, &key, deadline).await?;
        Ok(ObjectRecord::from_entry(&entry))
    }

    /// Every live object, ordered by key.
    pub async fn list(&self, deadline: Instant) -> StoreResult<Vec<ObjectRecord>> {
        Ok(self.listing(deadline).await?.records)
    }

    /// Every live object together with the watermark the listing reflects.
    pub async fn listing(&self, deadline: Instant) -> StoreResult<Listing> {
        let mut session = EnumerationSession::new(self.stream.as_ref(), self.bucket.clone());
        session
            .run(deadline)
            .await
            .map_err(|e| StoreError::watch(Operation::List, &self.bucket, e))
    }

    /// Current watermark of the bucket's log.
    pub async fn watermark(&self, deadline: Instant) -> StoreResult<Watermark> {
        self.bounded(
            Operation::Watermark,
            deadline,
            self.stream.current_watermark(&self.bucket),
        )
        .await
    }

    /// Latest entry for `key`, provided it is a put.
    async fn live_entry(
        &self,
        operation: Operation,
        key: &ObjectKey,
        deadline: Instant,
    ) -> StoreResult<LogEntry> {
        let last = self
            .bounded(operation, deadline, self.stream.last_entry(&self.bucket, key))
            .await?;
        match last {
            Some(entry) if !entry.is_tombstone() => Ok(entry),
            _ => Err(self.not_found(key.clone())),
        }
    }

    async fn bounded<T>(
        &self,
        operation: Operation,
        deadline: Instant,
        call: impl Future<Output = StreamResult<T>>,
    ) -> StoreResult<T> {
        match timeout_at(deadline, call).await {
            Ok(result) => result.map_err(|e| StoreError::stream(operation, &self.bucket, e)),
            Err(_) => Err(StoreError::timeout(operation, &self.bucket)),
        }
    }

    fn not_found(&self, key: ObjectKey) -> StoreError {
        StoreError::NotFound {
            bucket: self.bucket.clone(),
            key,
        }
    }
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("bucket", &self.bucket)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use tidelog_stream::{StreamError, Subscription};
    use tidelog_types::Digest;

    use super::*;

    /// A bound every list must meet on its own, far below the caller deadline.
    const TERMINATION_BOUND: Duration = Duration::from_secs(2);

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(3600)
    }

    fn store() -> ObjectStore {
        ObjectStore::in_memory(StoreConfig::with_bucket("test")).unwrap()
    }

    async fn list_keys(store: &ObjectStore) -> Vec<String> {
        let records = tokio::time::timeout(TERMINATION_BOUND, store.list(far_deadline()))
            .await
            .expect("list did not terminate on its own")
            .unwrap();
        records.into_iter().map(|r| r.key.to_string()).collect()
    }

    #[tokio::test]
    async fn empty_store_lists_empty() {
        assert!(list_keys(&store()).await.is_empty());
    }

    #[tokio::test]
    async fn drained_store_lists_empty() {
        let store = store();
        for i in 0..10 {
            store.put(&format!("obj-{i}"), vec![i as u8; 32], far_deadline()).await.unwrap();
        }
        for i in 0..10 {
            store.delete(&format!("obj-{i}"), far_deadline()).await.unwrap();
        }
        assert!(list_keys(&store).await.is_empty());
        assert_eq!(store.watermark(far_deadline()).await.unwrap(), Watermark::new(20));
    }

    #[tokio::test]
    async fn count_matches_distinct_puts() {
        let store = store();
        for i in 0..50 {
            store.put(&format!("/root/parent/child-{i}"), vec![0u8; 32], far_deadline()).await.unwrap();
        }
        assert_eq!(list_keys(&store).await.len(), 50);
    }

    #[tokio::test]
    async fn deleting_all_but_one_leaves_that_one() {
        let store = store();
        let keys: Vec<String> = (0..7).map(|i| format!("k{i}")).collect();
        for key in &keys {
            store.put(key, &b"data"[..], far_deadline()).await.unwrap();
        }
        for key in &keys[..6] {
            store.delete(key, far_deadline()).await.unwrap();
        }
        assert_eq!(list_keys(&store).await, vec!["k6".to_string()]);
    }

    #[tokio::test]
    async fn put_delete_list_scenario() {
        let store = store();
        for key in ["a", "b", "c"] {
            store.put(key, key.as_bytes().to_vec(), far_deadline()).await.unwrap();
        }
        assert_eq!(list_keys(&store).await, vec!["a", "b", "c"]);

        store.delete("a", far_deadline()).await.unwrap();
        store.delete("b", far_deadline()).await.unwrap();
        assert_eq!(list_keys(&store).await, vec!["c"]);

        store.delete("c", far_deadline()).await.unwrap();
        assert!(list_keys(&store).await.is_empty());
    }

    #[tokio::test]
    async fn overwrite_lists_latest_version_once() {
        let store = store();
        store.put("k", &b"v1"[..], far_deadline()).await.unwrap();
        let seq = store.put("k", &b"version-2"[..], far_deadline()).await.unwrap();

        let records = store.list(far_deadline()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].last_sequence, seq);
        assert_eq!(records[0].size, 9);
        assert_eq!(records[0].digest, Some(Digest::of(b"version-2")));
    }

    #[tokio::test]
    async fn get_and_info_return_live_object() {
        let store = store();
        store.put("doc", &b"hello"[..], far_deadline()).await.unwrap();

        assert_eq!(store.get("doc", far_deadline()).await.unwrap(), Bytes::from_static(b"hello"));
        let info = store.info("doc", far_deadline()).await.unwrap();
        assert_eq!(info.size, 5);
        assert!(info.is_live());

        store.delete("doc", far_deadline()).await.unwrap();
        assert!(store.get("doc", far_deadline()).await.unwrap_err().is_not_found());
        assert!(store.info("doc", far_deadline()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn strict_delete_of_unknown_or_deleted_key_is_not_found() {
        let store = store();
        assert!(store.delete("ghost", far_deadline()).await.unwrap_err().is_not_found());

        store.put("once", &b"x"[..], far_deadline()).await.unwrap();
        store.delete("once", far_deadline()).await.unwrap();
        assert!(store.delete("once", far_deadline()).await.unwrap_err().is_not_found());
        assert_eq!(store.watermark(far_deadline()).await.unwrap(), Watermark::new(2));
    }

    #[tokio::test]
    async fn permissive_delete_appends_tombstone_for_unknown_key() {
        let config = StoreConfig {
            delete_policy: DeletePolicy::Permissive,
            ..StoreConfig::with_bucket("permissive")
        };
        let store = ObjectStore::in_memory(config).unwrap();
        let seq = store.delete("ghost", far_deadline()).await.unwrap();
        assert_eq!(seq, Sequence::new(1));
        assert!(list_keys(&store).await.is_empty());
    }

    #[tokio::test]
    async fn invalid_key_is_rejected_before_io() {
        let store = store();
        assert!(matches!(
            store.put("", &b"x"[..], far_deadline()).await,
            Err(StoreError::InvalidName(_))
        ));
        assert_eq!(store.watermark(far_deadline()).await.unwrap(), Watermark::EMPTY);
    }

    #[tokio::test]
    async fn shut_down_stream_surfaces_transport_errors() {
        let stream = Arc::new(InMemoryLogStream::new());
        let store = ObjectStore::new(stream.clone(), StoreConfig::with_bucket("down")).unwrap();
        store.put("k", &b"v"[..], far_deadline()).await.unwrap();
        stream.shutdown();

        assert!(store.put("k2", &b"v"[..], far_deadline()).await.unwrap_err().is_transport());
        assert!(store.list(far_deadline()).await.unwrap_err().is_transport());
    }

    #[tokio::test]
    async fn buckets_are_isolated() {
        let stream: Arc<dyn LogStream> = Arc::new(InMemoryLogStream::new());
        let photos = ObjectStore::new(stream.clone(), StoreConfig::with_bucket("photos")).unwrap();
        let docs = ObjectStore::new(stream, StoreConfig::with_bucket("docs")).unwrap();

        photos.put("a.jpg", &b"jpg"[..], far_deadline()).await.unwrap();
        assert!(list_keys(&docs).await.is_empty());
        assert_eq!(list_keys(&photos).await, vec!["a.jpg"]);
    }

    #[tokio::test]
    async fn lists_run_concurrently_with_writes() {
        let store = store();
        for i in 0..20 {
            store.put(&format!("base-{i:02}"), vec![1u8], far_deadline()).await.unwrap();
        }

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..20 {
                    store.put(&format!("extra-{i:02}"), vec![2u8], far_deadline()).await.unwrap();
                }
            })
        };
        let mut readers = Vec::new();
        for _ in 0..4 {
            let store = store.clone();
            readers.push(tokio::spawn(async move {
                store.list(far_deadline()).await.map(|records| records.len())
            }));
        }

        for reader in readers {
            let count = reader.await.unwrap().unwrap();
            assert!((20..=40).contains(&count));
        }
        writer.await.unwrap();
        assert_eq!(list_keys(&store).await.len(), 40);
    }

    #[tokio::test]
    async fn file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("objects.wal");
        let config = StoreConfig::with_bucket("durable");

        {
            let store = ObjectStore::open_file(&path, config.clone()).unwrap();
            store.put("keep", &b"1"[..], far_deadline()).await.unwrap();
            store.put("drop", &b"2"[..], far_deadline()).await.unwrap();
            store.delete("drop", far_deadline()).await.unwrap();
        }

        let store = ObjectStore::open_file(&path, config).unwrap();
        assert_eq!(list_keys(&store).await, vec!["keep"]);
        store.delete("keep", far_deadline()).await.unwrap();
        assert!(list_keys(&store).await.is_empty());
    }

    #[test]
    fn unreadable_log_is_a_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ObjectStore::open_file(dir.path(), StoreConfig::with_bucket("dir")).unwrap_err();
        assert!(err.is_transport());
        assert!(matches!(err, StoreError::Transport { operation: Operation::Open, .. }));
    }

    #[test]
    fn corrupt_log_is_a_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.wal");
        std::fs::write(&path, [2, 0, 0, 0, 0, 0, 0, 0, 7, 7, 0, 0]).unwrap();
        let err = ObjectStore::open_file(&path, StoreConfig::with_bucket("corrupt")).unwrap_err();
        assert!(err.is_transport());
    }

    /// Stream whose every call waits forever.
    struct StalledStream;

    #[async_trait]
    impl LogStream for StalledStream {
        async fn append(&self, _: &BucketName, _: &ObjectKey, _: EntryOp) -> StreamResult<Sequence> {
            std::future::pending().await
        }

        async fn current_watermark(&self, _: &BucketName) -> StreamResult<Watermark> {
            std::future::pending().await
        }

        async fn subscribe(&self, _: &BucketName, _: Sequence) -> StreamResult<Subscription> {
            Err(StreamError::Transport("unreachable".into()))
        }

        async fn last_entry(&self, _: &BucketName, _: &ObjectKey) -> StreamResult<Option<LogEntry>> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn every_operation_honours_its_deadline() {
        let store = ObjectStore::new(Arc::new(StalledStream), StoreConfig::with_bucket("stalled")).unwrap();
        let soon = || Instant::now() + Duration::from_millis(100);

        assert!(store.put("k", &b"v"[..], soon()).await.unwrap_err().is_timeout());
        assert!(store.delete("k", soon()).await.unwrap_err().is_timeout());
        assert!(store.get("k", soon()).await.unwrap_err().is_timeout());
        assert!(store.list(soon()).await.unwrap_err().is_timeout());
        assert!(store.watermark(soon()).await.unwrap_err().is_timeout());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = StoreConfig::with_bucket("bad bucket");
        assert!(matches!(
            ObjectStore::in_memory(config),
            Err(StoreError::InvalidName(_))
        ));
    }
}
