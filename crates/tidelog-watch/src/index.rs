use std::collections::BTreeMap;

use tracing::trace;

use tidelog_types::{LogEntry, ObjectKey, ObjectRecord, Sequence};

/// In-memory reconstruction of a bucket, built by applying log entries in
/// sequence order.
///
/// Tombstoned keys keep their record. The index always reflects exactly the
/// cumulative effect of the entries applied so far.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectIndex {
    records: BTreeMap<ObjectKey, ObjectRecord>,
    highest_applied: Sequence,
}

impl ObjectIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index by applying `entries` in iteration order.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a LogEntry>) -> Self {
        let mut index = Self::new();
        for entry in entries {
            index.apply(entry);
        }
        index
    }

    /// Apply one entry. Returns `false` if the entry was already reflected
    /// (its sequence is not newer than the key's last applied sequence).
    pub fn apply(&mut self, entry: &LogEntry) -> bool {
        if let Some(existing) = self.records.get(&entry.key) {
            if entry.sequence <= existing.last_sequence {
                trace!(key = %entry.key, seq = %entry.sequence, "entry already applied");
                return false;
            }
        }
        self.records
            .insert(entry.key.clone(), ObjectRecord::from_entry(entry));
        self.highest_applied = self.highest_applied.max(entry.sequence);
        true
    }

    /// Snapshot of the live (non-deleted) records, ordered by key.
    pub fn materialize(&self) -> Vec<ObjectRecord> {
        self.records
            .values()
            .filter(|record| record.is_live())
            .cloned()
            .collect()
    }

    /// Record for `key`, including tombstones.
    pub fn get(&self, key: &ObjectKey) -> Option<&ObjectRecord> {
        self.records.get(key)
    }

    /// Number of distinct keys ever seen, tombstones included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn live_count(&self) -> usize {
        self.records.values().filter(|r| r.is_live()).count()
    }

    pub fn tombstone_count(&self) -> usize {
        self.records.values().filter(|r| r.deleted).count()
    }

    /// Highest sequence applied so far; [`Sequence::ZERO`] when nothing has been.
    pub fn highest_applied(&self) -> Sequence {
        self.highest_applied
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use chrono::Utc;
    use proptest::prelude::*;
    use tidelog_types::{BucketName, Digest, EntryOp};

    use super::*;

    fn entry(seq: u64, key: &str, op: EntryOp) -> LogEntry {
        LogEntry {
            sequence: Sequence::new(seq),
            bucket: BucketName::new("idx").unwrap(),
            key: ObjectKey::new(key).unwrap(),
            op,
            timestamp: Utc::now(),
        }
    }

    fn put(seq: u64, key: &str) -> LogEntry {
        entry(seq, key, EntryOp::put(Bytes::from(format!("payload-{seq}"))))
    }

    fn delete(seq: u64, key: &str) -> LogEntry {
        entry(seq, key, EntryOp::Delete)
    }

    fn keys(records: &[ObjectRecord]) -> Vec<&str> {
        records.iter().map(|r| r.key.as_str()).collect()
    }

    #[test]
    fn empty_index_materializes_nothing() {
        let index = ObjectIndex::new();
        assert!(index.materialize().is_empty());
        assert_eq!(index.highest_applied(), Sequence::ZERO);
    }

    #[test]
    fn puts_are_listed_in_key_order() {
        let index = ObjectIndex::from_entries(&[put(1, "c"), put(2, "a"), put(3, "b")]);
        assert_eq!(keys(&index.materialize()), vec!["a", "b", "c"]);
        assert_eq!(index.highest_applied(), Sequence::new(3));
    }

    #[test]
    fn delete_hides_key_but_keeps_tombstone() {
        let index = ObjectIndex::from_entries(&[put(1, "a"), put(2, "b"), delete(3, "a")]);
        assert_eq!(keys(&index.materialize()), vec!["b"]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.live_count(), 1);
        assert_eq!(index.tombstone_count(), 1);

        let tombstone = index.get(&ObjectKey::new("a").unwrap()).unwrap();
        assert!(tombstone.deleted);
        assert_eq!(tombstone.last_sequence, Sequence::new(3));
    }

    #[test]
    fn all_deleted_materializes_empty_with_history_applied() {
        let index = ObjectIndex::from_entries(&[
            put(1, "a"),
            put(2, "b"),
            delete(3, "a"),
            delete(4, "b"),
        ]);
        assert!(index.materialize().is_empty());
        assert_eq!(index.highest_applied(), Sequence::new(4));
        assert!(!index.is_empty());
    }

    #[test]
    fn put_after_delete_revives_key() {
        let index = ObjectIndex::from_entries(&[put(1, "a"), delete(2, "a"), put(3, "a")]);
        let live = index.materialize();
        assert_eq!(keys(&live), vec!["a"]);
        assert_eq!(live[0].last_sequence, Sequence::new(3));
        assert_eq!(live[0].digest, Some(Digest::of(b"payload-3")));
    }

    #[test]
    fn reapplying_older_entry_is_ignored() {
        let mut index = ObjectIndex::new();
        assert!(index.apply(&put(1, "a")));
        assert!(index.apply(&delete(2, "a")));
        assert!(!index.apply(&put(1, "a")));
        assert!(index.materialize().is_empty());
    }

    fn arbitrary_log() -> impl Strategy<Value = Vec<LogEntry>> {
        prop::collection::vec((0usize..6, any::<bool>()), 0..40).prop_map(|ops| {
            ops.into_iter()
                .enumerate()
                .map(|(i, (k, is_put))| {
                    let key = format!("key-{k}");
                    let seq = i as u64 + 1;
                    if is_put {
                        put(seq, &key)
                    } else {
                        delete(seq, &key)
                    }
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn replaying_the_same_log_twice_is_deterministic(log in arbitrary_log()) {
            let first = ObjectIndex::from_entries(&log);
            let second = ObjectIndex::from_entries(&log);
            prop_assert_eq!(first.materialize(), second.materialize());
        }

        #[test]
        fn redelivered_prefix_does_not_change_result(log in arbitrary_log(), cut in 0usize..40) {
            let cut = cut.min(log.len());
            let mut replayed = ObjectIndex::from_entries(&log);
            for entry in &log[..cut] {
                replayed.apply(entry);
            }
            prop_assert_eq!(replayed.materialize(), ObjectIndex::from_entries(&log).materialize());
        }

        #[test]
        fn live_plus_tombstones_is_distinct_keys(log in arbitrary_log()) {
            let index = ObjectIndex::from_entries(&log);
            prop_assert_eq!(index.live_count() + index.tombstone_count(), index.len());
            prop_assert_eq!(index.materialize().len(), index.live_count());
        }
    }
}
