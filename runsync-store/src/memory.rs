//! In-memory store
//!
//! In-process implementation of the store traits with the same semantics a
//! real record store exhibits: resource versions bump on every write, stale
//! updates conflict, and a deleting record is garbage-collected as soon as
//! its finalizer list empties. Used by tests and local runs.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use runsync_core::domain::record::{PipelineRun, RecordKey};
use runsync_core::domain::run::EngineRun;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::traits::{EngineRunStore, RecordLister, RecordStore};

/// In-memory record and engine-run store
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<RecordKey, PipelineRun>>,
    runs: Mutex<HashMap<RecordKey, EngineRun>>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record as an external creator would
    ///
    /// The stored copy starts at resource version 1 with no deletion
    /// timestamp.
    pub fn insert_record(&self, mut run: PipelineRun) {
        run.meta.resource_version = 1;
        run.meta.deletion_timestamp = None;
        self.lock_records().insert(run.key(), run);
    }

    /// Marks a record for deletion as an external delete request would
    ///
    /// Sets the deletion timestamp and bumps the resource version. If the
    /// record has no finalizers it is purged immediately.
    pub fn mark_deleted(&self, key: &RecordKey) {
        let mut records = self.lock_records();
        let Some(run) = records.get_mut(key) else {
            return;
        };
        run.meta.deletion_timestamp = Some(Utc::now());
        run.meta.resource_version += 1;
        if run.meta.finalizers.is_empty() {
            records.remove(key);
        }
    }

    /// Returns the stored record, if any
    pub fn record(&self, key: &RecordKey) -> Option<PipelineRun> {
        self.lock_records().get(key).cloned()
    }

    /// Returns the stored engine run, if any
    pub fn engine_run(&self, key: &RecordKey) -> Option<EngineRun> {
        self.lock_runs().get(key).cloned()
    }

    /// Number of engine runs currently stored
    pub fn engine_run_count(&self) -> usize {
        self.lock_runs().len()
    }

    /// Inserts an engine run directly, bypassing the create path
    pub fn insert_engine_run(&self, run: EngineRun) {
        self.lock_runs().insert(run.key(), run);
    }

    fn lock_records(&self) -> MutexGuard<'_, HashMap<RecordKey, PipelineRun>> {
        self.records.lock().expect("record store mutex poisoned")
    }

    fn lock_runs(&self) -> MutexGuard<'_, HashMap<RecordKey, EngineRun>> {
        self.runs.lock().expect("engine run store mutex poisoned")
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, key: &RecordKey) -> Result<PipelineRun> {
        self.lock_records()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn update(&self, run: &PipelineRun) -> Result<PipelineRun> {
        let key = run.key();
        let mut records = self.lock_records();

        let stored = records
            .get(&key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        if stored.meta.resource_version != run.meta.resource_version {
            return Err(StoreError::Conflict(key.to_string()));
        }

        let mut updated = run.clone();
        updated.meta.resource_version += 1;

        // Store-side garbage collection: a deleting record with no
        // finalizers left is purged rather than persisted.
        if updated.meta.is_deleting() && updated.meta.finalizers.is_empty() {
            debug!(record = %key, "last finalizer removed, purging record");
            records.remove(&key);
        } else {
            records.insert(key, updated.clone());
        }

        Ok(updated)
    }
}

#[async_trait]
impl EngineRunStore for MemoryStore {
    async fn get(&self, key: &RecordKey) -> Result<EngineRun> {
        self.lock_runs()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn create(&self, run: &EngineRun) -> Result<EngineRun> {
        let key = run.key();
        let mut runs = self.lock_runs();

        if runs.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key.to_string()));
        }
        runs.insert(key, run.clone());
        Ok(run.clone())
    }

    async fn delete(&self, key: &RecordKey) -> Result<()> {
        self.lock_runs()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }
}

#[async_trait]
impl RecordLister for MemoryStore {
    async fn list_keys(&self) -> Result<Vec<RecordKey>> {
        Ok(self.lock_records().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runsync_core::domain::record::{ObjectMeta, PipelineRunSpec};
    use runsync_core::domain::run::EngineRunSpec;

    fn sample_record() -> PipelineRun {
        PipelineRun {
            meta: ObjectMeta {
                namespace: "ci".to_string(),
                name: "build-1".to_string(),
                ..ObjectMeta::default()
            },
            spec: PipelineRunSpec {
                name: "build-1".to_string(),
                pipeline_ref: "tpl-a".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_get_missing_record_is_not_found() {
        let store = MemoryStore::new();
        let err = RecordStore::get(&store, &RecordKey::new("ci", "nope"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_bumps_resource_version() {
        let store = MemoryStore::new();
        store.insert_record(sample_record());

        let mut run = RecordStore::get(&store, &RecordKey::new("ci", "build-1"))
            .await
            .unwrap();
        run.meta.add_finalizer("a");

        let updated = store.update(&run).await.unwrap();
        assert_eq!(updated.meta.resource_version, 2);
    }

    #[tokio::test]
    async fn test_stale_update_conflicts() {
        let store = MemoryStore::new();
        store.insert_record(sample_record());
        let key = RecordKey::new("ci", "build-1");

        let stale = RecordStore::get(&store, &key).await.unwrap();

        // Another writer bumps the version first.
        let mut fresh = stale.clone();
        fresh.meta.add_finalizer("other");
        store.update(&fresh).await.unwrap();

        let err = store.update(&stale).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_removing_last_finalizer_purges_deleting_record() {
        let store = MemoryStore::new();
        let mut record = sample_record();
        record.meta.add_finalizer("a");
        store.insert_record(record);

        let key = RecordKey::new("ci", "build-1");
        store.mark_deleted(&key);

        let mut run = RecordStore::get(&store, &key).await.unwrap();
        run.meta.remove_finalizer("a");
        store.update(&run).await.unwrap();

        assert!(store.record(&key).is_none());
    }

    #[tokio::test]
    async fn test_mark_deleted_without_finalizers_purges_immediately() {
        let store = MemoryStore::new();
        store.insert_record(sample_record());

        let key = RecordKey::new("ci", "build-1");
        store.mark_deleted(&key);

        assert!(store.record(&key).is_none());
    }

    #[tokio::test]
    async fn test_create_engine_run_twice_already_exists() {
        let store = MemoryStore::new();
        let run = EngineRun {
            namespace: "ci".to_string(),
            name: "build-1".to_string(),
            spec: EngineRunSpec {
                pipeline_ref: "tpl-a".to_string(),
            },
        };

        store.create(&run).await.unwrap();
        let err = store.create(&run).await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_delete_missing_engine_run_is_not_found() {
        let store = MemoryStore::new();
        let err = EngineRunStore::delete(&store, &RecordKey::new("ci", "nope"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
