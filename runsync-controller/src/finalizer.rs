//! Finalizer management
//!
//! Maintains the controller's finalizer marker on declarative records. The
//! marker gates deletion: the store only purges a deleting record once its
//! finalizer list is empty, so the marker must stay in place until the
//! engine run has been cleaned up.

use std::sync::Arc;

use runsync_core::domain::record::{ObjectMeta, PipelineRun};
use runsync_store::{RecordStore, Result};
use tracing::debug;

/// Finalizer marker this controller owns on PipelineRun records
pub const PIPELINE_RUN_FINALIZER: &str = "pipelinerun.runsync.io/finalizer";

/// How many times a conflicted update is re-fetched and re-applied before
/// the conflict is surfaced to the caller
const MAX_CONFLICT_RETRIES: u32 = 3;

/// Adds and removes the controller's finalizer marker, persisting through
/// the record store
pub struct FinalizerManager {
    records: Arc<dyn RecordStore>,
}

impl FinalizerManager {
    /// Creates a new finalizer manager
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    /// Ensures the finalizer marker is present and persisted
    ///
    /// Returns the record as stored, whether or not a write was needed.
    /// Insertion is exactly-once: a marker that is already present is never
    /// duplicated, no matter how often this is retried.
    pub async fn ensure_present(&self, run: PipelineRun) -> Result<PipelineRun> {
        self.persist(run, |meta| meta.add_finalizer(PIPELINE_RUN_FINALIZER))
            .await
    }

    /// Removes the finalizer marker and persists the record
    ///
    /// Once persisted, the store is free to purge the record.
    pub async fn remove(&self, run: PipelineRun) -> Result<PipelineRun> {
        self.persist(run, |meta| meta.remove_finalizer(PIPELINE_RUN_FINALIZER))
            .await
    }

    /// Applies a metadata mutation and persists it, re-fetching and
    /// re-applying on conflict
    ///
    /// The retry loop is bounded and never sleeps; an exhausted conflict
    /// bubbles up for the caller to surface as a retryable outcome.
    async fn persist<F>(&self, mut run: PipelineRun, apply: F) -> Result<PipelineRun>
    where
        F: Fn(&mut ObjectMeta) -> bool,
    {
        let mut attempts = 0;
        loop {
            if !apply(&mut run.meta) {
                // Already in the desired state, nothing to persist.
                return Ok(run);
            }

            match self.records.update(&run).await {
                Ok(updated) => return Ok(updated),
                Err(e) if e.is_conflict() => {
                    attempts += 1;
                    if attempts >= MAX_CONFLICT_RETRIES {
                        return Err(e);
                    }
                    debug!(record = %run.key(), attempts, "update conflicted, re-fetching");
                    run = self.records.get(&run.key()).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runsync_core::domain::record::{ObjectMeta, PipelineRunSpec, RecordKey};
    use runsync_store::MemoryStore;

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

    fn manager_over(store: &Arc<MemoryStore>) -> FinalizerManager {
        FinalizerManager::new(Arc::clone(store) as Arc<dyn RecordStore>)
    }

    #[tokio::test]
    async fn test_ensure_present_persists_marker() {
        let store = Arc::new(MemoryStore::new());
        store.insert_record(sample_record());
        let manager = manager_over(&store);

        let run = store.record(&RecordKey::new("ci", "build-1")).unwrap();
        let updated = manager.ensure_present(run).await.unwrap();

        assert!(updated.meta.has_finalizer(PIPELINE_RUN_FINALIZER));
        let stored = store.record(&RecordKey::new("ci", "build-1")).unwrap();
        assert!(stored.meta.has_finalizer(PIPELINE_RUN_FINALIZER));
    }

    #[tokio::test]
    async fn test_ensure_present_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        store.insert_record(sample_record());
        let manager = manager_over(&store);

        let run = store.record(&RecordKey::new("ci", "build-1")).unwrap();
        let run = manager.ensure_present(run).await.unwrap();
        let run = manager.ensure_present(run).await.unwrap();

        assert_eq!(run.meta.finalizers, vec![PIPELINE_RUN_FINALIZER]);
    }

    #[tokio::test]
    async fn test_remove_persists_and_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let mut record = sample_record();
        record.meta.add_finalizer(PIPELINE_RUN_FINALIZER);
        store.insert_record(record);
        let manager = manager_over(&store);

        let run = store.record(&RecordKey::new("ci", "build-1")).unwrap();
        let run = manager.remove(run).await.unwrap();
        assert!(!run.meta.has_finalizer(PIPELINE_RUN_FINALIZER));

        // A second removal is a no-op, not an error.
        let run = manager.remove(run).await.unwrap();
        assert!(run.meta.finalizers.is_empty());
    }

    #[tokio::test]
    async fn test_conflicted_update_is_refetched_and_reapplied() {
        let store = Arc::new(MemoryStore::new());
        store.insert_record(sample_record());
        let manager = manager_over(&store);

        let key = RecordKey::new("ci", "build-1");
        let stale = store.record(&key).unwrap();

        // Another writer bumps the version behind our back.
        let mut fresh = stale.clone();
        fresh.meta.add_finalizer("someone-else");
        RecordStore::update(store.as_ref(), &fresh).await.unwrap();

        let updated = manager.ensure_present(stale).await.unwrap();
        assert!(updated.meta.has_finalizer(PIPELINE_RUN_FINALIZER));
        assert!(updated.meta.has_finalizer("someone-else"));
    }
}
