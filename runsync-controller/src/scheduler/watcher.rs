//! Poll watcher
//!
//! Level-triggered notification source: periodically lists all record keys
//! and enqueues every one of them. Spurious wake-ups for unchanged records
//! are expected and absorbed by the reconciler's idempotence.

use std::sync::Arc;
use std::time::Duration;

use runsync_store::RecordLister;
use tokio::time;
use tracing::{debug, error};

use super::SchedulerHandle;

/// Periodically resyncs every known record through the scheduler
pub struct PollWatcher {
    lister: Arc<dyn RecordLister>,
    scheduler: SchedulerHandle,
    interval: Duration,
}

impl PollWatcher {
    /// Creates a new poll watcher
    pub fn new(lister: Arc<dyn RecordLister>, scheduler: SchedulerHandle, interval: Duration) -> Self {
        Self {
            lister,
            scheduler,
            interval,
        }
    }

    /// Runs the resync loop
    ///
    /// A failed list is logged and retried on the next tick; the scheduler
    /// keeps whatever state it already has in the meantime.
    pub async fn run(self) {
        let mut ticker = time::interval(self.interval);

        loop {
            ticker.tick().await;

            match self.lister.list_keys().await {
                Ok(keys) => {
                    debug!(count = keys.len(), "resyncing records");
                    for key in keys {
                        self.scheduler.enqueue(key);
                    }
                }
                Err(e) => {
                    error!("failed to list records: {e}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::{Reconcile, Reconciler};
    use crate::scheduler::{BackoffPolicy, KeyedScheduler};
    use runsync_core::domain::record::{ObjectMeta, PipelineRun, PipelineRunSpec, RecordKey};
    use runsync_store::{EngineRunStore, MemoryStore, RecordStore};

    fn record(namespace: &str, name: &str, pipeline_ref: &str) -> PipelineRun {
        PipelineRun {
            meta: ObjectMeta {
                namespace: namespace.to_string(),
                name: name.to_string(),
                ..ObjectMeta::default()
            },
            spec: PipelineRunSpec {
                name: name.to_string(),
                pipeline_ref: pipeline_ref.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_watcher_drives_records_to_engine_runs() {
        let store = Arc::new(MemoryStore::new());
        store.insert_record(record("ci", "build-1", "tpl-a"));
        store.insert_record(record("ci", "build-2", "tpl-b"));

        let reconciler: Arc<dyn Reconcile> = Arc::new(Reconciler::new(
            Arc::clone(&store) as Arc<dyn RecordStore>,
            Arc::clone(&store) as Arc<dyn EngineRunStore>,
        ));
        let scheduler = KeyedScheduler::new(reconciler, BackoffPolicy::default());
        let handle = scheduler.handle();
        let scheduler_task = tokio::spawn(scheduler.run());

        let watcher = PollWatcher::new(
            Arc::clone(&store) as Arc<dyn RecordLister>,
            handle,
            Duration::from_millis(5),
        );
        let watcher_task = tokio::spawn(watcher.run());

        // First pass adds finalizers, second creates the runs.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while store.engine_run_count() < 2 {
            assert!(
                tokio::time::Instant::now() < deadline,
                "engine runs were never created"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(store.engine_run(&RecordKey::new("ci", "build-1")).is_some());
        assert!(store.engine_run(&RecordKey::new("ci", "build-2")).is_some());

        watcher_task.abort();
        scheduler_task.abort();
    }
}
