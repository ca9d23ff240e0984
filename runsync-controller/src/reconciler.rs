//! PipelineRun reconciler
//!
//! The state machine keeping one engine run in sync with each declarative
//! PipelineRun record. Each invocation handles a single record key to
//! completion and reports whether the scheduler should requeue it.
//!
//! The machine has two states, chosen by the record's deletion timestamp:
//! - Active: make sure the finalizer marker is persisted, then make sure
//!   the engine run exists.
//! - Deleting: clean up the engine run, then release the finalizer so the
//!   store can purge the record.
//!
//! Every path tolerates spurious re-invocation: creates accept
//! already-exists, deletes accept already-absent, and a record that is gone
//! by the time we look is simply done.

use std::sync::Arc;

use async_trait::async_trait;
use runsync_core::domain::record::{PipelineRun, RecordKey};
use runsync_core::domain::run::EngineRun;
use runsync_store::{self as store, EngineRunStore, RecordStore, StoreError};
use thiserror::Error;
use tracing::{Instrument, debug, error, info, info_span};

use crate::finalizer::{FinalizerManager, PIPELINE_RUN_FINALIZER};
use crate::translate::to_engine_spec;

/// A store failure, annotated with the record key and the operation that
/// failed
#[derive(Debug, Error)]
#[error("{operation} failed for {key}: {source}")]
pub struct ReconcileError {
    /// The operation that failed (e.g. "create engine run")
    pub operation: &'static str,
    /// Key of the record being reconciled
    pub key: RecordKey,
    #[source]
    pub source: StoreError,
}

/// Result of one reconciliation call
///
/// `requeue` asks the scheduler to re-invoke this key later, with backoff.
/// No outcome is ever fatal-and-drop: abandoning a record would leak its
/// engine run or strand its finalizer.
#[derive(Debug)]
pub struct ReconcileOutcome {
    pub requeue: bool,
    pub error: Option<ReconcileError>,
}

impl ReconcileOutcome {
    /// Reconciliation finished; nothing more to do until the record changes
    pub fn ok() -> Self {
        Self {
            requeue: false,
            error: None,
        }
    }

    /// Reconciliation failed; the scheduler should retry this key
    pub fn retry(error: ReconcileError) -> Self {
        Self {
            requeue: true,
            error: Some(error),
        }
    }

    /// Whether this outcome is a clean finish
    pub fn is_ok(&self) -> bool {
        !self.requeue && self.error.is_none()
    }
}

/// What the scheduler should watch on behalf of a reconciler
#[derive(Debug, Clone, Copy)]
pub struct WatchRegistration {
    /// Record kind whose change notifications drive the reconciler
    pub kind: &'static str,
}

/// One idempotent reconciliation step per record-change notification
///
/// The scheduler depends on this trait rather than the concrete
/// [`Reconciler`] so tests can drive it with probes.
#[async_trait]
pub trait Reconcile: Send + Sync + 'static {
    async fn reconcile(&self, key: &RecordKey) -> ReconcileOutcome;
}

/// Reconciles PipelineRun records against the execution engine
pub struct Reconciler {
    records: Arc<dyn RecordStore>,
    engine_runs: Arc<dyn EngineRunStore>,
    finalizers: FinalizerManager,
}

impl Reconciler {
    /// Creates a new reconciler over the given stores
    pub fn new(records: Arc<dyn RecordStore>, engine_runs: Arc<dyn EngineRunStore>) -> Self {
        let finalizers = FinalizerManager::new(Arc::clone(&records));
        Self {
            records,
            engine_runs,
            finalizers,
        }
    }

    /// The record kind this reconciler wants notifications for
    pub fn registration(&self) -> WatchRegistration {
        WatchRegistration {
            kind: "PipelineRun",
        }
    }

    async fn reconcile_key(&self, key: &RecordKey) -> ReconcileOutcome {
        let run = match self.records.get(key).await {
            Ok(run) => run,
            Err(e) if e.is_not_found() => {
                // Already purged; covers manual deletion of the record too.
                debug!("record no longer exists, nothing to do");
                return ReconcileOutcome::ok();
            }
            Err(e) => return self.retry("get record", key, e),
        };

        if run.meta.is_deleting() {
            self.reconcile_deleting(run).await
        } else {
            self.reconcile_active(run).await
        }
    }

    /// Active state: persist the finalizer first, then ensure the engine run
    ///
    /// The ordering matters: if the process crashed after creating the
    /// engine run but before the marker was persisted, a later delete of
    /// the record would orphan the run. A call that had to add the marker
    /// ends there; the persisted update triggers the next notification and
    /// the engine run is created on that call.
    async fn reconcile_active(&self, run: PipelineRun) -> ReconcileOutcome {
        let key = run.key();

        if !run.meta.has_finalizer(PIPELINE_RUN_FINALIZER) {
            return match self.finalizers.ensure_present(run).await {
                Ok(_) => {
                    info!("added finalizer");
                    ReconcileOutcome::ok()
                }
                Err(e) => self.retry("add finalizer", &key, e),
            };
        }

        self.ensure_engine_run(&run).await
    }

    /// Ensures an engine run named after the record's spec exists
    async fn ensure_engine_run(&self, run: &PipelineRun) -> ReconcileOutcome {
        let key = run.key();
        let target = RecordKey::new(run.meta.namespace.clone(), run.spec.name.clone());

        match self.engine_runs.get(&target).await {
            Ok(_) => {
                debug!(run = %target, "engine run already exists");
                return ReconcileOutcome::ok();
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return self.retry("get engine run", &key, e),
        }

        let engine_run = EngineRun {
            namespace: run.meta.namespace.clone(),
            name: run.spec.name.clone(),
            spec: to_engine_spec(&run.spec),
        };

        match self.engine_runs.create(&engine_run).await {
            Ok(_) => {
                info!(run = %target, "created engine run");
                ReconcileOutcome::ok()
            }
            Err(e) if e.is_already_exists() => {
                // Raced with another creator; the run is there, which is all
                // we wanted. Ownership of the name is not checked.
                info!(run = %target, "engine run already exists");
                ReconcileOutcome::ok()
            }
            Err(e) => self.retry("create engine run", &key, e),
        }
    }

    /// Deleting state: clean up the engine run, then release the finalizer
    async fn reconcile_deleting(&self, run: PipelineRun) -> ReconcileOutcome {
        let key = run.key();

        if !run.meta.has_finalizer(PIPELINE_RUN_FINALIZER) {
            debug!("no finalizer present, nothing left to clean up");
            return ReconcileOutcome::ok();
        }

        if let Err(e) = self.cleanup(&run).await {
            // Marker stays in place so the next reconciliation re-attempts
            // the deletion.
            return self.retry("delete engine run", &key, e);
        }

        match self.finalizers.remove(run).await {
            Ok(_) => {
                info!("removed finalizer");
                ReconcileOutcome::ok()
            }
            Err(e) => self.retry("remove finalizer", &key, e),
        }
    }

    /// Deletes the engine run derived from a deleting record
    ///
    /// Idempotent: an absent run, whether never created or already removed
    /// by a previous partial attempt, is success. The delete itself is
    /// fire-and-forget; the engine garbage-collects the run's dependents.
    async fn cleanup(&self, run: &PipelineRun) -> store::Result<()> {
        let target = RecordKey::new(run.meta.namespace.clone(), run.spec.name.clone());

        match self.engine_runs.get(&target).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                debug!(run = %target, "engine run absent, cleanup already done");
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        match self.engine_runs.delete(&target).await {
            Ok(()) => {
                info!(run = %target, "deleted engine run");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                // Vanished between lookup and delete; same as absent.
                debug!(run = %target, "engine run already gone");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn retry(&self, operation: &'static str, key: &RecordKey, source: StoreError) -> ReconcileOutcome {
        let err = ReconcileError {
            operation,
            key: key.clone(),
            source,
        };
        error!("{err}");
        ReconcileOutcome::retry(err)
    }
}

#[async_trait]
impl Reconcile for Reconciler {
    /// Runs one reconciliation step for the given record key
    async fn reconcile(&self, key: &RecordKey) -> ReconcileOutcome {
        let span = info_span!(
            "reconcile",
            record.namespace = %key.namespace,
            record.name = %key.name,
        );
        self.reconcile_key(key).instrument(span).await
    }
}
