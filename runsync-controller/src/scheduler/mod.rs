//! Scheduler runtime
//!
//! Level-triggered driving of the reconciler: the watcher feeds record keys
//! in, the keyed scheduler dispatches them to reconciliation tasks. The
//! scheduler guarantees that no two reconciliations for the same key run
//! concurrently while letting distinct keys proceed in parallel, and owns
//! all retry timing — the reconciler itself never sleeps or backs off.

pub mod watcher;

pub use watcher::PollWatcher;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use runsync_core::domain::record::RecordKey;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::reconciler::{Reconcile, WatchRegistration};

/// Exponential backoff for requeued keys
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Delay before the first retry
    pub initial: Duration,
    /// Cap applied to the doubled delay
    pub max: Duration,
}

impl BackoffPolicy {
    /// Delay before the given retry attempt (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let doubled = self
            .initial
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        doubled.min(self.max)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
        }
    }
}

enum Event {
    Notify(RecordKey),
    Done { key: RecordKey, requeue: bool },
}

/// Handle for feeding change notifications to the scheduler
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::UnboundedSender<Event>,
}

impl SchedulerHandle {
    /// Enqueues a record key for reconciliation
    ///
    /// Notifications for a key that is already queued or in flight coalesce
    /// into a single later pass, which is safe because reconciliation is
    /// level-triggered and idempotent.
    pub fn enqueue(&self, key: RecordKey) {
        let _ = self.tx.send(Event::Notify(key));
    }
}

/// Dispatches reconciliations, serialized per record key
pub struct KeyedScheduler {
    reconciler: Arc<dyn Reconcile>,
    backoff: BackoffPolicy,
    tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
    in_flight: HashSet<RecordKey>,
    pending: HashSet<RecordKey>,
    retries: HashMap<RecordKey, u32>,
}

impl KeyedScheduler {
    /// Creates a scheduler driving the given reconciler
    pub fn new(reconciler: Arc<dyn Reconcile>, backoff: BackoffPolicy) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            reconciler,
            backoff,
            tx,
            rx,
            in_flight: HashSet::new(),
            pending: HashSet::new(),
            retries: HashMap::new(),
        }
    }

    /// Records which kind of resource drives this scheduler
    pub fn register(&self, registration: WatchRegistration) {
        info!(kind = registration.kind, "registered reconciler");
    }

    /// Returns a handle for enqueueing keys
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            tx: self.tx.clone(),
        }
    }

    /// Runs the dispatch loop
    ///
    /// Never returns under normal operation: the scheduler holds a sender
    /// itself, so the channel stays open for completion events.
    pub async fn run(mut self) {
        while let Some(event) = self.rx.recv().await {
            match event {
                Event::Notify(key) => self.dispatch(key),
                Event::Done { key, requeue } => self.complete(key, requeue),
            }
        }
    }

    fn dispatch(&mut self, key: RecordKey) {
        if self.in_flight.contains(&key) {
            // Coalesce: one more pass after the current one finishes.
            self.pending.insert(key);
            return;
        }

        self.in_flight.insert(key.clone());
        let reconciler = Arc::clone(&self.reconciler);
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let outcome = reconciler.reconcile(&key).await;
            let _ = tx.send(Event::Done {
                key,
                requeue: outcome.requeue,
            });
        });
    }

    fn complete(&mut self, key: RecordKey, requeue: bool) {
        self.in_flight.remove(&key);

        if requeue {
            // A retry subsumes any coalesced notification.
            self.pending.remove(&key);

            let attempt = self.retries.entry(key.clone()).or_insert(0);
            *attempt += 1;
            let delay = self.backoff.delay(*attempt);
            warn!(record = %key, attempt, ?delay, "requeueing after backoff");

            let tx = self.tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = tx.send(Event::Notify(key));
            });
            return;
        }

        self.retries.remove(&key);
        if self.pending.remove(&key) {
            debug!(record = %key, "running coalesced pass");
            self.dispatch(key);
        }
    }
}
