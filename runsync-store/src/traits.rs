//! Store traits
//!
//! The boundary contract between the reconciler and whatever actually
//! persists records and engine runs. The reconciler depends on
//! [`RecordStore`] and [`EngineRunStore`] only; [`RecordLister`] exists for
//! the poll watcher and is deliberately kept out of the reconciler's reach.

use async_trait::async_trait;
use runsync_core::domain::record::{PipelineRun, RecordKey};
use runsync_core::domain::run::EngineRun;

use crate::error::Result;

/// Read/write access to declarative PipelineRun records
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetches a record by key
    ///
    /// Returns [`StoreError::NotFound`](crate::StoreError::NotFound) if the
    /// record does not exist (or was already purged).
    async fn get(&self, key: &RecordKey) -> Result<PipelineRun>;

    /// Persists a record's metadata
    ///
    /// Fails with [`StoreError::Conflict`](crate::StoreError::Conflict) if
    /// the record's resource version is stale; safe to retry after a
    /// re-fetch. Returns the stored record with its new resource version.
    async fn update(&self, run: &PipelineRun) -> Result<PipelineRun>;
}

/// Create/delete access to the engine's run resources
///
/// There is intentionally no update operation: spec drift on an existing
/// engine run is never corrected, matching the engine's conventions.
#[async_trait]
pub trait EngineRunStore: Send + Sync {
    /// Fetches an engine run by key
    async fn get(&self, key: &RecordKey) -> Result<EngineRun>;

    /// Creates an engine run
    ///
    /// Fails with
    /// [`StoreError::AlreadyExists`](crate::StoreError::AlreadyExists) if a
    /// run with that name already exists in the namespace.
    async fn create(&self, run: &EngineRun) -> Result<EngineRun>;

    /// Deletes an engine run
    ///
    /// Fire-and-forget: success means the delete was accepted, not that the
    /// run and its dependents are gone. Returns
    /// [`StoreError::NotFound`](crate::StoreError::NotFound) if the run was
    /// already absent; callers in cleanup paths treat that as success.
    async fn delete(&self, key: &RecordKey) -> Result<()>;
}

/// Listing of record keys, for level-triggered watch loops
#[async_trait]
pub trait RecordLister: Send + Sync {
    /// Lists the keys of all records across namespaces
    async fn list_keys(&self) -> Result<Vec<RecordKey>>;
}
