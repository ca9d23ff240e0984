//! Engine run types
//!
//! The execution resource derived from a declarative record. The engine
//! owns everything that happens after creation; this controller only
//! creates and deletes these.

use serde::{Deserialize, Serialize};

use crate::domain::record::RecordKey;

/// Execution resource managed by the pipeline-execution engine
///
/// Named after the declarative record's `spec.name`, in the record's
/// namespace. At most one exists per record; it is never updated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineRun {
    pub namespace: String,
    pub name: String,
    pub spec: EngineRunSpec,
}

impl EngineRun {
    /// Key identifying this run in the engine's store
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.namespace.clone(), self.name.clone())
    }
}

/// Minimal specification the engine needs to start execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineRunSpec {
    /// Reference to the pipeline template to execute
    pub pipeline_ref: String,
}
