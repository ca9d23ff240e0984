//! Declarative PipelineRun record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique key of a record: namespace + name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub namespace: String,
    pub name: String,
}

impl RecordKey {
    /// Creates a new record key
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Metadata carried by every declarative record
///
/// `resource_version` is the optimistic-concurrency token: an update sent
/// with a stale version is rejected by the store with a conflict.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub resource_version: u64,
    /// Finalizer markers gating deletion. Membership is set-like even though
    /// the wire format is a flat list.
    #[serde(default)]
    pub finalizers: Vec<String>,
    /// Set by the store when an external actor requests deletion. Once set,
    /// the record only changes through finalizer removal.
    #[serde(default)]
    pub deletion_timestamp: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    /// Whether an external delete request has marked this record for deletion
    pub fn is_deleting(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    /// Whether the given finalizer marker is present
    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers.iter().any(|f| f == finalizer)
    }

    /// Adds the finalizer marker if absent
    ///
    /// Returns `true` if the marker was added, `false` if it was already
    /// present. The membership check keeps insertion exactly-once across
    /// reconciliation retries.
    pub fn add_finalizer(&mut self, finalizer: &str) -> bool {
        if self.has_finalizer(finalizer) {
            return false;
        }
        self.finalizers.push(finalizer.to_string());
        true
    }

    /// Removes the finalizer marker if present
    ///
    /// Returns `true` if the marker was removed, `false` if it was absent.
    pub fn remove_finalizer(&mut self, finalizer: &str) -> bool {
        let before = self.finalizers.len();
        self.finalizers.retain(|f| f != finalizer);
        self.finalizers.len() != before
    }
}

/// Declarative PipelineRun record
///
/// Created by users to request a pipeline execution; the controller keeps
/// exactly one engine run in sync with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub meta: ObjectMeta,
    pub spec: PipelineRunSpec,
}

impl PipelineRun {
    /// Key identifying this record in the store
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.meta.namespace.clone(), self.meta.name.clone())
    }
}

/// User-provided specification of a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunSpec {
    /// Name to give the engine run derived from this record
    pub name: String,
    /// Reference to the pipeline template the engine should execute
    pub pipeline_ref: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_key_display() {
        let key = RecordKey::new("ci", "build-1");
        assert_eq!(key.to_string(), "ci/build-1");
    }

    #[test]
    fn test_add_finalizer_is_exactly_once() {
        let mut meta = ObjectMeta::default();

        assert!(meta.add_finalizer("a"));
        assert!(!meta.add_finalizer("a"));
        assert_eq!(meta.finalizers, vec!["a".to_string()]);
    }

    #[test]
    fn test_remove_finalizer() {
        let mut meta = ObjectMeta::default();
        meta.add_finalizer("a");
        meta.add_finalizer("b");

        assert!(meta.remove_finalizer("a"));
        assert!(!meta.remove_finalizer("a"));
        assert_eq!(meta.finalizers, vec!["b".to_string()]);
    }

    #[test]
    fn test_is_deleting() {
        let mut meta = ObjectMeta::default();
        assert!(!meta.is_deleting());

        meta.deletion_timestamp = Some(Utc::now());
        assert!(meta.is_deleting());
    }
}
