//! Runsync store adapters
//!
//! Read/write access to declarative PipelineRun records and to the
//! execution engine's run resources. The controller core only ever sees
//! the traits defined here; the concrete adapters are:
//!
//! - [`HttpStore`]: REST adapter for a remote record/engine API
//! - [`MemoryStore`]: in-process double with real conflict semantics, used
//!   by tests and local runs
//!
//! All stores are trait-based to enable testing and mocking.

pub mod error;
mod http;
mod memory;
mod traits;

// Re-export traits
pub use traits::{EngineRunStore, RecordLister, RecordStore};

// Re-export implementations
pub use http::HttpStore;
pub use memory::MemoryStore;

pub use error::{Result, StoreError};
