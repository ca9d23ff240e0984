//! Translation from declarative specs to engine run specs

use runsync_core::domain::record::PipelineRunSpec;
use runsync_core::domain::run::EngineRunSpec;

/// Maps a declarative spec to the minimal engine run spec needed to start
/// execution
///
/// Only the pipeline reference is carried over; resolving the referenced
/// template is the engine's job.
pub fn to_engine_spec(spec: &PipelineRunSpec) -> EngineRunSpec {
    EngineRunSpec {
        pipeline_ref: spec.pipeline_ref.clone(),
    }
}
