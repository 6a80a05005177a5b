//! Replay pipeline: scenario runner → event channel → dispatcher.

mod orchestrator;
mod stats;

pub use orchestrator::{Pipeline, PipelineConfig};
pub use stats::PipelineStats;
