pub mod config;
mod orchestrator;
pub mod types;

pub use config::MocoConfig;
pub use orchestrator::{run_pipeline, run_pipeline_reported, PipelineOutput};
