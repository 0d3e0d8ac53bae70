//! Model-based head-motion correction: the iterate/register/average loop
//! driven by per-volume model-predicted targets instead of a shared
//! template.

mod controller;
mod initialize;

pub use controller::{run_model_hmc, HmcLoopConfig, HmcResult};
pub use initialize::nearest_b0_transforms;
