//! Iterative b0 template construction.

mod average;
mod builder;

pub(crate) use builder::tag_iteration;

pub use average::normalized_average;
pub use builder::{build_template, IterationState, TemplateConfig, TemplateResult};
