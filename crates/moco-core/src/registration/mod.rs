//! Registration engine adapter: the seam to an external pairwise registration
//! engine, parameter profiles, and the in-process resampler shared by the
//! iteration loops.

pub mod centroid;
mod engine;
mod profile;
mod resample;

pub use centroid::CentroidEngine;
pub use engine::{Registration, RegistrationEngine};
pub use profile::{ProfileSchedule, RegistrationProfile, TransformModel};
pub use resample::{resample, trilinear_sample};
