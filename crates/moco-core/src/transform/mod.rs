//! Rigid/affine 3D transform algebra: composition, inversion, averaging, and
//! decomposition into interpretable motion parameters.

mod affine;
mod decompose;
mod history;

pub use affine::{mean_transform, TransformRole, VolumeTransform};
pub use decompose::{decompose, decompose_with_epsilon};
pub use history::TransformHistory;
