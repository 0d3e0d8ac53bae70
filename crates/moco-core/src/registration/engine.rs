use crate::error::Result;
use crate::transform::VolumeTransform;
use crate::volume::Volume;

use super::{RegistrationProfile, TransformModel};

/// Output of one pairwise registration: the moving volume resampled into the
/// fixed volume's grid, and the forward transform mapping moving to fixed
/// space.
#[derive(Clone, Debug)]
pub struct Registration {
    pub warped: Volume,
    pub forward: VolumeTransform,
}

/// Uniform interface to a pairwise intensity-based registration engine.
///
/// Implementations must be free of shared mutable scratch state so calls can
/// run concurrently across volumes within an iteration. On failure (including
/// a caller-imposed timeout) they return
/// [`MocoError::RegistrationFailed`](crate::error::MocoError::RegistrationFailed)
/// with the moving volume's index, never a silent identity transform.
pub trait RegistrationEngine: Send + Sync {
    fn register(
        &self,
        moving: &Volume,
        fixed: &Volume,
        model: TransformModel,
        profile: &RegistrationProfile,
    ) -> Result<Registration>;
}
