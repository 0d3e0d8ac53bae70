//! Centroid (center-of-gravity) registration engine.
//!
//! Estimates the translation between the intensity-weighted centers of mass
//! of the moving and fixed volumes in world coordinates. Fast, naturally
//! sub-voxel, and free of scratch state, which makes it a usable default
//! engine and the reference implementation behind the
//! [`RegistrationEngine`] seam. Heavier engines plug in behind the same
//! trait.

use nalgebra::Vector3;

use crate::consts::DEFAULT_CENTROID_THRESHOLD;
use crate::error::Result;
use crate::transform::VolumeTransform;
use crate::volume::Volume;

use super::{resample, Registration, RegistrationEngine, RegistrationProfile, TransformModel};

/// Moments-based registration engine.
///
/// Only the translation component is estimated, regardless of the requested
/// transform model; the rotation/scale parts of the forward transform stay
/// identity.
#[derive(Clone, Debug)]
pub struct CentroidEngine {
    /// Voxels below `threshold * max_intensity` are excluded from the
    /// centroid.
    pub threshold: f32,
}

impl Default for CentroidEngine {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_CENTROID_THRESHOLD,
        }
    }
}

impl RegistrationEngine for CentroidEngine {
    fn register(
        &self,
        moving: &Volume,
        fixed: &Volume,
        _model: TransformModel,
        _profile: &RegistrationProfile,
    ) -> Result<Registration> {
        let c_moving = world_centroid(moving, self.threshold);
        let c_fixed = world_centroid(fixed, self.threshold);

        let forward = VolumeTransform::from_translation(c_fixed - c_moving, 0);
        let warped = resample(moving, &forward, fixed)?;

        Ok(Registration { warped, forward })
    }
}

/// Intensity-weighted center of mass in world coordinates.
///
/// An all-zero volume yields its geometric center.
fn world_centroid(volume: &Volume, threshold: f32) -> Vector3<f64> {
    let (nx, ny, nz) = volume.dim();
    let max_val = volume.data.iter().cloned().fold(f32::NEG_INFINITY, f32::max);

    let center = volume.voxel_to_world(
        (nx as f64 - 1.0) / 2.0,
        (ny as f64 - 1.0) / 2.0,
        (nz as f64 - 1.0) / 2.0,
    );
    if max_val <= 0.0 {
        return center;
    }

    let cutoff = threshold * max_val;
    let mut sum = Vector3::zeros();
    let mut total = 0.0f64;

    for ((i, j, k), &val) in volume.data.indexed_iter() {
        if val > cutoff {
            let w = val as f64;
            sum += volume.voxel_to_world(i as f64, j as f64, k as f64) * w;
            total += w;
        }
    }

    if total > 0.0 {
        sum / total
    } else {
        center
    }
}
