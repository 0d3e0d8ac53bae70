use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use nalgebra::Matrix4;
use ndarray::Array3;

use moco_core::error::{MocoError, Result};
use moco_core::registration::{Registration, RegistrationEngine, RegistrationProfile, TransformModel};
use moco_core::transform::VolumeTransform;
use moco_core::volume::{DwiSeries, GradientRecord, Volume};

/// A Gaussian blob centered at a voxel position; the standard synthetic
/// volume for alignment tests.
pub fn blob_volume(
    dim: (usize, usize, usize),
    center: (f64, f64, f64),
    index: usize,
) -> Volume {
    let sigma2 = 4.0;
    let data = Array3::from_shape_fn(dim, |(i, j, k)| {
        let d2 = (i as f64 - center.0).powi(2)
            + (j as f64 - center.1).powi(2)
            + (k as f64 - center.2).powi(2);
        (100.0 * (-d2 / (2.0 * sigma2)).exp()) as f32
    });
    Volume::new(data, Matrix4::identity(), index)
}

/// A volume filled with a single value.
pub fn uniform_volume(dim: (usize, usize, usize), value: f32, index: usize) -> Volume {
    Volume::new(Array3::from_elem(dim, value), Matrix4::identity(), index)
}

/// An all-ones mask covering the whole grid.
pub fn full_mask(dim: (usize, usize, usize)) -> Volume {
    uniform_volume(dim, 1.0, 0)
}

pub fn gradient(bval: f64) -> GradientRecord {
    let bvec = if bval > 0.0 { [1.0, 0.0, 0.0] } else { [0.0; 3] };
    GradientRecord::new(bvec, bval)
}

/// A series of uniform volumes with the given b-values; value = bval scaled
/// so b0s and diffusion-weighted volumes are distinguishable.
pub fn uniform_series(dim: (usize, usize, usize), bvals: &[f64]) -> DwiSeries {
    let volumes: Vec<Volume> = bvals
        .iter()
        .enumerate()
        .map(|(i, &b)| uniform_volume(dim, (100.0 - b / 100.0) as f32, i))
        .collect();
    let gradients = bvals.iter().map(|&b| gradient(b)).collect();
    DwiSeries::new(volumes, gradients).unwrap()
}

/// Engine stub that records every call and returns identity transforms.
///
/// `fail_index` makes registration of that moving volume fail, exercising
/// the iteration barrier.
pub struct RecordingEngine {
    pub calls: AtomicUsize,
    /// (moving volume index, multi-resolution level count) per call.
    pub log: Mutex<Vec<(usize, usize)>>,
    pub fail_index: Option<usize>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            log: Mutex::new(Vec::new()),
            fail_index: None,
        }
    }

    pub fn failing_on(index: usize) -> Self {
        Self {
            fail_index: Some(index),
            ..Self::new()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RegistrationEngine for RecordingEngine {
    fn register(
        &self,
        moving: &Volume,
        _fixed: &Volume,
        _model: TransformModel,
        profile: &RegistrationProfile,
    ) -> Result<Registration> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log
            .lock()
            .unwrap()
            .push((moving.index, profile.shrink_factors.len()));

        if self.fail_index == Some(moving.index) {
            return Err(MocoError::RegistrationFailed {
                volume: moving.index,
                iteration: 0,
                reason: "stub failure".into(),
            });
        }

        Ok(Registration {
            warped: moving.clone(),
            forward: VolumeTransform::identity(0),
        })
    }
}
