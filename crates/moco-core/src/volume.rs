use nalgebra::{Matrix4, Vector3};
use ndarray::Array3;

/// A single 3D scalar image volume.
///
/// Voxel values are f32; `affine` maps voxel indices (i, j, k) to world
/// coordinates in millimeters. Volumes are immutable once ingested; resampling
/// produces new volumes.
#[derive(Clone, Debug)]
pub struct Volume {
    /// Voxel data, shape = (nx, ny, nz)
    pub data: Array3<f32>,
    /// Voxel-to-world affine
    pub affine: Matrix4<f64>,
    /// Position in the original acquisition order
    pub index: usize,
}

impl Volume {
    pub fn new(data: Array3<f32>, affine: Matrix4<f64>, index: usize) -> Self {
        Self {
            data,
            affine,
            index,
        }
    }

    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// World coordinates of a voxel index.
    pub fn voxel_to_world(&self, i: f64, j: f64, k: f64) -> Vector3<f64> {
        let p = self.affine * nalgebra::Vector4::new(i, j, k, 1.0);
        Vector3::new(p.x, p.y, p.z)
    }

    /// Mean voxel intensity.
    pub fn mean(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.sum() / self.data.len() as f32
    }
}

/// Diffusion-encoding record for one volume: unit direction and b-value.
#[derive(Clone, Debug, PartialEq)]
pub struct GradientRecord {
    pub bvec: [f64; 3],
    pub bval: f64,
}

impl GradientRecord {
    pub fn new(bvec: [f64; 3], bval: f64) -> Self {
        Self { bvec, bval }
    }

    /// Whether this volume is a b0 (b-value at or below the threshold).
    pub fn is_b0(&self, threshold: f64) -> bool {
        self.bval <= threshold
    }
}

impl Default for GradientRecord {
    fn default() -> Self {
        Self {
            bvec: [0.0, 0.0, 0.0],
            bval: 0.0,
        }
    }
}

/// A diffusion series: volumes paired 1:1 with gradient records by index.
#[derive(Clone, Debug)]
pub struct DwiSeries {
    pub volumes: Vec<Volume>,
    pub gradients: Vec<GradientRecord>,
}

impl DwiSeries {
    pub fn new(
        volumes: Vec<Volume>,
        gradients: Vec<GradientRecord>,
    ) -> crate::error::Result<Self> {
        if volumes.len() != gradients.len() {
            return Err(crate::error::MocoError::InvalidGradients(format!(
                "{} volumes but {} gradient records",
                volumes.len(),
                gradients.len()
            )));
        }
        Ok(Self { volumes, gradients })
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// Indices of volumes whose b-value is at or below the threshold.
    pub fn b0_indices_at(&self, threshold: f64) -> Vec<usize> {
        self.gradients
            .iter()
            .enumerate()
            .filter(|(_, g)| g.is_b0(threshold))
            .map(|(i, _)| i)
            .collect()
    }
}

/// Interpretable motion parameters decomposed from one transform.
///
/// Rotations are in degrees, translations in millimeters, scale and shear
/// dimensionless. Derived data only; the transform remains the source of
/// truth.
#[derive(Clone, Debug, PartialEq)]
pub struct MotionRecord {
    pub scale: [f64; 3],
    pub shear: [f64; 3],
    pub rotation: [f64; 3],
    pub translation: [f64; 3],
}

impl MotionRecord {
    /// The motion parameters of an identity transform.
    pub fn identity() -> Self {
        Self {
            scale: [1.0, 1.0, 1.0],
            shear: [0.0, 0.0, 0.0],
            rotation: [0.0, 0.0, 0.0],
            translation: [0.0, 0.0, 0.0],
        }
    }

    /// Parameters in confound-table column order:
    /// scale xyz, shear xy/xz/yz, rotation xyz, translation xyz.
    pub fn as_row(&self) -> [f64; 12] {
        [
            self.scale[0],
            self.scale[1],
            self.scale[2],
            self.shear[0],
            self.shear[1],
            self.shear[2],
            self.rotation[0],
            self.rotation[1],
            self.rotation[2],
            self.translation[0],
            self.translation[1],
            self.translation[2],
        ]
    }
}

/// Outlier decision for one volume, produced on the final HMC iteration.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OutlierFlag {
    pub flagged: bool,
    /// Standardized residual score (z-score across volumes).
    pub score: f64,
}
