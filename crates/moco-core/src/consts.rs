/// Determinant magnitude below which a transform's linear part is treated as
/// singular.
pub const DEFAULT_DET_EPSILON: f64 = 1e-10;

/// Minimum volume count to use volume-level Rayon parallelism.
pub const PARALLEL_VOLUME_THRESHOLD: usize = 4;

/// Minimum voxel count (x*y*z) to use slice-level Rayon parallelism during
/// resampling.
pub const PARALLEL_VOXEL_THRESHOLD: usize = 65_536;

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f32 = 1e-10;

/// b-values at or below this threshold (s/mm^2) classify a volume as b0.
pub const DEFAULT_B0_THRESHOLD: f64 = 100.0;

/// Default iteration budget for the b0 template-convergence loop.
pub const DEFAULT_TEMPLATE_ITERATIONS: usize = 3;

/// Default iteration budget for the model-based HMC loop.
pub const DEFAULT_HMC_ITERATIONS: usize = 2;

/// Default residual threshold (standard deviations) for outlier flagging.
/// 0 disables flagging.
pub const DEFAULT_OUTLIER_THRESHOLD: f64 = 0.0;

/// b-values within this distance (s/mm^2) of a shell center belong to that
/// shell when grouping gradients.
pub const DEFAULT_SHELL_TOLERANCE: f64 = 50.0;

/// Default intensity threshold for centroid registration (fraction of max
/// intensity).
pub const DEFAULT_CENTROID_THRESHOLD: f32 = 0.1;

/// Mask voxels above this value count as brain.
pub const MASK_THRESHOLD: f32 = 0.5;
