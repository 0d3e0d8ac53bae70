pub mod gradients;
pub mod nifti;
pub mod transforms;
