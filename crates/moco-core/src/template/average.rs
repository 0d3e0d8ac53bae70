use ndarray::Array3;

use crate::consts::EPSILON;
use crate::error::{MocoError, Result};
use crate::volume::Volume;

/// Unbiased voxelwise average of a set of volumes.
///
/// Each volume is scaled to unit mean intensity before averaging so that no
/// single acquisition dominates the template. All volumes must share a grid;
/// the result takes the first volume's affine.
pub fn normalized_average(volumes: &[Volume]) -> Result<Volume> {
    if volumes.is_empty() {
        return Err(MocoError::EmptySequence);
    }

    let dim = volumes[0].dim();
    let n = volumes.len() as f32;

    let mut sum = Array3::<f32>::zeros(dim);
    for volume in volumes {
        if volume.dim() != dim {
            return Err(MocoError::DimensionMismatch {
                expected: dim,
                actual: volume.dim(),
            });
        }
        let mean = volume.mean();
        if mean.abs() > EPSILON {
            sum.scaled_add(1.0 / mean, &volume.data);
        } else {
            sum += &volume.data;
        }
    }

    sum /= n;

    Ok(Volume::new(sum, volumes[0].affine, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Matrix4;
    use ndarray::Array3;

    fn uniform(value: f32) -> Volume {
        Volume::new(
            Array3::from_elem((4, 4, 4), value),
            Matrix4::identity(),
            0,
        )
    }

    #[test]
    fn average_normalizes_intensity() {
        // Two uniform volumes with different brightness both normalize to
        // unit mean, so the average is 1.0 everywhere.
        let result = normalized_average(&[uniform(0.5), uniform(4.0)]).unwrap();
        assert_relative_eq!(result.data[[1, 2, 3]], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn empty_input_fails() {
        assert!(matches!(
            normalized_average(&[]),
            Err(MocoError::EmptySequence)
        ));
    }

    #[test]
    fn mismatched_grid_fails() {
        let a = uniform(1.0);
        let b = Volume::new(Array3::zeros((4, 4, 5)), Matrix4::identity(), 1);
        assert!(matches!(
            normalized_average(&[a, b]),
            Err(MocoError::DimensionMismatch { .. })
        ));
    }
}
