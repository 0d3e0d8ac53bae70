use nalgebra::{Matrix3, Matrix4, Vector3};

use crate::consts::DEFAULT_DET_EPSILON;
use crate::error::{MocoError, Result};

/// Whether a transform maps moving to fixed space (forward) or the reverse.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransformRole {
    Forward,
    Inverse,
}

/// A 3D affine transform between two volume spaces.
///
/// The matrix is a homogeneous 4x4 operating on world coordinates. Carries
/// the iteration that produced it and its direction as metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct VolumeTransform {
    pub matrix: Matrix4<f64>,
    pub iteration: usize,
    pub role: TransformRole,
}

impl VolumeTransform {
    pub fn new(matrix: Matrix4<f64>, iteration: usize, role: TransformRole) -> Self {
        Self {
            matrix,
            iteration,
            role,
        }
    }

    pub fn identity(iteration: usize) -> Self {
        Self::new(Matrix4::identity(), iteration, TransformRole::Forward)
    }

    /// A pure translation transform.
    pub fn from_translation(t: Vector3<f64>, iteration: usize) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 3)] = t.x;
        m[(1, 3)] = t.y;
        m[(2, 3)] = t.z;
        Self::new(m, iteration, TransformRole::Forward)
    }

    /// The 3x3 linear part (rotation/scale/shear).
    pub fn linear(&self) -> Matrix3<f64> {
        self.matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// The translation part.
    pub fn translation(&self) -> Vector3<f64> {
        Vector3::new(self.matrix[(0, 3)], self.matrix[(1, 3)], self.matrix[(2, 3)])
    }

    /// Apply a point through this transform.
    pub fn apply(&self, p: Vector3<f64>) -> Vector3<f64> {
        let q = self.matrix * nalgebra::Vector4::new(p.x, p.y, p.z, 1.0);
        Vector3::new(q.x, q.y, q.z)
    }

    /// Compose with another transform: the result applies `other` first, then
    /// `self`.
    pub fn compose(&self, other: &VolumeTransform) -> VolumeTransform {
        VolumeTransform::new(self.matrix * other.matrix, self.iteration, self.role)
    }

    /// Invert this transform.
    ///
    /// Fails with [`MocoError::SingularTransform`] when the determinant of the
    /// linear part is below the default epsilon.
    pub fn invert(&self) -> Result<VolumeTransform> {
        self.invert_with_epsilon(DEFAULT_DET_EPSILON)
    }

    pub fn invert_with_epsilon(&self, epsilon: f64) -> Result<VolumeTransform> {
        let det = self.linear().determinant();
        if det.abs() < epsilon {
            return Err(MocoError::SingularTransform { determinant: det });
        }
        let inverse = self
            .matrix
            .try_inverse()
            .ok_or(MocoError::SingularTransform { determinant: det })?;
        let role = match self.role {
            TransformRole::Forward => TransformRole::Inverse,
            TransformRole::Inverse => TransformRole::Forward,
        };
        Ok(VolumeTransform::new(inverse, self.iteration, role))
    }
}

/// Element-wise mean of a set of transforms.
///
/// Used to recenter the template: the inverse of the mean forward transform
/// removes the net bias accumulated by the group.
pub fn mean_transform(transforms: &[VolumeTransform]) -> Result<VolumeTransform> {
    if transforms.is_empty() {
        return Err(MocoError::EmptySequence);
    }
    let mut sum = Matrix4::<f64>::zeros();
    for t in transforms {
        sum += t.matrix;
    }
    let mean = sum / transforms.len() as f64;
    Ok(VolumeTransform::new(
        mean,
        transforms[0].iteration,
        TransformRole::Forward,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn compose_applies_right_then_left() {
        let a = VolumeTransform::from_translation(Vector3::new(1.0, 0.0, 0.0), 0);
        let mut m = Matrix4::identity();
        m[(0, 0)] = 2.0;
        let b = VolumeTransform::new(m, 0, TransformRole::Forward);

        // a ∘ b: scale first, then translate
        let c = a.compose(&b);
        let p = c.apply(Vector3::new(3.0, 0.0, 0.0));
        assert_relative_eq!(p.x, 7.0, epsilon = 1e-12);
    }

    #[test]
    fn invert_round_trip() {
        let t = VolumeTransform::from_translation(Vector3::new(1.5, -2.0, 0.5), 2);
        let inv = t.invert().unwrap();
        assert_eq!(inv.role, TransformRole::Inverse);
        let round = t.compose(&inv);
        assert_relative_eq!(round.matrix, Matrix4::identity(), epsilon = 1e-12);
    }

    #[test]
    fn invert_singular_fails() {
        let mut m = Matrix4::identity();
        m[(0, 0)] = 0.0;
        let t = VolumeTransform::new(m, 0, TransformRole::Forward);
        assert!(matches!(
            t.invert(),
            Err(MocoError::SingularTransform { .. })
        ));
    }

    #[test]
    fn mean_of_translations() {
        let a = VolumeTransform::from_translation(Vector3::new(2.0, 0.0, 0.0), 0);
        let b = VolumeTransform::from_translation(Vector3::new(0.0, 2.0, 0.0), 0);
        let mean = mean_transform(&[a, b]).unwrap();
        assert_relative_eq!(mean.translation().x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(mean.translation().y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn mean_of_empty_fails() {
        assert!(mean_transform(&[]).is_err());
    }
}
