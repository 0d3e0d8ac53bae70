//! Decomposition of an affine transform into interpretable motion parameters.
//!
//! Fixed order: scale, shear, rotation, translation. All callers use this
//! order so motion tables are comparable run-to-run.

use nalgebra::{Matrix3, Vector3};

use crate::consts::DEFAULT_DET_EPSILON;
use crate::error::{MocoError, Result};
use crate::volume::MotionRecord;

use super::VolumeTransform;

/// Decompose a transform into scale, shear, rotation (degrees), and
/// translation (millimeters).
///
/// Fails with [`MocoError::SingularTransform`] when the linear part has a
/// near-zero determinant. Callers must treat that as a fatal registration
/// failure for the affected volume.
pub fn decompose(t: &VolumeTransform) -> Result<MotionRecord> {
    decompose_with_epsilon(t, DEFAULT_DET_EPSILON)
}

pub fn decompose_with_epsilon(t: &VolumeTransform, epsilon: f64) -> Result<MotionRecord> {
    let linear = t.linear();
    let det = linear.determinant();
    if det.abs() < epsilon {
        return Err(MocoError::SingularTransform { determinant: det });
    }

    // Gram-Schmidt on the columns of the linear part: peels off scale and
    // shear, leaving a pure rotation.
    let mut c0: Vector3<f64> = linear.column(0).into();
    let mut c1: Vector3<f64> = linear.column(1).into();
    let mut c2: Vector3<f64> = linear.column(2).into();

    let mut sx = c0.norm();
    c0 /= sx;

    let sx_sxy = c0.dot(&c1);
    c1 -= c0 * sx_sxy;
    let sy = c1.norm();
    c1 /= sy;
    let sxy = sx_sxy / sx;

    let sx_sxz = c0.dot(&c2);
    let sy_syz = c1.dot(&c2);
    c2 -= c0 * sx_sxz + c1 * sy_syz;
    let sz = c2.norm();
    c2 /= sz;
    let sxz = sx_sxz / sx;
    let syz = sy_syz / sy;

    let mut rotation = Matrix3::from_columns(&[c0, c1, c2]);
    if rotation.determinant() < 0.0 {
        sx = -sx;
        rotation.set_column(0, &(-c0));
    }

    let angles = euler_xyz_degrees(&rotation);
    let translation = t.translation();

    Ok(MotionRecord {
        scale: [sx, sy, sz],
        shear: [sxy, sxz, syz],
        rotation: angles,
        translation: [translation.x, translation.y, translation.z],
    })
}

/// Extract static-frame xyz Euler angles (degrees) from a rotation matrix.
fn euler_xyz_degrees(r: &Matrix3<f64>) -> [f64; 3] {
    let cy = (r[(0, 0)] * r[(0, 0)] + r[(1, 0)] * r[(1, 0)]).sqrt();
    let (ax, ay, az) = if cy > 1e-12 {
        (
            r[(2, 1)].atan2(r[(2, 2)]),
            (-r[(2, 0)]).atan2(cy),
            r[(1, 0)].atan2(r[(0, 0)]),
        )
    } else {
        // Gimbal lock: z angle is unrecoverable, report it as zero.
        (
            (-r[(1, 2)]).atan2(r[(1, 1)]),
            (-r[(2, 0)]).atan2(cy),
            0.0,
        )
    };
    [ax.to_degrees(), ay.to_degrees(), az.to_degrees()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::TransformRole;
    use approx::assert_relative_eq;
    use nalgebra::Matrix4;

    fn rotation_z(degrees: f64) -> Matrix3<f64> {
        let r = degrees.to_radians();
        Matrix3::new(
            r.cos(),
            -r.sin(),
            0.0,
            r.sin(),
            r.cos(),
            0.0,
            0.0,
            0.0,
            1.0,
        )
    }

    fn affine_from(linear: Matrix3<f64>, t: [f64; 3]) -> VolumeTransform {
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&linear);
        m[(0, 3)] = t[0];
        m[(1, 3)] = t[1];
        m[(2, 3)] = t[2];
        VolumeTransform::new(m, 0, TransformRole::Forward)
    }

    #[test]
    fn identity_decomposes_to_identity_motion() {
        let motion = decompose(&VolumeTransform::identity(0)).unwrap();
        assert_eq!(motion, MotionRecord::identity());
    }

    #[test]
    fn recovers_scale_rotation_translation() {
        let scale = Matrix3::from_diagonal(&Vector3::new(1.1, 0.9, 1.2));
        let linear = rotation_z(20.0) * scale;
        let t = affine_from(linear, [3.0, -1.0, 2.5]);

        let motion = decompose(&t).unwrap();
        assert_relative_eq!(motion.scale[0], 1.1, epsilon = 1e-9);
        assert_relative_eq!(motion.scale[1], 0.9, epsilon = 1e-9);
        assert_relative_eq!(motion.scale[2], 1.2, epsilon = 1e-9);
        assert_relative_eq!(motion.rotation[2], 20.0, epsilon = 1e-9);
        assert_relative_eq!(motion.rotation[0], 0.0, epsilon = 1e-9);
        assert_relative_eq!(motion.translation[0], 3.0, epsilon = 1e-12);
        assert_relative_eq!(motion.translation[1], -1.0, epsilon = 1e-12);
        assert_relative_eq!(motion.translation[2], 2.5, epsilon = 1e-12);
        for s in motion.shear {
            assert_relative_eq!(s, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn singular_linear_part_fails() {
        let mut linear = Matrix3::identity();
        linear[(1, 1)] = 0.0;
        let t = affine_from(linear, [0.0; 3]);
        assert!(matches!(
            decompose(&t),
            Err(MocoError::SingularTransform { .. })
        ));
    }

    #[test]
    fn compose_invert_round_trips_to_identity_motion() {
        let linear = rotation_z(-12.0) * Matrix3::from_diagonal(&Vector3::new(1.05, 1.0, 0.95));
        let t = affine_from(linear, [1.0, 2.0, 3.0]);
        let round = t.invert().unwrap().compose(&t);
        let motion = decompose(&round).unwrap();
        for (s, expected) in motion.scale.iter().zip([1.0; 3]) {
            assert_relative_eq!(*s, expected, epsilon = 1e-9);
        }
        for v in motion
            .shear
            .iter()
            .chain(motion.rotation.iter())
            .chain(motion.translation.iter())
        {
            assert_relative_eq!(*v, 0.0, epsilon = 1e-9);
        }
    }
}
