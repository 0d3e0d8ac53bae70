use ndarray::parallel::prelude::*;
use ndarray::{Array3, ArrayViewMut2, Axis};

use crate::consts::PARALLEL_VOXEL_THRESHOLD;
use crate::error::Result;
use crate::transform::{TransformRole, VolumeTransform};
use crate::volume::Volume;

/// Resample a volume through a world-space transform onto a reference grid.
///
/// The output lives on `reference`'s grid; its value at voxel v is the
/// trilinear sample of `moving` at `T^-1 * A_ref * v`, i.e. the image content
/// is carried forward by `transform`. Out-of-field samples are zero.
pub fn resample(
    moving: &Volume,
    transform: &VolumeTransform,
    reference: &Volume,
) -> Result<Volume> {
    // Reference voxel -> world -> (inverse transform) -> moving world ->
    // moving voxel, collapsed into a single matrix.
    let t_inv = transform.invert()?;
    let moving_inv = VolumeTransform::new(moving.affine, 0, TransformRole::Forward).invert()?;
    let map = moving_inv.matrix * t_inv.matrix * reference.affine;

    let (nx, ny, nz) = reference.dim();
    let mut out = Array3::<f32>::zeros((nx, ny, nz));

    let fill_plane = |i: usize, mut plane: ArrayViewMut2<'_, f32>| {
        for j in 0..ny {
            for k in 0..nz {
                let p = map * nalgebra::Vector4::new(i as f64, j as f64, k as f64, 1.0);
                plane[[j, k]] = trilinear_sample(&moving.data, p.x, p.y, p.z);
            }
        }
    };

    if nx * ny * nz >= PARALLEL_VOXEL_THRESHOLD {
        out.axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(i, plane)| fill_plane(i, plane));
    } else {
        for (i, plane) in out.axis_iter_mut(Axis(0)).enumerate() {
            fill_plane(i, plane);
        }
    }

    Ok(Volume::new(out, reference.affine, moving.index))
}

/// Trilinear sample at a fractional voxel coordinate. Out-of-bounds
/// neighbors contribute zero.
pub fn trilinear_sample(data: &Array3<f32>, x: f64, y: f64, z: f64) -> f32 {
    let (nx, ny, nz) = data.dim();

    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let z0 = z.floor() as i64;

    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;
    let fz = (z - z0 as f64) as f32;

    let sample = |i: i64, j: i64, k: i64| -> f32 {
        if i >= 0 && i < nx as i64 && j >= 0 && j < ny as i64 && k >= 0 && k < nz as i64 {
            data[[i as usize, j as usize, k as usize]]
        } else {
            0.0
        }
    };

    let mut acc = 0.0f32;
    for (di, wi) in [(0, 1.0 - fx), (1, fx)] {
        for (dj, wj) in [(0, 1.0 - fy), (1, fy)] {
            for (dk, wk) in [(0, 1.0 - fz), (1, fz)] {
                let w = wi * wj * wk;
                if w != 0.0 {
                    acc += w * sample(x0 + di, y0 + dj, z0 + dk);
                }
            }
        }
    }
    acc
}
