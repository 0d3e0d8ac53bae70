//! NIfTI volume I/O.
//!
//! Volumes are read as f32 with the voxel-to-world affine taken from the
//! header: sform when present, then qform, then plain pixdim scaling.

use std::path::Path;

use nalgebra::Matrix4;
use ndarray::{Array4, Axis};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::error::{MocoError, Result};
use crate::volume::Volume;

/// Load a 3D NIfTI file as a single volume.
pub fn load_volume<P: AsRef<Path>>(path: P) -> Result<Volume> {
    let obj = ReaderOptions::new().read_file(path.as_ref())?;
    let affine = header_affine(obj.header());
    let data = obj.into_volume().into_ndarray::<f32>()?;

    let data = data
        .into_dimensionality::<ndarray::Ix3>()
        .map_err(|e| MocoError::Pipeline(format!("expected a 3D NIfTI volume: {e}")))?;

    Ok(Volume::new(data, affine, 0))
}

/// Load a 4D NIfTI file as a series of volumes in acquisition order.
/// A 3D file yields a single-volume series.
pub fn load_series<P: AsRef<Path>>(path: P) -> Result<Vec<Volume>> {
    let obj = ReaderOptions::new().read_file(path.as_ref())?;
    let affine = header_affine(obj.header());
    let data = obj.into_volume().into_ndarray::<f32>()?;

    match data.ndim() {
        3 => {
            let data = data
                .into_dimensionality::<ndarray::Ix3>()
                .map_err(|e| MocoError::Pipeline(format!("bad volume shape: {e}")))?;
            Ok(vec![Volume::new(data, affine, 0)])
        }
        4 => {
            let data = data
                .into_dimensionality::<ndarray::Ix4>()
                .map_err(|e| MocoError::Pipeline(format!("bad series shape: {e}")))?;
            Ok(data
                .axis_iter(Axis(3))
                .enumerate()
                .map(|(index, frame)| Volume::new(frame.to_owned(), affine, index))
                .collect())
        }
        n => Err(MocoError::Pipeline(format!(
            "expected a 3D or 4D NIfTI file, found {n} dimensions"
        ))),
    }
}

/// Write a single volume as a 3D NIfTI file.
pub fn write_volume<P: AsRef<Path>>(path: P, volume: &Volume) -> Result<()> {
    let header = header_with_affine(&volume.affine);
    nifti::writer::WriterOptions::new(path.as_ref())
        .reference_header(&header)
        .write_nifti(&volume.data)?;
    Ok(())
}

/// Write a volume series as a 4D NIfTI file. All volumes must share a grid.
pub fn write_series<P: AsRef<Path>>(path: P, volumes: &[Volume]) -> Result<()> {
    if volumes.is_empty() {
        return Err(MocoError::EmptySequence);
    }
    let dim = volumes[0].dim();
    let mut stacked = Array4::<f32>::zeros((dim.0, dim.1, dim.2, volumes.len()));
    for (t, volume) in volumes.iter().enumerate() {
        if volume.dim() != dim {
            return Err(MocoError::DimensionMismatch {
                expected: dim,
                actual: volume.dim(),
            });
        }
        stacked
            .index_axis_mut(Axis(3), t)
            .assign(&volume.data);
    }

    let header = header_with_affine(&volumes[0].affine);
    nifti::writer::WriterOptions::new(path.as_ref())
        .reference_header(&header)
        .write_nifti(&stacked)?;
    Ok(())
}

/// Voxel-to-world affine from a NIfTI header: sform, then qform, then
/// pixdim scaling.
fn header_affine(header: &NiftiHeader) -> Matrix4<f64> {
    if header.sform_code > 0 {
        return rows_to_matrix(header.srow_x, header.srow_y, header.srow_z);
    }
    if header.qform_code > 0 {
        return qform_affine(header);
    }
    Matrix4::new(
        header.pixdim[1] as f64,
        0.0,
        0.0,
        0.0,
        0.0,
        header.pixdim[2] as f64,
        0.0,
        0.0,
        0.0,
        0.0,
        header.pixdim[3] as f64,
        0.0,
        0.0,
        0.0,
        0.0,
        1.0,
    )
}

fn rows_to_matrix(rx: [f32; 4], ry: [f32; 4], rz: [f32; 4]) -> Matrix4<f64> {
    Matrix4::new(
        rx[0] as f64,
        rx[1] as f64,
        rx[2] as f64,
        rx[3] as f64,
        ry[0] as f64,
        ry[1] as f64,
        ry[2] as f64,
        ry[3] as f64,
        rz[0] as f64,
        rz[1] as f64,
        rz[2] as f64,
        rz[3] as f64,
        0.0,
        0.0,
        0.0,
        1.0,
    )
}

/// Quaternion-based qform affine, per the NIfTI standard.
fn qform_affine(header: &NiftiHeader) -> Matrix4<f64> {
    let b = header.quatern_b as f64;
    let c = header.quatern_c as f64;
    let d = header.quatern_d as f64;
    let a = (1.0 - (b * b + c * c + d * d).min(1.0)).sqrt();

    let qfac = if header.pixdim[0] == 0.0 {
        1.0
    } else {
        header.pixdim[0] as f64
    };

    let dx = header.pixdim[1] as f64;
    let dy = header.pixdim[2] as f64;
    let dz = header.pixdim[3] as f64 * qfac;

    Matrix4::new(
        (a * a + b * b - c * c - d * d) * dx,
        (2.0 * b * c - 2.0 * a * d) * dy,
        (2.0 * b * d + 2.0 * a * c) * dz,
        header.quatern_x as f64,
        (2.0 * b * c + 2.0 * a * d) * dx,
        (a * a + c * c - b * b - d * d) * dy,
        (2.0 * c * d - 2.0 * a * b) * dz,
        header.quatern_y as f64,
        (2.0 * b * d - 2.0 * a * c) * dx,
        (2.0 * c * d + 2.0 * a * b) * dy,
        (a * a + d * d - c * c - b * b) * dz,
        header.quatern_z as f64,
        0.0,
        0.0,
        0.0,
        1.0,
    )
}

fn header_with_affine(affine: &Matrix4<f64>) -> NiftiHeader {
    NiftiHeader {
        sform_code: 1,
        srow_x: [
            affine[(0, 0)] as f32,
            affine[(0, 1)] as f32,
            affine[(0, 2)] as f32,
            affine[(0, 3)] as f32,
        ],
        srow_y: [
            affine[(1, 0)] as f32,
            affine[(1, 1)] as f32,
            affine[(1, 2)] as f32,
            affine[(1, 3)] as f32,
        ],
        srow_z: [
            affine[(2, 0)] as f32,
            affine[(2, 1)] as f32,
            affine[(2, 2)] as f32,
            affine[(2, 3)] as f32,
        ],
        ..NiftiHeader::default()
    }
}
