//! FSL-style gradient table I/O (.bval / .bvec).
//!
//! A .bval file holds one whitespace-separated b-value per volume. A .bvec
//! file holds three rows (x, y, z components), each with one entry per
//! volume.

use std::path::Path;

use crate::error::{MocoError, Result};
use crate::volume::GradientRecord;

/// Load a gradient table from a .bval/.bvec pair. Entry counts must agree.
pub fn load_gradients<P: AsRef<Path>>(bval_path: P, bvec_path: P) -> Result<Vec<GradientRecord>> {
    let bvals = parse_bvals(&std::fs::read_to_string(bval_path)?)?;
    let bvecs = parse_bvecs(&std::fs::read_to_string(bvec_path)?)?;

    if bvals.len() != bvecs.len() {
        return Err(MocoError::InvalidGradients(format!(
            "bval has {} entries but bvec has {}",
            bvals.len(),
            bvecs.len()
        )));
    }

    Ok(bvals
        .into_iter()
        .zip(bvecs)
        .map(|(bval, bvec)| GradientRecord { bvec, bval })
        .collect())
}

fn parse_bvals(text: &str) -> Result<Vec<f64>> {
    let values: Vec<f64> = text
        .split_whitespace()
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|_| MocoError::InvalidGradients(format!("bad b-value '{token}'")))
        })
        .collect::<Result<_>>()?;
    if values.is_empty() {
        return Err(MocoError::InvalidGradients("empty bval file".into()));
    }
    Ok(values)
}

fn parse_bvecs(text: &str) -> Result<Vec<[f64; 3]>> {
    let rows: Vec<Vec<f64>> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            line.split_whitespace()
                .map(|token| {
                    token.parse::<f64>().map_err(|_| {
                        MocoError::InvalidGradients(format!("bad bvec component '{token}'"))
                    })
                })
                .collect::<Result<Vec<f64>>>()
        })
        .collect::<Result<_>>()?;

    if rows.len() != 3 {
        return Err(MocoError::InvalidGradients(format!(
            "bvec file must have 3 rows, found {}",
            rows.len()
        )));
    }
    let n = rows[0].len();
    if rows[1].len() != n || rows[2].len() != n {
        return Err(MocoError::InvalidGradients(
            "bvec rows have unequal lengths".into(),
        ));
    }

    Ok((0..n).map(|i| [rows[0][i], rows[1][i], rows[2][i]]).collect())
}
