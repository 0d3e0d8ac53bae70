//! Outlier detection and replacement.
//!
//! Flags volumes whose registered appearance deviates excessively from their
//! model prediction and substitutes the prediction for downstream use. Runs
//! only on the final HMC iteration so replacement never compounds across
//! iterations.

use crate::consts::MASK_THRESHOLD;
use crate::error::{MocoError, Result};
use crate::volume::{OutlierFlag, Volume};

/// Parameters for outlier detection.
#[derive(Clone, Debug)]
pub struct OutlierParams {
    /// Residual threshold in standard deviations across volumes.
    /// 0 disables flagging entirely.
    pub threshold: f64,
}

impl Default for OutlierParams {
    fn default() -> Self {
        Self { threshold: 0.0 }
    }
}

/// Detect outliers from warped-vs-prediction residuals and build the
/// replaced output set.
///
/// Returns one flag per volume and the output volumes, with the model
/// prediction substituted wherever the flag is set. Fails with
/// [`MocoError::InsufficientData`] if flagging would remove every volume.
pub fn detect_and_replace(
    warped: &[Volume],
    predictions: &[Volume],
    mask: &Volume,
    params: &OutlierParams,
) -> Result<(Vec<OutlierFlag>, Vec<Volume>)> {
    if warped.is_empty() {
        return Err(MocoError::EmptySequence);
    }
    if warped.len() != predictions.len() {
        return Err(MocoError::Pipeline(format!(
            "{} warped volumes but {} predictions",
            warped.len(),
            predictions.len()
        )));
    }

    let residuals: Vec<f64> = warped
        .iter()
        .zip(predictions)
        .map(|(w, p)| masked_residual(w, p, mask))
        .collect::<Result<_>>()?;

    let scores = standardize(&residuals);

    let flags: Vec<OutlierFlag> = scores
        .iter()
        .map(|&score| OutlierFlag {
            flagged: params.threshold > 0.0 && score > params.threshold,
            score,
        })
        .collect();

    let flagged_count = flags.iter().filter(|f| f.flagged).count();
    if flagged_count == warped.len() {
        return Err(MocoError::InsufficientData(format!(
            "outlier threshold {} would flag all {} volumes",
            params.threshold,
            warped.len()
        )));
    }

    let replaced = warped
        .iter()
        .zip(predictions)
        .zip(&flags)
        .map(|((w, p), flag)| {
            if flag.flagged {
                Volume::new(p.data.clone(), w.affine, w.index)
            } else {
                w.clone()
            }
        })
        .collect();

    Ok((flags, replaced))
}

/// Mean absolute difference between a volume and its prediction over brain
/// voxels.
fn masked_residual(warped: &Volume, prediction: &Volume, mask: &Volume) -> Result<f64> {
    let dim = warped.dim();
    if prediction.dim() != dim || mask.dim() != dim {
        return Err(MocoError::DimensionMismatch {
            expected: dim,
            actual: if prediction.dim() != dim {
                prediction.dim()
            } else {
                mask.dim()
            },
        });
    }

    let mut sum = 0.0f64;
    let mut count = 0usize;
    for ((&w, &p), &m) in warped
        .data
        .iter()
        .zip(prediction.data.iter())
        .zip(mask.data.iter())
    {
        if m > MASK_THRESHOLD {
            sum += (w - p).abs() as f64;
            count += 1;
        }
    }

    if count == 0 {
        return Err(MocoError::InsufficientData(
            "brain mask is empty".to_string(),
        ));
    }
    Ok(sum / count as f64)
}

/// Z-scores of the residuals across volumes. A near-constant residual
/// distribution yields all-zero scores.
fn standardize(residuals: &[f64]) -> Vec<f64> {
    let n = residuals.len() as f64;
    let mean = residuals.iter().sum::<f64>() / n;
    let var = residuals.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = var.sqrt();

    if stddev < 1e-12 {
        return vec![0.0; residuals.len()];
    }
    residuals.iter().map(|r| (r - mean) / stddev).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Matrix4;
    use ndarray::Array3;

    fn uniform(value: f32, index: usize) -> Volume {
        Volume::new(
            Array3::from_elem((4, 4, 4), value),
            Matrix4::identity(),
            index,
        )
    }

    #[test]
    fn zero_threshold_disables_flagging() {
        let warped = vec![uniform(0.0, 0), uniform(100.0, 1), uniform(100.0, 2)];
        let predictions = vec![uniform(0.0, 0); 3];
        let mask = uniform(1.0, 0);

        let (flags, replaced) =
            detect_and_replace(&warped, &predictions, &mask, &OutlierParams::default()).unwrap();
        assert!(flags.iter().all(|f| !f.flagged));
        assert_eq!(replaced[1].data[[0, 0, 0]], 100.0);
    }

    #[test]
    fn flags_and_replaces_high_residual_volumes() {
        let warped = vec![uniform(0.0, 0), uniform(10.0, 1), uniform(10.0, 2)];
        let predictions = vec![uniform(0.0, 0), uniform(0.0, 1), uniform(0.0, 2)];
        let mask = uniform(1.0, 0);
        let params = OutlierParams { threshold: 0.5 };

        let (flags, replaced) =
            detect_and_replace(&warped, &predictions, &mask, &params).unwrap();
        assert!(!flags[0].flagged);
        assert!(flags[1].flagged);
        assert!(flags[2].flagged);
        // Flagged volumes take the prediction; the clean one is untouched.
        assert_eq!(replaced[0].data[[0, 0, 0]], 0.0);
        assert_eq!(replaced[1].data[[0, 0, 0]], 0.0);
        assert_eq!(replaced[2].data[[0, 0, 0]], 0.0);
        assert_eq!(replaced[1].index, 1);
    }

    #[test]
    fn empty_mask_is_insufficient_data() {
        let warped = vec![uniform(1.0, 0), uniform(2.0, 1)];
        let predictions = vec![uniform(1.0, 0), uniform(1.0, 1)];
        let mask = uniform(0.0, 0);

        assert!(matches!(
            detect_and_replace(&warped, &predictions, &mask, &OutlierParams::default()),
            Err(MocoError::InsufficientData(_))
        ));
    }
}
