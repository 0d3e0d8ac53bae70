use ndarray::Array3;

use crate::consts::DEFAULT_SHELL_TOLERANCE;
use crate::error::{MocoError, Result};
use crate::volume::{GradientRecord, Volume};

use super::SignalModel;

/// Leave-one-out shell-mean signal model.
///
/// Volumes are grouped into b-value shells; each volume's ideal image is the
/// mean of the other volumes in its shell. Crude as diffusion models go, but
/// deterministic, direction-agnostic, and honest about leave-one-out, which
/// is exactly the contract the HMC loop needs from a default model.
#[derive(Clone, Debug)]
pub struct ShellMeanModel {
    /// b-values within this distance of a shell center share the shell.
    pub shell_tolerance: f64,
}

impl Default for ShellMeanModel {
    fn default() -> Self {
        Self {
            shell_tolerance: DEFAULT_SHELL_TOLERANCE,
        }
    }
}

impl ShellMeanModel {
    /// Assign each volume a shell id by clustering b-values.
    fn shells(&self, gradients: &[GradientRecord]) -> Vec<usize> {
        let mut centers: Vec<f64> = Vec::new();
        let mut assignment = Vec::with_capacity(gradients.len());
        for g in gradients {
            let found = centers
                .iter()
                .position(|&c| (g.bval - c).abs() <= self.shell_tolerance);
            match found {
                Some(id) => assignment.push(id),
                None => {
                    centers.push(g.bval);
                    assignment.push(centers.len() - 1);
                }
            }
        }
        assignment
    }
}

impl SignalModel for ShellMeanModel {
    fn predict(
        &self,
        volumes: &[Volume],
        gradients: &[GradientRecord],
        _mask: &Volume,
    ) -> Result<Vec<Volume>> {
        if volumes.is_empty() {
            return Err(MocoError::EmptySequence);
        }
        if volumes.len() != gradients.len() {
            return Err(MocoError::InvalidGradients(format!(
                "{} volumes but {} gradient records",
                volumes.len(),
                gradients.len()
            )));
        }

        let shells = self.shells(gradients);

        // A singleton shell leaves nothing to predict that volume from.
        for (i, &shell) in shells.iter().enumerate() {
            let members = shells.iter().filter(|&&s| s == shell).count();
            if members < 2 {
                return Err(MocoError::ModelFitting(format!(
                    "shell with b={} has a single volume (index {}); cannot fit leave-one-out",
                    gradients[i].bval, i
                )));
            }
        }

        let dim = volumes[0].dim();
        let mut predictions = Vec::with_capacity(volumes.len());
        for (i, volume) in volumes.iter().enumerate() {
            if volume.dim() != dim {
                return Err(MocoError::DimensionMismatch {
                    expected: dim,
                    actual: volume.dim(),
                });
            }
            let mut sum = Array3::<f32>::zeros(dim);
            let mut count = 0usize;
            for (j, other) in volumes.iter().enumerate() {
                if j != i && shells[j] == shells[i] {
                    sum += &other.data;
                    count += 1;
                }
            }
            sum /= count as f32;
            predictions.push(Volume::new(sum, volume.affine, volume.index));
        }

        Ok(predictions)
    }
}
