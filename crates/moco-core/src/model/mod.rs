//! Signal model adapter: the seam to an external diffusion model that
//! predicts the expected per-volume signal.

mod shell_mean;

pub use shell_mean::ShellMeanModel;

use crate::error::Result;
use crate::volume::{GradientRecord, Volume};

/// Uniform interface to a diffusion signal model.
///
/// Given a volume set, gradient table, and brain mask, produce one
/// model-predicted "ideal" image per input volume. Predictions must be
/// leave-one-out with respect to the predicted volume so the model cannot
/// trivially reproduce its own registration target, and deterministic given
/// identical inputs. A gradient table that is rank-deficient for the model
/// fails with [`MocoError::ModelFitting`](crate::error::MocoError::ModelFitting).
pub trait SignalModel: Send + Sync {
    fn predict(
        &self,
        volumes: &[Volume],
        gradients: &[GradientRecord],
        mask: &Volume,
    ) -> Result<Vec<Volume>>;
}
