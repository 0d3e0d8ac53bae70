use serde::{Deserialize, Serialize};

/// Transform class used for alignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformModel {
    Rigid,
    Affine,
}

impl std::fmt::Display for TransformModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rigid => write!(f, "rigid"),
            Self::Affine => write!(f, "affine"),
        }
    }
}

/// Opaque parameter bundle selecting a speed/accuracy tradeoff for the
/// registration engine.
///
/// The coarse profile stops at half resolution with a large gradient step;
/// the fine profile adds a full-resolution level with a small step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegistrationProfile {
    /// Multi-resolution shrink factor per level.
    pub shrink_factors: Vec<u32>,
    /// Smoothing sigma per level (voxels).
    pub smoothing_sigmas: Vec<f64>,
    /// Optimizer iteration cap per level.
    pub level_iterations: Vec<u32>,
    /// Gradient descent step size.
    pub gradient_step: f64,
    /// Histogram bins for the mutual-information metric.
    pub metric_bins: u32,
    /// Fraction of voxels randomly sampled for the metric.
    pub sampling_fraction: f64,
    /// Intensity winsorization quantiles.
    pub winsorize_lower: f64,
    pub winsorize_upper: f64,
    /// Metric convergence threshold.
    pub convergence_threshold: f64,
}

impl RegistrationProfile {
    /// Fast profile for the first iteration: fewer levels, larger step.
    pub fn coarse() -> Self {
        Self {
            shrink_factors: vec![4, 2],
            smoothing_sigmas: vec![3.0, 1.0],
            level_iterations: vec![1000, 10_000],
            gradient_step: 0.3,
            ..Self::fine()
        }
    }

    /// Full-resolution refinement profile.
    pub fn fine() -> Self {
        Self {
            shrink_factors: vec![4, 2, 1],
            smoothing_sigmas: vec![3.0, 1.0, 0.0],
            level_iterations: vec![1000, 10_000, 10_000],
            gradient_step: 0.1,
            metric_bins: 32,
            sampling_fraction: 0.25,
            winsorize_lower: 0.025,
            winsorize_upper: 0.975,
            convergence_threshold: 1e-6,
        }
    }
}

/// Profile per iteration: coarse for iteration 0, fine thereafter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfileSchedule {
    pub initial: RegistrationProfile,
    pub refine: RegistrationProfile,
}

impl Default for ProfileSchedule {
    fn default() -> Self {
        Self {
            initial: RegistrationProfile::coarse(),
            refine: RegistrationProfile::fine(),
        }
    }
}

impl ProfileSchedule {
    pub fn for_iteration(&self, iteration: usize) -> &RegistrationProfile {
        if iteration == 0 {
            &self.initial
        } else {
            &self.refine
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_is_coarse_then_fine() {
        let schedule = ProfileSchedule::default();
        assert_eq!(schedule.for_iteration(0).shrink_factors, vec![4, 2]);
        assert_eq!(schedule.for_iteration(1).shrink_factors, vec![4, 2, 1]);
        assert_eq!(schedule.for_iteration(5).gradient_step, 0.1);
    }
}
