//! Run configuration, deserialized from TOML.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_B0_THRESHOLD, DEFAULT_HMC_ITERATIONS, DEFAULT_OUTLIER_THRESHOLD,
    DEFAULT_TEMPLATE_ITERATIONS,
};
use crate::error::{MocoError, Result};
use crate::hmc::HmcLoopConfig;
use crate::outlier::OutlierParams;
use crate::registration::{ProfileSchedule, TransformModel};
use crate::template::TemplateConfig;

/// Full pipeline configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MocoConfig {
    /// 4D diffusion series.
    pub dwi: PathBuf,
    pub bval: PathBuf,
    pub bvec: PathBuf,
    /// 3D brain mask on the series grid.
    pub mask: PathBuf,
    pub output_dir: PathBuf,
    /// Volumes with b-value at or below this are treated as b0.
    #[serde(default = "default_b0_threshold")]
    pub b0_threshold: f64,
    #[serde(default)]
    pub template: TemplateSection,
    #[serde(default)]
    pub hmc: HmcSection,
    /// Worker-pool size for per-volume registration. `None` uses the global
    /// Rayon pool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSection {
    pub transform: TransformModel,
    pub iterations: usize,
}

impl Default for TemplateSection {
    fn default() -> Self {
        Self {
            transform: TransformModel::Rigid,
            iterations: DEFAULT_TEMPLATE_ITERATIONS,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HmcSection {
    pub transform: TransformModel,
    pub iterations: usize,
    /// Z-score threshold for outlier replacement; 0 disables it.
    pub outlier_threshold: f64,
}

impl Default for HmcSection {
    fn default() -> Self {
        Self {
            transform: TransformModel::Affine,
            iterations: DEFAULT_HMC_ITERATIONS,
            outlier_threshold: DEFAULT_OUTLIER_THRESHOLD,
        }
    }
}

fn default_b0_threshold() -> f64 {
    DEFAULT_B0_THRESHOLD
}

impl MocoConfig {
    /// Parse a configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| MocoError::InvalidConfiguration(e.to_string()))
    }

    pub fn template_config(&self) -> TemplateConfig {
        TemplateConfig {
            model: self.template.transform,
            iterations: self.template.iterations,
            schedule: ProfileSchedule::default(),
            concurrency: self.concurrency,
        }
    }

    pub fn hmc_config(&self) -> HmcLoopConfig {
        HmcLoopConfig {
            model: self.hmc.transform,
            iterations: self.hmc.iterations,
            schedule: ProfileSchedule::default(),
            outlier: OutlierParams {
                threshold: self.hmc.outlier_threshold,
            },
            concurrency: self.concurrency,
        }
    }
}
