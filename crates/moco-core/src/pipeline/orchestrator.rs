//! End-to-end pipeline: load, build the b0 template, run model-based HMC,
//! write outputs.

use std::path::PathBuf;

use tracing::info;

use crate::error::{MocoError, Result};
use crate::hmc::{run_model_hmc, HmcResult};
use crate::io::{gradients, nifti, transforms};
use crate::model::SignalModel;
use crate::motion::write_confounds;
use crate::pipeline::config::MocoConfig;
use crate::pipeline::types::{NoOpReporter, PipelineStage, ProgressReporter};
use crate::registration::RegistrationEngine;
use crate::template::{build_template, TemplateResult};
use crate::transform::VolumeTransform;
use crate::volume::{DwiSeries, Volume};

/// Everything a finished run produced, plus where the artifacts landed.
#[derive(Clone, Debug)]
pub struct PipelineOutput {
    pub template: Volume,
    pub template_result: TemplateResult,
    pub hmc: HmcResult,
    pub corrected_path: PathBuf,
    pub template_path: PathBuf,
    pub confounds_path: PathBuf,
    pub transforms_path: PathBuf,
}

/// Run the full pipeline without progress reporting.
pub fn run_pipeline(
    config: &MocoConfig,
    engine: &dyn RegistrationEngine,
    model: &dyn SignalModel,
) -> Result<PipelineOutput> {
    run_pipeline_reported(config, engine, model, &NoOpReporter)
}

/// Run the full pipeline, reporting stage progress.
pub fn run_pipeline_reported(
    config: &MocoConfig,
    engine: &dyn RegistrationEngine,
    model: &dyn SignalModel,
    reporter: &dyn ProgressReporter,
) -> Result<PipelineOutput> {
    reporter.begin_stage(PipelineStage::Loading, None);
    let volumes = nifti::load_series(&config.dwi)?;
    let grads = gradients::load_gradients(&config.bval, &config.bvec)?;
    let mask = nifti::load_volume(&config.mask)?;
    let series = DwiSeries::new(volumes, grads)?;
    if mask.dim() != series.volumes[0].dim() {
        return Err(MocoError::DimensionMismatch {
            expected: series.volumes[0].dim(),
            actual: mask.dim(),
        });
    }
    reporter.finish_stage();

    let b0_indices = series.b0_indices_at(config.b0_threshold);
    if b0_indices.is_empty() {
        return Err(MocoError::InvalidGradients(format!(
            "no b0 volumes at threshold {}",
            config.b0_threshold
        )));
    }
    info!(
        volumes = series.len(),
        b0 = b0_indices.len(),
        "Loaded diffusion series"
    );

    let b0_volumes: Vec<Volume> = b0_indices
        .iter()
        .map(|&i| series.volumes[i].clone())
        .collect();
    let template_result = build_template(&b0_volumes, &config.template_config(), engine, reporter)?;

    // Full b0-to-template alignment per b0 volume, seeding the HMC loop.
    let b0_transforms: Vec<VolumeTransform> = template_result
        .history
        .iter()
        .map(|h| h.composed())
        .collect::<Result<_>>()?;

    let hmc = run_model_hmc(
        &series,
        &mask,
        &b0_indices,
        &b0_transforms,
        &template_result.final_template,
        &config.hmc_config(),
        engine,
        model,
        reporter,
    )?;

    reporter.begin_stage(PipelineStage::Writing, None);
    std::fs::create_dir_all(&config.output_dir)?;
    let template_path = config.output_dir.join("b0_template.nii.gz");
    let corrected_path = config.output_dir.join("dwi_corrected.nii.gz");
    let confounds_path = config.output_dir.join("confounds.csv");
    let transforms_path = config.output_dir.join("transforms.tsv");

    nifti::write_volume(&template_path, &template_result.final_template)?;
    nifti::write_series(&corrected_path, &hmc.corrected)?;
    write_confounds(&confounds_path, &hmc.confounds)?;
    transforms::write_transforms(&transforms_path, &hmc.history)?;
    reporter.finish_stage();

    info!(output_dir = %config.output_dir.display(), "Pipeline complete");

    Ok(PipelineOutput {
        template: template_result.final_template.clone(),
        template_result,
        hmc,
        corrected_path,
        template_path,
        confounds_path,
        transforms_path,
    })
}
