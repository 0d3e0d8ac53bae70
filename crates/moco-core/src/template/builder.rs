//! Iterative group-template construction.
//!
//! Average the inputs, register everyone to the average, recenter the average
//! with the inverse mean transform, repeat for a fixed iteration budget.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::consts::{DEFAULT_TEMPLATE_ITERATIONS, PARALLEL_VOLUME_THRESHOLD};
use crate::error::{MocoError, Result};
use crate::pipeline::types::{PipelineStage, ProgressReporter};
use crate::registration::{
    resample, ProfileSchedule, Registration, RegistrationEngine, RegistrationProfile,
    TransformModel,
};
use crate::transform::{decompose, mean_transform, TransformHistory, VolumeTransform};
use crate::volume::{MotionRecord, Volume};

use super::average::normalized_average;

/// Configuration for the template-convergence loop.
#[derive(Clone, Debug)]
pub struct TemplateConfig {
    pub model: TransformModel,
    /// Fixed iteration budget; must be at least 2.
    pub iterations: usize,
    pub schedule: ProfileSchedule,
    /// Worker-pool size for per-volume registration. `None` uses the global
    /// Rayon pool.
    pub concurrency: Option<usize>,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            model: TransformModel::Rigid,
            iterations: DEFAULT_TEMPLATE_ITERATIONS,
            schedule: ProfileSchedule::default(),
            concurrency: None,
        }
    }
}

/// Immutable snapshot of one loop iteration: the template registered
/// against, the forward transforms it produced, and the warped volumes.
#[derive(Clone, Debug)]
pub struct IterationState {
    pub template: Volume,
    pub transforms: Vec<VolumeTransform>,
    pub warped: Vec<Volume>,
}

/// Output of the template-convergence loop.
#[derive(Clone, Debug)]
pub struct TemplateResult {
    /// The template the last registration round was evaluated against (the
    /// second-to-last recentering).
    pub final_template: Volume,
    /// Registration target of each iteration, in order; the first entry is
    /// the initial unbiased average.
    pub iteration_templates: Vec<Volume>,
    /// Per-volume forward transforms from the last registration round.
    pub forward_transforms: Vec<VolumeTransform>,
    /// Per-volume incremental transform sequences, one entry per iteration.
    pub history: Vec<TransformHistory>,
    /// Motion parameters decomposed from each volume's composed chain.
    pub motion: Vec<MotionRecord>,
    /// Full per-iteration snapshots, in order.
    pub states: Vec<IterationState>,
}

/// Run the iterative linear-alignment loop over a set of volumes.
///
/// Fails fast with [`MocoError::InvalidConfiguration`] when the iteration
/// budget is below 2. Any registration failure aborts the run at the
/// iteration barrier; there is no partial output.
pub fn build_template(
    volumes: &[Volume],
    config: &TemplateConfig,
    engine: &dyn RegistrationEngine,
    reporter: &dyn ProgressReporter,
) -> Result<TemplateResult> {
    if config.iterations < 2 {
        return Err(MocoError::InvalidConfiguration(format!(
            "template loop needs at least 2 iterations, got {}",
            config.iterations
        )));
    }
    if volumes.is_empty() {
        return Err(MocoError::EmptySequence);
    }

    match config.concurrency {
        Some(workers) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()
                .map_err(|e| MocoError::Pipeline(format!("failed to build worker pool: {e}")))?;
            pool.install(|| run_loop(volumes, config, engine, reporter))
        }
        None => run_loop(volumes, config, engine, reporter),
    }
}

fn run_loop(
    volumes: &[Volume],
    config: &TemplateConfig,
    engine: &dyn RegistrationEngine,
    reporter: &dyn ProgressReporter,
) -> Result<TemplateResult> {
    info!(
        volumes = volumes.len(),
        iterations = config.iterations,
        model = %config.model,
        "Building template"
    );

    let mut template = normalized_average(volumes)?;
    let mut iteration_templates = vec![template.clone()];
    let mut histories: Vec<TransformHistory> = volumes
        .iter()
        .map(|v| TransformHistory::new(v.index))
        .collect();
    let mut states = Vec::with_capacity(config.iterations);
    let mut working: Vec<Volume> = volumes.to_vec();
    let mut last_transforms = Vec::new();

    reporter.begin_stage(
        PipelineStage::TemplateRegistration,
        Some(config.iterations * volumes.len()),
    );
    let counter = AtomicUsize::new(0);

    for iteration in 0..config.iterations {
        let profile = config.schedule.for_iteration(iteration);
        debug!(iteration, "registering volumes to template");

        let (transforms, warped) = register_all(
            &working,
            &template,
            config.model,
            profile,
            engine,
            iteration,
            &counter,
            reporter,
        )?;

        for (history, transform) in histories.iter_mut().zip(&transforms) {
            history.push(transform.clone());
        }
        states.push(IterationState {
            template: template.clone(),
            transforms: transforms.clone(),
            warped: warped.clone(),
        });

        // Re-template: average the warps, then pull the average back by the
        // inverse mean transform to remove the group's net drift. The last
        // round's registrations are evaluated against the prior template,
        // so no new template is produced after the final iteration.
        if iteration + 1 < config.iterations {
            let raw = normalized_average(&warped)?;
            let mean = mean_transform(&transforms)?;
            let recentered = resample(&raw, &mean.invert()?, &raw)?;
            template = recentered;
            iteration_templates.push(template.clone());
        }

        working = warped;
        last_transforms = transforms;
    }
    reporter.finish_stage();

    let motion = histories
        .iter()
        .map(|h| decompose(&h.composed()?))
        .collect::<Result<Vec<_>>>()?;

    let final_template = iteration_templates
        .last()
        .cloned()
        .ok_or(MocoError::EmptySequence)?;

    Ok(TemplateResult {
        final_template,
        iteration_templates,
        forward_transforms: last_transforms,
        history: histories,
        motion,
        states,
    })
}

/// Register every working volume against the template, in parallel when the
/// set is large enough. Collecting into `Vec<Result<_>>` forms the iteration
/// barrier; the first failure aborts the whole iteration afterwards.
#[allow(clippy::too_many_arguments)]
fn register_all(
    working: &[Volume],
    template: &Volume,
    model: TransformModel,
    profile: &RegistrationProfile,
    engine: &dyn RegistrationEngine,
    iteration: usize,
    counter: &AtomicUsize,
    reporter: &dyn ProgressReporter,
) -> Result<(Vec<VolumeTransform>, Vec<Volume>)> {
    let run = |volume: &Volume| -> Result<Registration> {
        let result = engine
            .register(volume, template, model, profile)
            .map_err(|e| tag_iteration(e, iteration));
        let done = counter.fetch_add(1, Ordering::Relaxed) + 1;
        reporter.advance(done);
        result
    };

    let results: Vec<Result<Registration>> = if working.len() >= PARALLEL_VOLUME_THRESHOLD {
        working.par_iter().map(run).collect()
    } else {
        working.iter().map(run).collect()
    };

    let registrations: Vec<Registration> = results.into_iter().collect::<Result<_>>()?;

    Ok(registrations
        .into_iter()
        .map(|r| {
            let mut forward = r.forward;
            forward.iteration = iteration;
            (forward, r.warped)
        })
        .unzip())
}

/// Stamp the iteration number onto a registration failure from the engine.
pub(crate) fn tag_iteration(err: MocoError, iteration: usize) -> MocoError {
    match err {
        MocoError::RegistrationFailed {
            volume, reason, ..
        } => MocoError::RegistrationFailed {
            volume,
            iteration,
            reason,
        },
        other => other,
    }
}
