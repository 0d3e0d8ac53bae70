use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::consts::{DEFAULT_HMC_ITERATIONS, PARALLEL_VOLUME_THRESHOLD};
use crate::error::{MocoError, Result};
use crate::model::SignalModel;
use crate::motion::ConfoundRecord;
use crate::outlier::{detect_and_replace, OutlierParams};
use crate::pipeline::types::{PipelineStage, ProgressReporter};
use crate::registration::{
    resample, ProfileSchedule, Registration, RegistrationEngine, RegistrationProfile,
    TransformModel,
};
use crate::template::tag_iteration;
use crate::transform::{decompose, TransformHistory, VolumeTransform};
use crate::volume::{DwiSeries, OutlierFlag, Volume};

/// Configuration for the model-based HMC loop.
#[derive(Clone, Debug)]
pub struct HmcLoopConfig {
    pub model: TransformModel,
    /// Fixed iteration budget; must be at least 2.
    pub iterations: usize,
    pub schedule: ProfileSchedule,
    pub outlier: OutlierParams,
    /// Worker-pool size for per-volume registration. `None` uses the global
    /// Rayon pool.
    pub concurrency: Option<usize>,
}

impl Default for HmcLoopConfig {
    fn default() -> Self {
        Self {
            model: TransformModel::Rigid,
            iterations: DEFAULT_HMC_ITERATIONS,
            schedule: ProfileSchedule::default(),
            outlier: OutlierParams::default(),
            concurrency: None,
        }
    }
}

/// Output of the model-based HMC loop.
#[derive(Clone, Debug)]
pub struct HmcResult {
    /// Full moving-to-template transform per volume: the nearest-b0
    /// initialization composed with every loop iteration's increment.
    pub transforms: Vec<VolumeTransform>,
    /// Per-volume incremental transforms, one entry per loop iteration
    /// (initialization excluded).
    pub history: Vec<TransformHistory>,
    /// Nearest-b0 initialization transform per volume.
    pub initial: Vec<VolumeTransform>,
    /// Motion parameters merged with outlier flags, one row per volume.
    pub confounds: Vec<ConfoundRecord>,
    /// Final warped volumes with flagged entries replaced by their model
    /// prediction.
    pub corrected: Vec<Volume>,
    /// Outlier decision per volume, from the terminal iteration.
    pub flags: Vec<OutlierFlag>,
}

/// Run model-based head-motion correction over a diffusion series.
///
/// `b0_indices`/`b0_transforms` come from the b0 template loop and seed the
/// initial alignment; `template` is that loop's final template and defines
/// the output grid. A model failure for the whole set is fatal
/// ([`MocoError::ModelFitting`]); a registration failure for any volume
/// aborts the run at the iteration barrier.
pub fn run_model_hmc(
    series: &DwiSeries,
    mask: &Volume,
    b0_indices: &[usize],
    b0_transforms: &[VolumeTransform],
    template: &Volume,
    config: &HmcLoopConfig,
    engine: &dyn RegistrationEngine,
    model: &dyn SignalModel,
    reporter: &dyn ProgressReporter,
) -> Result<HmcResult> {
    if config.iterations < 2 {
        return Err(MocoError::InvalidConfiguration(format!(
            "model-based HMC needs at least 2 iterations, got {}",
            config.iterations
        )));
    }
    if series.is_empty() {
        return Err(MocoError::EmptySequence);
    }

    match config.concurrency {
        Some(workers) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()
                .map_err(|e| MocoError::Pipeline(format!("failed to build worker pool: {e}")))?;
            pool.install(|| {
                run_loop(
                    series,
                    mask,
                    b0_indices,
                    b0_transforms,
                    template,
                    config,
                    engine,
                    model,
                    reporter,
                )
            })
        }
        None => run_loop(
            series,
            mask,
            b0_indices,
            b0_transforms,
            template,
            config,
            engine,
            model,
            reporter,
        ),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_loop(
    series: &DwiSeries,
    mask: &Volume,
    b0_indices: &[usize],
    b0_transforms: &[VolumeTransform],
    template: &Volume,
    config: &HmcLoopConfig,
    engine: &dyn RegistrationEngine,
    model: &dyn SignalModel,
    reporter: &dyn ProgressReporter,
) -> Result<HmcResult> {
    let n = series.len();
    info!(
        volumes = n,
        iterations = config.iterations,
        model = %config.model,
        "Running model-based HMC"
    );

    // Initial alignment: warp every volume into template space using its
    // nearest b0's transform.
    let initial = super::nearest_b0_transforms(n, b0_indices, b0_transforms)?;
    reporter.begin_stage(PipelineStage::InitialAlignment, Some(n));
    let mut working: Vec<Volume> = series
        .volumes
        .iter()
        .zip(&initial)
        .enumerate()
        .map(|(done, (volume, transform))| {
            let warped = resample(volume, transform, template)?;
            reporter.advance(done + 1);
            Ok(warped)
        })
        .collect::<Result<_>>()?;
    reporter.finish_stage();

    let mut histories: Vec<TransformHistory> = series
        .volumes
        .iter()
        .map(|v| TransformHistory::new(v.index))
        .collect();

    reporter.begin_stage(
        PipelineStage::ModelRegistration,
        Some(config.iterations * n),
    );
    let counter = AtomicUsize::new(0);

    let mut flags: Vec<OutlierFlag> = vec![OutlierFlag::default(); n];
    let mut corrected: Vec<Volume> = Vec::new();

    for iteration in 0..config.iterations {
        debug!(iteration, "predicting ideal signal targets");
        let predictions = model.predict(&working, &series.gradients, mask)?;

        let profile = config.schedule.for_iteration(iteration);
        let (transforms, warped) = register_to_targets(
            &working,
            &predictions,
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

        let last = iteration + 1 == config.iterations;
        if last {
            // All registration work is done at this point; close the stage
            // before the outlier pass so reporters see them in sequence.
            reporter.finish_stage();

            // Outliers are assessed and replaced only once, on the terminal
            // iteration, so replacement never feeds back into the model.
            reporter.begin_stage(PipelineStage::OutlierDetection, Some(n));
            let (detected, replaced) =
                detect_and_replace(&warped, &predictions, mask, &config.outlier)?;
            let flagged = detected.iter().filter(|f| f.flagged).count();
            info!(flagged, volumes = n, "Outlier detection complete");
            flags = detected;
            corrected = replaced;
            reporter.finish_stage();
        }

        working = warped;
    }

    // Full chain: initialization first, then each iteration's increment.
    let transforms: Vec<VolumeTransform> = histories
        .iter()
        .zip(&initial)
        .map(|(history, init)| Ok(history.composed()?.compose(init)))
        .collect::<Result<_>>()?;

    let confounds = transforms
        .iter()
        .zip(&flags)
        .enumerate()
        .map(|(volume, (transform, flag))| {
            Ok(ConfoundRecord {
                volume,
                motion: decompose(transform)?,
                outlier: flag.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(HmcResult {
        transforms,
        history: histories,
        initial,
        confounds,
        corrected,
        flags,
    })
}

/// Register each working volume against its own model-predicted target.
/// Same barrier semantics as the template loop: all results are collected
/// before the first failure aborts the iteration.
#[allow(clippy::too_many_arguments)]
fn register_to_targets(
    working: &[Volume],
    targets: &[Volume],
    model: TransformModel,
    profile: &RegistrationProfile,
    engine: &dyn RegistrationEngine,
    iteration: usize,
    counter: &AtomicUsize,
    reporter: &dyn ProgressReporter,
) -> Result<(Vec<VolumeTransform>, Vec<Volume>)> {
    let run = |(volume, target): (&Volume, &Volume)| -> Result<Registration> {
        let result = engine
            .register(volume, target, model, profile)
            .map_err(|e| tag_iteration(e, iteration));
        let done = counter.fetch_add(1, Ordering::Relaxed) + 1;
        reporter.advance(done);
        result
    };

    let pairs: Vec<(&Volume, &Volume)> = working.iter().zip(targets.iter()).collect();
    let results: Vec<Result<Registration>> = if pairs.len() >= PARALLEL_VOLUME_THRESHOLD {
        pairs.into_par_iter().map(run).collect()
    } else {
        pairs.into_iter().map(run).collect()
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
