use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use moco_core::consts::DEFAULT_B0_THRESHOLD;
use moco_core::io::{gradients, nifti, transforms};
use moco_core::registration::{CentroidEngine, TransformModel};
use moco_core::template::{build_template, TemplateConfig};
use moco_core::volume::{DwiSeries, Volume};

use crate::progress::BarReporter;

#[derive(Args)]
pub struct TemplateArgs {
    /// 4D diffusion NIfTI file
    pub dwi: PathBuf,

    /// FSL b-value file
    #[arg(long)]
    pub bval: PathBuf,

    /// FSL gradient-direction file
    #[arg(long)]
    pub bvec: PathBuf,

    /// b0 threshold
    #[arg(long, default_value_t = DEFAULT_B0_THRESHOLD)]
    pub b0_threshold: f64,

    /// Template loop iterations (at least 2)
    #[arg(long, default_value = "3")]
    pub iterations: usize,

    /// Transform class: rigid or affine
    #[arg(long, default_value = "rigid")]
    pub transform: String,

    /// Output template path
    #[arg(short, long, default_value = "b0_template.nii.gz")]
    pub output: PathBuf,

    /// Also write the per-iteration transform chains here
    #[arg(long)]
    pub transforms: Option<PathBuf>,
}

pub fn run(args: &TemplateArgs) -> Result<()> {
    let volumes = nifti::load_series(&args.dwi)?;
    let grads = gradients::load_gradients(&args.bval, &args.bvec)?;
    let series = DwiSeries::new(volumes, grads)?;

    let b0_indices = series.b0_indices_at(args.b0_threshold);
    anyhow::ensure!(
        !b0_indices.is_empty(),
        "no b0 volumes at threshold {}",
        args.b0_threshold
    );
    let b0_volumes: Vec<Volume> = b0_indices
        .iter()
        .map(|&i| series.volumes[i].clone())
        .collect();

    let model = match args.transform.as_str() {
        "rigid" => TransformModel::Rigid,
        "affine" => TransformModel::Affine,
        other => anyhow::bail!("unknown transform '{other}', expected rigid or affine"),
    };

    let config = TemplateConfig {
        model,
        iterations: args.iterations,
        ..TemplateConfig::default()
    };
    let engine = CentroidEngine::default();
    let reporter = BarReporter::new();

    println!(
        "Building template from {} b0 volume(s), {} iteration(s)",
        b0_volumes.len(),
        args.iterations
    );
    let result = build_template(&b0_volumes, &config, &engine, &reporter)?;

    nifti::write_volume(&args.output, &result.final_template)?;
    println!("Template saved to {}", args.output.display());

    if let Some(ref path) = args.transforms {
        transforms::write_transforms(path, &result.history)?;
        println!("Transforms saved to {}", path.display());
    }

    Ok(())
}
