use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use moco_core::model::ShellMeanModel;
use moco_core::pipeline::config::{HmcSection, TemplateSection};
use moco_core::pipeline::{run_pipeline_reported, MocoConfig};
use moco_core::registration::{CentroidEngine, TransformModel};

use crate::progress::BarReporter;
use crate::summary::print_run_summary;

#[derive(Args)]
pub struct RunArgs {
    /// 4D diffusion NIfTI file
    pub dwi: Option<PathBuf>,

    /// Pipeline config file (TOML); overrides the other arguments
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// FSL b-value file
    #[arg(long)]
    pub bval: Option<PathBuf>,

    /// FSL gradient-direction file
    #[arg(long)]
    pub bvec: Option<PathBuf>,

    /// 3D brain mask on the series grid
    #[arg(long)]
    pub mask: Option<PathBuf>,

    /// b0 threshold
    #[arg(long, default_value = "100.0")]
    pub b0_threshold: f64,

    /// Template loop iterations (at least 2)
    #[arg(long, default_value = "3")]
    pub template_iterations: usize,

    /// Model HMC loop iterations (at least 2)
    #[arg(long, default_value = "2")]
    pub hmc_iterations: usize,

    /// Transform class for the HMC loop: rigid or affine
    #[arg(long, default_value = "affine")]
    pub transform: String,

    /// Z-score threshold for outlier replacement; 0 disables it
    #[arg(long, default_value = "0.0")]
    pub outlier_threshold: f64,

    /// Worker-pool size for per-volume registration
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Output directory
    #[arg(short, long, default_value = "moco_out")]
    pub output: PathBuf,
}

pub fn run(args: &RunArgs) -> Result<()> {
    let config = if let Some(ref config_path) = args.config {
        MocoConfig::from_file(config_path)
            .with_context(|| format!("Failed to read config {}", config_path.display()))?
    } else {
        build_config_from_args(args)?
    };

    print_run_summary(&config);

    let engine = CentroidEngine::default();
    let model = ShellMeanModel::default();
    let reporter = BarReporter::new();

    let output = run_pipeline_reported(&config, &engine, &model, &reporter)?;

    let flagged = output.hmc.flags.iter().filter(|f| f.flagged).count();
    println!();
    println!("Corrected series: {}", output.corrected_path.display());
    println!("Template:         {}", output.template_path.display());
    println!("Confounds:        {}", output.confounds_path.display());
    println!("Transforms:       {}", output.transforms_path.display());
    if flagged > 0 {
        println!("Outliers:         {flagged} volume(s) replaced");
    }

    Ok(())
}

fn build_config_from_args(args: &RunArgs) -> Result<MocoConfig> {
    let dwi = args.dwi.clone().context("missing DWI file argument")?;
    let bval = args.bval.clone().context("missing --bval")?;
    let bvec = args.bvec.clone().context("missing --bvec")?;
    let mask = args.mask.clone().context("missing --mask")?;

    let transform = match args.transform.as_str() {
        "rigid" => TransformModel::Rigid,
        "affine" => TransformModel::Affine,
        other => anyhow::bail!("unknown transform '{other}', expected rigid or affine"),
    };

    Ok(MocoConfig {
        dwi,
        bval,
        bvec,
        mask,
        output_dir: args.output.clone(),
        b0_threshold: args.b0_threshold,
        template: TemplateSection {
            iterations: args.template_iterations,
            ..TemplateSection::default()
        },
        hmc: HmcSection {
            transform,
            iterations: args.hmc_iterations,
            outlier_threshold: args.outlier_threshold,
        },
        concurrency: args.concurrency,
    })
}
