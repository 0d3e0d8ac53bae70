use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use moco_core::consts::DEFAULT_B0_THRESHOLD;
use moco_core::io::{gradients, nifti};
use moco_core::volume::DwiSeries;

#[derive(Args)]
pub struct InfoArgs {
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
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let volumes = nifti::load_series(&args.dwi)?;
    let grads = gradients::load_gradients(&args.bval, &args.bvec)?;
    let series = DwiSeries::new(volumes, grads)?;

    let dim = series.volumes[0].dim();
    let b0 = series.b0_indices_at(args.b0_threshold);

    println!("File:        {}", args.dwi.display());
    println!("Volumes:     {}", series.len());
    println!("Dimensions:  {}x{}x{}", dim.0, dim.1, dim.2);
    println!("b0 volumes:  {} (b <= {})", b0.len(), args.b0_threshold);

    // Rounded b-values bucket the shells for display.
    let mut shells: BTreeMap<i64, usize> = BTreeMap::new();
    for grad in &series.gradients {
        *shells.entry((grad.bval / 100.0).round() as i64 * 100).or_default() += 1;
    }
    println!("Shells:");
    for (bval, count) in &shells {
        println!("  b={:<6} {} volume(s)", bval, count);
    }

    Ok(())
}
