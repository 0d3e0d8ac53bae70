use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use moco_core::pipeline::config::{HmcSection, TemplateSection};
use moco_core::pipeline::MocoConfig;

#[derive(Args)]
pub struct ConfigArgs {
    /// Write config to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Print or save a full default MocoConfig as TOML.
pub fn run(args: &ConfigArgs) -> Result<()> {
    let config = MocoConfig {
        dwi: PathBuf::from("dwi.nii.gz"),
        bval: PathBuf::from("dwi.bval"),
        bvec: PathBuf::from("dwi.bvec"),
        mask: PathBuf::from("mask.nii.gz"),
        output_dir: PathBuf::from("moco_out"),
        b0_threshold: 100.0,
        template: TemplateSection::default(),
        hmc: HmcSection::default(),
        concurrency: None,
    };
    let toml_str = toml::to_string_pretty(&config)?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &toml_str)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        println!("Default config saved to {}", path.display());
    } else {
        print!("{}", toml_str);
    }

    Ok(())
}
