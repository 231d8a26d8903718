//! mask_explore - dump every segmentation stage of one image as PNG
//!
//! Useful when tuning cue thresholds: each stage shows what one cue keeps.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use image::GrayImage;
use std::path::{Path, PathBuf};

use firewatch_kernel::detect::segment::{count_nonzero, ColorSpaceSegmenter};
use firewatch_kernel::{Frame, PipelineConfig, PipelineProfile};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Input image.
    input: PathBuf,
    /// Output directory for stage images.
    #[arg(long, default_value = "mask_stages")]
    out_dir: PathBuf,
    /// Detection profile whose cues to apply (basic|strict).
    #[arg(long, default_value = "strict")]
    profile: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let profile = PipelineProfile::parse(&args.profile)
        .ok_or_else(|| anyhow!("unknown profile {:?} (expected basic or strict)", args.profile))?;
    let config = PipelineConfig::for_profile(profile);
    config.validate()?;

    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let frame = Frame::decode(&bytes)?;
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("failed to create {}", args.out_dir.display()))?;

    let stages = ColorSpaceSegmenter::new(config.cues).stages(&frame);
    let out = args.out_dir.as_path();
    stages
        .blurred
        .save(out.join("blurred.png"))
        .context("failed to write blurred.png")?;
    save_mask(out, "hsv", &stages.color)?;
    if let Some(mask) = &stages.heat {
        save_mask(out, "chroma", mask)?;
    }
    if let Some(mask) = &stages.bright {
        save_mask(out, "lightness", mask)?;
    }
    save_mask(out, "combined", &stages.combined)?;
    save_mask(out, "fire_mask", &stages.fire_mask)?;
    Ok(())
}

fn save_mask(dir: &Path, name: &str, mask: &GrayImage) -> Result<()> {
    let path = dir.join(format!("{}.png", name));
    mask.save(&path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    log::info!("{}: {} pixels set", name, count_nonzero(mask));
    Ok(())
}
