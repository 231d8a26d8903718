//! fire_detect - run the detector over a sequence of image files
//!
//! Every input is one frame of the same stream: they share one detector, so
//! alerting is debounced across the whole sequence. Each frame prints one
//! JSON line on stdout.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use firewatch_kernel::alert::{LogAlarm, LogNotifier, ThreadDispatcher};
use firewatch_kernel::{
    DetectionResult, EncodedImage, FireDetector, FirewatchConfig, Frame, PipelineConfig,
    PipelineProfile,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Image files, processed in order as one frame sequence.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Detection profile (basic|strict). Overrides the config file.
    #[arg(long, env = "FIREWATCH_PROFILE")]
    profile: Option<String>,
    /// Directory to write segmented and annotated artifacts into.
    #[arg(long)]
    artifacts_dir: Option<PathBuf>,
    /// Reset alert state after every frame.
    #[arg(long, default_value_t = false)]
    reset_between: bool,
    /// Include base64 artifacts in the JSON output.
    #[arg(long, default_value_t = false)]
    include_artifacts: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = FirewatchConfig::load()?;
    if let Some(name) = args.profile.as_deref() {
        let profile = PipelineProfile::parse(name)
            .ok_or_else(|| anyhow!("unknown profile {:?} (expected basic or strict)", name))?;
        if profile != cfg.profile {
            cfg.profile = profile;
            cfg.pipeline = PipelineConfig::for_profile(profile);
        }
    }
    if let Some(dir) = &args.artifacts_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let detector = FireDetector::new(cfg.pipeline.clone(), cfg.alerts)?
        .with_encoder(Arc::new(cfg.encoder()));
    let dispatcher = ThreadDispatcher::new(
        Arc::new(LogAlarm),
        Arc::new(LogNotifier::new(cfg.notify.clone())),
        detector.alert_handle(),
    );
    log::info!(
        "fire_detect running: profile {:?}, {} frame(s)",
        cfg.profile,
        args.inputs.len()
    );

    let mut failures = 0usize;
    for path in &args.inputs {
        let bytes =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let frame = match Frame::decode(&bytes) {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("{} skipped: {}", path.display(), err);
                failures += 1;
                continue;
            }
        };
        let result = match detector.detect_and_dispatch(&frame, &dispatcher) {
            Ok(result) => result,
            Err(err) => {
                log::warn!("{} failed: {}", path.display(), err);
                failures += 1;
                continue;
            }
        };
        if let Some(dir) = &args.artifacts_dir {
            write_artifacts(dir, path, &result)?;
        }
        println!("{}", render(path, &result, args.include_artifacts)?);

        if args.reset_between {
            detector.reset_and_dispatch(&dispatcher);
        }
    }

    dispatcher.wait();
    let state = detector.alert_state();
    log::info!(
        "done: alarm_active={} notified={} fire_streak={}",
        state.alarm_active,
        state.notified,
        state.fire_streak
    );
    if failures > 0 {
        return Err(anyhow!("{} of {} frame(s) failed", failures, args.inputs.len()));
    }
    Ok(())
}

fn render(path: &Path, result: &DetectionResult, include_artifacts: bool) -> Result<String> {
    let line = if include_artifacts {
        json!({ "file": path.display().to_string(), "result": result })
    } else {
        json!({
            "file": path.display().to_string(),
            "detected": result.detected,
            "confidence": result.confidence,
            "red_pixel_count": result.red_pixel_count,
            "locations": result.locations,
            "landmarks": result.landmarks,
            "timestamp": result.timestamp,
        })
    };
    Ok(serde_json::to_string(&line)?)
}

fn write_artifacts(dir: &Path, input: &Path, result: &DetectionResult) -> Result<()> {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frame".to_string());
    write_artifact(dir, &stem, "segmented", &result.segmented_image)?;
    write_artifact(dir, &stem, "annotated", &result.annotated_image)
}

fn write_artifact(dir: &Path, stem: &str, kind: &str, image: &EncodedImage) -> Result<()> {
    let path = dir.join(format!("{}_{}.{}", stem, kind, image.format.extension()));
    std::fs::write(&path, &image.bytes)
        .with_context(|| format!("failed to write {}", path.display()))?;
    log::debug!("wrote {}", path.display());
    Ok(())
}
