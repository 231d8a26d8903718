use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;

use crate::alert::{AlertPolicy, ArmingPolicy, NotifyConfig};
use crate::artifact::{ArtifactFormat, ImageArtifactEncoder, DEFAULT_JPEG_QUALITY};
use crate::detect::classify::Predicate;
use crate::detect::pipeline::{PipelineConfig, PipelineProfile};

const DEFAULT_RECIPIENT: &str = "Enter_Recipient_Email";
const DEFAULT_SENDER: &str = "Enter_Your_Email";
const DEFAULT_PASSWORD: &str = "Enter_Your_Email_Password";

#[derive(Debug, Deserialize, Default)]
struct FirewatchConfigFile {
    profile: Option<String>,
    pipeline: Option<PipelineConfigFile>,
    alerts: Option<AlertConfigFile>,
    artifacts: Option<ArtifactConfigFile>,
    notify: Option<NotifyConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    working_width: Option<u32>,
    working_height: Option<u32>,
    blur_kernel: Option<u32>,
    closing_kernel: Option<u32>,
    min_area: Option<f64>,
    max_area: Option<f64>,
    predicates: Option<Vec<Predicate>>,
    confidence_scale: Option<f64>,
    annotate_min_mask_pixels: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct AlertConfigFile {
    arming_streak: Option<u32>,
    rearm_notification_on_reset: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct ArtifactConfigFile {
    format: Option<String>,
    jpeg_quality: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
struct NotifyConfigFile {
    recipient: Option<String>,
    sender: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FirewatchConfig {
    pub profile: PipelineProfile,
    pub pipeline: PipelineConfig,
    pub alerts: AlertPolicy,
    pub artifacts: ArtifactSettings,
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactSettings {
    pub format: ArtifactFormat,
    pub jpeg_quality: u8,
}

impl Default for FirewatchConfig {
    fn default() -> Self {
        Self {
            profile: PipelineProfile::default(),
            pipeline: PipelineConfig::default(),
            alerts: AlertPolicy::default(),
            artifacts: ArtifactSettings {
                format: ArtifactFormat::default(),
                jpeg_quality: DEFAULT_JPEG_QUALITY,
            },
            notify: placeholder_notify(),
        }
    }
}

impl FirewatchConfig {
    /// Defaults, then the file named by `FIREWATCH_CONFIG`, then
    /// `FIREWATCH_*` environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("FIREWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: FirewatchConfigFile) -> Result<Self> {
        // Profile picks the base pipeline that file settings then refine.
        let profile_name = std::env::var("FIREWATCH_PROFILE")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .or(file.profile);
        let profile = match profile_name {
            Some(name) => PipelineProfile::parse(&name)
                .ok_or_else(|| anyhow!("unknown profile {:?} (expected basic or strict)", name))?,
            None => PipelineProfile::default(),
        };

        let mut pipeline = PipelineConfig::for_profile(profile);
        if let Some(p) = file.pipeline {
            match (p.working_width, p.working_height) {
                (Some(w), Some(h)) => pipeline.working_size = Some((w, h)),
                (None, None) => {}
                _ => {
                    return Err(anyhow!(
                        "working_width and working_height must be set together"
                    ))
                }
            }
            if let Some(k) = p.blur_kernel {
                pipeline.cues.blur_kernel = k;
            }
            if let Some(k) = p.closing_kernel {
                pipeline.cues.closing_kernel = k;
            }
            if let Some(v) = p.min_area {
                pipeline.min_area = v;
            }
            if let Some(v) = p.max_area {
                pipeline.max_area = v;
            }
            if let Some(v) = p.predicates {
                pipeline.predicates = v;
            }
            if let Some(v) = p.confidence_scale {
                pipeline.confidence_scale = v;
            }
            if let Some(v) = p.annotate_min_mask_pixels {
                pipeline.annotate_min_mask_pixels = v;
            }
        }

        let alerts = AlertPolicy {
            arming: arming_for(
                file.alerts
                    .as_ref()
                    .and_then(|alerts| alerts.arming_streak)
                    .unwrap_or(1),
            ),
            rearm_notification_on_reset: file
                .alerts
                .and_then(|alerts| alerts.rearm_notification_on_reset)
                .unwrap_or(false),
        };

        let format = match file.artifacts.as_ref().and_then(|a| a.format.clone()) {
            Some(name) => parse_format(&name)?,
            None => ArtifactFormat::default(),
        };
        let artifacts = ArtifactSettings {
            format,
            jpeg_quality: file
                .artifacts
                .and_then(|a| a.jpeg_quality)
                .unwrap_or(DEFAULT_JPEG_QUALITY),
        };

        let defaults = placeholder_notify();
        let notify = match file.notify {
            Some(n) => NotifyConfig {
                recipient: n.recipient.unwrap_or(defaults.recipient),
                sender: n.sender.unwrap_or(defaults.sender),
                password: n.password.unwrap_or(defaults.password),
            },
            None => defaults,
        };

        Ok(Self {
            profile,
            pipeline,
            alerts,
            artifacts,
            notify,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(scale) = std::env::var("FIREWATCH_CONFIDENCE_SCALE") {
            self.pipeline.confidence_scale = scale
                .trim()
                .parse()
                .map_err(|_| anyhow!("FIREWATCH_CONFIDENCE_SCALE must be a number"))?;
        }
        if let Ok(streak) = std::env::var("FIREWATCH_ARMING_STREAK") {
            let n: u32 = streak
                .trim()
                .parse()
                .map_err(|_| anyhow!("FIREWATCH_ARMING_STREAK must be a non-negative integer"))?;
            self.alerts.arming = arming_for(n);
        }
        if let Ok(flag) = std::env::var("FIREWATCH_REARM_NOTIFY_ON_RESET") {
            self.alerts.rearm_notification_on_reset = parse_bool(&flag).ok_or_else(|| {
                anyhow!("FIREWATCH_REARM_NOTIFY_ON_RESET must be true or false")
            })?;
        }
        if let Ok(format) = std::env::var("FIREWATCH_ARTIFACT_FORMAT") {
            if !format.trim().is_empty() {
                self.artifacts.format = parse_format(&format)?;
            }
        }
        if let Ok(recipient) = std::env::var("FIREWATCH_NOTIFY_RECIPIENT") {
            if !recipient.trim().is_empty() {
                self.notify.recipient = recipient;
            }
        }
        if let Ok(sender) = std::env::var("FIREWATCH_NOTIFY_SENDER") {
            if !sender.trim().is_empty() {
                self.notify.sender = sender;
            }
        }
        if let Ok(password) = std::env::var("FIREWATCH_NOTIFY_PASSWORD") {
            if !password.trim().is_empty() {
                self.notify.password = password;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        if !(1..=100).contains(&self.artifacts.jpeg_quality) {
            return Err(anyhow!(
                "jpeg_quality must be within 1..=100, got {}",
                self.artifacts.jpeg_quality
            ));
        }
        // Notifier settings are checked at send time; an unconfigured
        // notifier only disables notifications.
        if self.notify.validate().is_err() {
            log::warn!("notifier is not configured; notifications will not be delivered");
        }
        Ok(())
    }

    pub fn encoder(&self) -> ImageArtifactEncoder {
        ImageArtifactEncoder::new(self.artifacts.format).with_jpeg_quality(self.artifacts.jpeg_quality)
    }
}

fn placeholder_notify() -> NotifyConfig {
    NotifyConfig {
        recipient: DEFAULT_RECIPIENT.to_string(),
        sender: DEFAULT_SENDER.to_string(),
        password: DEFAULT_PASSWORD.to_string(),
    }
}

fn arming_for(streak: u32) -> ArmingPolicy {
    if streak <= 1 {
        ArmingPolicy::Immediate
    } else {
        ArmingPolicy::Streak(streak)
    }
}

fn parse_format(name: &str) -> Result<ArtifactFormat> {
    ArtifactFormat::parse(name)
        .ok_or_else(|| anyhow!("unknown artifact format {:?} (expected jpeg or png)", name))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn read_config_file(path: &Path) -> Result<FirewatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
