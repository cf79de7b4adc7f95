use std::path::Path;

use config::{Config, Environment, File};
use miette::{Context, IntoDiagnostic, Result};
use serde::Deserialize;

/// Prefix of the environment variables overriding the settings,
/// e.g. `SPACEREC__CORRECTOR__TOLERANCE=0.02`
const ENV_PREFIX: &str = "SPACEREC";

/// Tuning knobs that do not deserve a CLI flag
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub corrector: CorrectorSettings,
    pub tools: ToolSettings,
    pub api: ApiSettings,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CorrectorSettings {
    /// Maximum relative ratio difference still considered the same geometry
    pub tolerance: f64,
    /// Sample one frame out of this many
    pub stride: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolSettings {
    pub primary: String,
    pub fallback: String,
    pub ffmpeg: String,
    pub ffprobe: String,
    /// Maximum duration of one download attempt
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Settings {
    /// Load the settings from the defaults, the optional file, then the environment
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("corrector.tolerance", 0.01)
            .and_then(|b| b.set_default("corrector.stride", 30))
            .and_then(|b| b.set_default("tools.primary", "twspace_dl"))
            .and_then(|b| b.set_default("tools.fallback", "yt-dlp"))
            .and_then(|b| b.set_default("tools.ffmpeg", "ffmpeg"))
            .and_then(|b| b.set_default("tools.ffprobe", "ffprobe"))
            .and_then(|b| b.set_default("tools.timeout_secs", 4 * 60 * 60))
            .and_then(|b| b.set_default("api.base_url", "https://api.x.com/2"))
            .and_then(|b| b.set_default("api.timeout_secs", 30))
            .into_diagnostic()
            .wrap_err("Could not set default settings")?;

        if let Some(file) = file {
            builder = builder.add_source(File::from(file));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .into_diagnostic()
            .wrap_err("Could not read settings")?
            .try_deserialize()
            .into_diagnostic()
            .wrap_err("Invalid settings")?;

        if !(settings.corrector.tolerance >= 0.0) {
            return Err(miette::miette!(
                "corrector.tolerance must be a positive number, got {}",
                settings.corrector.tolerance
            ));
        }

        Ok(settings)
    }
}
