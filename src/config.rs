//! Runtime configuration.
//! Sources, lowest to highest precedence: defaults → JSON file → environment → CLI.
//! All durations are fractional seconds; `validate()` must pass before the loop runs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audio::ring_buffer::RingBuffer;
use crate::clock::secs;
use crate::error::ConfigError;

/// Environment variable naming an optional JSON config file.
pub const CONFIG_PATH_ENV: &str = "ARC_ASSIST_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Peak amplitude a clap must exceed (i16 units).
    pub clap_threshold: f64,
    /// Double-clap window in seconds.
    pub clap_interval_secs: f64,
    /// How long clap gestures are evaluated after the wake word.
    pub active_duration_secs: f64,
    /// How long a triple clap is awaited after the primary action.
    pub followup_wait_secs: f64,
    pub wake: WakeConfig,
    pub audio: AudioConfig,
    pub launcher: LauncherConfig,
    pub debug: bool,
    /// Plain-text copy of the log, appended to.
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clap_threshold: 1800.0,
            clap_interval_secs: 0.7,
            active_duration_secs: 5.0,
            followup_wait_secs: 30.0,
            wake: WakeConfig::default(),
            audio: AudioConfig::default(),
            launcher: LauncherConfig::default(),
            debug: false,
            log_file: None,
        }
    }
}

/// Built-in wake engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeConfig {
    pub sample_rate: u32,
    /// Samples per frame handed to the detectors.
    pub frame_length: usize,
    pub spike_ratio: f32,
    /// Spike score in (0, 1] at which a frame counts as the wake word.
    pub min_score: f32,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            frame_length: 512, // 32ms at 16kHz
            spike_ratio: 3.0,
            min_score: 0.5,
        }
    }
}

/// Capture settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub ring_buffer_secs: f32,
    /// A read that waits this long without a full frame yields "no data".
    pub read_timeout_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            ring_buffer_secs: 3.0,
            read_timeout_ms: 500,
        }
    }
}

/// Action targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Opened in a browser as part of the primary set.
    pub primary_url: String,
    /// Opened by the follow-up triple clap.
    pub secondary_url: String,
    /// Replaces the per-OS primary set; each entry is an argv vector.
    pub primary_commands: Option<Vec<Vec<String>>>,
    /// Pause between launches in the primary set.
    pub launch_spacing_ms: u64,
    /// Editor started on Windows.
    pub vs_code_path: String,
    /// Windows only; launched when set and present on disk.
    pub spotify_path: Option<String>,
    /// Windows only; launched when set and present on disk.
    pub discord_path: Option<String>,
    /// Windows browser; launched when present on disk.
    pub brave_path: String,
    /// Folder VS Code opens on macOS when it exists. `~/` is the home directory.
    pub project_dir: String,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            primary_url: "https://claude.ai".into(),
            secondary_url: "https://github.com".into(),
            primary_commands: None,
            launch_spacing_ms: 500,
            vs_code_path: "code".into(),
            spotify_path: None,
            discord_path: None,
            brave_path: "brave".into(),
            project_dir: "~/code/tbt".into(),
        }
    }
}

impl Config {
    /// Defaults, then the JSON file (`path` or `$ARC_ASSIST_CONFIG`), then environment.
    /// Not validated; callers apply CLI overrides and call `validate()`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var_os(CONFIG_PATH_ENV).map(std::path::PathBuf::from);
        let mut config = match path.or(env_path.as_deref()) {
            Some(p) => Self::load_from_file(p)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Load config from a JSON file. Missing fields take their defaults.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        debug!(path = %path.display(), "config_file_loaded");
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some((var, value)) = lookup_first(&lookup, &["CLAP_THRESHOLD"]) {
            self.clap_threshold = parse_f64(var, &value)?;
        }
        if let Some((var, value)) = lookup_first(&lookup, &["CLAP_INTERVAL"]) {
            self.clap_interval_secs = parse_f64(var, &value)?;
        }
        if let Some((var, value)) = lookup_first(&lookup, &["ACTIVE_DURATION"]) {
            self.active_duration_secs = parse_f64(var, &value)?;
        }
        if let Some((var, value)) =
            lookup_first(&lookup, &["FOLLOWUP_WAIT_DURATION", "TRIPLE_WAIT_DURATION"])
        {
            self.followup_wait_secs = parse_f64(var, &value)?;
        }
        if let Some((_, value)) = lookup_first(&lookup, &["PRIMARY_URL", "CHROME_URL"]) {
            self.launcher.primary_url = value;
        }
        if let Some((_, value)) = lookup_first(&lookup, &["SECONDARY_URL", "GITHUB_URL"]) {
            self.launcher.secondary_url = value;
        }
        if let Some((_, value)) = lookup_first(&lookup, &["VS_CODE_PATH"]) {
            self.launcher.vs_code_path = value;
        }
        if let Some((_, value)) = lookup_first(&lookup, &["SPOTIFY_PATH"]) {
            self.launcher.spotify_path = Some(value);
        }
        if let Some((_, value)) = lookup_first(&lookup, &["DISCORD_PATH"]) {
            self.launcher.discord_path = Some(value);
        }
        if let Some((_, value)) = lookup_first(&lookup, &["BRAVE_PATH"]) {
            self.launcher.brave_path = value;
        }
        if let Some((_, value)) = lookup_first(&lookup, &["ARC_ASSIST_LOG"]) {
            self.log_file = Some(PathBuf::from(value));
        }
        if let Some((_, value)) = lookup_first(&lookup, &["DEBUG"]) {
            self.debug = value.trim().eq_ignore_ascii_case("true");
        }
        Ok(())
    }

    /// Reject values the core cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("clap_threshold", self.clap_threshold)?;
        positive("clap_interval_secs", self.clap_interval_secs)?;
        positive("active_duration_secs", self.active_duration_secs)?;
        positive("followup_wait_secs", self.followup_wait_secs)?;
        measurable("clap_interval_secs", self.clap_interval_secs)?;
        measurable("active_duration_secs", self.active_duration_secs)?;
        measurable("followup_wait_secs", self.followup_wait_secs)?;
        positive("wake.sample_rate", f64::from(self.wake.sample_rate))?;
        positive("wake.frame_length", self.wake.frame_length as f64)?;
        positive("wake.spike_ratio", f64::from(self.wake.spike_ratio))?;
        let min_score = f64::from(self.wake.min_score);
        if !(min_score > 0.0 && min_score <= 1.0) {
            return Err(ConfigError::OutOfRange {
                field: "wake.min_score",
                value: min_score,
                range: "(0, 1]",
            });
        }
        positive("audio.ring_buffer_secs", f64::from(self.audio.ring_buffer_secs))?;
        positive("audio.read_timeout_ms", self.audio.read_timeout_ms as f64)?;
        let capacity = RingBuffer::capacity_for(self.wake.sample_rate, self.audio.ring_buffer_secs);
        if capacity < self.wake.frame_length {
            return Err(ConfigError::FrameExceedsBuffer {
                frame_length: self.wake.frame_length,
                capacity,
            });
        }
        valid_url("launcher.primary_url", &self.launcher.primary_url)?;
        valid_url("launcher.secondary_url", &self.launcher.secondary_url)?;
        Ok(())
    }

    pub fn clap_interval(&self) -> Duration {
        secs(self.clap_interval_secs)
    }

    pub fn active_duration(&self) -> Duration {
        secs(self.active_duration_secs)
    }

    pub fn followup_wait(&self) -> Duration {
        secs(self.followup_wait_secs)
    }

    /// Real-time budget per frame: frame length ÷ sample rate.
    pub fn frame_budget(&self) -> Duration {
        if self.wake.sample_rate == 0 {
            return Duration::ZERO;
        }
        secs(self.wake.frame_length as f64 / f64::from(self.wake.sample_rate))
    }
}

/// First variable in `vars` that is set, with its value.
fn lookup_first<F>(lookup: &F, vars: &[&'static str]) -> Option<(&'static str, String)>
where
    F: Fn(&str) -> Option<String>,
{
    vars.iter().find_map(|&v| lookup(v).map(|value| (v, value)))
}

fn parse_f64(var: &'static str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse::<f64>().map_err(|_| ConfigError::InvalidEnv {
        var,
        value: value.to_string(),
    })
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

/// Positive values that still round to a zero `Duration` are rejected.
fn measurable(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if secs(value).is_zero() {
        Err(ConfigError::TooShort { field, value })
    } else {
        Ok(())
    }
}

/// Accepts http, https and file URLs.
pub fn is_valid_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://") || url.starts_with("file://")
}

fn valid_url(field: &'static str, url: &str) -> Result<(), ConfigError> {
    if is_valid_url(url) {
        Ok(())
    } else {
        Err(ConfigError::InvalidUrl {
            field,
            value: url.to_string(),
        })
    }
}
