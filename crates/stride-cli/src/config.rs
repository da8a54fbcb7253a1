//! Configuration Vault – reads/writes `~/.stride/config.toml`.
//!
//! ```toml
//! [telemetry]
//! topic = "rt/sportmodestate"
//! connect_timeout_ms = 3000
//! stale_after_ms = 1000
//!
//! [stability]
//! low_height_m = 0.25
//! min_contact_force_n = 20.0
//! max_tilt_rad = 0.5
//!
//! [sequencer]
//! poll_interval_ms = 100
//!
//! [triggers]
//! cooldown_ms = 2000
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use stride_kernel::StabilityThresholds;
use stride_middleware::SPORT_STATE_TOPIC;
use stride_perception::IngestConfig;
use stride_runtime::SequencerConfig;

/// `[telemetry]` – where state frames come from and when they go stale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySection {
    pub topic: String,
    pub connect_timeout_ms: u64,
    pub stale_after_ms: u64,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            topic: SPORT_STATE_TOPIC.to_string(),
            connect_timeout_ms: 3_000,
            stale_after_ms: 1_000,
        }
    }
}

/// `[sequencer]` – poll cadence for settle and stability waits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerSection {
    /// Clamped to 50–200 ms by the monitor.
    pub poll_interval_ms: u64,
}

impl Default for SequencerSection {
    fn default() -> Self {
        Self { poll_interval_ms: 100 }
    }
}

/// `[triggers]` – spacing between repeats of the same operator trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerSection {
    pub cooldown_ms: u64,
}

impl Default for TriggerSection {
    fn default() -> Self {
        Self { cooldown_ms: 2_000 }
    }
}

/// Persisted operator configuration stored in `~/.stride/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub telemetry: TelemetrySection,
    pub stability: StabilityThresholds,
    pub sequencer: SequencerSection,
    pub triggers: TriggerSection,
}

impl Config {
    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            topic: self.telemetry.topic.clone(),
            connect_timeout: Duration::from_millis(self.telemetry.connect_timeout_ms),
            stale_after: Duration::from_millis(self.telemetry.stale_after_ms),
        }
    }

    pub fn sequencer_config(&self) -> SequencerConfig {
        SequencerConfig {
            poll_interval: Duration::from_millis(self.sequencer.poll_interval_ms),
            thresholds: self.stability,
        }
    }

    pub fn trigger_cooldown(&self) -> Duration {
        Duration::from_millis(self.triggers.cooldown_ms)
    }
}

/// Return the path to `~/.stride/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".stride").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `STRIDE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `STRIDE_TELEMETRY_TOPIC` | `telemetry.topic` |
/// | `STRIDE_STALE_AFTER_MS` | `telemetry.stale_after_ms` |
/// | `STRIDE_POLL_INTERVAL_MS` | `sequencer.poll_interval_ms` |
///
/// Unparseable numbers are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("STRIDE_TELEMETRY_TOPIC") {
        cfg.telemetry.topic = v;
    }
    if let Ok(v) = std::env::var("STRIDE_STALE_AFTER_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.telemetry.stale_after_ms = ms;
    }
    if let Ok(v) = std::env::var("STRIDE_POLL_INTERVAL_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.sequencer.poll_interval_ms = ms;
    }
}

/// Save the config to disk, creating `~/.stride/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
