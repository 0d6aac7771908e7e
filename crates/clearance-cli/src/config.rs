//! Configuration Vault – reads/writes `~/.clearance/config.toml`.

use clearance_kernel::TimeoutPolicy;
use clearance_types::ClearanceError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Persisted gate configuration stored in `~/.clearance/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database holding the detector's status row.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Seconds between two polls of the status row.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: f64,

    /// Seconds without a person before the checklist resets.
    #[serde(default = "default_person_timeout")]
    pub person_timeout_secs: u64,

    /// Seconds a granted clearance stays before the gate re-arms.
    #[serde(default = "default_completion_timeout")]
    pub completion_timeout_secs: u64,

    /// Directory for the daily event journal files.
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

fn default_db_path() -> String {
    "ppe_detection.db".to_string()
}
fn default_refresh_interval() -> f64 {
    5.0
}
fn default_person_timeout() -> u64 {
    30
}
fn default_completion_timeout() -> u64 {
    30
}
fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            refresh_interval_secs: default_refresh_interval(),
            person_timeout_secs: default_person_timeout(),
            completion_timeout_secs: default_completion_timeout(),
            log_dir: default_log_dir(),
        }
    }
}

impl Config {
    /// Validated controller timeouts.
    pub fn timeout_policy(&self) -> Result<TimeoutPolicy, ClearanceError> {
        TimeoutPolicy::from_secs(self.person_timeout_secs, self.completion_timeout_secs)
    }

    /// Validated polling interval.
    pub fn refresh_interval(&self) -> Result<Duration, ClearanceError> {
        let secs = self.refresh_interval_secs;
        if !secs.is_finite() || secs <= 0.0 {
            return Err(ClearanceError::InvalidConfig {
                field: "refresh_interval_secs".to_string(),
                reason: format!("must be a positive number of seconds, got {secs}"),
            });
        }
        Duration::try_from_secs_f64(secs).map_err(|e| ClearanceError::InvalidConfig {
            field: "refresh_interval_secs".to_string(),
            reason: e.to_string(),
        })
    }
}

/// Return the path to `~/.clearance/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".clearance").join("config.toml")
}

/// Load the config from disk and apply environment overrides.  Returns
/// `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    let mut cfg = load_from(&config_path())?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `CLEARANCE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `CLEARANCE_DB_PATH` | `db_path` |
/// | `CLEARANCE_REFRESH_INTERVAL` | `refresh_interval_secs` |
/// | `CLEARANCE_PERSON_TIMEOUT` | `person_timeout_secs` |
/// | `CLEARANCE_COMPLETION_TIMEOUT` | `completion_timeout_secs` |
/// | `CLEARANCE_LOG_DIR` | `log_dir` |
///
/// Values that fail to parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("CLEARANCE_DB_PATH") {
        cfg.db_path = v;
    }
    if let Ok(v) = std::env::var("CLEARANCE_LOG_DIR") {
        cfg.log_dir = v;
    }
    if let Ok(v) = std::env::var("CLEARANCE_REFRESH_INTERVAL")
        && let Ok(secs) = v.parse::<f64>()
    {
        cfg.refresh_interval_secs = secs;
    }
    if let Ok(v) = std::env::var("CLEARANCE_PERSON_TIMEOUT")
        && let Ok(secs) = v.parse::<u64>()
    {
        cfg.person_timeout_secs = secs;
    }
    if let Ok(v) = std::env::var("CLEARANCE_COMPLETION_TIMEOUT")
        && let Ok(secs) = v.parse::<u64>()
    {
        cfg.completion_timeout_secs = secs;
    }
}

/// Save the config to disk, creating `~/.clearance/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
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
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
