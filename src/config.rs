//! Runtime configuration for sitewright.
//!
//! Layered resolution, lowest priority first: built-in defaults, a
//! `sitewright.toml` file, `SITEWRIGHT_*` environment variables, CLI flags.
//!
//! # Configuration File Format
//!
//! ```toml
//! [sessions]
//! dir = "/var/lib/sitewright/sessions"
//! ttl_secs = 1800
//!
//! [correction]
//! max_attempts = 3
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default sliding-expiry window for sessions (30 minutes).
pub const DEFAULT_SESSION_TTL_SECS: u64 = 1800;

/// Default attempt ceiling for the correction loop.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Session storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Directory holding one JSON record (and one lock file) per session.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Sliding-expiry window in seconds.
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

/// Correction-loop settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrectionConfig {
    /// Maximum generation attempts before a forced decision.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

/// On-disk representation of `sitewright.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub correction: CorrectionConfig,
}

impl ConfigFile {
    /// Load a config file, returning defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding session records and lock files.
    pub session_dir: PathBuf,
    /// Sliding-expiry window in seconds.
    pub session_ttl_secs: u64,
    /// Maximum correction-loop attempts.
    pub max_attempts: u32,
    pub verbose: bool,
}

impl Config {
    /// Resolve configuration from defaults, an optional config file, and the
    /// environment.
    pub fn resolve(config_file: Option<&Path>, verbose: bool) -> Result<Self> {
        let file = match config_file {
            Some(path) => ConfigFile::load(path)?,
            None => {
                let default_path = PathBuf::from("sitewright.toml");
                ConfigFile::load(&default_path)?
            }
        };

        let session_dir = env_path("SITEWRIGHT_SESSION_DIR")
            .or(file.sessions.dir)
            .unwrap_or_else(Self::default_session_dir);

        let session_ttl_secs = env_u64("SITEWRIGHT_SESSION_TTL_SECS")
            .or(file.sessions.ttl_secs)
            .unwrap_or(DEFAULT_SESSION_TTL_SECS);

        let max_attempts = env_u64("SITEWRIGHT_MAX_ATTEMPTS")
            .map(|v| v as u32)
            .or(file.correction.max_attempts)
            .unwrap_or(DEFAULT_MAX_ATTEMPTS)
            .max(1);

        Ok(Self {
            session_dir,
            session_ttl_secs,
            max_attempts,
            verbose,
        })
    }

    /// Default session directory: the user data dir if available, otherwise
    /// a subdirectory of the system temp dir.
    fn default_session_dir() -> PathBuf {
        dirs::data_dir()
            .map(|d| d.join("sitewright").join("sessions"))
            .unwrap_or_else(|| std::env::temp_dir().join("sitewright_sessions"))
    }

    /// Create the session directory if missing.
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.session_dir)
            .context("Failed to create session directory")?;
        Ok(())
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key).map(PathBuf::from)
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
