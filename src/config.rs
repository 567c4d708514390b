//! Configuration management
//!
//! Layers an optional config file and `SPECTRA_*` environment variables
//! over serde defaults. Unknown keys are ignored; missing keys take the
//! documented defaults.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration load failed: {0}")]
    Load(#[from] config::ConfigError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectraConfig {
    /// Cap on concurrently executing intents
    pub max_concurrent_sessions: usize,

    /// Per-step deadline, in seconds
    pub default_timeout: f64,

    /// Browsing session TTL, in seconds
    pub session_timeout: u64,

    /// Retries per step before aborting the run
    pub max_retries: u32,

    /// Structural similarity above which two frames count as "same page"
    pub screenshot_comparison_threshold: f64,

    /// Capacity of the media perception analysis cache
    pub cache_max_size: usize,

    /// Interval of the session expiry sweep, in seconds
    pub cleanup_interval: u64,

    /// Prometheus /metrics port; 0 disables the endpoint
    pub metrics_port: u16,

    /// Directory for durable session blobs; unset means in-memory only
    pub storage_dir: Option<PathBuf>,
}

impl Default for SpectraConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: 10,
            default_timeout: 30.0,
            session_timeout: 3600,
            max_retries: 3,
            screenshot_comparison_threshold: 0.95,
            cache_max_size: 1000,
            cleanup_interval: 300,
            metrics_port: 0,
            storage_dir: None,
        }
    }
}

impl SpectraConfig {
    /// Load configuration: defaults <- file (optional) <- environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(Environment::with_prefix("SPECTRA").try_parsing(true));

        let raw = builder.build()?;
        Ok(raw.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_the_documented_values() {
        let cfg = SpectraConfig::default();
        assert_eq!(cfg.max_concurrent_sessions, 10);
        assert_eq!(cfg.default_timeout, 30.0);
        assert_eq!(cfg.session_timeout, 3600);
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.screenshot_comparison_threshold, 0.95);
        assert_eq!(cfg.cache_max_size, 1000);
        assert_eq!(cfg.cleanup_interval, 300);
    }

    #[test]
    fn file_overrides_defaults_and_unknown_keys_are_ignored() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "max_retries = 5\ncache_max_size = 50\nnot_a_real_option = \"ignored\""
        )
        .unwrap();

        let cfg = SpectraConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.max_retries, 5);
        assert_eq!(cfg.cache_max_size, 50);
        // Untouched keys keep their defaults.
        assert_eq!(cfg.max_concurrent_sessions, 10);
    }
}
