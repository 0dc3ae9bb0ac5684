//! Configuration management.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration structure that matches the TOML file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    teardown: TeardownConfig,
    #[serde(default)]
    events: EventsConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TeardownConfig {
    #[serde(default = "default_unref_delay_ms")]
    unref_delay_ms: u64,
    #[serde(default = "default_grace_period_ms")]
    grace_period_ms: u64,
    #[serde(default = "default_workers")]
    workers: usize,
}

impl Default for TeardownConfig {
    fn default() -> Self {
        Self {
            unref_delay_ms: default_unref_delay_ms(),
            grace_period_ms: default_grace_period_ms(),
            workers: default_workers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EventsConfig {
    #[serde(default = "default_buffer_size")]
    buffer_size: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct LoggingConfig {
    /// Path to log file (if set, logs will be written to file in addition to stdout)
    log_file: Option<PathBuf>,
    /// Log level (trace, debug, info, warn, error)
    /// If not set, uses RUST_LOG environment variable or defaults to "info"
    log_level: Option<String>,
}

fn default_unref_delay_ms() -> u64 {
    10
}

fn default_grace_period_ms() -> u64 {
    1000
}

fn default_workers() -> usize {
    2
}

fn default_buffer_size() -> usize {
    64
}

/// Bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Delay between the start of teardown and the pipeline unref
    pub unref_delay: Duration,
    /// Upper bound on waiting for the main loop to drain before the final free
    pub grace_period: Duration,
    /// Worker threads of the teardown runtime
    pub teardown_workers: usize,
    /// Capacity of each controller's event broadcast channel
    pub event_buffer_size: usize,
    /// Path to log file (if set, logs will be written to file in addition to stdout)
    pub log_file: Option<PathBuf>,
    /// Log level (if set, overrides RUST_LOG environment variable)
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with full priority chain: CLI args > env vars > config files > defaults.
    ///
    /// Config files are merged in this order (later wins):
    /// 1. `config.toml` in user config directory (~/.config/gstlaunch/ on Linux)
    /// 2. `.gstlaunch.toml` in current directory
    /// 3. `config_path`, if given
    pub fn from_figment(
        config_path: Option<PathBuf>,
        log_level: Option<String>,
        log_file: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let local_config = std::env::current_dir()
            .ok()
            .map(|d| d.join(".gstlaunch.toml"));
        let user_config = directories::ProjectDirs::from("", "", "gstlaunch")
            .map(|dirs| dirs.config_dir().join("config.toml"));

        // 1. Start with defaults
        let mut figment = Figment::new().merge(Serialized::defaults(ConfigFile::default()));

        // 2. Merge config files that exist
        for path in [user_config, local_config].into_iter().flatten() {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        // 3. An explicitly requested file must exist
        if let Some(ref path) = config_path {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            figment = figment.merge(Toml::file(path));
        }

        // 4. Merge environment variables (GSTLAUNCH_SECTION__KEY)
        figment = figment.merge(Env::prefixed("GSTLAUNCH_").split("__"));

        // 5. Merge CLI arguments (highest priority)
        if let Some(ref level) = log_level {
            figment = figment.merge(Serialized::default("logging.log_level", level));
        }
        if let Some(ref file) = log_file {
            figment = figment.merge(Serialized::default("logging.log_file", file));
        }

        let config_file: ConfigFile = figment.extract()?;
        Self::from_file(config_file)
    }

    fn from_file(file: ConfigFile) -> anyhow::Result<Self> {
        if file.teardown.workers == 0 {
            anyhow::bail!("teardown.workers must be at least 1");
        }
        if file.events.buffer_size == 0 {
            anyhow::bail!("events.buffer_size must be at least 1");
        }

        Ok(Self {
            unref_delay: Duration::from_millis(file.teardown.unref_delay_ms),
            grace_period: Duration::from_millis(file.teardown.grace_period_ms),
            teardown_workers: file.teardown.workers,
            event_buffer_size: file.events.buffer_size,
            log_file: file.logging.log_file,
            log_level: file.logging.log_level,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            unref_delay: Duration::from_millis(default_unref_delay_ms()),
            grace_period: Duration::from_millis(default_grace_period_ms()),
            teardown_workers: default_workers(),
            event_buffer_size: default_buffer_size(),
            log_file: None,
            log_level: None,
        }
    }
}
