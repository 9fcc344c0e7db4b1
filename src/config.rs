//! Engine configuration
//!
//! Layers, lowest first: built-in defaults, a YAML file, then environment
//! variables of the form `REPLAY__SECTION__KEY` (e.g.
//! `REPLAY__RETRY__MAX_RETRIES=5`).

use crate::errors::ConfigError;
use action_flow::{OrchestratorSettings, RetryPolicy};
use action_locator::ResolverSettings;
use ::config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const ENV_PREFIX: &str = "REPLAY";
const LOCAL_CONFIG: &str = "config/replay.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Everything the engine reads at startup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub retry: RetryPolicy,
    pub orchestrator: OrchestratorSettings,
    pub resolver: ResolverSettings,
    pub logging: LoggingConfig,
}

impl ReplayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let retry = &self.retry;
        for (name, value) in [
            ("retry.initial_threshold", retry.initial_threshold),
            ("retry.relaxed_threshold", retry.relaxed_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if retry.initial_tolerance < 0.0 || retry.relaxed_tolerance < retry.initial_tolerance {
            return Err(ConfigError::Invalid(format!(
                "retry tolerances must satisfy 0 <= initial ({}) <= relaxed ({})",
                retry.initial_tolerance, retry.relaxed_tolerance
            )));
        }
        if retry.relaxed_threshold > retry.initial_threshold {
            return Err(ConfigError::Invalid(format!(
                "retry.relaxed_threshold ({}) exceeds initial_threshold ({})",
                retry.relaxed_threshold, retry.initial_threshold
            )));
        }
        Ok(())
    }
}

/// Default search path: `./config/replay.yaml`, then the user config dir.
pub fn default_config_path() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG);
    if local.exists() {
        return Some(local);
    }
    dirs::config_dir().map(|mut path| {
        path.push("replay-engine");
        path.push("replay.yaml");
        path
    })
}

/// Load the configuration. An explicit `path` must exist; the default
/// locations are optional.
pub fn load_config(path: Option<&Path>) -> Result<ReplayConfig, ConfigError> {
    let mut builder = ::config::Config::builder();

    match path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::Load(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            info!(path = %path.display(), "loading configuration");
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml));
        }
        None => match default_config_path() {
            Some(default) if default.exists() => {
                info!(path = %default.display(), "loading configuration");
                builder = builder.add_source(File::from(default).format(FileFormat::Yaml));
            }
            _ => warn!("no configuration file found, using defaults"),
        },
    }

    let config: ReplayConfig = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    config.validate()?;
    Ok(config)
}
