//! Configuration loading and source merging.
//!
//! File, then environment, then CLI flags, each overriding the last. The
//! file is optional; the environment alone (`DOCKER_FWD_HOST` or the legacy
//! `BOOT2DOCKER_HOST`) is enough to run.

use super::error::ConfigError;
use super::schema::{Config, DiscoveryMode};
use crate::cli::Cli;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loads and merges configuration from file, environment, and CLI.
#[derive(Debug, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Create a new loader.
    pub fn new() -> Self {
        Self
    }

    /// Load the merged, validated configuration.
    pub fn load(&self, cli: &Cli) -> Result<Config, ConfigError> {
        let mut config = match self.config_path(cli) {
            Some(path) => {
                debug!("Loading config file {:?}", path);
                load_file(&path)?
            }
            None => Config::default(),
        };

        apply_env_from(&mut config, |name| std::env::var(name).ok())?;
        apply_cli(&mut config, cli);
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config file path: `--config` wins, otherwise the default
    /// user path if it exists.
    fn config_path(&self, cli: &Cli) -> Option<PathBuf> {
        if let Some(path) = &cli.config {
            return Some(path.clone());
        }
        let default = default_config_path()?;
        default.exists().then_some(default)
    }
}

/// Default user config path (`~/.config/docker-fwd/config.toml`).
fn default_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("docker-fwd")
            .join("config.toml"),
    )
}

/// Read and parse a TOML config file.
fn load_file(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::ParseError {
        path: path.to_path_buf(),
        source,
    })
}

/// Apply environment overrides through a lookup function.
///
/// Taking the lookup as a closure keeps this testable without mutating
/// process-global environment state.
fn apply_env_from(
    config: &mut Config,
    get: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(host) = get("DOCKER_FWD_HOST").or_else(|| get("BOOT2DOCKER_HOST")) {
        config.remote.host = Some(host);
    }
    if let Some(user) = get("DOCKER_FWD_USER") {
        config.remote.user = user;
    }
    if let Some(identity) = get("DOCKER_FWD_IDENTITY") {
        config.remote.identity_file = Some(PathBuf::from(identity));
    }
    if let Some(port) = get("DOCKER_FWD_CONTROL_PORT") {
        config.control.port = port.parse().map_err(|_| ConfigError::InvalidValue {
            field: "DOCKER_FWD_CONTROL_PORT".to_string(),
            message: format!("not a valid port: {}", port),
        })?;
    }
    if let Some(url) = get("DOCKER_FWD_API_URL") {
        config.discovery.api_url = Some(url);
        config.discovery.mode = DiscoveryMode::Api;
    }
    if let Some(interval) = get("DOCKER_FWD_INTERVAL") {
        config.discovery.interval_secs =
            interval.parse().map_err(|_| ConfigError::InvalidValue {
                field: "DOCKER_FWD_INTERVAL".to_string(),
                message: format!("not a valid number of seconds: {}", interval),
            })?;
    }
    Ok(())
}

/// Apply CLI flag overrides (highest priority).
fn apply_cli(config: &mut Config, cli: &Cli) {
    if let Some(host) = &cli.host {
        config.remote.host = Some(host.clone());
    }
    if let Some(user) = &cli.user {
        config.remote.user = user.clone();
    }
    if let Some(identity) = &cli.identity {
        config.remote.identity_file = Some(identity.clone());
    }
    if let Some(port) = cli.control_port {
        config.control.port = port;
    }
    if cli.api {
        config.discovery.mode = DiscoveryMode::Api;
    }
    if let Some(url) = &cli.api_url {
        config.discovery.api_url = Some(url.clone());
        config.discovery.mode = DiscoveryMode::Api;
    }
    if let Some(interval) = cli.interval {
        config.discovery.interval_secs = interval;
    }
    config
        .discovery
        .always_forward
        .extend(cli.always_forward.iter().copied());
}
