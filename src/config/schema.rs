//! Configuration schema definitions.
//!
//! Configuration is resolved from three sources, each overriding the last:
//!
//! 1. TOML config file (`--config` flag or `~/.config/docker-fwd/config.toml`)
//! 2. Environment variables (`DOCKER_FWD_*`, legacy `BOOT2DOCKER_HOST`)
//! 3. CLI flags (highest priority)
//!
//! The only required value after merging is `remote.host`; everything else
//! has a working default.

use super::error::ConfigError;
use crate::control::DEFAULT_CONTROL_PORT;
use crate::ports::PortSet;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Remote Docker host and ssh settings.
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Control surface settings.
    #[serde(default)]
    pub control: ControlConfig,

    /// Port discovery settings.
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

impl Config {
    /// Validate the merged configuration.
    ///
    /// Missing required configuration is fatal at startup; the supervisor
    /// never starts with a half-configured tunnel target.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.remote.host {
            Some(host) if !host.trim().is_empty() => {}
            _ => return Err(ConfigError::MissingRemoteHost),
        }

        if self.discovery.mode == DiscoveryMode::Command
            && self.discovery.command.trim().is_empty()
        {
            return Err(ConfigError::InvalidValue {
                field: "discovery.command".to_string(),
                message: "must be non-empty in command mode".to_string(),
            });
        }

        if self.discovery.interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "discovery.interval_secs".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.discovery.always_forward.contains(&0) {
            return Err(ConfigError::InvalidValue {
                field: "discovery.always_forward".to_string(),
                message: "port 0 is not forwardable".to_string(),
            });
        }

        Ok(())
    }
}

/// Remote Docker host and ssh settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteConfig {
    /// Hostname or address of the remote Docker host. Required.
    pub host: Option<String>,

    /// SSH user on the remote host.
    #[serde(default = "default_user")]
    pub user: String,

    /// SSH identity file, if the default keys won't do.
    pub identity_file: Option<PathBuf>,

    /// SSH connect timeout in seconds. Short, so a dead host fails fast.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: None,
            user: default_user(),
            identity_file: None,
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl RemoteConfig {
    /// SSH connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Control surface settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControlConfig {
    /// TCP port for the loopback control server.
    #[serde(default = "default_control_port")]
    pub port: u16,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            port: default_control_port(),
        }
    }
}

/// How the published port set is discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryMode {
    /// Shell out to `discovery.command` and scan its output.
    Command,
    /// Query the Docker Engine API at `discovery.api_url`.
    Api,
}

/// Port discovery settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscoveryConfig {
    /// Which discovery provider to use.
    #[serde(default = "default_mode")]
    pub mode: DiscoveryMode,

    /// Command line for command-mode discovery.
    #[serde(default = "default_command")]
    pub command: String,

    /// Docker Engine API endpoint for api-mode discovery
    /// (e.g. `tcp://192.168.59.103:2375`). Local defaults when unset.
    pub api_url: Option<String>,

    /// Seconds between periodic reconcile cycles.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Ports forwarded unconditionally, regardless of what discovery finds.
    ///
    /// Historically the Docker daemon's own plain/TLS ports (2375, 2376).
    /// Empty by default; operators opt in.
    #[serde(default)]
    pub always_forward: Vec<u16>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            command: default_command(),
            api_url: None,
            interval_secs: default_interval(),
            always_forward: Vec::new(),
        }
    }
}

impl DiscoveryConfig {
    /// Reconcile period as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// The always-forwarded ports as a deduplicated [`PortSet`].
    pub fn always_forward_set(&self) -> PortSet {
        self.always_forward.iter().copied().collect()
    }
}

fn default_user() -> String {
    "docker".to_string()
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_control_port() -> u16 {
    DEFAULT_CONTROL_PORT
}

fn default_mode() -> DiscoveryMode {
    DiscoveryMode::Command
}

fn default_command() -> String {
    "docker forwarded-ports".to_string()
}

fn default_interval() -> u64 {
    30
}
