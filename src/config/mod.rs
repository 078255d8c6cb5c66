//! Configuration system for docker-fwd.
//!
//! Sources are merged in order, each overriding the last:
//!
//! 1. TOML config file (`--config`, or `~/.config/docker-fwd/config.toml`)
//! 2. Environment variables (`DOCKER_FWD_*`, legacy `BOOT2DOCKER_HOST`)
//! 3. CLI flags
//!
//! # Example
//!
//! ```toml
//! [remote]
//! host = "192.168.59.103"
//! user = "docker"
//! identity_file = "~/.ssh/id_boot2docker"
//!
//! [control]
//! port = 59145
//!
//! [discovery]
//! mode = "command"
//! command = "docker forwarded-ports"
//! interval_secs = 30
//! always_forward = [2375, 2376]
//! ```

mod error;
mod loader;
mod schema;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{Config, ControlConfig, DiscoveryConfig, DiscoveryMode, RemoteConfig};
