//! Command-line interface definitions for docker-fwd.
//!
//! Uses clap's derive API for type-safe argument parsing. Every flag is an
//! override on top of the config file and environment (see [`crate::config`]).

use clap::Parser;
use std::path::PathBuf;

/// Keep an SSH port-forwarding tunnel in sync with a remote Docker host.
///
/// docker-fwd periodically discovers which container ports are published on
/// the remote host and maintains a single ssh tunnel forwarding exactly that
/// set, restarting it only when the set changes. A loopback HTTP control
/// surface triggers refreshes and reports state.
#[derive(Parser, Debug)]
#[command(name = "docker-fwd")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML config file.
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Remote Docker host to tunnel to.
    #[arg(long = "host", value_name = "HOST")]
    pub host: Option<String>,

    /// SSH user on the remote host (default: docker).
    #[arg(long = "user", value_name = "USER")]
    pub user: Option<String>,

    /// SSH identity file.
    #[arg(short = 'i', long = "identity", value_name = "PATH")]
    pub identity: Option<PathBuf>,

    /// Port for the loopback control server (default: 59145).
    #[arg(long = "control-port", value_name = "PORT")]
    pub control_port: Option<u16>,

    /// Discover ports via the Docker Engine API instead of a command.
    #[arg(long = "api")]
    pub api: bool,

    /// Docker Engine API endpoint (implies --api).
    #[arg(long = "api-url", value_name = "URL")]
    pub api_url: Option<String>,

    /// Forward this port unconditionally (repeatable).
    ///
    /// Useful for the Docker daemon's own plain/TLS ports (2375, 2376),
    /// which some setups want forwarded alongside container ports.
    #[arg(long = "always-forward", value_name = "PORT")]
    pub always_forward: Vec<u16>,

    /// Seconds between periodic reconcile cycles (default: 30).
    #[arg(long = "interval", value_name = "SECS")]
    pub interval: Option<u64>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}
