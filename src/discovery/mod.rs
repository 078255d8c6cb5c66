//! Port discovery for the tunnel supervisor.
//!
//! Discovery answers one question: which ports should currently be forwarded?
//! Two providers exist:
//!
//! - [`CommandDiscovery`] shells out to an external command and scans its
//!   output for `<port>/<proto> -> <ip>:<hostPort>` lines.
//! - [`ApiDiscovery`] queries the Docker Engine API and collects every
//!   published host port across all containers.
//!
//! Both union in a configurable set of always-forwarded ports (historically
//! the Docker daemon's own plain/TLS ports) before returning.
//!
//! The supervisor only sees the [`PortDiscovery`] trait, so tests can inject
//! scripted stubs without touching a shell or a daemon.

mod api;
mod command;
mod error;

pub use api::ApiDiscovery;
pub use command::{parse_port_lines, CommandDiscovery};
pub use error::{DiscoveryError, DiscoveryResult};

use crate::ports::PortSet;
use std::future::Future;

/// A source of the currently published port set.
///
/// A failed discovery must leave the caller's state untouched; providers
/// return an error rather than a partial set.
pub trait PortDiscovery: Send + Sync {
    /// Determine the set of ports that should currently be forwarded.
    fn discover(&self) -> impl Future<Output = DiscoveryResult<PortSet>> + Send;
}

/// Runtime-selected discovery provider.
pub enum Provider {
    /// Shell out to an external command and scan its output.
    Command(CommandDiscovery),
    /// Query the Docker Engine API.
    Api(ApiDiscovery),
}

impl PortDiscovery for Provider {
    async fn discover(&self) -> DiscoveryResult<PortSet> {
        match self {
            Provider::Command(p) => p.discover().await,
            Provider::Api(p) => p.discover().await,
        }
    }
}
