//! docker-fwd: keep an SSH port-forwarding tunnel in sync with a remote
//! Docker host.
//!
//! The remote host publishes container ports; this crate discovers that set,
//! diffs it against the single tunnel it maintains, and restarts the tunnel
//! only when the set actually changed. A loopback HTTP control surface
//! triggers refreshes, reports state, and terminates the supervisor.
//!
//! # Architecture
//!
//! - **ports**: the port-set model and the diff that gates restarts
//! - **discovery**: command- and Docker-API-based port discovery providers
//! - **tunnel**: the ssh subprocess and the reconciliation supervisor
//! - **control**: the loopback HTTP command surface
//! - **config**: TOML + environment + CLI configuration merging

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod control;
pub mod discovery;
pub mod ports;
pub mod tunnel;
