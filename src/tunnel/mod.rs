//! Tunnel process lifecycle and the reconciliation supervisor.
//!
//! The supervisor owns the single tunnel slot: it discovers the desired port
//! set, diffs it against the live tunnel, and restarts the tunnel only when
//! the set actually changed. Restarting is disruptive (it drops in-flight
//! connections), so the no-change case must be a strict no-op.
//!
//! [`SshTunnel`] is the real subprocess spawner; the supervisor only sees the
//! [`TunnelRuntime`] trait, so tests can count stop/start calls on a fake
//! without ever spawning a process.

mod error;
mod ssh;
mod supervisor;

pub use error::{TunnelError, TunnelResult};
pub use ssh::{SshTunnel, TunnelChild};
pub use supervisor::{SupervisorHandle, TunnelSupervisor};

use crate::ports::PortSet;

/// Spawns and terminates the tunnel subprocess.
///
/// The supervisor guarantees at most one live handle at any time; `spawn` is
/// fire-and-forget (a tunnel that fails to establish is not detected here).
pub trait TunnelRuntime {
    /// Handle to a running tunnel.
    type Handle;

    /// Spawn a tunnel forwarding every port in `ports`.
    fn spawn(&self, ports: &PortSet) -> TunnelResult<Self::Handle>;

    /// Terminate a tunnel gracefully, consuming its handle.
    fn terminate(&self, handle: Self::Handle);

    /// Process id of the tunnel, if it has one.
    fn pid(&self, handle: &Self::Handle) -> Option<u32>;
}
