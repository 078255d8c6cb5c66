//! SSH subprocess spawner for the port-forwarding tunnel.
//!
//! Builds and spawns a long-lived `ssh -N` process with one `-L` forward per
//! port, connecting local ports to the same ports on the remote host. Host
//! key verification is disabled (trusted-network assumption) and a short
//! connect timeout makes a dead host fail fast instead of hanging.
//!
//! Spawning is fire-and-forget: a tunnel that fails to establish produces no
//! working forward and is only discoverable by the absence of connectivity.

use super::error::{TunnelError, TunnelResult};
use super::TunnelRuntime;
use crate::ports::PortSet;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Handle to a running ssh tunnel subprocess.
pub struct TunnelChild {
    child: Child,
    pid: u32,
}

impl TunnelChild {
    /// Process id of the tunnel.
    pub fn pid(&self) -> u32 {
        self.pid
    }
}

/// Spawner for ssh port-forwarding tunnels.
#[derive(Debug, Clone)]
pub struct SshTunnel {
    remote_host: String,
    user: String,
    identity_file: Option<PathBuf>,
    connect_timeout: Duration,
}

impl SshTunnel {
    /// Create a spawner targeting `user@remote_host`.
    pub fn new(remote_host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            remote_host: remote_host.into(),
            user: user.into(),
            identity_file: None,
            connect_timeout: Duration::from_secs(5),
        }
    }

    /// Use a specific ssh identity file.
    pub fn with_identity_file(mut self, path: Option<PathBuf>) -> Self {
        self.identity_file = path;
        self
    }

    /// Override the ssh connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Build the ssh argument list for the given port set.
    fn build_args(&self, ports: &PortSet) -> Vec<String> {
        let mut args = vec![
            "-N".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs()),
        ];
        if let Some(identity) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        for port in ports.iter() {
            args.push("-L".to_string());
            args.push(format!("{}:{}:{}", port, self.remote_host, port));
        }
        args.push(format!("{}@{}", self.user, self.remote_host));
        args
    }
}

impl TunnelRuntime for SshTunnel {
    type Handle = TunnelChild;

    fn spawn(&self, ports: &PortSet) -> TunnelResult<TunnelChild> {
        let args = self.build_args(ports);
        debug!("Spawning tunnel: ssh {}", args.join(" "));

        let child = Command::new("ssh")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            // Safety net if the supervisor is dropped without teardown.
            .kill_on_drop(true)
            .spawn()
            .map_err(TunnelError::Spawn)?;

        let pid = child.id().ok_or(TunnelError::NoPid)?;
        info!(
            "Tunnel started (pid {}) forwarding {} port(s) to {}",
            pid,
            ports.len(),
            self.remote_host
        );
        Ok(TunnelChild { child, pid })
    }

    fn terminate(&self, handle: TunnelChild) {
        let TunnelChild { mut child, pid } = handle;
        match kill(Pid::from_raw(pid as i32), Signal::SIGINT) {
            Ok(()) => info!("Sent SIGINT to tunnel (pid {})", pid),
            // Already gone; stopping a dead tunnel is a no-op.
            Err(e) => debug!("Could not signal tunnel (pid {}): {}", pid, e),
        }
        // Reap in the background so the supervisor never blocks on exit.
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => debug!("Tunnel (pid {}) exited: {}", pid, status),
                Err(e) => warn!("Failed to reap tunnel (pid {}): {}", pid, e),
            }
        });
    }

    fn pid(&self, handle: &TunnelChild) -> Option<u32> {
        Some(handle.pid())
    }
}
