//! Tunnel reconciliation supervisor.
//!
//! A single task owns the authoritative tunnel state: the optional subprocess
//! handle and the set of ports it forwards. Everything else (the control
//! server, the periodic timer) only sends commands over a channel, which
//! makes the reconcile step non-reentrant by construction and preserves the
//! "at most one live tunnel" invariant without locks.
//!
//! A reconcile cycle is discover → diff → (maybe) restart:
//!
//! 1. Discovery failure: log and keep the current tunnel untouched.
//! 2. No diff: strict no-op, no process churn. This is the common case.
//! 3. Diff: stop the old tunnel first (graceful, never two at once), then
//!    spawn a replacement iff the new set is non-empty.
//!
//! Reconcile requests are coalesced: if one is already queued, new triggers
//! are dropped. The periodic timer guarantees another cycle soon regardless.

use super::TunnelRuntime;
use crate::discovery::PortDiscovery;
use crate::ports::{differs, PortSet};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Command channel depth. Small on purpose: a full queue just means the
/// trigger is dropped and the timer picks it up.
const COMMAND_BUFFER: usize = 16;

/// The tunnel state owned by the supervisor task.
///
/// Invariant: `handle` is present iff `ports` is non-empty and a spawn
/// succeeded and has not been torn down.
struct TunnelState<H> {
    handle: Option<H>,
    ports: PortSet,
}

impl<H> TunnelState<H> {
    fn idle() -> Self {
        Self {
            handle: None,
            ports: PortSet::new(),
        }
    }
}

/// Commands processed by the supervisor task.
enum Command {
    /// Run one reconcile cycle.
    Reconcile,
    /// Report the currently forwarded ports.
    Ports { reply: oneshot::Sender<PortSet> },
    /// Report the tunnel subprocess pid, if any.
    TunnelPid { reply: oneshot::Sender<Option<u32>> },
    /// Stop the tunnel and go idle, leaving the supervisor running.
    StopTunnel { reply: oneshot::Sender<()> },
    /// Stop the tunnel and end the supervisor task.
    Shutdown { reply: oneshot::Sender<()> },
}

/// Cloneable handle for talking to the supervisor task.
#[derive(Clone)]
pub struct SupervisorHandle {
    tx: mpsc::Sender<Command>,
}

impl SupervisorHandle {
    /// Schedule a reconcile without waiting for it to run.
    ///
    /// Coalescing: if the command queue is full (a reconcile is already
    /// pending), the trigger is silently dropped.
    pub fn request_reconcile(&self) {
        if self.tx.try_send(Command::Reconcile).is_err() {
            debug!("Reconcile already pending, trigger dropped");
        }
    }

    /// Currently forwarded ports. Empty if no tunnel is active (or the
    /// supervisor has stopped).
    pub async fn ports(&self) -> PortSet {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Command::Ports { reply }).await.is_err() {
            return PortSet::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Pid of the active tunnel subprocess, if any.
    pub async fn tunnel_pid(&self) -> Option<u32> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Command::TunnelPid { reply }).await.is_err() {
            return None;
        }
        rx.await.ok().flatten()
    }

    /// Stop the tunnel (transition to idle) and wait until it is done.
    pub async fn stop_tunnel(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Command::StopTunnel { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }

    /// Stop the tunnel and end the supervisor task, waiting for teardown.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Command::Shutdown { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }
}

/// The reconciliation loop.
///
/// Generic over the discovery provider and the tunnel runtime so tests can
/// inject scripted discovery results and a stop/start-counting fake runtime.
pub struct TunnelSupervisor<D, R: TunnelRuntime> {
    discovery: D,
    runtime: R,
    state: TunnelState<R::Handle>,
    rx: mpsc::Receiver<Command>,
    interval: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

impl<D, R> TunnelSupervisor<D, R>
where
    D: PortDiscovery,
    R: TunnelRuntime,
{
    /// Create a supervisor and its command handle.
    ///
    /// `interval` is the periodic reconcile period; `shutdown_rx` ends the
    /// task (with tunnel teardown) when it flips to `true`.
    pub fn new(
        discovery: D,
        runtime: R,
        interval: Duration,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (Self, SupervisorHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let supervisor = Self {
            discovery,
            runtime,
            state: TunnelState::idle(),
            rx,
            interval,
            shutdown_rx,
        };
        (supervisor, SupervisorHandle { tx })
    }

    /// Run the supervisor event loop until shutdown.
    ///
    /// The interval fires immediately, so the first reconcile happens at
    /// startup. The tunnel is torn down on every exit path of this loop.
    pub async fn run(mut self) {
        info!("Tunnel supervisor started (interval {:?})", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.reconcile().await,
                cmd = self.rx.recv() => match cmd {
                    Some(Command::Reconcile) => self.reconcile().await,
                    Some(Command::Ports { reply }) => {
                        let _ = reply.send(self.state.ports.clone());
                    }
                    Some(Command::TunnelPid { reply }) => {
                        let pid = self.state.handle.as_ref().and_then(|h| self.runtime.pid(h));
                        let _ = reply.send(pid);
                    }
                    Some(Command::StopTunnel { reply }) => {
                        self.stop_tunnel();
                        let _ = reply.send(());
                    }
                    Some(Command::Shutdown { reply }) => {
                        self.stop_tunnel();
                        let _ = reply.send(());
                        break;
                    }
                    None => {
                        // All handles dropped.
                        self.stop_tunnel();
                        break;
                    }
                },
                changed = self.shutdown_rx.changed() => {
                    // A closed channel means no one is left to signal
                    // shutdown; tear down rather than run unsupervised.
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        self.stop_tunnel();
                        break;
                    }
                }
            }
        }

        info!("Tunnel supervisor stopped");
    }

    /// One reconcile cycle: discover, diff, restart on change.
    async fn reconcile(&mut self) {
        let discovered = match self.discovery.discover().await {
            Ok(ports) => ports,
            Err(e) => {
                warn!("Port discovery failed, keeping current tunnel: {}", e);
                return;
            }
        };

        if !differs(&self.state.ports, &discovered) {
            debug!("Port set unchanged ({} port(s)), no-op", discovered.len());
            return;
        }

        info!(
            "Port set changed: {} -> {} port(s)",
            self.state.ports.len(),
            discovered.len()
        );
        self.stop_tunnel();

        if discovered.is_empty() {
            info!("No ports to forward, tunnel idle");
            return;
        }

        match self.runtime.spawn(&discovered) {
            Ok(handle) => {
                self.state.handle = Some(handle);
                self.state.ports = discovered;
            }
            Err(e) => {
                // Stay idle; the next cycle will try again.
                warn!("Failed to start tunnel: {}", e);
            }
        }
    }

    /// Stop the active tunnel, if any, and clear the forwarded port set.
    /// Idempotent.
    fn stop_tunnel(&mut self) {
        if let Some(handle) = self.state.handle.take() {
            self.runtime.terminate(handle);
        }
        self.state.ports.clear();
    }
}
