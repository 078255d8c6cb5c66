//! End-to-end tests for the control surface against a live supervisor.
//!
//! Uses a fixed discovery stub and a stop/start-counting fake tunnel runtime,
//! so no ssh process or Docker daemon is involved. Requests go over real
//! loopback TCP to exercise the HTTP path.

use docker_fwd::discovery::{DiscoveryResult, PortDiscovery};
use docker_fwd::ports::PortSet;
use docker_fwd::tunnel::{SupervisorHandle, TunnelResult, TunnelRuntime, TunnelSupervisor};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;

/// Discovery stub that reports the same port set on every call.
struct FixedDiscovery {
    ports: PortSet,
}

impl PortDiscovery for FixedDiscovery {
    async fn discover(&self) -> DiscoveryResult<PortSet> {
        Ok(self.ports.clone())
    }
}

/// Tunnel runtime fake that counts spawns and terminations.
#[derive(Clone, Default)]
struct CountingRuntime {
    starts: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
    next_pid: Arc<AtomicU32>,
}

impl TunnelRuntime for CountingRuntime {
    type Handle = u32;

    fn spawn(&self, _ports: &PortSet) -> TunnelResult<u32> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(4000 + self.next_pid.fetch_add(1, Ordering::SeqCst))
    }

    fn terminate(&self, _handle: u32) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn pid(&self, handle: &u32) -> Option<u32> {
        Some(*handle)
    }
}

struct Harness {
    addr: SocketAddr,
    runtime: CountingRuntime,
    handle: SupervisorHandle,
    shutdown_rx: watch::Receiver<bool>,
    supervisor_task: tokio::task::JoinHandle<()>,
    server_task: tokio::task::JoinHandle<()>,
}

/// Start a supervisor plus control server on an ephemeral loopback port.
async fn start_harness(ports: &[u16]) -> Harness {
    let runtime = CountingRuntime::default();
    let discovery = FixedDiscovery {
        ports: ports.iter().copied().collect(),
    };
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Long interval: only the immediate startup tick and explicit triggers
    // reconcile during a test.
    let (supervisor, handle) = TunnelSupervisor::new(
        discovery,
        runtime.clone(),
        Duration::from_secs(3600),
        shutdown_rx.clone(),
    );
    let supervisor_task = tokio::spawn(supervisor.run());

    let server = docker_fwd::control::ControlServer::bind(
        0,
        handle.clone(),
        shutdown_tx,
        shutdown_rx.clone(),
    )
    .await
    .expect("bind control server");
    let addr = server.local_addr();
    let server_task = tokio::spawn(server.run());

    // Let the startup reconcile run.
    tokio::time::sleep(Duration::from_millis(100)).await;

    Harness {
        addr,
        runtime,
        handle,
        shutdown_rx,
        supervisor_task,
        server_task,
    }
}

/// Issue a GET over raw TCP and return (status line, body).
async fn http_get(addr: SocketAddr, path: &str) -> (String, String) {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: 127.0.0.1\r\nConnection: close\r\n\r\n",
        path
    );
    stream.write_all(request.as_bytes()).await.expect("write");

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.expect("read");
    let response = String::from_utf8(response).expect("utf-8 response");

    let status = response.lines().next().unwrap_or_default().to_string();
    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default();
    (status, body)
}

#[tokio::test]
async fn test_ports_endpoint_reports_forwarded_set() {
    let harness = start_harness(&[443, 80]).await;

    let (status, body) = http_get(harness.addr, "/ports").await;
    assert!(status.contains("200"));
    assert_eq!(body, "80\n443");
}

#[tokio::test]
async fn test_pid_endpoint_reports_supervisor_pid() {
    let harness = start_harness(&[80]).await;

    let (status, body) = http_get(harness.addr, "/pid").await;
    assert!(status.contains("200"));
    assert_eq!(body, std::process::id().to_string());
}

#[tokio::test]
async fn test_child_endpoint_reports_tunnel_pid() {
    let harness = start_harness(&[80]).await;

    let expected = harness.handle.tunnel_pid().await.expect("tunnel active");
    let (_, body) = http_get(harness.addr, "/child").await;
    assert_eq!(body, expected.to_string());
}

#[tokio::test]
async fn test_child_kill_then_ports_is_empty() {
    let harness = start_harness(&[80, 443]).await;
    assert_eq!(harness.runtime.starts.load(Ordering::SeqCst), 1);

    let (status, body) = http_get(harness.addr, "/child/kill").await;
    assert!(status.contains("200"));
    assert!(body.is_empty());
    assert_eq!(harness.runtime.stops.load(Ordering::SeqCst), 1);

    let (_, body) = http_get(harness.addr, "/ports").await;
    assert!(body.is_empty());
    let (_, body) = http_get(harness.addr, "/child").await;
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_unrecognized_path_schedules_reconcile() {
    let harness = start_harness(&[80]).await;

    // Drop the tunnel, then poke the default path.
    http_get(harness.addr, "/child/kill").await;
    let (status, body) = http_get(harness.addr, "/refresh-please").await;
    assert!(status.contains("200"));
    assert!(body.is_empty());

    // The reconcile runs in the background relative to the response.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let (_, body) = http_get(harness.addr, "/ports").await;
    assert_eq!(body, "80");
    assert_eq!(harness.runtime.starts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_kill_signals_shutdown_and_tears_down_tunnel() {
    let mut harness = start_harness(&[80]).await;
    assert!(harness.handle.tunnel_pid().await.is_some());

    // The response must complete before the process goes away.
    let (status, body) = http_get(harness.addr, "/kill").await;
    assert!(status.contains("200"));
    assert!(body.is_empty());

    // The shutdown signal reaches both the server and the supervisor.
    tokio::time::timeout(Duration::from_secs(1), harness.shutdown_rx.wait_for(|v| *v))
        .await
        .expect("shutdown signalled")
        .expect("watch channel alive");

    tokio::time::timeout(Duration::from_secs(1), harness.server_task)
        .await
        .expect("server stops")
        .unwrap();
    tokio::time::timeout(Duration::from_secs(1), harness.supervisor_task)
        .await
        .expect("supervisor stops")
        .unwrap();

    // The active tunnel received its termination before exit.
    assert_eq!(harness.runtime.stops.load(Ordering::SeqCst), 1);
}
