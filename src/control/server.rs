//! HTTP control server implementation.
//!
//! Serves the command surface over HTTP/1.1 on the loopback interface:
//!
//! | path          | effect                              | body                |
//! |---------------|-------------------------------------|---------------------|
//! | `/ports`      | none (read)                         | forwarded ports     |
//! | `/child`      | none (read)                         | tunnel pid or empty |
//! | `/child/kill` | stop tunnel only                    | empty               |
//! | `/pid`        | none (read)                         | supervisor pid      |
//! | `/kill`       | terminate the whole supervisor      | empty               |
//! | anything else | schedule a reconcile (async)        | empty               |
//!
//! `/kill` sends its response before signalling shutdown; the actual process
//! exit (and tunnel teardown) happens in `main` once the accept loop stops.

use crate::tunnel::SupervisorHandle;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::{Ipv4Addr, SocketAddr};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Historical default control port.
pub const DEFAULT_CONTROL_PORT: u16 = 59145;

/// Errors from the control server.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Could not bind the loopback listener.
    #[error("Failed to bind control socket on 127.0.0.1:{port}: {source}")]
    Bind {
        /// The requested port.
        port: u16,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// The control server.
///
/// Owns the bound listener; `run` serves until the shutdown signal flips.
pub struct ControlServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    supervisor: SupervisorHandle,
    /// Flipped by `/kill` to terminate the whole process.
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ControlServer {
    /// Bind the control socket on `127.0.0.1:port` (port 0 picks a free one).
    pub async fn bind(
        port: u16,
        supervisor: SupervisorHandle,
        shutdown_tx: watch::Sender<bool>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<Self, ControlError> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ControlError::Bind { port, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ControlError::Bind { port, source })?;
        info!("Control server listening on {}", local_addr);

        Ok(Self {
            listener,
            local_addr,
            supervisor,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// The bound address (useful when binding port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve control requests until the shutdown signal flips.
    pub async fn run(self) {
        let mut shutdown_rx = self.shutdown_rx.clone();
        loop {
            tokio::select! {
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => {
                            debug!("Control connection from {}", peer);
                            self.spawn_connection_handler(stream);
                        }
                        Err(e) => warn!("Failed to accept control connection: {}", e),
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Control server shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Handle a single control connection in its own task.
    fn spawn_connection_handler(&self, stream: tokio::net::TcpStream) {
        let supervisor = self.supervisor.clone();
        let shutdown_tx = self.shutdown_tx.clone();

        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req: Request<Incoming>| {
                let supervisor = supervisor.clone();
                let shutdown_tx = shutdown_tx.clone();
                async move { handle_request(req, supervisor, shutdown_tx).await }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!("Control connection ended: {}", e);
            }
        });
    }
}

/// Dispatch one control request.
///
/// Every path resolves to a `200 text/plain` response; commands are
/// acknowledged, not awaited to completion (except the synchronous
/// tunnel-stop).
async fn handle_request(
    req: Request<Incoming>,
    supervisor: SupervisorHandle,
    shutdown_tx: watch::Sender<bool>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path();
    debug!("Control request: {} {}", req.method(), path);

    let body = match path {
        "/ports" => supervisor.ports().await.to_string(),
        "/child" => supervisor
            .tunnel_pid()
            .await
            .map(|pid| pid.to_string())
            .unwrap_or_default(),
        "/child/kill" => {
            supervisor.stop_tunnel().await;
            String::new()
        }
        "/pid" => std::process::id().to_string(),
        "/kill" => {
            info!("Kill requested via control surface");
            // Response first; the accept loop and main() see the flip next.
            let _ = shutdown_tx.send(true);
            String::new()
        }
        _ => {
            supervisor.request_reconcile();
            String::new()
        }
    };

    Ok(plain_text(body))
}

/// Build a `200 text/plain` response.
fn plain_text(body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::StatusCode;

    #[test]
    fn test_plain_text_response() {
        let resp = plain_text("80\n443".to_string());
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn test_default_port() {
        assert_eq!(DEFAULT_CONTROL_PORT, 59145);
    }
}
