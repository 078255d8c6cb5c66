//! docker-fwd binary entry point.
//!
//! Wires the pieces together: parse CLI flags, load configuration, build the
//! discovery provider and ssh spawner, run the supervisor task and the
//! control server, and guarantee tunnel teardown on every exit path:
//! normal shutdown, `/kill`, or Ctrl-C. No orphaned tunnels survive this
//! process.

use anyhow::{Context, Result};
use clap::Parser;
use docker_fwd::{
    cli::Cli,
    config::{Config, ConfigLoader, DiscoveryMode},
    control::ControlServer,
    discovery::{ApiDiscovery, CommandDiscovery, Provider},
    tunnel::{SshTunnel, TunnelSupervisor},
};
use tokio::sync::watch;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let config = ConfigLoader::new()
        .load(&cli)
        .context("Failed to load configuration")?;
    debug!("Loaded configuration: {:?}", config);

    let host = config
        .remote
        .host
        .clone()
        .context("remote host is required")?;

    let provider = build_provider(&config).context("Failed to set up port discovery")?;
    let runtime = SshTunnel::new(host.clone(), config.remote.user.clone())
        .with_identity_file(config.remote.identity_file.clone())
        .with_connect_timeout(config.remote.connect_timeout());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (supervisor, handle) = TunnelSupervisor::new(
        provider,
        runtime,
        config.discovery.interval(),
        shutdown_rx.clone(),
    );
    let supervisor_task = tokio::spawn(supervisor.run());

    let server = ControlServer::bind(
        config.control.port,
        handle.clone(),
        shutdown_tx.clone(),
        shutdown_rx,
    )
    .await
    .context("Failed to start control server")?;

    info!(
        "docker-fwd forwarding to {} (control on {})",
        host,
        server.local_addr()
    );

    tokio::select! {
        _ = server.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, shutting down");
        }
    }

    // Structured teardown: the tunnel must not outlive the supervisor.
    let _ = shutdown_tx.send(true);
    handle.shutdown().await;
    let _ = supervisor_task.await;

    Ok(())
}

/// Build the configured discovery provider.
fn build_provider(config: &Config) -> Result<Provider> {
    let always = config.discovery.always_forward_set();
    match config.discovery.mode {
        DiscoveryMode::Command => Ok(Provider::Command(
            CommandDiscovery::new(config.discovery.command.clone()).with_always_forward(always),
        )),
        DiscoveryMode::Api => {
            let api = ApiDiscovery::connect(config.discovery.api_url.as_deref())
                .context("Failed to connect to the Docker API")?
                .with_always_forward(always);
            Ok(Provider::Api(api))
        }
    }
}

/// Initialize the tracing subscriber.
///
/// Logs go to stderr, filtered by `RUST_LOG` when set, otherwise by the
/// `-v` count.
///
/// # Verbosity Levels
/// - 0 (default): Only warnings and errors
/// - 1 (-v): Info level
/// - 2 (-vv): Debug level
/// - 3+ (-vvv): Trace level
fn init_tracing(verbose: u8) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}
