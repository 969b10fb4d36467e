use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use eyre::Context;
use mpc_service::config::MpcNodeConfig;
use mpc_service::{InMemoryShareStore, MpcServiceBuilder, StaticPeerRegistry};
use tokio_util::sync::CancellationToken;

/// A demo peer, given as `address@x`, e.g. `https://validator-2.example.net@2`.
#[derive(Clone, Debug)]
struct PeerArg {
    address: String,
    x: u8,
}

impl std::str::FromStr for PeerArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address, x) = s.rsplit_once('@').ok_or_else(|| format!("expected `address@x`, got `{s}`"))?;
        let x = x.parse().map_err(|err| format!("invalid peer x-coordinate `{x}`: {err}"))?;
        Ok(Self { address: address.to_string(), x })
    }
}

/// Runnable single-node demo of a signal-availability MPC node.
///
/// Hosts the peer-facing `/mpc/*` and `/signal/*` API over the configured
/// node settings. This binary provisions no signal shares of its own: pair
/// it with a handful of nodes and seed them out of band, the way a real
/// deployment's provisioning pipeline would.
#[derive(Parser, Debug)]
struct ExampleConfig {
    /// The bind address of the axum server.
    #[clap(long, env = "MPC_NODE_BIND_ADDR", default_value = "0.0.0.0:4321")]
    bind_addr: SocketAddr,

    /// Max wait time for graceful shutdown before the process exits anyway.
    #[clap(
        long,
        env = "MPC_NODE_MAX_WAIT_TIME_SHUTDOWN",
        default_value = "10s",
        value_parser = humantime::parse_duration
    )]
    max_wait_time_shutdown: Duration,

    /// The other validators this node may coordinate sessions against,
    /// `address@x` pairs, comma-separated.
    #[clap(long, env = "MPC_NODE_PEERS", value_delimiter = ',')]
    peers: Vec<PeerArg>,

    #[clap(flatten)]
    node_config: MpcNodeConfig,
}

#[tokio::main]
async fn main() -> eyre::Result<ExitCode> {
    tracing_subscriber::fmt::init();

    let config = ExampleConfig::parse();
    tracing::info!("starting mpc-service with config: {config:#?}");

    let peer_entries = config.peers.iter().map(|p| (p.address.clone(), p.x)).collect();
    let peer_registry = Arc::new(StaticPeerRegistry::new(peer_entries).context("while validating configured peer addresses")?);
    let share_store = Arc::new(InMemoryShareStore::default());

    let (router, cleanup_handle) = MpcServiceBuilder::new(config.node_config, peer_registry, share_store)
        .build()
        .context("while building mpc-service")?;

    let shutdown_token = CancellationToken::new();
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received shutdown signal");
        signal_token.cancel();
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    let server_token = shutdown_token.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { server_token.cancelled().await })
            .await
    });

    shutdown_token.cancelled().await;
    cleanup_handle.abort();

    match tokio::time::timeout(config.max_wait_time_shutdown, server).await {
        Ok(Ok(Ok(()))) => {
            tracing::info!("good night!");
            Ok(ExitCode::SUCCESS)
        }
        Ok(Ok(Err(err))) => {
            tracing::error!("axum server error: {err:?}");
            Ok(ExitCode::FAILURE)
        }
        Ok(Err(err)) => {
            tracing::error!("server task panicked: {err:?}");
            Ok(ExitCode::FAILURE)
        }
        Err(_) => {
            tracing::warn!("could not finish shutdown within {:?}", config.max_wait_time_shutdown);
            Ok(ExitCode::FAILURE)
        }
    }
}
