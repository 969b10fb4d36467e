#![deny(missing_docs)]
//! Assembles an MPC node's HTTP service for the signal-availability
//! protocol: the peer-facing `/mpc/*` and `/signal/*` API, the services
//! backing it (session tracking, peer discovery, the outbound peer HTTP
//! client), and the background session-cleanup task.
//!
//! The main entry point is [`MpcServiceBuilder`]. A hosting binary supplies
//! its node configuration, a [`PeerRegistry`] (how this deployment
//! discovers the other validators), and a [`ShareStore`] (this validator's
//! persistent signal shares), and gets back an `axum::Router` to serve and
//! a `JoinHandle` for the background cleanup task.

use std::sync::Arc;

use axum::Router;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
pub mod metrics;
pub(crate) mod services;
pub mod util;

pub(crate) mod api;

pub use services::coordinator::Coordinator;
pub use services::ot_store::OtStateStore;
pub use services::peer_client::{PeerClient, PeerHandle};
pub use services::peer_registry::{PeerRegistry, StaticPeerRegistry};
pub use services::session_registry::SessionRegistry;
pub use services::share_store::{InMemoryShareStore, ShareStore, SignalRecord};

use crate::config::MpcNodeConfig;

/// Every service an incoming `/mpc/*` or `/signal/*` request may need,
/// cloned cheaply into each request handler.
#[derive(Clone)]
pub struct AppState {
    /// This node's configuration.
    pub config: Arc<MpcNodeConfig>,
    /// Every session this node is tracking, coordinator or peer role.
    pub registry: SessionRegistry,
    /// This node's own persistent signal shares.
    pub share_store: Arc<dyn ShareStore>,
    /// Transient per-session state for the peer side of network-OT triple
    /// generation.
    pub ot_store: OtStateStore,
    /// Drives sessions this node originates.
    pub coordinator: Arc<Coordinator>,
}

/// Builds an MPC node's HTTP service from its constituent pieces, mirroring
/// this codebase's existing node-service-builder pattern.
pub struct MpcServiceBuilder {
    config: MpcNodeConfig,
    peer_registry: Arc<dyn PeerRegistry>,
    share_store: Arc<dyn ShareStore>,
}

impl MpcServiceBuilder {
    /// Starts a builder from this node's configuration, peer registry, and
    /// share store.
    pub fn new(config: MpcNodeConfig, peer_registry: Arc<dyn PeerRegistry>, share_store: Arc<dyn ShareStore>) -> Self {
        Self {
            config,
            peer_registry,
            share_store,
        }
    }

    /// Wires every service together and returns the request router plus a
    /// handle to the background session-cleanup task.
    ///
    /// A hosting binary should spawn an axum server with the returned
    /// router and await the cleanup handle on shutdown only if it wants to
    /// observe the reaper's termination; the reaper itself runs forever and
    /// is not expected to finish during normal operation.
    pub fn build(self) -> eyre::Result<(Router, JoinHandle<()>)> {
        metrics::describe_metrics();

        let registry = SessionRegistry::default();
        let ot_store = OtStateStore::default();
        let peer_client = PeerClient::new(&self.config)?;
        let cleanup_interval = self.config.cleanup_interval;

        let coordinator = Arc::new(Coordinator::new(
            self.config.clone(),
            registry.clone(),
            peer_client,
            self.peer_registry,
            self.share_store.clone(),
        ));

        let state = AppState {
            config: Arc::new(self.config),
            registry: registry.clone(),
            share_store: self.share_store,
            ot_store,
            coordinator,
        };

        let cleanup_handle = tokio::spawn(services::cleanup::run(registry, cleanup_interval));

        let router = api::routes().with_state(state).layer(TraceLayer::new_for_http());

        Ok((router, cleanup_handle))
    }
}
