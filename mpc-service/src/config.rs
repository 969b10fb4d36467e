//! Configuration types and CLI/environment parsing for an MPC node.
//!
//! Mirrors the existing node-configuration pattern in this codebase: a
//! single `clap::Parser`-derived struct with `--flag`/`env = "MPC_NODE_*"`
//! pairs, plus an [`Environment`] enum with an `assert_is_dev` guard for
//! code paths that must never run in production.

use std::time::Duration;

use clap::{Parser, ValueEnum};
use mpc_core::Fp;

use crate::error::CoordinatorError;

/// The environment an MPC node is running in.
///
/// Code paths gated by [`Environment::assert_is_dev`] include the
/// single-validator simulation fallback and anything that reconstructs the
/// SPDZ MAC key - both are dev/test-only by design, never silently enabled
/// in production regardless of how `ALLOW_SIMULATION_MODE` ends up set.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Environment {
    /// Production environment.
    Prod,
    /// Development environment.
    Dev,
}

impl Environment {
    /// Asserts that `Environment` is `dev`. Panics if not the case.
    pub fn assert_is_dev(&self) {
        assert!(matches!(self, Environment::Dev), "is not dev environment")
    }
}

/// Configuration for an MPC node's coordinator and peer-facing API.
///
/// Can be configured via environment variables or command-line arguments
/// using `clap`.
#[derive(Parser, Debug, Clone)]
pub struct MpcNodeConfig {
    /// The environment of the MPC node (either `prod` or `dev`).
    #[clap(long, env = "MPC_NODE_ENVIRONMENT", default_value = "prod")]
    pub environment: Environment,

    /// This node's own Shamir x-coordinate.
    #[clap(long, env = "MPC_NODE_SELF_X")]
    pub self_x: u8,

    /// Reconstruction threshold `k` used for newly originated sessions.
    #[clap(long, env = "MPC_NODE_THRESHOLD")]
    pub threshold: usize,

    /// Whether newly originated sessions run the SPDZ-authenticated gate
    /// variant instead of plain semi-honest Beaver multiplication.
    #[clap(long, env = "MPC_NODE_USE_AUTHENTICATED_MPC", default_value = "false")]
    pub use_authenticated_mpc: bool,

    /// Whether Beaver-triple generation runs the two-party network-OT
    /// protocol (only meaningful when exactly two parties generate a
    /// triple together).
    #[clap(long, env = "MPC_NODE_USE_NETWORK_OT", default_value = "true")]
    pub use_network_ot: bool,

    /// Permits the dev-only single-validator simulation fallback and
    /// SPDZ-alpha reconstruction helpers. Must be `false` in production.
    #[clap(long, env = "MPC_NODE_ALLOW_SIMULATION_MODE", default_value = "false")]
    pub allow_simulation_mode: bool,

    /// Permits the trusted-dealer Beaver-triple fallback for more than two
    /// participating parties. A documented, explicit security downgrade.
    #[clap(long, env = "MPC_NODE_ALLOW_DEALER_FALLBACK", default_value = "false")]
    pub allow_dealer_fallback: bool,

    /// Timeout for a single outbound peer HTTP request.
    #[clap(
        long,
        env = "MPC_NODE_PEER_TIMEOUT",
        default_value = "2s",
        value_parser = humantime::parse_duration
    )]
    pub peer_timeout: Duration,

    /// Maximum retry attempts for a peer request that failed with a 5xx
    /// status or a network error.
    #[clap(long, env = "MPC_NODE_PEER_RETRIES", default_value = "3")]
    pub peer_retries: usize,

    /// Outer timeout for one gathered round across every peer
    /// (`3 * peer_timeout` is the documented default).
    #[clap(
        long,
        env = "MPC_NODE_GATHER_TIMEOUT",
        default_value = "6s",
        value_parser = humantime::parse_duration
    )]
    pub gather_timeout: Duration,

    /// Total lifetime of a session before it is reaped as expired.
    #[clap(
        long,
        env = "MPC_NODE_SESSION_TTL",
        default_value = "180s",
        value_parser = humantime::parse_duration
    )]
    pub session_ttl: Duration,

    /// How often the background cleanup loop sweeps for expired sessions.
    #[clap(
        long,
        env = "MPC_NODE_CLEANUP_INTERVAL",
        default_value = "300s",
        value_parser = humantime::parse_duration
    )]
    pub cleanup_interval: Duration,

    /// Consecutive peer failures before that peer's circuit breaker opens.
    #[clap(long, env = "MPC_NODE_CIRCUIT_BREAKER_THRESHOLD", default_value = "5")]
    pub circuit_breaker_threshold: u32,

    /// How long a peer's open circuit breaker waits before allowing a
    /// single half-open probe request.
    #[clap(
        long,
        env = "MPC_NODE_CIRCUIT_BREAKER_RECOVERY_TIMEOUT",
        default_value = "30s",
        value_parser = humantime::parse_duration
    )]
    pub circuit_breaker_recovery_timeout: Duration,

    /// Bit-length of the per-bit Gilboa OT pass; must match the field's bit
    /// length headroom (see `mpc_core::gilboa::GILBOA_BITS`).
    #[clap(long, env = "MPC_NODE_OT_BITS", default_value = "256")]
    pub ot_bits: usize,

    /// This node's persistent share of the deployment-wide SPDZ MAC key,
    /// hex-encoded. Required when `use_authenticated_mpc` is set; never
    /// rotated per-session, mirroring a real SPDZ offline/online split
    /// where the key is established once, out of band.
    #[clap(long, env = "MPC_NODE_ALPHA_SHARE")]
    pub alpha_share_hex: Option<String>,
}

impl MpcNodeConfig {
    /// Parses [`Self::alpha_share_hex`], if present.
    pub fn alpha_share(&self) -> Result<Option<Fp>, CoordinatorError> {
        self.alpha_share_hex
            .as_deref()
            .map(|hex| Fp::from_hex(hex).map_err(CoordinatorError::FieldError))
            .transpose()
    }
}
