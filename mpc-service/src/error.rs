//! The error taxonomy crossing the MPC-core/caller boundary.
//!
//! Internal orchestration glue (service startup, peer-registry bootstrap)
//! uses `eyre::Result` with `.context(...)`; this enum is reserved for
//! errors a caller needs to match on, at the API boundary and inside the
//! coordinator's peer-handling logic.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// All errors the MPC coordinator and peer-facing API may surface.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// Malformed hex, x-coord out of range, duplicate shares, or an
    /// available index outside `1..=10`. Surfaced synchronously.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Fewer than the threshold number of participants responded. Not an
    /// error to the external caller - the coordinator returns
    /// `MPCResult{available: false, ..}` instead of propagating this, but
    /// it is still a typed condition internally so it can be logged and
    /// tested precisely.
    #[error("insufficient shares: needed {needed}, got {got}")]
    InsufficientShares {
        /// The number of shares required.
        needed: usize,
        /// The number of shares actually available.
        got: usize,
    },

    /// A SPDZ MAC check failed at the given gate. Aborts the session; this
    /// is a security signal, never retried.
    #[error("mac check failed at gate {gate_idx}")]
    MacFailure {
        /// The gate index at which the check failed.
        gate_idx: usize,
    },

    /// A peer returned a 5xx status or a network error. Retried up to
    /// `PEER_RETRIES` with exponential backoff before the peer is treated
    /// as missing for this session.
    #[error("transient error from peer {peer}: {message}")]
    PeerTransient {
        /// The peer's address or identifier.
        peer: String,
        /// A short description of the failure.
        message: String,
    },

    /// A peer returned a 4xx status. Not retried; the peer is dropped from
    /// this session.
    #[error("permanent error from peer {peer}: {message}")]
    PeerPermanent {
        /// The peer's address or identifier.
        peer: String,
        /// A short description of the failure.
        message: String,
    },

    /// The outer gathered round exceeded `GATHER_TIMEOUT`.
    #[error("gather timed out waiting on {missing} peer(s)")]
    Timeout {
        /// How many peers had not yet responded when the timeout fired.
        missing: usize,
    },

    /// The session was not found, or a request arrived after its TTL.
    #[error("session {0} expired or not found")]
    SessionExpired(String),

    /// A lower-level field/Shamir/OT invariant was violated - an
    /// implementation bug, fatal to the affected session.
    #[error(transparent)]
    FieldError(#[from] mpc_core::CoreError),

    /// The dev-only single-validator fallback was required but is not
    /// permitted by configuration.
    #[error("simulation mode required but not allowed: {0}")]
    SimulationModeRequired(&'static str),
}

/// The JSON body returned alongside an error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for CoordinatorError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self, "mpc api error");
        let status = match &self {
            CoordinatorError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CoordinatorError::InsufficientShares { .. } => StatusCode::OK,
            CoordinatorError::MacFailure { .. } => StatusCode::CONFLICT,
            CoordinatorError::PeerTransient { .. } => StatusCode::BAD_GATEWAY,
            CoordinatorError::PeerPermanent { .. } => StatusCode::BAD_REQUEST,
            CoordinatorError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            CoordinatorError::SessionExpired(_) => StatusCode::NOT_FOUND,
            CoordinatorError::FieldError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CoordinatorError::SimulationModeRequired(_) => StatusCode::FORBIDDEN,
        };
        (status, axum::Json(ErrorBody { error: self.to_string() })).into_response()
    }
}
