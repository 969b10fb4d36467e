//! Session-lifecycle types shared across every API version.

use serde::{Deserialize, Serialize};

/// Which Beaver-gate variant a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MPCMode {
    /// Plain Beaver-triple multiplication; no tamper detection.
    SemiHonest,
    /// SPDZ-authenticated gates with information-theoretic MACs.
    Authenticated,
}

/// A session's lifecycle status, as reported by `GET /mpc/{session_id}/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created but `/mpc/init` has not yet been accepted by enough peers.
    Pending,
    /// Init accepted; gates are being driven.
    Round1Collecting,
    /// The session reached its final gate and reconstructed a result.
    Complete,
    /// The session exceeded its TTL before completing.
    Expired,
    /// The session was aborted, e.g. by a failed MAC check.
    Aborted,
}

/// The caller-visible outcome of a completed (or simulation-mode-fallback)
/// availability check. Failure detail beyond this is never surfaced to the
/// caller - it is logged server-side only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MPCResult {
    /// Whether the secret index was a member of the queried set.
    pub available: bool,
    /// How many validators actually participated in reconstructing this
    /// result (may be less than the full participant set, but at least the
    /// session's threshold unless `available` was forced `false` by
    /// insufficient participation).
    pub participating_validators: usize,
    /// `true` if the session was aborted (e.g. a MAC check failure) rather
    /// than completing normally. `available` is meaningless when this is set.
    pub aborted: bool,
}
