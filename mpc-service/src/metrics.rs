//! Metrics definitions for the MPC coordinator service.
//!
//! This module defines all metrics keys used by the service and provides
//! [`describe_metrics`] to set metadata for each metric using the `metrics`
//! crate.

/// Metrics key for the number of currently open sessions.
pub const METRICS_ID_SESSIONS_OPEN: &str = "mpc.node.sessions.open";
/// Metrics key for sessions aborted, tagged by `reason`.
pub const METRICS_ID_SESSIONS_ABORTED: &str = "mpc.node.sessions.aborted";
/// Metrics key for sessions reaped for exceeding their TTL.
pub const METRICS_ID_SESSIONS_TIMEOUT: &str = "mpc.node.sessions.timeout";
/// Metrics key for sessions that completed successfully.
pub const METRICS_ID_SESSIONS_COMPLETE: &str = "mpc.node.sessions.complete";
/// Metrics key for the duration of a single gate round.
pub const METRICS_ID_GATE_DURATION: &str = "mpc.node.gate.duration";
/// Metrics key for peer-circuit-breaker state transitions, tagged by
/// `peer` and `state`.
pub const METRICS_ID_CIRCUIT_BREAKER_TRANSITIONS: &str = "mpc.node.peer.circuit_breaker.transitions";
/// Metrics key for peer request outcomes, tagged by `peer` and `outcome`.
pub const METRICS_ID_PEER_REQUESTS: &str = "mpc.node.peer.requests";

/// Describe all metrics used by the service.
///
/// Calls the `describe_*` functions from the `metrics` crate to set
/// metadata on each metric.
pub fn describe_metrics() {
    metrics::describe_gauge!(
        METRICS_ID_SESSIONS_OPEN,
        metrics::Unit::Count,
        "Number of open sessions this node is tracking"
    );
    metrics::describe_counter!(
        METRICS_ID_SESSIONS_ABORTED,
        metrics::Unit::Count,
        "Number of sessions aborted, tagged by reason"
    );
    metrics::describe_counter!(
        METRICS_ID_SESSIONS_TIMEOUT,
        metrics::Unit::Count,
        "Number of sessions reaped for exceeding their TTL"
    );
    metrics::describe_counter!(
        METRICS_ID_SESSIONS_COMPLETE,
        metrics::Unit::Count,
        "Number of sessions that completed successfully"
    );
    metrics::describe_histogram!(
        METRICS_ID_GATE_DURATION,
        metrics::Unit::Milliseconds,
        "Duration of one gate round, from request to reconstructed opening"
    );
    metrics::describe_counter!(
        METRICS_ID_CIRCUIT_BREAKER_TRANSITIONS,
        metrics::Unit::Count,
        "Peer circuit-breaker state transitions, tagged by peer and state"
    );
    metrics::describe_counter!(
        METRICS_ID_PEER_REQUESTS,
        metrics::Unit::Count,
        "Outbound peer requests, tagged by peer and outcome"
    );
}
