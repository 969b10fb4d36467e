//! Outbound HTTP to peer validators: shared client, retry policy, and a
//! per-peer circuit breaker so one unreachable peer does not repeatedly
//! stall every session that includes it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use backon::{ExponentialBuilder, Retryable};
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::MpcNodeConfig;
use crate::error::CoordinatorError;
use crate::metrics::METRICS_ID_PEER_REQUESTS;

/// One participant this node may need to call during a session it
/// coordinates: its peer-facing base URL and Shamir x-coordinate.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    /// The peer's base URL, e.g. `https://validator-3.example.net`.
    pub address: String,
    /// The peer's Shamir x-coordinate.
    pub x: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct Breaker {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

impl Default for Breaker {
    fn default() -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            opened_at: None,
        }
    }
}

/// Outbound HTTP client to peer validators, with exponential-backoff retry
/// on transient failures and a circuit breaker per peer address.
#[derive(Clone)]
pub struct PeerClient {
    http: reqwest::Client,
    peer_timeout: Duration,
    peer_retries: usize,
    circuit_breaker_threshold: u32,
    circuit_breaker_recovery_timeout: Duration,
    breakers: Arc<Mutex<HashMap<String, Breaker>>>,
}

impl PeerClient {
    /// Builds a client from node configuration.
    pub fn new(config: &MpcNodeConfig) -> eyre::Result<Self> {
        let http = reqwest::Client::builder().timeout(config.peer_timeout).build()?;
        Ok(Self {
            http,
            peer_timeout: config.peer_timeout,
            peer_retries: config.peer_retries,
            circuit_breaker_threshold: config.circuit_breaker_threshold,
            circuit_breaker_recovery_timeout: config.circuit_breaker_recovery_timeout,
            breakers: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Whether `peer` may currently be called: closed or half-open
    /// (allowing exactly one probe past the recovery timeout).
    fn may_call(&self, peer: &str) -> bool {
        let mut breakers = self.breakers.lock();
        let breaker = breakers.entry(peer.to_string()).or_default();
        match breaker.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let opened_at = breaker.opened_at.expect("open implies opened_at set");
                if opened_at.elapsed() >= self.circuit_breaker_recovery_timeout {
                    breaker.state = BreakerState::HalfOpen;
                    true
                } else {
                    false
                }
            }
            BreakerState::HalfOpen => true,
        }
    }

    fn record_success(&self, peer: &str) {
        let mut breakers = self.breakers.lock();
        let breaker = breakers.entry(peer.to_string()).or_default();
        if breaker.state != BreakerState::Closed {
            tracing::info!(peer, "peer circuit breaker closed");
        }
        breaker.state = BreakerState::Closed;
        breaker.consecutive_failures = 0;
        breaker.opened_at = None;
    }

    fn record_failure(&self, peer: &str) {
        let mut breakers = self.breakers.lock();
        let breaker = breakers.entry(peer.to_string()).or_default();
        breaker.consecutive_failures += 1;
        if breaker.state == BreakerState::HalfOpen || breaker.consecutive_failures >= self.circuit_breaker_threshold {
            if breaker.state != BreakerState::Open {
                tracing::warn!(peer, "peer circuit breaker opened");
            }
            breaker.state = BreakerState::Open;
            breaker.opened_at = Some(Instant::now());
        }
    }

    /// Posts `body` as JSON to `{peer.address}{path}`, deserializing the
    /// response. Retries up to `peer_retries` times with exponential
    /// backoff on network errors and 5xx responses; 4xx responses and an
    /// open circuit breaker fail immediately without a request attempt.
    pub async fn post_json<Req, Resp>(&self, peer: &PeerHandle, path: &str, body: &Req) -> Result<Resp, CoordinatorError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        if !self.may_call(&peer.address) {
            metrics::counter!(METRICS_ID_PEER_REQUESTS, "peer" => peer.address.clone(), "outcome" => "breaker_open")
                .increment(1);
            return Err(CoordinatorError::PeerTransient {
                peer: peer.address.clone(),
                message: "circuit breaker open".into(),
            });
        }

        let url = format!("{}{}", peer.address, path);
        let attempt = || async {
            let response = self
                .http
                .post(&url)
                .timeout(self.peer_timeout)
                .json(body)
                .send()
                .await
                .map_err(|err| CoordinatorError::PeerTransient {
                    peer: peer.address.clone(),
                    message: err.to_string(),
                })?;

            let status = response.status();
            if status.is_success() {
                response.json::<Resp>().await.map_err(|err| CoordinatorError::PeerTransient {
                    peer: peer.address.clone(),
                    message: format!("malformed response body: {err}"),
                })
            } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                Err(CoordinatorError::PeerTransient {
                    peer: peer.address.clone(),
                    message: format!("peer returned {status}"),
                })
            } else {
                Err(CoordinatorError::PeerPermanent {
                    peer: peer.address.clone(),
                    message: format!("peer returned {status}"),
                })
            }
        };

        let backoff = ExponentialBuilder::default()
            .with_max_times(self.peer_retries)
            .with_jitter();

        let result = attempt
            .retry(backoff)
            .when(|err| matches!(err, CoordinatorError::PeerTransient { .. }))
            .await;

        match &result {
            Ok(_) => {
                self.record_success(&peer.address);
                metrics::counter!(METRICS_ID_PEER_REQUESTS, "peer" => peer.address.clone(), "outcome" => "success")
                    .increment(1);
            }
            Err(CoordinatorError::PeerTransient { .. }) => {
                self.record_failure(&peer.address);
                metrics::counter!(METRICS_ID_PEER_REQUESTS, "peer" => peer.address.clone(), "outcome" => "transient_error")
                    .increment(1);
            }
            Err(_) => {
                metrics::counter!(METRICS_ID_PEER_REQUESTS, "peer" => peer.address.clone(), "outcome" => "permanent_error")
                    .increment(1);
            }
        }
        result
    }
}
