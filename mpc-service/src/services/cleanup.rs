//! Background reaper that removes sessions which have outlived their TTL.
//!
//! Expiry is cooperative: a session is only ever removed here or by the
//! coordinator/peer handlers that finish it normally, never by a third
//! party mutating another session's state.

use std::time::Duration;

use crate::metrics::METRICS_ID_SESSIONS_TIMEOUT;
use crate::services::session_registry::SessionRegistry;

/// Runs forever, sweeping `registry` for expired sessions every `interval`.
/// Intended to be spawned once at service startup via `tokio::spawn`.
pub async fn run(registry: SessionRegistry, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick fires immediately; skip it so we don't reap on startup.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        for session_id in registry.expired_session_ids() {
            if registry.remove(&session_id).is_some() {
                tracing::debug!(session_id, "reaped expired session");
                metrics::counter!(METRICS_ID_SESSIONS_TIMEOUT).increment(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use mpc_core::beaver::ParticipantState;
    use mpc_core::field::Fp;
    use mpc_types::{MPCMode, SessionStatus};
    use parking_lot::Mutex;

    use super::*;
    use crate::services::session_registry::Engine;
    use crate::services::session_registry::SessionEntry;

    fn dummy_entry(session_id: &str, ttl: StdDuration) -> SessionEntry {
        SessionEntry {
            session_id: session_id.to_string(),
            signal_id: uuid::Uuid::nil(),
            mode: MPCMode::SemiHonest,
            threshold: 1,
            participant_xs: vec![1],
            created_at: std::time::Instant::now(),
            ttl,
            engine: Mutex::new(Engine::SemiHonest(
                ParticipantState::new(1, vec![Fp::zero()], vec![], vec![]).unwrap(),
            )),
            status: Mutex::new(SessionStatus::Pending),
            peers: vec![],
            pending_mac_check: Mutex::new(None),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reaps_expired_sessions_only() {
        let registry = SessionRegistry::default();
        let (_, mut fresh_guard) = registry.insert_new_session(dummy_entry("fresh", StdDuration::from_secs(3600))).unwrap();
        fresh_guard.disarm();
        let (_, mut stale_guard) = registry.insert_new_session(dummy_entry("stale", StdDuration::from_millis(1))).unwrap();
        stale_guard.disarm();

        tokio::time::advance(StdDuration::from_millis(10)).await;

        let cleanup = tokio::spawn(run(registry.clone(), StdDuration::from_millis(5)));
        tokio::time::advance(StdDuration::from_millis(20)).await;
        tokio::task::yield_now().await;
        cleanup.abort();

        assert!(registry.get("stale").is_none());
        assert!(registry.get("fresh").is_some());
    }
}
