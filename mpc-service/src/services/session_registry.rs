//! Tracks every session this node is currently participating in, whether it
//! originated the session (coordinator role) or only received `/mpc/init`
//! from another node (peer role).
//!
//! Mirrors the guard-on-insert pattern used elsewhere in this codebase for
//! single-use session identifiers: a session id can only be claimed once,
//! and the registry entry is removed on `/mpc/result`, `/mpc/abort`, or by
//! the background TTL reaper.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mpc_core::beaver::ParticipantState;
use mpc_core::field::Fp;
use mpc_core::spdz::AuthenticatedParticipantState;
use mpc_types::{MPCMode, SessionStatus};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::CoordinatorError;
use crate::metrics::METRICS_ID_SESSIONS_OPEN;
use crate::services::peer_client::PeerHandle;

/// The gate-driving state machine for one session, in whichever variant its
/// mode selected.
pub enum Engine {
    /// Plain Beaver-triple multiplication.
    SemiHonest(ParticipantState),
    /// SPDZ-authenticated gates with information-theoretic MACs.
    Authenticated(AuthenticatedParticipantState),
}

impl Engine {
    /// This participant's own Shamir x-coordinate.
    pub fn x(&self) -> u8 {
        match self {
            Engine::SemiHonest(s) => s.x(),
            Engine::Authenticated(s) => s.x(),
        }
    }

    /// The call index that finalizes the last gate and returns the final
    /// output share instead of a new gate's masks.
    pub fn final_call_idx(&self) -> usize {
        match self {
            Engine::SemiHonest(s) => s.final_call_idx(),
            Engine::Authenticated(s) => s.final_call_idx(),
        }
    }
}

/// Everything this node tracks about one running session.
pub struct SessionEntry {
    /// The session identifier, matching `^[A-Za-z0-9_-]{1,256}$`.
    pub session_id: String,
    /// The signal being queried.
    pub signal_id: Uuid,
    /// Which gate variant this session runs.
    pub mode: MPCMode,
    /// Reconstruction threshold `k`.
    pub threshold: usize,
    /// Every participant's x-coordinate, this node included.
    pub participant_xs: Vec<u8>,
    /// When this entry was created, for TTL expiry.
    pub created_at: Instant,
    /// This session's lifetime before being reaped as expired.
    pub ttl: Duration,
    /// This node's gate-driving state machine for the session.
    pub engine: Mutex<Engine>,
    /// The session's externally visible lifecycle status.
    pub status: Mutex<SessionStatus>,
    /// The remaining peers, present only when this node originated the
    /// session and is driving it as coordinator. Empty for sessions this
    /// node only joined as a peer.
    pub peers: Vec<PeerHandle>,
    /// This node's own `(sigma, nonce)` commitment for the current batch
    /// MAC check, stashed between `/mpc/mac_check/commit` and
    /// `/mpc/mac_check/reveal` when this node is driven as a peer.
    pub pending_mac_check: Mutex<Option<(Fp, [u8; 32])>>,
}

impl SessionEntry {
    /// Whether this entry has outlived its TTL.
    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }
}

/// A guard for a claimed session id. Removes the entry from the registry on
/// drop, so a session is always cleaned up regardless of which code path
/// finishes it (normal completion, abort, or an early return on error).
#[must_use]
pub struct SessionGuard {
    session_id: String,
    registry: SessionRegistry,
    disarmed: bool,
}

impl SessionGuard {
    /// Leaves the entry in the registry instead of removing it on drop -
    /// used once a session has legitimately finished and the entry was
    /// already explicitly removed, to avoid a double-remove.
    pub fn disarm(&mut self) {
        self.disarmed = true;
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if !self.disarmed {
            self.registry.remove(&self.session_id);
        }
    }
}

/// Thread-safe registry of every session this node is tracking.
#[derive(Clone, Default)]
pub struct SessionRegistry(Arc<Mutex<HashMap<String, Arc<SessionEntry>>>>);

impl SessionRegistry {
    /// Claims a new session id, inserting `entry`. Fails if the id is
    /// already in use - session ids are single-use, since gate call
    /// ordering is tracked per entry and reusing an id would let a stale
    /// request replay into a fresh session.
    pub fn insert_new_session(&self, entry: SessionEntry) -> Result<(Arc<SessionEntry>, SessionGuard), CoordinatorError> {
        let session_id = entry.session_id.clone();
        let mut sessions = self.0.lock();
        if sessions.contains_key(&session_id) {
            return Err(CoordinatorError::InvalidInput(format!("session {session_id} already exists")));
        }
        let entry = Arc::new(entry);
        sessions.insert(session_id.clone(), entry.clone());
        metrics::gauge!(METRICS_ID_SESSIONS_OPEN).increment(1);
        Ok((
            entry,
            SessionGuard {
                session_id,
                registry: self.clone(),
                disarmed: false,
            },
        ))
    }

    /// Looks up a session by id.
    pub fn get(&self, session_id: &str) -> Option<Arc<SessionEntry>> {
        self.0.lock().get(session_id).cloned()
    }

    /// Removes a session, returning it if present.
    pub fn remove(&self, session_id: &str) -> Option<Arc<SessionEntry>> {
        let removed = self.0.lock().remove(session_id);
        if removed.is_some() {
            metrics::gauge!(METRICS_ID_SESSIONS_OPEN).decrement(1);
        }
        removed
    }

    /// Returns the ids of every session that has outlived its TTL, for the
    /// background cleanup loop to reap.
    pub fn expired_session_ids(&self) -> Vec<String> {
        self.0
            .lock()
            .values()
            .filter(|entry| entry.is_expired())
            .map(|entry| entry.session_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use mpc_core::beaver::{build_gate_plan, ParticipantState};

    use super::*;

    fn dummy_entry(session_id: &str, ttl: Duration) -> SessionEntry {
        let engine = Engine::SemiHonest(ParticipantState::new(1, vec![Fp::zero()], build_gate_plan(1), vec![]).unwrap());
        SessionEntry {
            session_id: session_id.to_string(),
            signal_id: Uuid::nil(),
            mode: MPCMode::SemiHonest,
            threshold: 2,
            participant_xs: vec![1, 2, 3],
            created_at: Instant::now(),
            ttl,
            engine: Mutex::new(engine),
            status: Mutex::new(SessionStatus::Round1Collecting),
            peers: Vec::new(),
            pending_mac_check: Mutex::new(None),
        }
    }

    #[test]
    fn session_ids_are_single_use() {
        let registry = SessionRegistry::default();
        let (_, guard) = registry.insert_new_session(dummy_entry("s1", Duration::from_secs(60))).unwrap();
        let err = registry.insert_new_session(dummy_entry("s1", Duration::from_secs(60))).unwrap_err();
        assert!(matches!(err, CoordinatorError::InvalidInput(_)));
        drop(guard);
    }

    #[test]
    fn dropping_an_armed_guard_removes_the_entry() {
        let registry = SessionRegistry::default();
        let (_, guard) = registry.insert_new_session(dummy_entry("s2", Duration::from_secs(60))).unwrap();
        assert!(registry.get("s2").is_some());
        drop(guard);
        assert!(registry.get("s2").is_none());
    }

    #[test]
    fn disarming_a_guard_keeps_the_entry_on_drop() {
        let registry = SessionRegistry::default();
        let (_, mut guard) = registry.insert_new_session(dummy_entry("s3", Duration::from_secs(60))).unwrap();
        guard.disarm();
        drop(guard);
        assert!(registry.get("s3").is_some());
        registry.remove("s3");
    }

    #[test]
    fn expired_sessions_are_reaped_by_id() {
        let registry = SessionRegistry::default();
        let (_, mut guard) = registry.insert_new_session(dummy_entry("expired", Duration::from_millis(0))).unwrap();
        guard.disarm();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(registry.expired_session_ids(), vec!["expired".to_string()]);
    }
}
