//! Transient per-session state for the peer side of the two-party
//! network-OT triple generator, threaded across the five `/mpc/ot/*` calls
//! a coordinator drives against this node.

use std::collections::HashMap;
use std::sync::Arc;

use mpc_core::field::Fp;
use mpc_core::triple_gen::OtTripleGenState;
use num_bigint::BigUint;
use parking_lot::Mutex;

use crate::error::CoordinatorError;

/// One in-progress OT run, scoped to a single session id: the per-triple
/// state machines plus the scratch this node needs to carry between the
/// `/choices`, `/transfers`, and `/complete` calls - the coordinator's
/// published sender public keys (learned at `/choices`) and this node's own
/// per-triple sender shares (learned at `/transfers`, needed again at
/// `/complete`).
#[derive(Default)]
pub struct OtPeerRun {
    /// This node's per-triple OT state machines.
    pub states: Vec<OtTripleGenState>,
    /// The coordinator's sender public keys, one per triple.
    pub peer_public_keys: Vec<BigUint>,
    /// This node's sender share of each triple's cross term, produced while
    /// processing the coordinator's choices at `/transfers`.
    pub sender_shares: Vec<Fp>,
}

/// Holds one in-progress [`OtPeerRun`] per session id, for the duration of
/// the five-call handshake.
#[derive(Clone, Default)]
pub struct OtStateStore(Arc<Mutex<HashMap<String, OtPeerRun>>>);

impl OtStateStore {
    /// Registers a freshly initialized set of states for `session_id`,
    /// replacing any prior entry (an OT run is never resumed).
    pub fn insert(&self, session_id: String, states: Vec<OtTripleGenState>) {
        self.0.lock().insert(
            session_id,
            OtPeerRun {
                states,
                peer_public_keys: Vec::new(),
                sender_shares: Vec::new(),
            },
        );
    }

    /// Runs `f` against the run state for `session_id`, if present.
    pub fn with<T>(&self, session_id: &str, f: impl FnOnce(&mut OtPeerRun) -> T) -> Result<T, CoordinatorError> {
        let mut runs = self.0.lock();
        let entry = runs
            .get_mut(session_id)
            .ok_or_else(|| CoordinatorError::SessionExpired(session_id.to_string()))?;
        Ok(f(entry))
    }

    /// Removes and returns the run state for `session_id`, once the
    /// handshake is complete and its final additive shares have been read.
    pub fn remove(&self, session_id: &str) -> Option<OtPeerRun> {
        self.0.lock().remove(session_id)
    }
}
