//! Distributed Beaver-triple generation.
//!
//! Two independent mechanisms are provided:
//!
//! * [`OtTripleGenState`] drives the two-party network-OT protocol from
//!   section 4.E: each of the two triple-generating parties runs this state
//!   machine through its four phases, exchanging the returned messages with
//!   its peer over whatever transport the caller provides (the service
//!   crate drives this over the `/mpc/ot/*` endpoints).
//! * [`generate_dealer_triple`] is the documented, explicitly-gated
//!   trusted-dealer fallback used when more than two parties participate.
//!
//! Both paths end the same way: [`additive_to_shamir`] turns whatever
//! additive shares were produced into Shamir shares at the full
//! participant x-coordinate set.

use rand::{CryptoRng, RngCore};

use crate::dh::DhGroup;
use crate::error::{CoreError, Result};
use crate::field::Fp;
use crate::gilboa::{GilboaReceiverSetup, GilboaSenderSetup};
use crate::shamir::{self, Share};

/// A Beaver triple's Shamir shares for every participant.
#[derive(Debug, Clone)]
pub struct BeaverTripleShares {
    /// Shares of `a`.
    pub a: Vec<Share>,
    /// Shares of `b`.
    pub b: Vec<Share>,
    /// Shares of `c = a * b mod p`.
    pub c: Vec<Share>,
}

/// Combines additive shares of a single secret into Shamir shares at `xs`.
///
/// Each additive share's holder independently creates a random
/// degree-`(k-1)` polynomial with that share as the constant term and
/// evaluates it at every x-coordinate in `xs`; summing all parties'
/// evaluations at a given x yields a valid Shamir share of the sum of the
/// additive shares. Because each polynomial is otherwise random, no single
/// served evaluation reveals anything about the underlying additive share.
pub fn additive_to_shamir<R: RngCore + CryptoRng>(
    additive_values: &[Fp],
    xs: &[u8],
    k: usize,
    rng: &mut R,
) -> Result<Vec<Share>> {
    if xs.len() < k {
        return Err(CoreError::InsufficientShares {
            needed: k,
            got: xs.len(),
        });
    }
    let mut combined = vec![Fp::zero(); xs.len()];
    for &value in additive_values {
        let served = shamir::split_at_points(value, xs, k, rng)?;
        for (slot, share) in combined.iter_mut().zip(served.iter()) {
            *slot = slot.add(&share.y);
        }
    }
    Ok(xs
        .iter()
        .zip(combined.iter())
        .map(|(&x, &y)| Share::new(x, y))
        .collect())
}

/// One party's half of the two-party network-OT triple generator.
///
/// Drive this through `initialize` -> `sender_public_key` (publish) ->
/// `generate_receiver_choices` (send) -> `process_sender_choices` (send) ->
/// `decrypt_receiver_transfers` (accumulate), exactly mirroring the four
/// phases in section 4.E. The protocol is symmetric: both parties run the
/// identical sequence of calls against each other's messages.
pub struct OtTripleGenState {
    group: DhGroup,
    a: Fp,
    b: Fp,
    c: Fp,
    sender: GilboaSenderSetup,
    receiver: GilboaReceiverSetup,
}

impl OtTripleGenState {
    /// Phase 1 (setup): draws random `a`, `b`, computes the local product,
    /// and spins up a sender DH instance (for `a`) and a receiver DH
    /// instance (for `b`).
    pub fn initialize<R: RngCore + CryptoRng>(group: DhGroup, rng: &mut R) -> Self {
        let a = Fp::random(rng);
        let b = Fp::random(rng);
        let c = a.mul(&b);
        let sender = GilboaSenderSetup::new(a, group.clone(), rng);
        let receiver = GilboaReceiverSetup::new(b, group.clone(), rng);
        Self {
            group,
            a,
            b,
            c,
            sender,
            receiver,
        }
    }

    /// This party's sender public key `A = g^a`, to publish to the peer.
    pub fn sender_public_key(&self) -> num_bigint::BigUint {
        self.sender.dh_public().clone()
    }

    /// Phase 2 (choices): uses this party's receiver half (holding `b`)
    /// against the peer's published sender public key to produce this
    /// party's choice commitments `T_k`.
    pub fn generate_receiver_choices(&self, peer_sender_pk: &num_bigint::BigUint) -> Vec<num_bigint::BigUint> {
        self.receiver.generate_choices(peer_sender_pk)
    }

    /// Phase 3 (transfers): uses this party's sender half (holding `a`)
    /// against the peer's choice commitments to produce the encrypted
    /// transfer pairs to send back, and this party's additive share of
    /// `a (mine) * b (peer's)`.
    pub fn process_sender_choices(&self, peer_choices: &[num_bigint::BigUint]) -> (Vec<(Fp, Fp)>, Fp) {
        self.sender.process_choices(peer_choices)
    }

    /// Phase 4 (complete): decrypts the peer's transfer pairs using this
    /// party's receiver half, yielding this party's additive share of
    /// `a (peer's) * b (mine)`, then folds both cross-term shares plus the
    /// local product into this party's running `c` share.
    pub fn decrypt_and_accumulate(
        &mut self,
        peer_sender_pk: &num_bigint::BigUint,
        peer_pairs: &[(Fp, Fp)],
        my_sender_share: Fp,
    ) {
        let receiver_share = self.receiver.decrypt_transfers(peer_sender_pk, peer_pairs);
        self.c = self.c.add(&my_sender_share).add(&receiver_share);
    }

    /// This party's final additive shares of `(a, b, c)` after phase 4.
    pub fn additive_shares(&self) -> (Fp, Fp, Fp) {
        (self.a, self.b, self.c)
    }
}

/// Generates `count` Beaver triples via the two-party network-OT protocol,
/// running both halves in-process. Used for tests and for the local
/// simulation mode; the networked coordinator instead drives one
/// [`OtTripleGenState`] per party across the wire and calls
/// [`additive_to_shamir`] itself once both sides report their additive
/// shares.
pub fn generate_two_party_triples_local<R: RngCore + CryptoRng>(
    count: usize,
    xs: &[u8],
    k: usize,
    group: &DhGroup,
    rng: &mut R,
) -> Result<Vec<BeaverTripleShares>> {
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let mut coord = OtTripleGenState::initialize(group.clone(), rng);
        let mut peer = OtTripleGenState::initialize(group.clone(), rng);

        let coord_pk = coord.sender_public_key();
        let peer_pk = peer.sender_public_key();

        let coord_choices = coord.generate_receiver_choices(&peer_pk);
        let peer_choices = peer.generate_receiver_choices(&coord_pk);

        let (coord_pairs, coord_sender_share) = coord.process_sender_choices(&peer_choices);
        let (peer_pairs, peer_sender_share) = peer.process_sender_choices(&coord_choices);

        coord.decrypt_and_accumulate(&peer_pk, &peer_pairs, coord_sender_share);
        peer.decrypt_and_accumulate(&coord_pk, &coord_pairs, peer_sender_share);

        let (a0, b0, c0) = coord.additive_shares();
        let (a1, b1, c1) = peer.additive_shares();

        let a = additive_to_shamir(&[a0, a1], xs, k, rng)?;
        let b = additive_to_shamir(&[b0, b1], xs, k, rng)?;
        let c = additive_to_shamir(&[c0, c1], xs, k, rng)?;
        out.push(BeaverTripleShares { a, b, c });
    }
    Ok(out)
}

/// The documented trusted-dealer fallback for more than two participating
/// parties: one party samples `a`, `b`, `c = a*b` directly and secret-shares
/// each. Requires `allow_dealer_fallback` to be `true`; callers must surface
/// this as an explicit, logged security downgrade for the session.
pub fn generate_dealer_triple<R: RngCore + CryptoRng>(
    xs: &[u8],
    k: usize,
    allow_dealer_fallback: bool,
    rng: &mut R,
) -> Result<BeaverTripleShares> {
    if !allow_dealer_fallback {
        return Err(CoreError::DealerFallbackNotAllowed);
    }
    let a = Fp::random(rng);
    let b = Fp::random(rng);
    let c = a.mul(&b);
    Ok(BeaverTripleShares {
        a: shamir::split_at_points(a, xs, k, rng)?,
        b: shamir::split_at_points(b, xs, k, rng)?,
        c: shamir::split_at_points(c, xs, k, rng)?,
    })
}

/// Verifies a generated triple reconstructs correctly: `c == a * b`.
/// Testing/debugging only - production verification of a Beaver triple
/// happens implicitly via the MAC check in authenticated sessions, or is
/// simply trusted in semi-honest mode.
pub fn verify_triple(triple: &BeaverTripleShares, k: usize) -> Result<bool> {
    let a = shamir::reconstruct(&triple.a[..k], k)?;
    let b = shamir::reconstruct(&triple.b[..k], k)?;
    let c = shamir::reconstruct(&triple.c[..k], k)?;
    Ok(c == a.mul(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dh::dh_group_test;
    use rand::thread_rng;

    #[test]
    fn two_party_ot_triple_reconstructs_correctly() {
        let mut rng = thread_rng();
        let xs = [1u8, 2, 3];
        let group = dh_group_test();
        let triples = generate_two_party_triples_local(3, &xs, 2, &group, &mut rng).unwrap();
        for triple in &triples {
            assert!(verify_triple(triple, 2).unwrap());
        }
    }

    #[test]
    fn dealer_fallback_requires_explicit_flag() {
        let mut rng = thread_rng();
        assert!(matches!(
            generate_dealer_triple(&[1, 2, 3], 2, false, &mut rng),
            Err(CoreError::DealerFallbackNotAllowed)
        ));
    }

    #[test]
    fn dealer_fallback_triple_is_correct_when_allowed() {
        let mut rng = thread_rng();
        let triple = generate_dealer_triple(&[1, 2, 3], 2, true, &mut rng).unwrap();
        assert!(verify_triple(&triple, 2).unwrap());
    }
}
