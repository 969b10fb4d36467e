//! SPDZ-style information-theoretic authentication for the gate protocol.
//!
//! Every secret-shared value carries, alongside its ordinary Shamir share,
//! a share of that value times a global, never-reconstructed MAC key
//! `alpha`. A batch of openings is verified by combining the claimed MAC
//! shares under a fresh random linear combination, committing to the
//! combined share, then revealing and summing: an honest run sums to zero,
//! a single tampered opening sums to zero only with probability `1/|Fp|`.
//!
//! [`AuthenticatedParticipantState`] drives gates with the same single-call
//! shape as [`crate::beaver::ParticipantState`]: each `compute_gate` call
//! both finalizes the previous gate's product and MAC (using its just-opened
//! masks) and produces the next gate's own masks, so a caller that already
//! knows how to drive the semi-honest protocol knows how to drive this one.

use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::beaver::{GateOperand, GatePlan};
use crate::error::{CoreError, Result};
use crate::field::Fp;
use crate::gilboa::gilboa_multiply_local;
use crate::shamir::{self, Share};
use crate::triple_gen::additive_to_shamir;

/// A share of the global, per-session MAC key `alpha`. Never reconstructed
/// outside of [`reconstruct_alpha_for_simulation`].
pub type MacKeyShare = Fp;

/// A value's Shamir share paired with a share of `value * alpha`.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedShare {
    pub value: Fp,
    pub mac: Fp,
}

/// One participant's authenticated record for one triple component.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedRecord {
    pub x: u8,
    pub share: AuthenticatedShare,
}

/// An authenticated Beaver triple: every participant's `(a, b, c)` shares,
/// each carrying a MAC share.
#[derive(Debug, Clone)]
pub struct AuthenticatedBeaverTriple {
    pub a: Vec<AuthenticatedRecord>,
    pub b: Vec<AuthenticatedRecord>,
    pub c: Vec<AuthenticatedRecord>,
}

/// Generates `count` authenticated Beaver triples for the two-party OT
/// path, given each party's additive share of the session's MAC key.
///
/// Builds on the same machinery as [`crate::triple_gen`]: value shares come
/// from the two-party OT triple generator, and each component's MAC share
/// is produced by an additional Gilboa multiplication of that component's
/// additive share against the MAC key's additive share. Local simulation
/// only, mirroring [`crate::triple_gen::generate_two_party_triples_local`].
pub fn generate_authenticated_triples_local<R: RngCore + CryptoRng>(
    count: usize,
    xs: &[u8],
    k: usize,
    group: &crate::dh::DhGroup,
    alpha_party0: Fp,
    alpha_party1: Fp,
    rng: &mut R,
) -> Result<Vec<AuthenticatedBeaverTriple>> {
    use crate::triple_gen::OtTripleGenState;

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

        let mut mac_of = |v0: Fp, v1: Fp, rng: &mut R| -> (Fp, Fp) {
            let gs0 = gilboa_multiply_local(v0, alpha_party1, rng);
            let gs1 = gilboa_multiply_local(alpha_party0, v1, rng);
            // mac0 + mac1 = v0*alpha1 + alpha0*v1 + v0*alpha0 + v1*alpha1 = (v0+v1)(alpha0+alpha1)
            let mac0 = gs0.sender_share.add(&gs1.receiver_share).add(&v0.mul(&alpha_party0));
            let mac1 = gs0.receiver_share.add(&gs1.sender_share).add(&v1.mul(&alpha_party1));
            (mac0, mac1)
        };

        let (mac_a0, mac_a1) = mac_of(a0, a1, &mut *rng);
        let (mac_b0, mac_b1) = mac_of(b0, b1, &mut *rng);
        let (mac_c0, mac_c1) = mac_of(c0, c1, &mut *rng);

        let a_value = additive_to_shamir(&[a0, a1], xs, k, rng)?;
        let b_value = additive_to_shamir(&[b0, b1], xs, k, rng)?;
        let c_value = additive_to_shamir(&[c0, c1], xs, k, rng)?;
        let a_mac = additive_to_shamir(&[mac_a0, mac_a1], xs, k, rng)?;
        let b_mac = additive_to_shamir(&[mac_b0, mac_b1], xs, k, rng)?;
        let c_mac = additive_to_shamir(&[mac_c0, mac_c1], xs, k, rng)?;

        let zip = |values: Vec<Share>, macs: Vec<Share>| -> Vec<AuthenticatedRecord> {
            values
                .into_iter()
                .zip(macs)
                .map(|(v, m)| {
                    debug_assert_eq!(v.x, m.x);
                    AuthenticatedRecord {
                        x: v.x,
                        share: AuthenticatedShare { value: v.y, mac: m.y },
                    }
                })
                .collect()
        };

        out.push(AuthenticatedBeaverTriple {
            a: zip(a_value, a_mac),
            b: zip(b_value, b_mac),
            c: zip(c_value, c_mac),
        });
    }
    Ok(out)
}

/// Masked shares broadcast for opening in one authenticated gate.
#[derive(Debug, Clone, Copy)]
pub struct AuthMaskedShares {
    pub d: Fp,
    pub e: Fp,
}

/// The result of one `compute_gate` round: either this gate's masks to
/// broadcast for opening, or (at the sentinel final call) this participant's
/// authenticated share of the session's output.
#[derive(Debug, Clone, Copy)]
pub enum AuthGateOutput {
    Masked(AuthMaskedShares),
    Final(AuthenticatedShare),
}

/// This participant's view of one gate's triple: both the value and the MAC
/// share of each of `a`, `b`, `c`.
#[derive(Debug, Clone, Copy)]
pub struct AuthLocalTriple {
    pub a: AuthenticatedShare,
    pub b: AuthenticatedShare,
    pub c: AuthenticatedShare,
}

/// Per-participant authenticated gate driver, mirroring
/// [`crate::beaver::ParticipantState`] gate-for-gate over the same
/// [`GatePlan`]. In addition to the running value it tracks the MAC share
/// of every opened `d`/`e`, queuing them in `pending_checks` for a later
/// batch MAC check via [`Self::mac_check_contribution`].
pub struct AuthenticatedParticipantState {
    x: u8,
    alpha_share: MacKeyShare,
    leaves: Vec<AuthenticatedShare>,
    plan: Vec<GatePlan>,
    triples: Vec<AuthLocalTriple>,
    results: Vec<Option<AuthenticatedShare>>,
    expected_call: usize,
    pending_macs: Option<(Fp, Fp)>,
    pending_checks: Vec<(Fp, Fp)>,
}

impl AuthenticatedParticipantState {
    /// Builds a state machine for the given gate plan, one authenticated
    /// triple per gate, and this participant's share of the session's MAC
    /// key.
    pub fn new(
        x: u8,
        alpha_share: MacKeyShare,
        leaves: Vec<AuthenticatedShare>,
        plan: Vec<GatePlan>,
        triples: Vec<AuthLocalTriple>,
    ) -> Result<Self> {
        if plan.len() != triples.len() {
            return Err(CoreError::InvalidInput("gate plan and triple count must match".into()));
        }
        let results = vec![None; plan.len()];
        Ok(Self {
            x,
            alpha_share,
            leaves,
            plan,
            triples,
            results,
            expected_call: 0,
            pending_macs: None,
            pending_checks: Vec::new(),
        })
    }

    pub fn x(&self) -> u8 {
        self.x
    }

    /// The call index that finalizes the last gate and returns the final
    /// authenticated output share instead of a new gate's masks.
    pub fn final_call_idx(&self) -> usize {
        self.plan.len()
    }

    fn resolve(&self, op: GateOperand) -> Result<AuthenticatedShare> {
        match op {
            GateOperand::Leaf(i) => self
                .leaves
                .get(i)
                .copied()
                .ok_or(CoreError::InvalidInput("leaf index out of range".into())),
            GateOperand::Gate(i) => self
                .results
                .get(i)
                .copied()
                .flatten()
                .ok_or(CoreError::InvalidInput("referenced gate has no result yet".into())),
        }
    }

    /// Advances the state machine by one call: finalizes the previous
    /// gate's value and MAC (if any) using `prev_opened`, queues both of
    /// that gate's openings for the batch MAC check, then either produces
    /// the next gate's masks or, at [`Self::final_call_idx`], the final
    /// authenticated output share.
    ///
    /// Every participant adds the full `d*e` (value) and `d*e*alpha_i`
    /// (MAC) cross terms unconditionally: Lagrange coefficients for
    /// reconstruction at `x = 0` always sum to 1 over any valid k-subset,
    /// so there is no "designated" participant, matching
    /// [`crate::beaver::ParticipantState::compute_gate`].
    pub fn compute_gate(&mut self, call_idx: usize, prev_opened: Option<(Fp, Fp)>) -> Result<AuthGateOutput> {
        if call_idx != self.expected_call {
            return Err(CoreError::OutOfOrderGate {
                expected: self.expected_call,
                got: call_idx,
            });
        }

        if call_idx == 0 {
            if prev_opened.is_some() {
                return Err(CoreError::InvalidInput("first call must not carry previous opened values".into()));
            }
        } else {
            let (d, e) = prev_opened
                .ok_or(CoreError::InvalidInput("missing previous gate's opened values".into()))?;
            let prev_idx = call_idx - 1;
            let triple = self.triples[prev_idx];
            let (mac_d, mac_e) = self
                .pending_macs
                .take()
                .ok_or(CoreError::InvalidInput("missing pending MAC shares for previous gate".into()))?;

            let cross = d.mul(&e);
            let value = cross
                .add(&d.mul(&triple.b.value))
                .add(&e.mul(&triple.a.value))
                .add(&triple.c.value);
            let mac = cross
                .mul(&self.alpha_share)
                .add(&d.mul(&triple.b.mac))
                .add(&e.mul(&triple.a.mac))
                .add(&triple.c.mac);

            self.results[prev_idx] = Some(AuthenticatedShare { value, mac });
            self.pending_checks.push((d, mac_d));
            self.pending_checks.push((e, mac_e));
        }

        self.expected_call = call_idx + 1;

        if call_idx == self.plan.len() {
            let last = self.results[call_idx - 1].expect("previous gate just finalized above");
            return Ok(AuthGateOutput::Final(last));
        }

        let gate = self.plan[call_idx];
        let x_share = self.resolve(gate.left)?;
        let y_share = self.resolve(gate.right)?;
        let triple = self.triples[call_idx];
        let d = x_share.value.sub(&triple.a.value);
        let e = y_share.value.sub(&triple.b.value);
        let mac_d = x_share.mac.sub(&triple.a.mac);
        let mac_e = y_share.mac.sub(&triple.b.mac);
        self.pending_macs = Some((mac_d, mac_e));
        Ok(AuthGateOutput::Masked(AuthMaskedShares { d, e }))
    }

    /// This participant's contribution to the batch MAC check, combining
    /// every queued opening under the caller-supplied random coefficients
    /// (one per queued opening). The coefficients must be agreed by all
    /// participants only *after* every opening has been queued.
    pub fn mac_check_contribution(&self, coeffs: &[Fp]) -> Result<Fp> {
        if coeffs.len() != self.pending_checks.len() {
            return Err(CoreError::InvalidInput(format!(
                "expected {} MAC-check coefficients, got {}",
                self.pending_checks.len(),
                coeffs.len()
            )));
        }
        Ok(self
            .pending_checks
            .iter()
            .zip(coeffs)
            .fold(Fp::zero(), |acc, ((opened, mac_share), r)| {
                acc.add(&r.mul(&mac_share.sub(&self.alpha_share.mul(opened))))
            }))
    }

    /// Drops queued openings once they have been MAC-checked.
    pub fn clear_pending_checks(&mut self) {
        self.pending_checks.clear();
    }
}

/// A hash commitment to a MAC-check contribution, opened later via
/// [`verify_commitment`]. Commit-then-reveal prevents a corrupt participant
/// from choosing its contribution after seeing everyone else's, which would
/// let a single tampered opening's error term be cancelled out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Commitment([u8; 32]);

impl Commitment {
    /// Wraps a commitment hash received from a peer, for later verification
    /// against a revealed `(sigma, nonce)` pair via [`verify_commitment`].
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Commitment(bytes)
    }

    /// The raw commitment bytes, to serialize onto the wire.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Commits to a MAC-check contribution `sigma` under a random nonce.
pub fn commit(sigma: Fp, nonce: [u8; 32]) -> Commitment {
    let mut hasher = Sha256::new();
    hasher.update(sigma.to_be_bytes());
    hasher.update(nonce);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    Commitment(out)
}

/// Verifies a revealed `(sigma, nonce)` pair against a prior commitment, in
/// constant time.
pub fn verify_commitment(commitment: &Commitment, sigma: Fp, nonce: [u8; 32]) -> bool {
    let recomputed = commit(sigma, nonce);
    commitment.0.ct_eq(&recomputed.0).into()
}

/// Combines every participant's revealed MAC-check contribution under its
/// Lagrange coefficient at `x = 0` - the same combination
/// [`shamir::reconstruct`] uses to recover a secret from its shares - and
/// compares the result against zero in constant time. `true` means the
/// batch of openings this round was authentic.
///
/// Each `sigma_shares` entry's `x` is the contributing participant's
/// x-coordinate and `y` is its [`AuthenticatedParticipantState::mac_check_contribution`]
/// output; summing the raw contributions without this weighting would
/// reject every honest run, since `sigma_i` is only a share of the
/// (always-zero) authenticated check value, not the value itself.
pub fn mac_check_passes(sigma_shares: &[Share]) -> Result<bool> {
    let xs: Vec<u8> = sigma_shares.iter().map(|s| s.x).collect();
    let coeffs = shamir::lagrange_from_coeff(&xs)?;
    let total = sigma_shares
        .iter()
        .zip(&coeffs)
        .fold(Fp::zero(), |acc, (s, l)| acc.add(&s.y.mul(l)));
    Ok(total.to_be_bytes().ct_eq(&Fp::zero().to_be_bytes()).into())
}

/// Reconstructs the MAC key `alpha` from its shares. Gated behind
/// `allow_simulation_mode` - authenticated sessions must never reconstruct
/// `alpha` in production, since doing so lets a corrupt participant forge
/// MACs for any future opening.
pub fn reconstruct_alpha_for_simulation(shares: &[Share], k: usize, allow_simulation_mode: bool) -> Result<Fp> {
    if !allow_simulation_mode {
        return Err(CoreError::SimulationModeRequired("alpha reconstruction"));
    }
    shamir::reconstruct(shares, k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beaver::build_gate_plan;
    use crate::dh::dh_group_test;
    use rand::thread_rng;

    fn setup_triples(xs: &[u8], k: usize, count: usize) -> (Fp, Vec<AuthenticatedBeaverTriple>) {
        let mut rng = thread_rng();
        let group = dh_group_test();
        let alpha0 = Fp::random(&mut rng);
        let alpha1 = Fp::random(&mut rng);
        let triples = generate_authenticated_triples_local(count, xs, k, &group, alpha0, alpha1, &mut rng).unwrap();
        (alpha0.add(&alpha1), triples)
    }

    #[test]
    fn authenticated_triple_reconstructs_and_macs_correctly() {
        let xs = [1u8, 2, 3];
        let k = 2;
        let (alpha, triples) = setup_triples(&xs, k, 1);
        let triple = &triples[0];

        let a_shares: Vec<Share> = triple.a.iter().map(|r| Share::new(r.x, r.share.value)).collect();
        let b_shares: Vec<Share> = triple.b.iter().map(|r| Share::new(r.x, r.share.value)).collect();
        let c_shares: Vec<Share> = triple.c.iter().map(|r| Share::new(r.x, r.share.value)).collect();
        let a = shamir::reconstruct(&a_shares[..k], k).unwrap();
        let b = shamir::reconstruct(&b_shares[..k], k).unwrap();
        let c = shamir::reconstruct(&c_shares[..k], k).unwrap();
        assert_eq!(c, a.mul(&b));

        let a_macs: Vec<Share> = triple.a.iter().map(|r| Share::new(r.x, r.share.mac)).collect();
        let mac_a = shamir::reconstruct(&a_macs[..k], k).unwrap();
        assert_eq!(mac_a, a.mul(&alpha));
    }

    #[test]
    fn gate_produces_correct_authenticated_product_and_passing_mac_check() {
        let xs = [1u8, 2, 3];
        let k = 2;
        let (alpha, triples) = setup_triples(&xs, k, 1);
        let mut rng = thread_rng();

        let x = Fp::from_u64(6);
        let y = Fp::from_u64(7);
        let x_val_shares = shamir::split_at_points(x, &xs, k, &mut rng).unwrap();
        let y_val_shares = shamir::split_at_points(y, &xs, k, &mut rng).unwrap();
        let x_mac_shares = shamir::split_at_points(x.mul(&alpha), &xs, k, &mut rng).unwrap();
        let y_mac_shares = shamir::split_at_points(y.mul(&alpha), &xs, k, &mut rng).unwrap();
        // per-participant alpha shares: split alpha itself so every participant
        // has a consistent share of the same key used to generate the triple.
        let alpha_shares = shamir::split_at_points(alpha, &xs, k, &mut rng).unwrap();

        let plan = build_gate_plan(2);
        let mut states: Vec<AuthenticatedParticipantState> = xs
            .iter()
            .enumerate()
            .map(|(i, &_x)| {
                let leaves = vec![
                    AuthenticatedShare {
                        value: x_val_shares[i].y,
                        mac: x_mac_shares[i].y,
                    },
                    AuthenticatedShare {
                        value: y_val_shares[i].y,
                        mac: y_mac_shares[i].y,
                    },
                ];
                let local_triples = vec![AuthLocalTriple {
                    a: triples[0].a[i].share,
                    b: triples[0].b[i].share,
                    c: triples[0].c[i].share,
                }];
                AuthenticatedParticipantState::new(xs[i], alpha_shares[i].y, leaves, plan.clone(), local_triples)
            })
            .collect::<Result<_>>()
            .unwrap();

        let final_call = plan.len();
        let mut prev_opened = None;
        let mut final_shares = Vec::new();
        for call_idx in 0..=final_call {
            let mut masked = Vec::with_capacity(states.len());
            for state in &mut states {
                match state.compute_gate(call_idx, prev_opened).unwrap() {
                    AuthGateOutput::Masked(m) => masked.push(Some(m)),
                    AuthGateOutput::Final(share) => {
                        final_shares.push(Share::new(state.x(), share.value));
                        masked.push(None);
                    }
                }
            }
            if call_idx < final_call {
                let d_shares: Vec<Share> = xs.iter().zip(&masked).map(|(&x, m)| Share::new(x, m.unwrap().d)).collect();
                let e_shares: Vec<Share> = xs.iter().zip(&masked).map(|(&x, m)| Share::new(x, m.unwrap().e)).collect();
                let d = shamir::reconstruct(&d_shares[..k], k).unwrap();
                let e = shamir::reconstruct(&e_shares[..k], k).unwrap();
                prev_opened = Some((d, e));
            }
        }

        let z = shamir::reconstruct(&final_shares[..k], k).unwrap();
        assert_eq!(z, x.mul(&y));

        // batch MAC check over the two openings (d, e) from this gate
        let coeffs = vec![Fp::from_u64(3), Fp::from_u64(5)];
        let sigma_shares: Vec<Share> = states
            .iter()
            .map(|s| Share::new(s.x(), s.mac_check_contribution(&coeffs).unwrap()))
            .collect();
        assert!(mac_check_passes(&sigma_shares).unwrap());
    }

    #[test]
    fn tampered_opening_fails_mac_check() {
        let sigma_shares = [Share::new(1, Fp::from_u64(1)), Share::new(2, Fp::from_u64(2))];
        assert!(!mac_check_passes(&sigma_shares).unwrap());
    }

    #[test]
    fn alpha_reconstruction_requires_simulation_mode() {
        let mut rng = thread_rng();
        let shares = shamir::split(Fp::from_u64(9), 3, 2, &mut rng).unwrap();
        assert!(matches!(
            reconstruct_alpha_for_simulation(&shares, 2, false),
            Err(CoreError::SimulationModeRequired(_))
        ));
        assert!(reconstruct_alpha_for_simulation(&shares, 2, true).is_ok());
    }

    #[test]
    fn commitment_roundtrip() {
        let sigma = Fp::from_u64(123);
        let nonce = [7u8; 32];
        let c = commit(sigma, nonce);
        assert!(verify_commitment(&c, sigma, nonce));
        assert!(!verify_commitment(&c, Fp::from_u64(124), nonce));
    }
}
