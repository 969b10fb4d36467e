//! Beaver-triple multiplication gates and the availability-check tree.
//!
//! A single multiplication gate turns Shamir shares of `X` and `Y` into
//! Shamir shares of `Z = X * Y` by masking each operand with one half of a
//! pre-shared [`LocalTriple`], opening the two masks, and combining them
//! with the triple's `c` share. [`ParticipantState`] drives an entire
//! session's worth of gates with a single call per round: each call both
//! finalizes the previous gate (using its just-opened masks) and produces
//! the next gate's own masks, mirroring the wire contract's single
//! `compute_gate` endpoint with an optional `prev_opened` payload.
//!
//! Computing `r * prod(s - a_i)` for the availability check is a balanced
//! binary tree of such gates over the leaves `[r, s - a_1, ..., s - a_d]`;
//! see [`build_gate_plan`] and [`availability_leaves`].

use crate::error::{CoreError, Result};
use crate::field::Fp;
use crate::shamir::{self, Share};
use crate::triple_gen::BeaverTripleShares;

/// One participant's shares of a single Beaver triple `(a, b, c = a*b)`.
#[derive(Debug, Clone, Copy)]
pub struct LocalTriple {
    pub a: Fp,
    pub b: Fp,
    pub c: Fp,
}

/// A participant's masked shares for one gate, to be broadcast and opened.
#[derive(Debug, Clone, Copy)]
pub struct MaskedShares {
    pub d: Fp,
    pub e: Fp,
}

/// Where a gate's operand comes from: a precomputed leaf value, or the
/// (not-yet-known) result of an earlier gate in the same plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOperand {
    Leaf(usize),
    Gate(usize),
}

/// One internal node of the multiplication tree: which two operands (each
/// a leaf or an earlier gate's result) this gate multiplies.
#[derive(Debug, Clone, Copy)]
pub struct GatePlan {
    pub left: GateOperand,
    pub right: GateOperand,
}

/// Builds the gate plan for a balanced binary tree over `leaf_count`
/// leaves: pairs adjacent entries level by level, carrying forward any odd
/// trailing entry unchanged, until one value remains. Produces exactly
/// `leaf_count.saturating_sub(1)` gates, matching section 4.F's "max(d, 1)
/// multiplications" for `leaf_count = d + 1`.
pub fn build_gate_plan(leaf_count: usize) -> Vec<GatePlan> {
    let mut plan = Vec::new();
    if leaf_count == 0 {
        return plan;
    }
    let mut level: Vec<GateOperand> = (0..leaf_count).map(GateOperand::Leaf).collect();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        let mut it = level.into_iter();
        loop {
            match (it.next(), it.next()) {
                (Some(l), Some(r)) => {
                    let gate_idx = plan.len();
                    plan.push(GatePlan { left: l, right: r });
                    next.push(GateOperand::Gate(gate_idx));
                }
                (Some(l), None) => {
                    next.push(l);
                    break;
                }
                (None, _) => break,
            }
        }
        level = next;
    }
    plan
}

/// This participant's leaf values for the availability-check tree: `r`
/// followed by one `s - a_i` per available index, in order.
pub fn availability_leaves(secret_share: Fp, r_share: Fp, available_indices: &[u64]) -> Vec<Fp> {
    let mut leaves = Vec::with_capacity(1 + available_indices.len());
    leaves.push(r_share);
    leaves.extend(available_indices.iter().map(|&a| secret_share.sub(&Fp::from_u64(a))));
    leaves
}

/// The result of one `compute_gate` round: either this gate's masks to
/// broadcast for opening, or (once the sentinel call past the last gate is
/// reached) the session's final output share.
#[derive(Debug, Clone, Copy)]
pub enum GateOutput {
    Masked(MaskedShares),
    Final(Fp),
}

/// Per-participant state machine driving every gate in a plan with a
/// single call per round. Call `compute_gate` with call index `0, 1, 2,
/// ...` up to and including [`Self::final_call_idx`]; pass `None` for
/// `prev_opened` only on the very first call.
pub struct ParticipantState {
    x: u8,
    leaves: Vec<Fp>,
    plan: Vec<GatePlan>,
    triples: Vec<LocalTriple>,
    results: Vec<Option<Fp>>,
    expected_call: usize,
}

impl ParticipantState {
    /// Builds a state machine for the given gate plan and one triple per
    /// gate.
    pub fn new(x: u8, leaves: Vec<Fp>, plan: Vec<GatePlan>, triples: Vec<LocalTriple>) -> Result<Self> {
        if plan.len() != triples.len() {
            return Err(CoreError::InvalidInput("gate plan and triple count must match".into()));
        }
        let results = vec![None; plan.len()];
        Ok(Self {
            x,
            leaves,
            plan,
            triples,
            results,
            expected_call: 0,
        })
    }

    pub fn x(&self) -> u8 {
        self.x
    }

    /// Number of real multiplication gates in this plan (excludes the
    /// sentinel finalize-only call).
    pub fn gate_count(&self) -> usize {
        self.plan.len()
    }

    /// The call index that finalizes the last gate and returns the final
    /// output share instead of a new gate's masks.
    pub fn final_call_idx(&self) -> usize {
        self.plan.len()
    }

    fn resolve(&self, op: GateOperand) -> Result<Fp> {
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
    /// gate (if any) using `prev_opened`, then either produces the next
    /// gate's masks or, at [`Self::final_call_idx`], the final output
    /// share.
    pub fn compute_gate(&mut self, call_idx: usize, prev_opened: Option<(Fp, Fp)>) -> Result<GateOutput> {
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
            // Every participant adds the full d*e term: Lagrange coefficients
            // for reconstruction at x=0 always sum to 1, so this is correct
            // regardless of which k-subset of participants is used later.
            let z = d.mul(&e).add(&d.mul(&triple.b)).add(&e.mul(&triple.a)).add(&triple.c);
            self.results[prev_idx] = Some(z);
        }

        self.expected_call = call_idx + 1;

        if call_idx == self.plan.len() {
            let last = self.results[call_idx - 1].expect("previous gate just finalized above");
            return Ok(GateOutput::Final(last));
        }

        let gate = self.plan[call_idx];
        let x_share = self.resolve(gate.left)?;
        let y_share = self.resolve(gate.right)?;
        let triple = self.triples[call_idx];
        Ok(GateOutput::Masked(MaskedShares {
            d: x_share.sub(&triple.a),
            e: y_share.sub(&triple.b),
        }))
    }
}

/// The outcome of running the full availability-check tree to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityOutcome {
    pub available: bool,
}

/// Runs the full section-4.F availability check for every participant
/// locally in one call: builds the gate plan over `[r, s - a_1, ...]`,
/// drives every participant's [`ParticipantState`] through every gate
/// (opening `d`/`e` via Lagrange interpolation each round), and
/// reconstructs the final output. `available_indices` empty short-circuits
/// to `available: false` without consuming any triples, per section 4.F's
/// documented edge case.
///
/// Single-process simulation only - the networked coordinator instead
/// drives one [`ParticipantState`] per participant across `/mpc/compute_gate`.
pub fn evaluate_availability_local(
    xs: &[u8],
    k: usize,
    secret_shares: &[Share],
    r_shares: &[Share],
    available_indices: &[u64],
    triples: &[BeaverTripleShares],
) -> Result<AvailabilityOutcome> {
    if available_indices.is_empty() {
        return Ok(AvailabilityOutcome { available: false });
    }
    if secret_shares.len() != xs.len() || r_shares.len() != xs.len() {
        return Err(CoreError::InvalidInput("share count must match participant x-coordinates".into()));
    }

    let plan = build_gate_plan(1 + available_indices.len());
    if triples.len() != plan.len() {
        return Err(CoreError::InvalidInput(format!(
            "availability check over {} indices needs {} triples, got {}",
            available_indices.len(),
            plan.len(),
            triples.len()
        )));
    }

    let mut states: Vec<ParticipantState> = xs
        .iter()
        .enumerate()
        .map(|(i, &x)| {
            let leaves = availability_leaves(secret_shares[i].y, r_shares[i].y, available_indices);
            let local_triples: Vec<LocalTriple> = triples
                .iter()
                .map(|t| LocalTriple {
                    a: t.a[i].y,
                    b: t.b[i].y,
                    c: t.c[i].y,
                })
                .collect();
            ParticipantState::new(x, leaves, plan.clone(), local_triples)
        })
        .collect::<Result<_>>()?;

    let mut prev_opened = None;
    let final_call = plan.len();
    let mut final_shares = Vec::new();
    for call_idx in 0..=final_call {
        let mut masked = Vec::with_capacity(states.len());
        for state in &mut states {
            match state.compute_gate(call_idx, prev_opened)? {
                GateOutput::Masked(m) => masked.push(Some(m)),
                GateOutput::Final(z) => {
                    final_shares.push(Share::new(state.x(), z));
                    masked.push(None);
                }
            }
        }
        if call_idx < final_call {
            let d_shares: Vec<Share> = xs
                .iter()
                .zip(&masked)
                .map(|(&x, m)| Share::new(x, m.expect("masked gate call").d))
                .collect();
            let e_shares: Vec<Share> = xs
                .iter()
                .zip(&masked)
                .map(|(&x, m)| Share::new(x, m.expect("masked gate call").e))
                .collect();
            let d = shamir::reconstruct(&d_shares[..k], k)?;
            let e = shamir::reconstruct(&e_shares[..k], k)?;
            prev_opened = Some((d, e));
        }
    }

    let result = shamir::reconstruct(&final_shares[..k], k)?;
    Ok(AvailabilityOutcome {
        available: result.is_zero(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dh::dh_group_test;
    use crate::triple_gen::generate_two_party_triples_local;
    use rand::thread_rng;

    fn shares_of<R: rand::RngCore + rand::CryptoRng>(xs: &[u8], k: usize, secret: Fp, rng: &mut R) -> Vec<Share> {
        shamir::split_at_points(secret, xs, k, rng).unwrap()
    }

    #[test]
    fn gate_plan_pairs_breadth_first_with_carry() {
        let plan = build_gate_plan(5);
        assert_eq!(plan.len(), 4);
        assert_eq!(plan[0].left, GateOperand::Leaf(0));
        assert_eq!(plan[0].right, GateOperand::Leaf(1));
        assert_eq!(plan[1].left, GateOperand::Leaf(2));
        assert_eq!(plan[1].right, GateOperand::Leaf(3));
        // leaf 4 carries forward unpaired at level 0, pairs with gate 0's result at level 1
        assert_eq!(plan[2].left, GateOperand::Gate(0));
        assert_eq!(plan[2].right, GateOperand::Gate(1));
        assert_eq!(plan[3].left, GateOperand::Gate(2));
        assert_eq!(plan[3].right, GateOperand::Leaf(4));
    }

    #[test]
    fn single_leaf_needs_no_gates() {
        assert!(build_gate_plan(1).is_empty());
    }

    #[test]
    fn availability_true_when_secret_is_available() {
        let mut rng = thread_rng();
        let xs = [1u8, 2, 3];
        let k = 2;
        let group = dh_group_test();

        let secret = Fp::from_u64(5);
        let r = Fp::random_nonzero(&mut rng);
        let available = [3u64, 5, 7];
        let secret_shares = shares_of(&xs, k, secret, &mut rng);
        let r_shares = shares_of(&xs, k, r, &mut rng);
        let plan = build_gate_plan(1 + available.len());
        let triples = generate_two_party_triples_local(plan.len(), &xs, k, &group, &mut rng).unwrap();

        let outcome = evaluate_availability_local(&xs, k, &secret_shares, &r_shares, &available, &triples).unwrap();
        assert!(outcome.available);
    }

    #[test]
    fn availability_false_when_secret_is_absent() {
        let mut rng = thread_rng();
        let xs = [1u8, 2, 3];
        let k = 2;
        let group = dh_group_test();

        let secret = Fp::from_u64(5);
        let r = Fp::random_nonzero(&mut rng);
        let available = [1u64, 2, 3];
        let secret_shares = shares_of(&xs, k, secret, &mut rng);
        let r_shares = shares_of(&xs, k, r, &mut rng);
        let plan = build_gate_plan(1 + available.len());
        let triples = generate_two_party_triples_local(plan.len(), &xs, k, &group, &mut rng).unwrap();

        let outcome = evaluate_availability_local(&xs, k, &secret_shares, &r_shares, &available, &triples).unwrap();
        assert!(!outcome.available);
    }

    #[test]
    fn empty_available_set_short_circuits_without_triples() {
        let xs = [1u8, 2, 3];
        let secret_shares = vec![Share::new(1, Fp::zero()), Share::new(2, Fp::zero()), Share::new(3, Fp::zero())];
        let r_shares = secret_shares.clone();
        let outcome = evaluate_availability_local(&xs, 2, &secret_shares, &r_shares, &[], &[]).unwrap();
        assert!(!outcome.available);
    }

    #[test]
    fn out_of_order_call_rejected() {
        let triple = LocalTriple {
            a: Fp::from_u64(1),
            b: Fp::from_u64(2),
            c: Fp::from_u64(2),
        };
        let plan = build_gate_plan(2);
        let mut state = ParticipantState::new(1, vec![Fp::from_u64(3), Fp::from_u64(4)], plan, vec![triple]).unwrap();
        assert!(matches!(
            state.compute_gate(1, None),
            Err(CoreError::OutOfOrderGate { expected: 0, got: 1 })
        ));
    }
}
