//! Gilboa OT-based multiplication.
//!
//! Sender holds a field element `x`, receiver holds `y`. After running one
//! pass of `GILBOA_BITS` parallel 1-of-2 oblivious transfers, the sender
//! holds `sender_share` and the receiver holds `receiver_share`, with
//! `sender_share + receiver_share == x * y mod p`. Neither party learns the
//! other's input.
//!
//! [`GilboaSenderSetup`]/[`GilboaReceiverSetup`] implement the four
//! network-facing steps used by the two-party distributed triple generator
//! in [`crate::triple_gen`]. [`gilboa_multiply_local`] runs both halves in
//! one call with no DH round-trip, for single-process simulation and tests.

use num_bigint::BigUint;
use rand::{CryptoRng, RngCore};

use crate::dh::{ot_key, DhGroup};
use crate::field::Fp;

/// Number of parallel 1-of-2 OTs run per Gilboa multiplication. The BN254
/// scalar field is ~254 bits; 256 is used for headroom, mirroring the
/// reference protocol this crate's triple generator implements.
pub const GILBOA_BITS: usize = 256;

/// Sender-side state for one Gilboa multiplication (holds `x`).
pub struct GilboaSenderSetup {
    x: Fp,
    dh_secret: BigUint,
    dh_public: BigUint,
    r_values: Vec<Fp>,
    group: DhGroup,
}

/// Receiver-side state for one Gilboa multiplication (holds `y`).
pub struct GilboaReceiverSetup {
    bits: Vec<bool>,
    r_scalars: Vec<BigUint>,
    group: DhGroup,
}

impl GilboaSenderSetup {
    /// Generates a fresh DH keypair and per-bit correlated randomness.
    pub fn new<R: RngCore + CryptoRng>(x: Fp, group: DhGroup, rng: &mut R) -> Self {
        let dh_secret = group.rand_scalar(rng);
        let dh_public = group.pow_gen(&dh_secret);
        let r_values = (0..GILBOA_BITS).map(|_| Fp::random(rng)).collect();
        Self {
            x,
            dh_secret,
            dh_public,
            r_values,
            group,
        }
    }

    /// The sender's DH public key `A = g^a`, to be published to the peer.
    pub fn dh_public(&self) -> &BigUint {
        &self.dh_public
    }

    /// Processes the receiver's per-bit choice commitments `T_k` and
    /// returns the encrypted `(E0, E1)` pairs plus this sender's
    /// accumulated additive share `-sum(r_k) mod p`.
    pub fn process_choices(&self, t_values: &[BigUint]) -> (Vec<(Fp, Fp)>, Fp) {
        assert_eq!(t_values.len(), GILBOA_BITS, "one T_k per bit");
        let a_inv = self.group.inv(&self.dh_public);
        let mut pairs = Vec::with_capacity(GILBOA_BITS);
        let mut sender_share = Fp::zero();

        for (k, t_k) in t_values.iter().enumerate() {
            let r_k = self.r_values[k];
            let x_shifted = self.x.mul(&shift_factor(k));
            let m0 = r_k;
            let m1 = r_k.add(&x_shifted);

            let dh0 = self.group.pow(t_k, &self.dh_secret);
            let dh1 = self
                .group
                .pow(&self.group.mul(t_k, &a_inv), &self.dh_secret);
            let k0 = ot_key(&self.group, &dh0, k as u32, 0);
            let k1 = ot_key(&self.group, &dh1, k as u32, 1);

            pairs.push((m0.add(&k0), m1.add(&k1)));
            sender_share = sender_share.sub(&r_k);
        }

        (pairs, sender_share)
    }
}

/// `2^k mod p` computed via repeated squaring over [`Fp`]; `shift_factor(0)
/// == 1`. `x_shifted = x * 2^k` is computed as `x * shift_factor(k)` to
/// avoid overflowing a native integer for `k` beyond 63.
fn shift_factor(k: usize) -> Fp {
    Fp::from_u64(2).pow_u64(k as u64)
}

impl GilboaReceiverSetup {
    /// Decomposes `y` into bits and draws per-bit DH scalars.
    pub fn new<R: RngCore + CryptoRng>(y: Fp, group: DhGroup, rng: &mut R) -> Self {
        let bits = (0..GILBOA_BITS).map(|k| y.bit(k)).collect();
        let r_scalars = (0..GILBOA_BITS).map(|_| group.rand_scalar(rng)).collect();
        Self {
            bits,
            r_scalars,
            group,
        }
    }

    /// Builds the per-bit choice commitments `T_k = g^{r'_k}` (bit 0) or
    /// `A * g^{r'_k}` (bit 1), to be sent to the sender.
    pub fn generate_choices(&self, sender_pk: &BigUint) -> Vec<BigUint> {
        self.bits
            .iter()
            .zip(self.r_scalars.iter())
            .map(|(&bit, r)| {
                let g_r = self.group.pow_gen(r);
                if bit {
                    self.group.mul(sender_pk, &g_r)
                } else {
                    g_r
                }
            })
            .collect()
    }

    /// Decrypts the selected ciphertext from each `(E0, E1)` pair using the
    /// sender's public key, returning the receiver's additive share.
    pub fn decrypt_transfers(&self, sender_pk: &BigUint, pairs: &[(Fp, Fp)]) -> Fp {
        assert_eq!(pairs.len(), GILBOA_BITS);
        let mut receiver_share = Fp::zero();
        for (k, (e0, e1)) in pairs.iter().enumerate() {
            let dh_result = self.group.pow(sender_pk, &self.r_scalars[k]);
            let bit = self.bits[k];
            let key = ot_key(&self.group, &dh_result, k as u32, u8::from(bit));
            let selected = if bit { e1 } else { e0 };
            receiver_share = receiver_share.add(&selected.sub(&key));
        }
        receiver_share
    }
}

/// One additive-share result of a Gilboa multiplication.
#[derive(Debug, Clone, Copy)]
pub struct GilboaShares {
    /// The sender's additive share.
    pub sender_share: Fp,
    /// The receiver's additive share.
    pub receiver_share: Fp,
}

/// Runs both halves of a Gilboa multiplication locally in one call, with no
/// DH exponentiation round-trip. Used only for single-process simulation
/// and tests - the network coordinator always drives
/// [`GilboaSenderSetup`]/[`GilboaReceiverSetup`] across an HTTP round-trip
/// instead.
pub fn gilboa_multiply_local<R: RngCore + CryptoRng>(x: Fp, y: Fp, rng: &mut R) -> GilboaShares {
    let mut sender_sum = Fp::zero();
    let mut receiver_sum = Fp::zero();
    for k in 0..GILBOA_BITS {
        let bit = y.bit(k);
        let x_shifted = x.mul(&shift_factor(k));
        let r_k = Fp::random(rng);
        let m0 = r_k;
        let m1 = r_k.add(&x_shifted);
        let selected = if bit { m1 } else { m0 };
        sender_sum = sender_sum.sub(&r_k);
        receiver_sum = receiver_sum.add(&selected);
    }
    GilboaShares {
        sender_share: sender_sum,
        receiver_share: receiver_sum,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dh::dh_group_test;
    use rand::thread_rng;

    #[test]
    fn local_simulation_is_correct() {
        let mut rng = thread_rng();
        for _ in 0..20 {
            let x = Fp::random(&mut rng);
            let y = Fp::random(&mut rng);
            let shares = gilboa_multiply_local(x, y, &mut rng);
            assert_eq!(shares.sender_share.add(&shares.receiver_share), x.mul(&y));
        }
    }

    #[test]
    fn networked_protocol_is_correct() {
        let mut rng = thread_rng();
        let group = dh_group_test();
        let x = Fp::from_u64(17);
        let y = Fp::from_u64(29);

        let sender = GilboaSenderSetup::new(x, group.clone(), &mut rng);
        let receiver = GilboaReceiverSetup::new(y, group, &mut rng);

        let choices = receiver.generate_choices(sender.dh_public());
        let (pairs, sender_share) = sender.process_choices(&choices);
        let receiver_share = receiver.decrypt_transfers(sender.dh_public(), &pairs);

        assert_eq!(sender_share.add(&receiver_share), x.mul(&y));
    }
}
