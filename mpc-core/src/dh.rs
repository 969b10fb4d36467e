//! Diffie-Hellman group plumbing and hash-based OT key derivation.
//!
//! The group is parameterised (prime, generator, byte-length) so that
//! production code runs against [`DH_GROUP_2048`] (RFC 3526 Group 14) while
//! unit tests swap in [`DH_GROUP_TEST`], a tiny safe-prime group cheap
//! enough to exponentiate thousands of times per test run.

use num_bigint::BigUint;
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};

use crate::field::{Fp, FIELD_BYTES};

/// A multiplicative Diffie-Hellman group `(prime, generator)`, with a fixed
/// encoding width used for hashing group elements into OT keys.
#[derive(Debug, Clone)]
pub struct DhGroup {
    /// The group's modulus.
    pub prime: BigUint,
    /// The group's generator.
    pub generator: BigUint,
    /// Fixed byte-length used to encode group elements before hashing,
    /// preventing a length side-channel on `dh_result_bytes`.
    pub byte_length: usize,
}

impl DhGroup {
    /// Draws a uniformly random exponent in `[1, prime - 1)`.
    pub fn rand_scalar<R: RngCore + CryptoRng>(&self, rng: &mut R) -> BigUint {
        let bound = &self.prime - BigUint::from(1u8);
        loop {
            let candidate = rand_below(rng, &bound);
            if candidate != BigUint::ZERO {
                return candidate;
            }
        }
    }

    /// `g^exp mod p`.
    pub fn pow_gen(&self, exp: &BigUint) -> BigUint {
        self.generator.modpow(exp, &self.prime)
    }

    /// `base^exp mod p`.
    pub fn pow(&self, base: &BigUint, exp: &BigUint) -> BigUint {
        base.modpow(exp, &self.prime)
    }

    /// Multiplicative inverse of `base` mod `prime`, via `base^(p-2)`.
    ///
    /// Valid because `prime` is prime for both groups this crate ships.
    pub fn inv(&self, base: &BigUint) -> BigUint {
        let exp = &self.prime - BigUint::from(2u8);
        base.modpow(&exp, &self.prime)
    }

    /// `a * b mod p`.
    pub fn mul(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a * b) % &self.prime
    }

    /// Encodes a group element as a fixed-width big-endian byte string.
    pub fn encode(&self, element: &BigUint) -> Vec<u8> {
        let raw = element.to_bytes_be();
        let mut out = vec![0u8; self.byte_length];
        let offset = self.byte_length.saturating_sub(raw.len());
        out[offset..].copy_from_slice(&raw[raw.len().saturating_sub(self.byte_length)..]);
        out
    }
}

fn rand_below<R: RngCore + CryptoRng>(rng: &mut R, bound: &BigUint) -> BigUint {
    let bits = bound.bits().max(1) as usize;
    let bytes = bits.div_ceil(8);
    loop {
        let mut buf = vec![0u8; bytes];
        rng.fill_bytes(&mut buf);
        let candidate = BigUint::from_bytes_be(&buf);
        if &candidate < bound {
            return candidate;
        }
    }
}

/// RFC 3526 Group 14: the 2048-bit MODP group, generator 2. Used for all
/// production OT instances.
pub fn dh_group_2048() -> DhGroup {
    // The canonical RFC 3526 Group 14 prime, reproduced verbatim.
    const GROUP14_HEX: &str = concat!(
        "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1",
        "29024E088A67CC74020BBEA63B139B22514A08798E3404DD",
        "EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245",
        "E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED",
        "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3D",
        "C2007CB8A163BF0598DA48361C55D39A69163FA8FD24CF5F",
        "83655D23DCA3AD961C62F356208552BB9ED529077096966D",
        "670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B",
        "E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9",
        "DE2BCBF6955817183995497CEA956AE515D2261898FA0510",
        "15728E5A8AACAA68FFFFFFFFFFFFFFFF",
    );
    DhGroup {
        prime: BigUint::parse_bytes(GROUP14_HEX.as_bytes(), 16)
            .expect("hardcoded RFC 3526 Group 14 prime is well-formed"),
        generator: BigUint::from(2u8),
        byte_length: 256,
    }
}

/// A tiny safe-prime group used only in unit tests, cheap enough to
/// exponentiate many thousands of times per test run.
pub fn dh_group_test() -> DhGroup {
    DhGroup {
        prime: BigUint::from(1223u32),
        generator: BigUint::from(2u8),
        byte_length: 2,
    }
}

/// Derives an OT key `K = SHA256(dh_result_bytes || bit_index:u32_be || choice:u8)`.
///
/// `dh_result_bytes` is encoded at `group.byte_length`, a fixed width, so
/// the hash input length never leaks which DH exponentiation produced it.
pub fn ot_key(group: &DhGroup, dh_result: &BigUint, bit_idx: u32, choice: u8) -> Fp {
    let mut hasher = Sha256::new();
    hasher.update(group.encode(dh_result));
    hasher.update(bit_idx.to_be_bytes());
    hasher.update([choice]);
    let digest = hasher.finalize();
    // SHA256 output is 32 bytes, matching FIELD_BYTES; reduce mod p.
    debug_assert_eq!(digest.len(), FIELD_BYTES);
    Fp::from_be_bytes_mod_order(&digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    #[test]
    fn test_group_exponentiation_is_consistent() {
        let group = dh_group_test();
        let mut rng = thread_rng();
        let a = group.rand_scalar(&mut rng);
        let b = group.rand_scalar(&mut rng);
        // (g^a)^b == (g^b)^a
        let ga = group.pow_gen(&a);
        let gb = group.pow_gen(&b);
        assert_eq!(group.pow(&ga, &b), group.pow(&gb, &a));
    }

    #[test]
    fn inverse_undoes_multiplication() {
        let group = dh_group_test();
        let mut rng = thread_rng();
        let a = group.rand_scalar(&mut rng);
        let ga = group.pow_gen(&a);
        let inv = group.inv(&ga);
        assert_eq!(group.mul(&ga, &inv), BigUint::from(1u8));
    }

    #[test]
    fn ot_key_is_deterministic_and_domain_separated() {
        let group = dh_group_test();
        let dh_result = BigUint::from(42u32);
        let k1 = ot_key(&group, &dh_result, 3, 0);
        let k2 = ot_key(&group, &dh_result, 3, 0);
        let k3 = ot_key(&group, &dh_result, 3, 1);
        assert_eq!(k1, k2);
        assert_ne!(k1, k3);
    }
}
