//! Modular arithmetic over the BN254 scalar prime.
//!
//! [`Fp`] is a thin newtype around the BN254 scalar field already used
//! elsewhere in this codebase's dependency stack (`ark-ff`/`ark-bn254`).
//! It is a *scalar*-field type: an integer mod a 254-bit prime. No curve
//! point, curve addition, or pairing ever appears behind this type - it is
//! used purely as a fast, constant-time-reduced big-integer-mod-p.

use ark_ff::{BigInteger, Field as _, PrimeField as _, UniformRand, Zero as _};
use rand::{CryptoRng, RngCore};
use std::fmt;

use crate::error::{CoreError, Result};

/// A field element in `[0, BN254_PRIME)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fp(ark_bn254::Fr);

/// Width, in bytes, of the fixed big-endian encoding used on the wire and
/// for OT key derivation. The BN254 scalar field is ~254 bits, so 32 bytes
/// is ample and leaves the top two bits always zero.
pub const FIELD_BYTES: usize = 32;

impl Fp {
    /// The additive identity.
    pub fn zero() -> Self {
        Self(ark_bn254::Fr::zero())
    }

    /// The multiplicative identity.
    pub fn one() -> Self {
        Self(ark_bn254::Fr::from(1u64))
    }

    /// Wraps a `u64` as a field element.
    pub fn from_u64(value: u64) -> Self {
        Self(ark_bn254::Fr::from(value))
    }

    /// Draws a uniformly random field element.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self(ark_bn254::Fr::rand(rng))
    }

    /// Draws a uniformly random *nonzero* field element.
    ///
    /// Used for the Beaver-triple random mask `r`, which must never be
    /// zero or the masking property in section 4.F collapses.
    pub fn random_nonzero<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        loop {
            let candidate = Self::random(rng);
            if !candidate.is_zero() {
                return candidate;
            }
        }
    }

    /// Returns `true` iff this element is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// `self + other mod p`.
    pub fn add(&self, other: &Fp) -> Fp {
        Fp(self.0 + other.0)
    }

    /// `self - other mod p`.
    pub fn sub(&self, other: &Fp) -> Fp {
        Fp(self.0 - other.0)
    }

    /// `-self mod p`.
    pub fn neg(&self) -> Fp {
        Fp(-self.0)
    }

    /// `self * other mod p`.
    pub fn mul(&self, other: &Fp) -> Fp {
        Fp(self.0 * other.0)
    }

    /// `self^exp mod p` for a `u64` exponent.
    pub fn pow_u64(&self, exp: u64) -> Fp {
        Fp(self.0.pow([exp]))
    }

    /// Modular inverse via Fermat's little theorem (`self^(p-2)`).
    ///
    /// # Errors
    /// Returns [`CoreError::FieldError`] if `self` is zero.
    pub fn inv(&self) -> Result<Fp> {
        self.0
            .inverse()
            .map(Fp)
            .ok_or_else(|| CoreError::FieldError("inverse of zero".into()))
    }

    /// Encodes this element as a fixed-width big-endian byte array.
    pub fn to_be_bytes(self) -> [u8; FIELD_BYTES] {
        let mut out = [0u8; FIELD_BYTES];
        let bytes = self.0.into_bigint().to_bytes_be();
        // `bytes` is already <= FIELD_BYTES for the BN254 scalar field, but
        // right-align defensively in case of a narrower leading encoding.
        let offset = FIELD_BYTES - bytes.len();
        out[offset..].copy_from_slice(&bytes);
        out
    }

    /// Decodes a fixed-width big-endian byte array, reducing mod p if the
    /// raw integer is out of range.
    pub fn from_be_bytes_mod_order(bytes: &[u8]) -> Fp {
        Fp(ark_bn254::Fr::from_be_bytes_mod_order(bytes))
    }

    /// Parses a `0x`-prefixed or bare lowercase hex string into a field
    /// element, reduced mod p.
    pub fn from_hex(s: &str) -> Result<Fp> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped)
            .map_err(|e| CoreError::InvalidInput(format!("bad hex field element: {e}")))?;
        Ok(Self::from_be_bytes_mod_order(&bytes))
    }

    /// Renders this element as a `0x`-prefixed lowercase hex string.
    pub fn to_hex(self) -> String {
        format!("0x{}", hex::encode(self.to_be_bytes()))
    }

    /// Returns the `k`-th least-significant bit (0-indexed) of this
    /// element's canonical big-endian representation, used by the Gilboa
    /// bit-decomposition loop.
    pub fn bit(&self, k: usize) -> bool {
        self.0.into_bigint().get_bit(k)
    }
}

impl fmt::Debug for Fp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fp({})", self.to_hex())
    }
}

impl serde::Serialize for Fp {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> serde::Deserialize<'de> for Fp {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Fp::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    #[test]
    fn inverse_roundtrips() {
        let mut rng = thread_rng();
        for _ in 0..50 {
            let x = Fp::random_nonzero(&mut rng);
            let inv = x.inv().unwrap();
            assert_eq!(x.mul(&inv), Fp::one());
        }
    }

    #[test]
    fn inverse_of_zero_errors() {
        assert!(Fp::zero().inv().is_err());
    }

    #[test]
    fn distributes_over_addition() {
        let mut rng = thread_rng();
        let a = Fp::random(&mut rng);
        let b = Fp::random(&mut rng);
        let c = Fp::random(&mut rng);
        assert_eq!(a.add(&b).mul(&c), a.mul(&c).add(&b.mul(&c)));
    }

    #[test]
    fn hex_roundtrip() {
        let mut rng = thread_rng();
        let x = Fp::random(&mut rng);
        assert_eq!(Fp::from_hex(&x.to_hex()).unwrap(), x);
    }

    #[test]
    fn bit_decomposition_matches_value() {
        let x = Fp::from_u64(0b1011);
        assert!(x.bit(0));
        assert!(x.bit(1));
        assert!(!x.bit(2));
        assert!(x.bit(3));
    }
}
