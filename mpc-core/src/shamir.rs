//! Shamir secret sharing over [`Fp`](crate::field::Fp).
//!
//! Shares are evaluated at small integer x-coordinates in `[1, 255]`; the
//! secret is always the polynomial's value at `x = 0`.

use rand::{CryptoRng, RngCore};

use crate::error::{CoreError, Result};
use crate::field::Fp;

/// One point `(x, f(x))` on a secret-sharing polynomial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Share {
    /// The x-coordinate; a validator's stable "address" within a session.
    pub x: u8,
    /// The polynomial's value at `x`.
    pub y: Fp,
}

impl Share {
    /// Builds a share from raw parts.
    pub fn new(x: u8, y: Fp) -> Self {
        Self { x, y }
    }
}

fn validate_x_coord(x: u8) -> Result<()> {
    if x == 0 {
        return Err(CoreError::InvalidInput(
            "x-coordinate 0 is reserved for the secret itself".into(),
        ));
    }
    Ok(())
}

/// Horner evaluation of `coeffs[0] + coeffs[1]*x + coeffs[2]*x^2 + ...` at `x`.
pub fn evaluate_poly(coeffs: &[Fp], x: Fp) -> Fp {
    let mut acc = Fp::zero();
    for c in coeffs.iter().rev() {
        acc = acc.mul(&x).add(c);
    }
    acc
}

/// Splits `secret` into `n` shares at x-coordinates `1..=n` using a random
/// degree-`(k-1)` polynomial with `f(0) = secret`.
pub fn split<R: RngCore + CryptoRng>(
    secret: Fp,
    n: usize,
    k: usize,
    rng: &mut R,
) -> Result<Vec<Share>> {
    let xs: Vec<u8> = (1..=n)
        .map(|i| u8::try_from(i).map_err(|_| CoreError::InvalidInput("n too large".into())))
        .collect::<Result<_>>()?;
    split_at_points(secret, &xs, k, rng)
}

/// Splits `secret` into shares at arbitrary x-coordinates.
pub fn split_at_points<R: RngCore + CryptoRng>(
    secret: Fp,
    xs: &[u8],
    k: usize,
    rng: &mut R,
) -> Result<Vec<Share>> {
    if k == 0 {
        return Err(CoreError::InvalidInput("threshold must be >= 1".into()));
    }
    for &x in xs {
        validate_x_coord(x)?;
    }
    check_no_duplicates(xs)?;

    let mut coeffs = Vec::with_capacity(k);
    coeffs.push(secret);
    for _ in 1..k {
        coeffs.push(Fp::random(rng));
    }

    Ok(xs
        .iter()
        .map(|&x| Share::new(x, evaluate_poly(&coeffs, Fp::from_u64(x as u64))))
        .collect())
}

fn check_no_duplicates(xs: &[u8]) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for &x in xs {
        if !seen.insert(x) {
            return Err(CoreError::DuplicateShare(x as u16));
        }
    }
    Ok(())
}

/// The Lagrange coefficient `L_i` for reconstruction at `x = 0`, for the
/// share at `xi` given the full set of x-coordinates `xs`.
///
/// `L_i = prod_{j != i} (-x_j) / (x_i - x_j)`.
pub fn single_lagrange_from_coeff(xi: u8, xs: &[u8]) -> Result<Fp> {
    let xi_f = Fp::from_u64(xi as u64);
    let mut num = Fp::one();
    let mut den = Fp::one();
    for &xj in xs {
        if xj == xi {
            continue;
        }
        let xj_f = Fp::from_u64(xj as u64);
        num = num.mul(&xj_f.neg());
        den = den.mul(&xi_f.sub(&xj_f));
    }
    Ok(num.mul(&den.inv()?))
}

/// Computes the Lagrange coefficient at `x = 0` for every x-coordinate in
/// `xs`, in the same order.
pub fn lagrange_from_coeff(xs: &[u8]) -> Result<Vec<Fp>> {
    xs.iter().map(|&xi| single_lagrange_from_coeff(xi, xs)).collect()
}

/// Reconstructs the secret `f(0)` from `shares` via Lagrange interpolation.
///
/// # Errors
/// [`CoreError::InsufficientShares`] if fewer than `k` shares are given;
/// [`CoreError::DuplicateShare`] if any two shares share an x-coordinate.
pub fn reconstruct(shares: &[Share], k: usize) -> Result<Fp> {
    if shares.len() < k {
        return Err(CoreError::InsufficientShares {
            needed: k,
            got: shares.len(),
        });
    }
    let xs: Vec<u8> = shares.iter().map(|s| s.x).collect();
    check_no_duplicates(&xs)?;
    let coeffs = lagrange_from_coeff(&xs)?;
    Ok(shares
        .iter()
        .zip(coeffs.iter())
        .fold(Fp::zero(), |acc, (s, l)| acc.add(&s.y.mul(l))))
}

/// Helpers used only by this crate's own property tests and by
/// integration tests elsewhere in the workspace. Never used by the
/// production MPC session or coordinator code paths.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use super::*;
    use rand::{CryptoRng, RngCore};

    /// Splits a fresh random secret into `n` shares at `1..=n` with
    /// threshold `k`, then reconstructs it from the first `k` shares,
    /// returning `(secret, shares, reconstructed)` for equality assertions.
    pub fn reconstruct_random_shares<R: RngCore + CryptoRng>(
        n: usize,
        k: usize,
        rng: &mut R,
    ) -> (Fp, Vec<Share>, Fp) {
        let secret = Fp::random(rng);
        let shares = split(secret, n, k, rng).expect("valid split parameters");
        let reconstructed = reconstruct(&shares[..k], k).expect("enough shares");
        (secret, shares, reconstructed)
    }

    /// Same as [`reconstruct_random_shares`] but at caller-supplied
    /// x-coordinates, exercising [`split_at_points`].
    pub fn reconstruct_random_pointshares<R: RngCore + CryptoRng>(
        xs: &[u8],
        k: usize,
        rng: &mut R,
    ) -> (Fp, Vec<Share>, Fp) {
        let secret = Fp::random(rng);
        let shares = split_at_points(secret, xs, k, rng).expect("valid split parameters");
        let reconstructed = reconstruct(&shares[..k], k).expect("enough shares");
        (secret, shares, reconstructed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    #[test]
    fn roundtrip_any_k_subset() {
        let mut rng = thread_rng();
        let secret = Fp::from_u64(12345);
        let shares = split(secret, 5, 3, &mut rng).unwrap();

        // any 3-subset reconstructs the same secret
        assert_eq!(reconstruct(&shares[0..3], 3).unwrap(), secret);
        assert_eq!(reconstruct(&shares[1..4], 3).unwrap(), secret);
        assert_eq!(reconstruct(&[shares[0], shares[2], shares[4]], 3).unwrap(), secret);
    }

    #[test]
    fn insufficient_shares_rejected() {
        let mut rng = thread_rng();
        let shares = split(Fp::from_u64(7), 3, 3, &mut rng).unwrap();
        assert!(matches!(
            reconstruct(&shares[0..2], 3),
            Err(CoreError::InsufficientShares { needed: 3, got: 2 })
        ));
    }

    #[test]
    fn duplicate_x_rejected() {
        let s1 = Share::new(1, Fp::from_u64(1));
        let s2 = Share::new(1, Fp::from_u64(2));
        assert!(matches!(
            reconstruct(&[s1, s2], 1),
            Err(CoreError::DuplicateShare(1))
        ));
    }

    #[test]
    fn split_at_arbitrary_points() {
        let mut rng = thread_rng();
        let xs = [3u8, 7, 42, 100];
        let secret = Fp::from_u64(99);
        let shares = split_at_points(secret, &xs, 2, &mut rng).unwrap();
        assert_eq!(reconstruct(&shares[0..2], 2).unwrap(), secret);
        assert_eq!(reconstruct(&shares[2..4], 2).unwrap(), secret);
    }
}
