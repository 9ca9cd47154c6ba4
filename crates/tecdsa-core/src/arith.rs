//! Big integer helpers shared by the homomorphic cryptosystem and the proofs
//!
//! Sampling functions draw bytes through `try_fill_bytes` so a failing
//! entropy source surfaces as [`Error::Randomness`] instead of a panic.
//! Prime generation is delegated to `glass_pumpkin`.

use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand_core::CryptoRngCore;
use zeroize::Zeroize;

use crate::{Error, Result};

/// Uniform integer in `[0, bound)` by rejection sampling.
pub fn random_below(rng: &mut impl CryptoRngCore, bound: &BigUint) -> Result<BigUint> {
    if bound.is_zero() {
        return Err(Error::Internal("cannot sample below zero".into()));
    }

    let bits = bound.bits();
    let len = ((bits + 7) / 8) as usize;
    let excess = (len as u64 * 8 - bits) as u32;
    let mut buf = vec![0u8; len];

    loop {
        rng.try_fill_bytes(&mut buf)?;
        buf[0] &= 0xff >> excess;

        let candidate = BigUint::from_bytes_be(&buf);
        if &candidate < bound {
            buf.zeroize();
            return Ok(candidate);
        }
    }
}

/// Uniform element of the multiplicative group `Z*_n`.
pub fn random_unit(rng: &mut impl CryptoRngCore, n: &BigUint) -> Result<BigUint> {
    loop {
        let candidate = random_below(rng, n)?;
        if !candidate.is_zero() && candidate.gcd(n).is_one() {
            return Ok(candidate);
        }
    }
}

/// `base^exponent mod modulus` for a possibly negative exponent.
pub fn mod_pow_signed(base: &BigUint, exponent: &BigInt, modulus: &BigUint) -> Option<BigUint> {
    let magnitude = exponent.magnitude();
    if exponent.sign() == num_bigint::Sign::Minus {
        let inverse = base.modinv(modulus)?;
        Some(inverse.modpow(magnitude, modulus))
    } else {
        Some(base.modpow(magnitude, modulus))
    }
}

/// Random probable prime with exactly `bits` bits.
///
/// Candidates come from `glass_pumpkin`, which sieves and runs Miller-Rabin
/// plus a Lucas test.
pub fn generate_prime(rng: &mut impl CryptoRngCore, bits: u64) -> Result<BigUint> {
    if bits < 16 {
        return Err(Error::InvalidConfig(format!(
            "prime bit length {} is too small",
            bits
        )));
    }

    loop {
        let candidate = glass_pumpkin::prime::from_rng(bits as usize, rng)
            .map_err(|e| Error::crypto("prime generation", format!("{:?}", e)))?;
        if candidate.bits() == bits {
            return Ok(candidate);
        }
    }
}

/// Big-endian bytes of an integer, left padded to `len` bytes.
pub fn to_fixed_bytes(value: &BigUint, len: usize) -> Vec<u8> {
    let bytes = value.to_bytes_be();
    if bytes.len() >= len {
        return bytes;
    }
    let mut out = vec![0u8; len - bytes.len()];
    out.extend_from_slice(&bytes);
    out
}
