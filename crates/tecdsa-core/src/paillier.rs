//! Threshold Paillier cryptosystem
//!
//! Additively homomorphic encryption with `g = N + 1`:
//! `E(m; r) = (1 + mN) * r^N mod N^2`. Adding ciphertexts multiplies them,
//! multiplying by a constant raises the ciphertext to that power.
//!
//! The decryption exponent `d` (with `d = 0 mod lambda`, `d = 1 mod N`) is
//! shared by a dealer with a random polynomial of degree `threshold - 1` over
//! `Z_{N * lambda}`. A share holder `i` publishes `c^(Delta * s_i)` with
//! `Delta = total!`; any `threshold` of those combine through integer Lagrange
//! coefficients `Delta * l_i(0)` into `c^(Delta^2 * d) = 1 + Delta^2 * m * N`.

use std::collections::BTreeSet;

use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::arith::{generate_prime, mod_pow_signed, random_below, random_unit};
use crate::{Error, Result};

/// Paillier public key shared by the whole group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    n: BigUint,
    n_square: BigUint,
}

/// Paillier ciphertext, an element of `Z*_{N^2}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ciphertext(BigUint);

/// One group member's share of the Paillier decryption key
#[derive(Clone, Serialize, Deserialize)]
pub struct ThresholdPrivateKey {
    public_key: PublicKey,
    /// Number of shares needed to decrypt
    threshold: usize,
    /// Number of issued shares
    total: usize,
    /// Evaluation point of this share, in `1..=total`
    index: u32,
    share: BigUint,
}

/// Contribution of a single share holder towards decrypting a ciphertext
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialDecryption {
    pub index: u32,
    pub value: BigUint,
}

impl Ciphertext {
    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes_be()
    }
}

impl PublicKey {
    pub fn new(n: BigUint) -> Self {
        let n_square = &n * &n;
        Self { n, n_square }
    }

    pub fn n(&self) -> &BigUint {
        &self.n
    }

    pub fn n_square(&self) -> &BigUint {
        &self.n_square
    }

    /// `(N + 1)^m mod N^2`, computed as `1 + mN` without exponentiation.
    pub fn gamma_pow(&self, m: &BigUint) -> BigUint {
        (BigUint::one() + (m % &self.n) * &self.n) % &self.n_square
    }

    /// Fresh encryption randomness from `Z*_N`.
    pub fn random_randomizer(&self, rng: &mut impl CryptoRngCore) -> Result<BigUint> {
        random_unit(rng, &self.n)
    }

    /// Encrypt `plaintext` with caller-supplied randomness `r` from `Z*_N`.
    pub fn encrypt_with_randomness(&self, plaintext: &BigUint, r: &BigUint) -> Result<Ciphertext> {
        if plaintext >= &self.n {
            return Err(Error::crypto(
                "paillier encryption",
                "plaintext is outside of the plaintext space [0, N)",
            ));
        }
        if r.is_zero() || r >= &self.n {
            return Err(Error::crypto(
                "paillier encryption",
                "randomness is outside of Z*_N",
            ));
        }

        let c = self.gamma_pow(plaintext) * r.modpow(&self.n, &self.n_square) % &self.n_square;
        Ok(Ciphertext(c))
    }

    pub fn encrypt(
        &self,
        rng: &mut impl CryptoRngCore,
        plaintext: &BigUint,
    ) -> Result<(Ciphertext, BigUint)> {
        let r = self.random_randomizer(rng)?;
        let c = self.encrypt_with_randomness(plaintext, &r)?;
        Ok((c, r))
    }

    /// Homomorphic addition: `E(a) + E(b) = E(a + b)`.
    pub fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Ciphertext {
        Ciphertext(&a.0 * &b.0 % &self.n_square)
    }

    /// Homomorphic sum of any number of ciphertexts; `E(0; 1)` for none.
    pub fn sum<'a>(&self, ciphertexts: impl IntoIterator<Item = &'a Ciphertext>) -> Ciphertext {
        ciphertexts
            .into_iter()
            .fold(Ciphertext(BigUint::one()), |acc, c| self.add(&acc, c))
    }

    /// Homomorphic multiplication by a constant: `E(a) * k = E(a * k)`.
    pub fn mul(&self, c: &Ciphertext, k: &BigUint) -> Ciphertext {
        Ciphertext(c.0.modpow(k, &self.n_square))
    }

    /// Whether `c` can be a ciphertext under this key.
    pub fn is_valid_ciphertext(&self, c: &Ciphertext) -> bool {
        !c.0.is_zero() && c.0 < self.n_square && c.0.gcd(&self.n).is_one()
    }
}

impl std::fmt::Debug for ThresholdPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThresholdPrivateKey")
            .field("public_key", &self.public_key)
            .field("threshold", &self.threshold)
            .field("total", &self.total)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl ThresholdPrivateKey {
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// `Delta = total!`
    fn delta(&self) -> BigUint {
        (1..=self.total as u64).fold(BigUint::one(), |acc, i| acc * i)
    }

    /// This share's contribution `c^(Delta * s_i) mod N^2`.
    pub fn partial_decrypt(&self, c: &Ciphertext) -> PartialDecryption {
        let exponent = self.delta() * &self.share;
        PartialDecryption {
            index: self.index,
            value: c.0.modpow(&exponent, &self.public_key.n_square),
        }
    }

    /// Combine partial decryptions from at least `threshold` distinct share
    /// holders into the plaintext.
    pub fn combine_partial_decryptions(&self, partials: &[PartialDecryption]) -> Result<BigUint> {
        if partials.len() < self.threshold {
            return Err(Error::ThresholdNotMet {
                required: self.threshold,
                actual: partials.len(),
            });
        }

        let indices: BTreeSet<u32> = partials.iter().map(|p| p.index).collect();
        if indices.len() != partials.len() {
            return Err(Error::crypto(
                "threshold decryption",
                "partial decryptions from the same share holder",
            ));
        }
        if indices
            .iter()
            .any(|&i| i == 0 || i as usize > self.total)
        {
            return Err(Error::crypto(
                "threshold decryption",
                "partial decryption with an unknown share index",
            ));
        }

        let n = &self.public_key.n;
        let n_square = &self.public_key.n_square;
        let delta = self.delta();

        let mut combined = BigUint::one();
        for partial in partials {
            let coefficient = lagrange_coefficient(&delta, partial.index, &indices);
            let term = mod_pow_signed(&partial.value, &coefficient, n_square).ok_or_else(|| {
                Error::crypto("threshold decryption", "partial decryption is not invertible")
            })?;
            combined = combined * term % n_square;
        }

        // L(u) = (u - 1) / N
        if combined.is_zero() {
            return Err(Error::crypto(
                "threshold decryption",
                "combined value is not in Z*_{N^2}",
            ));
        }
        let l = (combined - 1u32) / n;
        let delta_square_inverse = (&delta * &delta).modinv(n).ok_or_else(|| {
            Error::crypto("threshold decryption", "Delta^2 is not invertible modulo N")
        })?;

        Ok(l * delta_square_inverse % n)
    }
}

/// Integer Lagrange coefficient `Delta * prod_{j != i} j / (j - i)` at zero.
fn lagrange_coefficient(delta: &BigUint, i: u32, indices: &BTreeSet<u32>) -> BigInt {
    let mut numerator = BigInt::from(delta.clone());
    let mut denominator = BigInt::one();
    for &j in indices.iter().filter(|&&j| j != i) {
        numerator *= i64::from(j);
        denominator *= i64::from(j) - i64::from(i);
    }
    // Delta contains every factor of the denominator, the division is exact
    numerator / denominator
}

/// Dealer-side generation of a `(threshold, total)` threshold Paillier key
/// with a modulus of `bits` bits.
pub fn generate_threshold_keys(
    rng: &mut impl CryptoRngCore,
    bits: u64,
    total: usize,
    threshold: usize,
) -> Result<Vec<ThresholdPrivateKey>> {
    debug!(bits, total, threshold, "generating threshold paillier key");

    loop {
        let p = generate_prime(rng, bits / 2)?;
        let q = generate_prime(rng, bits - bits / 2)?;
        if p == q || (&p * &q).bits() != bits {
            continue;
        }
        return threshold_keys_from_primes(rng, &p, &q, total, threshold);
    }
}

/// Dealer-side threshold key setup for a modulus `N = p * q`.
pub fn threshold_keys_from_primes(
    rng: &mut impl CryptoRngCore,
    p: &BigUint,
    q: &BigUint,
    total: usize,
    threshold: usize,
) -> Result<Vec<ThresholdPrivateKey>> {
    if threshold == 0 || threshold > total {
        return Err(Error::InvalidConfig(format!(
            "decryption threshold {} must be in [1, {}]",
            threshold, total
        )));
    }

    let n = p * q;
    let lambda = (p - 1u32).lcm(&(q - 1u32));
    let lambda_inverse = lambda.modinv(&n).ok_or_else(|| {
        Error::InvalidConfig("paillier primes give gcd(N, lambda) != 1".into())
    })?;

    // d = 0 mod lambda, d = 1 mod N
    let d = &lambda * lambda_inverse;
    let share_modulus = &n * &lambda;

    let mut coefficients = Vec::with_capacity(threshold);
    coefficients.push(d % &share_modulus);
    for _ in 1..threshold {
        coefficients.push(random_below(rng, &share_modulus)?);
    }

    let public_key = PublicKey::new(n);
    let keys = (1..=total as u32)
        .map(|index| {
            let x = BigUint::from(index);
            let share = coefficients
                .iter()
                .rev()
                .fold(BigUint::zero(), |acc, coefficient| {
                    (acc * &x + coefficient) % &share_modulus
                });

            ThresholdPrivateKey {
                public_key: public_key.clone(),
                threshold,
                total,
                index,
                share,
            }
        })
        .collect();

    Ok(keys)
}
