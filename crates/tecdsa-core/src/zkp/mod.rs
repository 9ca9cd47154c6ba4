//! Zero-knowledge range proofs binding Paillier ciphertexts to curve values
//!
//! All three proofs follow the same Fiat-Shamir shape: the prover commits to
//! masked witnesses in the Paillier group, in the curve group and in an
//! auxiliary RSA group `Z*_Ñ` (where `h1`, `h2` act as a Fujisaki-Okamoto
//! commitment), derives the challenge `e` from a transcript, and answers with
//! `s = e * witness + mask`. Range soundness comes from checking that the
//! integer responses stay below `q^3` (or `q^8` for the signature mask).

mod key_range;
mod secret_key_factor;
mod signature_factor;

pub use key_range::KeyShareRangeProof;
pub use secret_key_factor::SecretKeyFactorRangeProof;
pub use signature_factor::SignatureFactorRangeProof;

use k256::ProjectivePoint;
use merlin::Transcript;
use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::arith::{generate_prime, random_below, random_unit};
use crate::curve::{point_to_bytes, Curve};
use crate::paillier::{self, Ciphertext};
use crate::Result;

const TRANSCRIPT_LABEL: &[u8] = b"tecdsa v0.1.0 range proof";

/// Public parameters shared by every prover and verifier in the group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZkpPublicParameters {
    curve: Curve,
    paillier: paillier::PublicKey,
    n_tilde: BigUint,
    h1: BigUint,
    h2: BigUint,
}

impl ZkpPublicParameters {
    /// Generate a fresh auxiliary RSA modulus of `n_tilde_bits` bits.
    pub fn generate(
        rng: &mut impl CryptoRngCore,
        curve: Curve,
        paillier: paillier::PublicKey,
        n_tilde_bits: u64,
    ) -> Result<Self> {
        debug!(n_tilde_bits, "generating zero-knowledge proof parameters");

        loop {
            let p = generate_prime(rng, n_tilde_bits / 2)?;
            let q = generate_prime(rng, n_tilde_bits - n_tilde_bits / 2)?;
            if p != q {
                return Self::from_primes(rng, curve, paillier, &p, &q);
            }
        }
    }

    /// Build parameters over `Ñ = p * q` for the given primes.
    pub fn from_primes(
        rng: &mut impl CryptoRngCore,
        curve: Curve,
        paillier: paillier::PublicKey,
        p: &BigUint,
        q: &BigUint,
    ) -> Result<Self> {
        let n_tilde = p * q;

        // h2 generates (a large subgroup of) the quadratic residues, h1 lies
        // in the subgroup generated by h2
        let h2 = loop {
            let root = random_unit(rng, &n_tilde)?;
            let h2 = root.modpow(&BigUint::from(2u8), &n_tilde);
            if !h2.is_one() {
                break h2;
            }
        };
        let h1 = loop {
            let exponent = random_below(rng, &n_tilde)?;
            let h1 = h2.modpow(&exponent, &n_tilde);
            if !h1.is_one() {
                break h1;
            }
        };

        Ok(Self {
            curve,
            paillier,
            n_tilde,
            h1,
            h2,
        })
    }

    pub fn curve(&self) -> Curve {
        self.curve
    }

    pub fn paillier(&self) -> &paillier::PublicKey {
        &self.paillier
    }

    pub fn n_tilde(&self) -> &BigUint {
        &self.n_tilde
    }

    fn q(&self) -> BigUint {
        self.curve.order()
    }

    fn q_pow(&self, exponent: u32) -> BigUint {
        self.q().pow(exponent)
    }

    /// `h1^a * h2^b mod Ñ`
    fn ring_commit(&self, a: &BigUint, b: &BigUint) -> BigUint {
        self.h1.modpow(a, &self.n_tilde) * self.h2.modpow(b, &self.n_tilde) % &self.n_tilde
    }

    fn in_ring(&self, x: &BigUint) -> bool {
        !x.is_zero() && x < &self.n_tilde
    }

    fn in_paillier_group(&self, x: &BigUint) -> bool {
        !x.is_zero() && x < self.paillier.n_square()
    }

    fn in_paillier_units(&self, x: &BigUint) -> bool {
        !x.is_zero() && x < self.paillier.n()
    }

    fn sample_unit(&self, rng: &mut impl CryptoRngCore) -> Result<BigUint> {
        random_unit(rng, self.paillier.n())
    }

    fn sample_below_q_pow(&self, rng: &mut impl CryptoRngCore, exponent: u32) -> Result<BigUint> {
        random_below(rng, &self.q_pow(exponent))
    }

    /// Uniform integer in `[0, q^exponent * Ñ)`.
    fn sample_ring_mask(&self, rng: &mut impl CryptoRngCore, exponent: u32) -> Result<BigUint> {
        random_below(rng, &(self.q_pow(exponent) * &self.n_tilde))
    }
}

/// Fiat-Shamir transcript bound to the group's public parameters
pub(crate) struct ChallengeTranscript(Transcript);

impl ChallengeTranscript {
    pub(crate) fn new(proof_label: &'static [u8], params: &ZkpPublicParameters) -> Self {
        let mut transcript = Transcript::new(TRANSCRIPT_LABEL);
        transcript.append_message(b"proof", proof_label);
        transcript.append_message(b"N", &params.paillier.n().to_bytes_be());
        transcript.append_message(b"N-tilde", &params.n_tilde.to_bytes_be());
        transcript.append_message(b"h1", &params.h1.to_bytes_be());
        transcript.append_message(b"h2", &params.h2.to_bytes_be());
        Self(transcript)
    }

    pub(crate) fn append_int(&mut self, label: &'static [u8], value: &BigUint) {
        self.0.append_message(label, &value.to_bytes_be());
    }

    pub(crate) fn append_ciphertext(&mut self, label: &'static [u8], value: &Ciphertext) {
        self.0.append_message(label, &value.to_bytes());
    }

    pub(crate) fn append_point(&mut self, label: &'static [u8], point: &ProjectivePoint) {
        self.0.append_message(label, &point_to_bytes(point));
    }

    /// Challenge `e` in `Z_q`, reduced from 512 bits to keep the bias negligible.
    pub(crate) fn challenge(mut self, q: &BigUint) -> BigUint {
        let mut buf = [0u8; 64];
        self.0.challenge_bytes(b"challenge", &mut buf);
        BigUint::from_bytes_be(&buf) % q
    }
}
