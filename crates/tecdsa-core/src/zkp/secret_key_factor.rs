//! Proof for the first signing round.
//!
//! Statement: `u = E(eta; r)` and `v = c^eta` where `c = E(x)` is the group's
//! encrypted secret key, i.e. `v` encrypts `eta * x`, with `eta` in range.

use num_bigint::BigUint;
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};

use super::{ChallengeTranscript, ZkpPublicParameters};
use crate::paillier::Ciphertext;
use crate::Result;

const PROOF_LABEL: &[u8] = b"secret key factor range proof";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretKeyFactorRangeProof {
    z: BigUint,
    u1: BigUint,
    u2: BigUint,
    u3: BigUint,
    s1: BigUint,
    s2: BigUint,
    s3: BigUint,
}

#[allow(clippy::too_many_arguments)]
fn challenge(
    params: &ZkpPublicParameters,
    secret_key_multiple: &Ciphertext,
    encrypted_secret_key: &Ciphertext,
    secret_key_factor: &Ciphertext,
    z: &BigUint,
    u1: &BigUint,
    u2: &BigUint,
    u3: &BigUint,
) -> BigUint {
    let mut transcript = ChallengeTranscript::new(PROOF_LABEL, params);
    transcript.append_ciphertext(b"c", encrypted_secret_key);
    transcript.append_ciphertext(b"u", secret_key_factor);
    transcript.append_ciphertext(b"v", secret_key_multiple);
    transcript.append_int(b"z", z);
    transcript.append_int(b"u1", u1);
    transcript.append_int(b"u2", u2);
    transcript.append_int(b"u3", u3);
    transcript.challenge(&params.q())
}

impl SecretKeyFactorRangeProof {
    /// Prove that `secret_key_factor = E(factor; randomness)` and
    /// `secret_key_multiple = encrypted_secret_key^factor`.
    pub fn prove(
        rng: &mut impl CryptoRngCore,
        secret_key_multiple: &Ciphertext,
        encrypted_secret_key: &Ciphertext,
        secret_key_factor: &Ciphertext,
        factor: &BigUint,
        randomness: &BigUint,
        params: &ZkpPublicParameters,
    ) -> Result<Self> {
        let paillier = params.paillier();
        let (n, n_square) = (paillier.n(), paillier.n_square());

        let alpha = params.sample_below_q_pow(rng, 3)?;
        let beta = params.sample_unit(rng)?;
        let rho = params.sample_ring_mask(rng, 1)?;
        let gamma = params.sample_ring_mask(rng, 3)?;

        let z = params.ring_commit(factor, &rho);
        let u1 = paillier.gamma_pow(&alpha) * beta.modpow(n, n_square) % n_square;
        let u2 = params.ring_commit(&alpha, &gamma);
        let u3 = encrypted_secret_key.as_biguint().modpow(&alpha, n_square);

        let e = challenge(
            params,
            secret_key_multiple,
            encrypted_secret_key,
            secret_key_factor,
            &z,
            &u1,
            &u2,
            &u3,
        );

        let s1 = randomness.modpow(&e, n) * beta % n;
        let s2 = &e * factor + alpha;
        let s3 = &e * rho + gamma;

        Ok(Self {
            z,
            u1,
            u2,
            u3,
            s1,
            s2,
            s3,
        })
    }

    #[must_use]
    pub fn verify(
        &self,
        secret_key_multiple: &Ciphertext,
        encrypted_secret_key: &Ciphertext,
        secret_key_factor: &Ciphertext,
        params: &ZkpPublicParameters,
    ) -> bool {
        let paillier = params.paillier();
        let (n, n_square) = (paillier.n(), paillier.n_square());
        let u = secret_key_factor.as_biguint();
        let v = secret_key_multiple.as_biguint();
        let c = encrypted_secret_key.as_biguint();

        if self.s2 >= params.q_pow(3)
            || !params.in_ring(&self.z)
            || !params.in_ring(&self.u2)
            || !params.in_paillier_group(&self.u1)
            || !params.in_paillier_group(&self.u3)
            || !params.in_paillier_units(&self.s1)
            || !params.in_paillier_group(u)
            || !params.in_paillier_group(v)
        {
            return false;
        }

        let e = challenge(
            params,
            secret_key_multiple,
            encrypted_secret_key,
            secret_key_factor,
            &self.z,
            &self.u1,
            &self.u2,
            &self.u3,
        );

        // Γ^s2 * s1^N = u1 * u^e  mod N^2
        let lhs = paillier.gamma_pow(&self.s2) * self.s1.modpow(n, n_square) % n_square;
        let rhs = &self.u1 * u.modpow(&e, n_square) % n_square;
        if lhs != rhs {
            return false;
        }

        // h1^s2 * h2^s3 = u2 * z^e  mod Ñ
        let lhs = params.ring_commit(&self.s2, &self.s3);
        let rhs = &self.u2 * self.z.modpow(&e, params.n_tilde()) % params.n_tilde();
        if lhs != rhs {
            return false;
        }

        // c^s2 = u3 * v^e  mod N^2
        let lhs = c.modpow(&self.s2, n_square);
        let rhs = &self.u3 * v.modpow(&e, n_square) % n_square;
        lhs == rhs
    }
}
