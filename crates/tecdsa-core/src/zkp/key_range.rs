//! Proof that a Paillier ciphertext encrypts the discrete log of a public key
//! share.
//!
//! Statement: `y = g^x` and `w = E(x; r)` with `x` in range. Published during
//! key generation so nobody contributes a secret share that does not match
//! its public share.

use k256::ProjectivePoint;
use num_bigint::BigUint;
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};

use super::{ChallengeTranscript, ZkpPublicParameters};
use crate::curve::point_serde;
use crate::paillier::Ciphertext;
use crate::Result;

const PROOF_LABEL: &[u8] = b"key share range proof";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyShareRangeProof {
    z: BigUint,
    #[serde(with = "point_serde")]
    u1: ProjectivePoint,
    u2: BigUint,
    u3: BigUint,
    s1: BigUint,
    s2: BigUint,
    s3: BigUint,
}

fn challenge(
    params: &ZkpPublicParameters,
    public_share: &ProjectivePoint,
    encrypted_share: &Ciphertext,
    z: &BigUint,
    u1: &ProjectivePoint,
    u2: &BigUint,
    u3: &BigUint,
) -> BigUint {
    let mut transcript = ChallengeTranscript::new(PROOF_LABEL, params);
    transcript.append_point(b"y", public_share);
    transcript.append_ciphertext(b"w", encrypted_share);
    transcript.append_int(b"z", z);
    transcript.append_point(b"u1", u1);
    transcript.append_int(b"u2", u2);
    transcript.append_int(b"u3", u3);
    transcript.challenge(&params.q())
}

impl KeyShareRangeProof {
    /// Prove knowledge of `secret_share` and `randomness` such that
    /// `public_share = g^secret_share` and
    /// `encrypted_share = E(secret_share; randomness)`.
    pub fn prove(
        rng: &mut impl CryptoRngCore,
        secret_share: &BigUint,
        public_share: &ProjectivePoint,
        encrypted_share: &Ciphertext,
        randomness: &BigUint,
        params: &ZkpPublicParameters,
    ) -> Result<Self> {
        let paillier = params.paillier();

        let alpha = params.sample_below_q_pow(rng, 3)?;
        let beta = params.sample_unit(rng)?;
        let rho = params.sample_ring_mask(rng, 1)?;
        let gamma = params.sample_ring_mask(rng, 3)?;

        let z = params.ring_commit(secret_share, &rho);
        let u1 = params.curve().scalar_base_mult(&alpha);
        let u2 = paillier.gamma_pow(&alpha) * beta.modpow(paillier.n(), paillier.n_square())
            % paillier.n_square();
        let u3 = params.ring_commit(&alpha, &gamma);

        let e = challenge(params, public_share, encrypted_share, &z, &u1, &u2, &u3);

        let s1 = &e * secret_share + alpha;
        let s2 = randomness.modpow(&e, paillier.n()) * beta % paillier.n();
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
        public_share: &ProjectivePoint,
        encrypted_share: &Ciphertext,
        params: &ZkpPublicParameters,
    ) -> bool {
        let paillier = params.paillier();
        let n_square = paillier.n_square();
        let w = encrypted_share.as_biguint();

        if self.s1 >= params.q_pow(3)
            || !params.in_ring(&self.z)
            || !params.in_ring(&self.u3)
            || !params.in_paillier_group(&self.u2)
            || !params.in_paillier_units(&self.s2)
            || !params.in_paillier_group(w)
        {
            return false;
        }

        let e = challenge(
            params,
            public_share,
            encrypted_share,
            &self.z,
            &self.u1,
            &self.u2,
            &self.u3,
        );

        // g^s1 = u1 * y^e
        let curve = params.curve();
        if curve.scalar_base_mult(&self.s1) != self.u1 + curve.scalar_mult(public_share, &e) {
            return false;
        }

        // Γ^s1 * s2^N = u2 * w^e  mod N^2
        let lhs = paillier.gamma_pow(&self.s1) * self.s2.modpow(paillier.n(), n_square) % n_square;
        let rhs = &self.u2 * w.modpow(&e, n_square) % n_square;
        if lhs != rhs {
            return false;
        }

        // h1^s1 * h2^s3 = u3 * z^e  mod Ñ
        let lhs = params.ring_commit(&self.s1, &self.s3);
        let rhs = &self.u3 * self.z.modpow(&e, params.n_tilde()) % params.n_tilde();
        lhs == rhs
    }
}
