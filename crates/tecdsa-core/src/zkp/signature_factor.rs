//! Proof for the third signing round.
//!
//! Statement: `r_i = g^k` and `w_i = u^k * E(c * q; r)` where `u = E(rho)` is
//! the combined secret key factor. `k` is bounded by `q^3`, the mask `c` by
//! `q^8`.

use k256::ProjectivePoint;
use num_bigint::BigUint;
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};

use super::{ChallengeTranscript, ZkpPublicParameters};
use crate::curve::point_serde;
use crate::paillier::Ciphertext;
use crate::Result;

const PROOF_LABEL: &[u8] = b"signature factor range proof";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureFactorRangeProof {
    z1: BigUint,
    z2: BigUint,
    #[serde(with = "point_serde")]
    u1: ProjectivePoint,
    u2: BigUint,
    u3: BigUint,
    v: BigUint,
    s1: BigUint,
    s2: BigUint,
    s3: BigUint,
    t1: BigUint,
    t2: BigUint,
}

struct Commitments<'a> {
    z1: &'a BigUint,
    z2: &'a BigUint,
    u1: &'a ProjectivePoint,
    u2: &'a BigUint,
    u3: &'a BigUint,
    v: &'a BigUint,
}

fn challenge(
    params: &ZkpPublicParameters,
    public_share: &ProjectivePoint,
    unmask_share: &Ciphertext,
    secret_key_factor: &Ciphertext,
    commitments: Commitments<'_>,
) -> BigUint {
    let mut transcript = ChallengeTranscript::new(PROOF_LABEL, params);
    transcript.append_ciphertext(b"u", secret_key_factor);
    transcript.append_point(b"r", public_share);
    transcript.append_ciphertext(b"w", unmask_share);
    transcript.append_int(b"z1", commitments.z1);
    transcript.append_int(b"z2", commitments.z2);
    transcript.append_point(b"u1", commitments.u1);
    transcript.append_int(b"u2", commitments.u2);
    transcript.append_int(b"u3", commitments.u3);
    transcript.append_int(b"v", commitments.v);
    transcript.challenge(&params.q())
}

impl SignatureFactorRangeProof {
    /// Prove that `public_share = g^secret_share` and
    /// `unmask_share = secret_key_factor^secret_share * E(mask_share * q; randomness)`.
    #[allow(clippy::too_many_arguments)]
    pub fn prove(
        rng: &mut impl CryptoRngCore,
        public_share: &ProjectivePoint,
        unmask_share: &Ciphertext,
        secret_key_factor: &Ciphertext,
        secret_share: &BigUint,
        mask_share: &BigUint,
        randomness: &BigUint,
        params: &ZkpPublicParameters,
    ) -> Result<Self> {
        let paillier = params.paillier();
        let (n, n_square) = (paillier.n(), paillier.n_square());
        let q = params.q();

        let alpha = params.sample_below_q_pow(rng, 3)?;
        let beta = params.sample_below_q_pow(rng, 8)?;
        let mu = params.sample_unit(rng)?;
        let rho1 = params.sample_ring_mask(rng, 1)?;
        let rho2 = params.sample_ring_mask(rng, 6)?;
        let gamma = params.sample_ring_mask(rng, 3)?;
        let delta = params.sample_ring_mask(rng, 8)?;

        let z1 = params.ring_commit(secret_share, &rho1);
        let z2 = params.ring_commit(mask_share, &rho2);
        let u1 = params.curve().scalar_base_mult(&alpha);
        let u2 = params.ring_commit(&alpha, &gamma);
        let u3 = params.ring_commit(&beta, &delta);
        let v = secret_key_factor.as_biguint().modpow(&alpha, n_square)
            * paillier.gamma_pow(&(&q * &beta))
            % n_square
            * mu.modpow(n, n_square)
            % n_square;

        let e = challenge(
            params,
            public_share,
            unmask_share,
            secret_key_factor,
            Commitments {
                z1: &z1,
                z2: &z2,
                u1: &u1,
                u2: &u2,
                u3: &u3,
                v: &v,
            },
        );

        let s1 = &e * secret_share + alpha;
        let s2 = &e * rho1 + gamma;
        let s3 = randomness.modpow(&e, n) * mu % n;
        let t1 = &e * mask_share + beta;
        let t2 = &e * rho2 + delta;

        Ok(Self {
            z1,
            z2,
            u1,
            u2,
            u3,
            v,
            s1,
            s2,
            s3,
            t1,
            t2,
        })
    }

    #[must_use]
    pub fn verify(
        &self,
        public_share: &ProjectivePoint,
        unmask_share: &Ciphertext,
        secret_key_factor: &Ciphertext,
        params: &ZkpPublicParameters,
    ) -> bool {
        let paillier = params.paillier();
        let (n, n_square) = (paillier.n(), paillier.n_square());
        let n_tilde = params.n_tilde();
        let q = params.q();
        let u = secret_key_factor.as_biguint();
        let w = unmask_share.as_biguint();

        if self.s1 >= params.q_pow(3)
            || self.t1 >= params.q_pow(8)
            || !params.in_ring(&self.z1)
            || !params.in_ring(&self.z2)
            || !params.in_ring(&self.u2)
            || !params.in_ring(&self.u3)
            || !params.in_paillier_group(&self.v)
            || !params.in_paillier_units(&self.s3)
            || !params.in_paillier_group(u)
            || !params.in_paillier_group(w)
        {
            return false;
        }

        let e = challenge(
            params,
            public_share,
            unmask_share,
            secret_key_factor,
            Commitments {
                z1: &self.z1,
                z2: &self.z2,
                u1: &self.u1,
                u2: &self.u2,
                u3: &self.u3,
                v: &self.v,
            },
        );

        // g^s1 = u1 * r_i^e
        let curve = params.curve();
        if curve.scalar_base_mult(&self.s1) != self.u1 + curve.scalar_mult(public_share, &e) {
            return false;
        }

        // h1^s1 * h2^s2 = u2 * z1^e  mod Ñ
        if params.ring_commit(&self.s1, &self.s2) != &self.u2 * self.z1.modpow(&e, n_tilde) % n_tilde
        {
            return false;
        }

        // h1^t1 * h2^t2 = u3 * z2^e  mod Ñ
        if params.ring_commit(&self.t1, &self.t2) != &self.u3 * self.z2.modpow(&e, n_tilde) % n_tilde
        {
            return false;
        }

        // u^s1 * Γ^(q * t1) * s3^N = v * w^e  mod N^2
        let lhs = u.modpow(&self.s1, n_square) * paillier.gamma_pow(&(&q * &self.t1)) % n_square
            * self.s3.modpow(n, n_square)
            % n_square;
        let rhs = &self.v * w.modpow(&e, n_square) % n_square;
        lhs == rhs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arith::random_below;
    use crate::fixtures;
    use rand_core::OsRng;

    #[test]
    fn test_valid_proof_verifies_and_binds_public_share() {
        let params = fixtures::zkp_parameters();
        let paillier = params.paillier();
        let q = params.q();

        let factor = random_below(&mut OsRng, &q).unwrap();
        let (secret_key_factor, _) = paillier.encrypt(&mut OsRng, &factor).unwrap();

        let k = random_below(&mut OsRng, &q).unwrap();
        let c = random_below(&mut OsRng, &q.pow(6)).unwrap();
        let public_share = params.curve().scalar_base_mult(&k);
        let (masked, r) = paillier.encrypt(&mut OsRng, &(&c * &q)).unwrap();
        let unmask_share = paillier.add(&paillier.mul(&secret_key_factor, &k), &masked);

        let proof = SignatureFactorRangeProof::prove(
            &mut OsRng,
            &public_share,
            &unmask_share,
            &secret_key_factor,
            &k,
            &c,
            &r,
            &params,
        )
        .unwrap();
        assert!(proof.verify(&public_share, &unmask_share, &secret_key_factor, &params));

        let other_share = params.curve().scalar_base_mult(&(&k + 1u32));
        assert!(!proof.verify(&other_share, &unmask_share, &secret_key_factor, &params));
    }
}
