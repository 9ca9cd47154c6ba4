//! Distributed Signature Generation (DSG) module
//!
//! Six broadcast rounds over the threshold key produced by key generation.
//! Each round consumes the previous round's signer state by value, so rounds
//! cannot be skipped or replayed; in particular one nonce `k` never signs two
//! digests:
//!
//! 1. commit to `u_i = E(rho_i)` and `v_i = rho_i * E(x)`
//! 2. reveal `u_i`, `v_i` with a range proof; combine into `u`, `v`
//! 3. commit to `r_i = g^k_i` and `w_i = k_i * u + E(c_i * q)`
//! 4. reveal `r_i`, `w_i` with a range proof; combine into `R`, `w`
//! 5. partially decrypt `w`; combine into `k * rho mod q`
//! 6. partially decrypt `(k * rho)^-1 * (m * u + r * v)`; combine into `s`

mod dsg;
mod messages;

pub use dsg::run_dsg;
pub use messages::*;

use k256::ecdsa::{self, signature::hazmat::PrehashVerifier, VerifyingKey};
use k256::ProjectivePoint;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::arith::to_fixed_bytes;
use crate::commitment::DecommitmentKey;
use crate::keygen::ThresholdDsaKey;
use crate::paillier::Ciphertext;
use crate::types::ParticipantCore;
use crate::{Error, Result, SignerId};

/// Group member holding the threshold key, ready to sign
#[derive(Debug, Clone)]
pub struct Signer {
    core: ParticipantCore,
    key: ThresholdDsaKey,
}

impl Signer {
    pub(crate) fn new(core: ParticipantCore, key: ThresholdDsaKey) -> Self {
        Self { core, key }
    }

    pub fn id(&self) -> &SignerId {
        self.core.id()
    }

    pub fn core(&self) -> &ParticipantCore {
        &self.core
    }

    pub fn threshold_key(&self) -> &ThresholdDsaKey {
        &self.key
    }

    pub fn public_key(&self) -> &ProjectivePoint {
        self.key.public_key()
    }
}

/// State after round 1: secret key factor share chosen and committed
pub struct Round1Signer {
    signer: Signer,
    /// rho_i
    secret_key_factor: BigUint,
    secret_key_factor_randomness: BigUint,
    /// u_i = E(rho_i)
    secret_key_factor_share: Ciphertext,
    /// v_i = E(rho_i * x)
    secret_key_multiple_share: Ciphertext,
    decommitment_key: DecommitmentKey,
}

/// State after round 2: secret key factor share revealed and proven
pub struct Round2Signer {
    round1: Round1Signer,
}

/// Homomorphic sums of every member's round 2 shares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedRound2 {
    /// u = E(rho)
    pub secret_key_factor: Ciphertext,
    /// v = E(rho * x)
    pub secret_key_multiple: Ciphertext,
}

/// State after round 3: signature factor share chosen and committed
pub struct Round3Signer {
    signer: Signer,
    combined: CombinedRound2,
    /// k_i
    signature_factor_secret_share: BigUint,
    /// c_i
    signature_factor_mask_share: BigUint,
    signature_unmask_randomness: BigUint,
    /// r_i = g^k_i
    signature_factor_public_share: ProjectivePoint,
    /// w_i = E(k_i * rho + c_i * q)
    signature_unmask_share: Ciphertext,
    decommitment_key: DecommitmentKey,
}

/// State after round 4: signature factor share revealed and proven
pub struct Round4Signer {
    round3: Round3Signer,
}

/// Sums of every member's round 4 shares
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedRound4 {
    /// w = E(k * rho + c * q)
    pub signature_unmask: Ciphertext,
    /// R = g^k
    pub signature_factor_public: ProjectivePoint,
    /// Members whose round 4 shares went into the sums
    pub senders: Vec<SignerId>,
}

/// State after round 5: everything needed to finish once the message is known
pub struct Round5Signer {
    signer: Signer,
    combined: CombinedRound2,
    /// r = R.x mod q
    signature_r: BigUint,
    senders: Vec<SignerId>,
}

/// State after round 6: the signature's partial decryption is published
pub struct Round6Signer {
    signer: Signer,
    signature_r: BigUint,
    senders: Vec<SignerId>,
}

/// ECDSA signature with `s` in the lower half of `[1, q)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    r: BigUint,
    s: BigUint,
}

impl Signature {
    /// Build a signature from raw `r` and `s`, normalizing `s` to its low form.
    pub fn new(r: BigUint, s: BigUint, q: &BigUint) -> Result<Self> {
        let zero = BigUint::from(0u8);
        if r == zero || &r >= q {
            return Err(Error::crypto("signature", "r is outside of [1, q)"));
        }
        if s == zero || &s >= q {
            return Err(Error::crypto("signature", "s is outside of [1, q)"));
        }

        Ok(Self {
            r,
            s: normalize_s(s, q),
        })
    }

    pub fn r(&self) -> &BigUint {
        &self.r
    }

    pub fn s(&self) -> &BigUint {
        &self.s
    }

    /// Fixed-size `r || s` encoding
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&to_fixed_bytes(&self.r, 32));
        bytes[32..].copy_from_slice(&to_fixed_bytes(&self.s, 32));
        bytes
    }

    /// Convert to a `k256` ECDSA signature
    pub fn to_ecdsa(&self) -> Result<ecdsa::Signature> {
        ecdsa::Signature::from_slice(&self.to_bytes())
            .map_err(|e| Error::crypto("signature", e))
    }

    /// Standard ECDSA verification of this signature over a message digest
    #[must_use]
    pub fn verify(&self, public_key: &ProjectivePoint, digest: &[u8]) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_affine(public_key.to_affine()) else {
            return false;
        };
        let Ok(signature) = self.to_ecdsa() else {
            return false;
        };
        verifying_key.verify_prehash(digest, &signature).is_ok()
    }
}

/// Replace `s` by `q - s` when it lies in the upper half of the range.
fn normalize_s(s: BigUint, q: &BigUint) -> BigUint {
    let half_order = q >> 1u32;
    if s > half_order {
        q - s
    } else {
        s
    }
}
