//! DSG message types

use k256::ProjectivePoint;
use serde::{Deserialize, Serialize};

use crate::commitment::{Commitment, DecommitmentKey};
use crate::curve::{point_serde, point_to_bytes};
use crate::paillier::{Ciphertext, PartialDecryption};
use crate::types::Message;
use crate::zkp::{SecretKeyFactorRangeProof, SignatureFactorRangeProof, ZkpPublicParameters};
use crate::SignerId;

/// Round 1 message: commitment to the secret key factor shares
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignRound1Message {
    pub sender_id: SignerId,
    pub commitment: Commitment,
}

/// Round 2 message: opened secret key factor shares with their proof
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignRound2Message {
    pub sender_id: SignerId,
    /// u_i = E(rho_i)
    pub secret_key_factor_share: Ciphertext,
    /// v_i = E(rho_i * x)
    pub secret_key_multiple_share: Ciphertext,
    pub decommitment_key: DecommitmentKey,
    pub proof: SecretKeyFactorRangeProof,
}

/// Round 3 message: commitment to the signature factor shares
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignRound3Message {
    pub sender_id: SignerId,
    pub commitment: Commitment,
}

/// Round 4 message: opened signature factor shares with their proof
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignRound4Message {
    pub sender_id: SignerId,
    /// r_i = g^k_i
    #[serde(with = "point_serde")]
    pub signature_factor_public_share: ProjectivePoint,
    /// w_i = E(k_i * rho + c_i * q)
    pub signature_unmask_share: Ciphertext,
    pub decommitment_key: DecommitmentKey,
    pub proof: SignatureFactorRangeProof,
}

/// Round 5 message: partial decryption of the combined signature unmask
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignRound5Message {
    pub sender_id: SignerId,
    pub signature_unmask_partial_decryption: PartialDecryption,
}

/// Round 6 message: partial decryption of the encrypted signature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignRound6Message {
    pub sender_id: SignerId,
    pub signature_partial_decryption: PartialDecryption,
}

macro_rules! impl_message {
    ($($message:ty),* $(,)?) => {
        $(
            impl Message for $message {
                fn sender_id(&self) -> &SignerId {
                    &self.sender_id
                }
            }
        )*
    };
}

impl_message!(
    SignRound1Message,
    SignRound2Message,
    SignRound3Message,
    SignRound4Message,
    SignRound5Message,
    SignRound6Message,
);

impl SignRound2Message {
    /// Whether the shares open `commitment` and `v_i` multiplies the
    /// encrypted secret key by the factor inside `u_i`.
    #[must_use]
    pub fn is_valid(
        &self,
        commitment: &Commitment,
        encrypted_secret_key: &Ciphertext,
        params: &ZkpPublicParameters,
    ) -> bool {
        let paillier = params.paillier();
        commitment.verify(
            &self.decommitment_key,
            &[
                &self.secret_key_factor_share.to_bytes(),
                &self.secret_key_multiple_share.to_bytes(),
            ],
        ) && paillier.is_valid_ciphertext(&self.secret_key_factor_share)
            && paillier.is_valid_ciphertext(&self.secret_key_multiple_share)
            && self.proof.verify(
                &self.secret_key_multiple_share,
                encrypted_secret_key,
                &self.secret_key_factor_share,
                params,
            )
    }
}

impl SignRound4Message {
    /// Whether the shares open `commitment` and `w_i` is built from the
    /// discrete log of `r_i` over the combined secret key factor.
    #[must_use]
    pub fn is_valid(
        &self,
        commitment: &Commitment,
        secret_key_factor: &Ciphertext,
        params: &ZkpPublicParameters,
    ) -> bool {
        commitment.verify(
            &self.decommitment_key,
            &[
                &point_to_bytes(&self.signature_factor_public_share),
                &self.signature_unmask_share.to_bytes(),
            ],
        ) && params
            .paillier()
            .is_valid_ciphertext(&self.signature_unmask_share)
            && self.proof.verify(
                &self.signature_factor_public_share,
                &self.signature_unmask_share,
                secret_key_factor,
                params,
            )
    }
}
