//! DKG message types

use k256::ProjectivePoint;
use serde::{Deserialize, Serialize};

use crate::commitment::{Commitment, DecommitmentKey};
use crate::curve::{point_serde, point_to_bytes};
use crate::paillier::Ciphertext;
use crate::types::Message;
use crate::zkp::{KeyShareRangeProof, ZkpPublicParameters};
use crate::SignerId;

/// Round 1 message: commitment to the public key share
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKeyShareCommitmentMessage {
    pub sender_id: SignerId,
    pub commitment: Commitment,
}

/// Round 2 message: the committed public key share, opened
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyShareRevealMessage {
    pub sender_id: SignerId,
    #[serde(with = "point_serde")]
    pub public_key_share: ProjectivePoint,
    pub decommitment_key: DecommitmentKey,
    /// Paillier encryption of the secret key share
    pub encrypted_secret_key_share: Ciphertext,
    pub proof: KeyShareRangeProof,
}

impl Message for PublicKeyShareCommitmentMessage {
    fn sender_id(&self) -> &SignerId {
        &self.sender_id
    }
}

impl Message for KeyShareRevealMessage {
    fn sender_id(&self) -> &SignerId {
        &self.sender_id
    }
}

impl KeyShareRevealMessage {
    /// Whether the revealed share opens `commitment` and the encrypted secret
    /// share is the discrete log of the public share.
    #[must_use]
    pub fn is_valid(&self, commitment: &Commitment, params: &ZkpPublicParameters) -> bool {
        commitment.verify(
            &self.decommitment_key,
            &[&point_to_bytes(&self.public_key_share)],
        ) && params
            .paillier()
            .is_valid_ciphertext(&self.encrypted_secret_key_share)
            && self.proof.verify(
                &self.public_key_share,
                &self.encrypted_secret_key_share,
                params,
            )
    }
}
