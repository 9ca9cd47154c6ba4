//! DKG protocol implementation

use k256::ProjectivePoint;
use rand::rngs::OsRng;
use rand_core::CryptoRngCore;
use tracing::{debug, info, instrument};

use super::{
    CommittedLocalSigner, KeyShare, KeyShareRevealMessage, LocalSigner,
    PublicKeyShareCommitmentMessage, ThresholdDsaKey,
};
use crate::arith::random_below;
use crate::commitment;
use crate::curve::{point_to_bytes, scalar_from_biguint, scalar_to_biguint};
use crate::mpc::Relay;
use crate::sign::Signer;
use crate::validation::{pair_by_sender, verify_all};
use crate::zkp::KeyShareRangeProof;
use crate::{Result, SessionId};

const COMMITMENT_MESSAGE: &str = "public key share commitment message";
const REVEAL_MESSAGE: &str = "key share reveal message";

impl LocalSigner {
    /// Draw a secret key share uniformly from `[0, q)` together with its
    /// public share `g^x`.
    pub fn generate_key_share(&self, rng: &mut impl CryptoRngCore) -> Result<KeyShare> {
        let curve = self.core.group_parameters().curve();
        let secret = random_below(rng, &curve.order())?;
        let secret_share = scalar_from_biguint(&secret);

        Ok(KeyShare {
            secret_share,
            public_share: ProjectivePoint::GENERATOR * secret_share,
        })
    }

    /// First DKG round: generate a key share and commit to its public part.
    pub fn initialize_key_shares(
        self,
        rng: &mut impl CryptoRngCore,
    ) -> Result<(CommittedLocalSigner, PublicKeyShareCommitmentMessage)> {
        let key_share = self.generate_key_share(rng)?;
        let (commitment, decommitment_key) =
            commitment::generate(rng, &[&point_to_bytes(&key_share.public_share)])?;

        let message = PublicKeyShareCommitmentMessage {
            sender_id: self.core.id().clone(),
            commitment,
        };
        let signer = CommittedLocalSigner {
            core: self.core,
            key_share,
            decommitment_key,
        };

        Ok((signer, message))
    }
}

impl CommittedLocalSigner {
    /// Second DKG round: open the commitment and publish the encrypted secret
    /// share with its range proof.
    ///
    /// Call only after every member's commitment has been received.
    pub fn reveal_key_shares(&self, rng: &mut impl CryptoRngCore) -> Result<KeyShareRevealMessage> {
        let paillier = self.core.paillier_public_key();
        let secret = scalar_to_biguint(&self.key_share.secret_share);

        let (encrypted_secret_key_share, randomness) = paillier.encrypt(rng, &secret)?;
        let proof = KeyShareRangeProof::prove(
            rng,
            &secret,
            &self.key_share.public_share,
            &encrypted_secret_key_share,
            &randomness,
            self.core.zkp_parameters(),
        )?;

        Ok(KeyShareRevealMessage {
            sender_id: self.core.id().clone(),
            public_key_share: self.key_share.public_share,
            decommitment_key: self.decommitment_key,
            encrypted_secret_key_share,
            proof,
        })
    }

    /// Check every member's reveal against its commitment and combine the
    /// shares into the group key.
    ///
    /// Requires exactly one commitment and one reveal from each group member.
    pub fn combine_key_shares(
        &self,
        commitments: &[PublicKeyShareCommitmentMessage],
        reveals: &[KeyShareRevealMessage],
    ) -> Result<ThresholdDsaKey> {
        let group_size = self.core.group_parameters().group_size();
        let zkp_parameters = self.core.zkp_parameters();

        let pairs = pair_by_sender(
            COMMITMENT_MESSAGE,
            commitments,
            REVEAL_MESSAGE,
            reveals,
            group_size,
        )?;
        verify_all(REVEAL_MESSAGE, &pairs, |commitment, reveal| {
            reveal.is_valid(&commitment.commitment, zkp_parameters)
        })?;

        let encrypted_secret_key = self
            .core
            .paillier_public_key()
            .sum(reveals.iter().map(|r| &r.encrypted_secret_key_share));
        let public_key = reveals
            .iter()
            .fold(ProjectivePoint::IDENTITY, |acc, r| acc + r.public_key_share);

        debug!(signer_id = %self.core.id(), "Key shares combined");

        Ok(ThresholdDsaKey {
            encrypted_secret_key,
            public_key,
        })
    }

    /// Finish key generation, discarding the local key share.
    pub fn into_signer(self, key: ThresholdDsaKey) -> Signer {
        Signer::new(self.core, key)
    }
}

/// Run both DKG rounds over `relay`
///
/// Blocks on each round until every group member has broadcast its message.
///
/// # Returns
/// A signer holding the combined threshold key
#[instrument(skip_all, fields(signer_id = %signer.id()))]
pub async fn run_dkg<R: Relay>(
    signer: LocalSigner,
    session_id: &SessionId,
    relay: &R,
) -> Result<Signer> {
    let group_size = signer.core.group_parameters().group_size();
    info!(
        group_size,
        threshold = signer.core.group_parameters().threshold(),
        "Starting DKG"
    );

    debug!("DKG Round 1: Commitment");
    let (committed, commitment) = signer.initialize_key_shares(&mut OsRng)?;
    relay.broadcast(session_id, 1, &commitment).await?;
    let commitments = relay
        .collect_broadcasts::<PublicKeyShareCommitmentMessage>(session_id, 1, group_size)
        .await?;

    debug!("DKG Round 2: Reveal");
    let reveal = committed.reveal_key_shares(&mut OsRng)?;
    relay.broadcast(session_id, 2, &reveal).await?;
    let reveals = relay
        .collect_broadcasts::<KeyShareRevealMessage>(session_id, 2, group_size)
        .await?;

    let key = committed.combine_key_shares(&commitments, &reveals)?;

    info!(
        public_key = hex::encode(key.public_key_bytes()),
        "DKG completed successfully"
    );

    Ok(committed.into_signer(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::DecommitmentKey;
    use crate::curve::Curve;
    use crate::fixtures::{self, FailingRng};
    use crate::mpc::MemoryRelay;
    use crate::Error;
    use num_bigint::BigUint;
    use std::sync::Arc;

    struct Round {
        committed: Vec<CommittedLocalSigner>,
        commitments: Vec<PublicKeyShareCommitmentMessage>,
        reveals: Vec<KeyShareRevealMessage>,
    }

    fn run_rounds(group_size: usize, threshold: usize) -> Round {
        let (committed, commitments): (Vec<_>, Vec<_>) = fixtures::group(group_size, threshold)
            .into_iter()
            .map(|signer| signer.initialize_key_shares(&mut OsRng).unwrap())
            .unzip();
        let reveals = committed
            .iter()
            .map(|signer| signer.reveal_key_shares(&mut OsRng).unwrap())
            .collect();

        Round {
            committed,
            commitments,
            reveals,
        }
    }

    #[test]
    fn test_key_share_is_in_range() {
        let signer = fixtures::group(1, 1).remove(0);
        let share = signer.generate_key_share(&mut OsRng).unwrap();
        assert!(scalar_to_biguint(&share.secret_share) < Curve::Secp256k1.order());
        assert_eq!(
            *share.public_share(),
            ProjectivePoint::GENERATOR * share.secret_share
        );
    }

    #[test]
    fn test_key_share_needs_randomness() {
        let signer = fixtures::group(1, 1).remove(0);
        assert!(matches!(
            signer.generate_key_share(&mut FailingRng),
            Err(Error::Randomness(_))
        ));
    }

    #[test]
    fn test_combined_key_encrypts_sum_of_shares() {
        let round = run_rounds(3, 2);
        let keys: Vec<_> = round
            .committed
            .iter()
            .map(|s| s.combine_key_shares(&round.commitments, &round.reveals).unwrap())
            .collect();
        assert!(keys.iter().all(|k| k == &keys[0]));

        let q = Curve::Secp256k1.order();
        let expected_secret = round
            .committed
            .iter()
            .map(|s| scalar_to_biguint(&s.key_share.secret_share))
            .fold(BigUint::from(0u8), |acc, x| acc + x);

        let partials: Vec<_> = round
            .committed
            .iter()
            .map(|s| s.core.paillier_key().partial_decrypt(keys[0].encrypted_secret_key()))
            .collect();
        let decrypted = round.committed[0]
            .core
            .paillier_key()
            .combine_partial_decryptions(&partials)
            .unwrap();
        assert_eq!(&decrypted % &q, &expected_secret % &q);

        let expected_public = round
            .committed
            .iter()
            .fold(ProjectivePoint::IDENTITY, |acc, s| acc + s.key_share.public_share);
        assert_eq!(keys[0].public_key(), &expected_public);
    }

    #[test]
    fn test_combine_requires_every_member() {
        let round = run_rounds(3, 2);

        let err = round.committed[0]
            .combine_key_shares(&round.commitments[..2], &round.reveals)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::IncompleteGroup {
                expected: 3,
                actual: 2,
                ..
            }
        ));

        let err = round.committed[0]
            .combine_key_shares(&round.commitments, &round.reveals[1..])
            .unwrap_err();
        assert!(err.is_attendance_failure());
    }

    #[test]
    fn test_combine_rejects_wrong_decommitment() {
        let mut round = run_rounds(3, 2);
        round.reveals[1].decommitment_key = round.reveals[2].decommitment_key;
        let sender = round.reveals[1].sender_id.clone();

        let err = round.committed[0]
            .combine_key_shares(&round.commitments, &round.reveals)
            .unwrap_err();
        assert!(matches!(err, Error::MessageRejected { sender: ref s, .. } if *s == sender));
    }

    #[test]
    fn test_combine_rejects_substituted_share() {
        let mut round = run_rounds(3, 2);
        // a valid reveal of another member under this sender's commitment
        let mut substituted = round.reveals[2].clone();
        substituted.sender_id = round.reveals[1].sender_id.clone();
        round.reveals[1] = substituted;

        let err = round.committed[0]
            .combine_key_shares(&round.commitments, &round.reveals)
            .unwrap_err();
        assert!(err.is_validation_failure());
    }

    #[test]
    fn test_combine_rejects_mismatched_encrypted_share() {
        let mut round = run_rounds(3, 2);
        round.reveals[0].encrypted_secret_key_share =
            round.reveals[1].encrypted_secret_key_share.clone();

        let err = round.committed[1]
            .combine_key_shares(&round.commitments, &round.reveals)
            .unwrap_err();
        assert!(matches!(err, Error::MessageRejected { .. }));
    }

    #[test]
    fn test_combine_does_not_double_count_sender() {
        let mut round = run_rounds(3, 2);
        round.commitments[2] = round.commitments[0].clone();
        round.reveals[2] = round.reveals[0].clone();

        let err = round.committed[0]
            .combine_key_shares(&round.commitments, &round.reveals)
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateSender { .. }));
    }

    #[test]
    fn test_decommitment_key_is_fresh() {
        let round = run_rounds(2, 1);
        let keys: Vec<DecommitmentKey> = round.reveals.iter().map(|r| r.decommitment_key).collect();
        assert_ne!(keys[0], keys[1]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 3)]
    async fn test_run_dkg_over_memory_relay() {
        fixtures::init_tracing();
        let relay = Arc::new(MemoryRelay::new());
        let session_id = [7u8; 32];

        let handles: Vec<_> = fixtures::group(3, 2)
            .into_iter()
            .map(|signer| {
                let relay = Arc::clone(&relay);
                tokio::spawn(async move { run_dkg(signer, &session_id, relay.as_ref()).await })
            })
            .collect();

        let mut signers = Vec::new();
        for handle in handles {
            signers.push(handle.await.unwrap().unwrap());
        }

        let public_key = signers[0].public_key();
        assert!(signers.iter().all(|s| s.public_key() == public_key));
    }
}
