//! DSG protocol implementation

use k256::ProjectivePoint;
use num_bigint::BigUint;
use num_traits::Zero;
use rand::rngs::OsRng;
use rand_core::CryptoRngCore;
use tracing::{debug, info, instrument, warn};

use super::{
    CombinedRound2, CombinedRound4, Round1Signer, Round2Signer, Round3Signer, Round4Signer,
    Round5Signer, Round6Signer, SignRound1Message, SignRound2Message, SignRound3Message, SignRound4Message,
    SignRound5Message, SignRound6Message, Signature, Signer,
};
use crate::arith::random_below;
use crate::commitment;
use crate::curve::{point_to_bytes, point_x};
use crate::mpc::Relay;
use crate::paillier::PartialDecryption;
use crate::types::{Message, ParticipantCore};
use crate::validation::{match_senders, pair_by_sender, verify_all};
use crate::zkp::{SecretKeyFactorRangeProof, SignatureFactorRangeProof};
use crate::{Error, Result, SessionId, SignerId};

const ROUND1_MESSAGE: &str = "round 1 message";
const ROUND2_MESSAGE: &str = "round 2 message";
const ROUND3_MESSAGE: &str = "round 3 message";
const ROUND4_MESSAGE: &str = "round 4 message";
const ROUND5_MESSAGE: &str = "round 5 message";
const ROUND6_MESSAGE: &str = "round 6 message";

/// Exponent of the upper bound `q^6` for the round 3 mask `c_i`.
///
/// The mask is drawn from `[0, q^6)` instead of `[-q^6, q^6)` because
/// Paillier plaintexts are non-negative.
pub const MASK_BOUND_EXPONENT: u32 = 6;

/// Length of the message digest accepted by round 6.
pub const MESSAGE_HASH_LENGTH: usize = 32;

impl Signer {
    /// Round 1: pick the secret key factor share `rho_i` and commit to
    /// `u_i = E(rho_i)` and `v_i = rho_i * E(x)`.
    pub fn sign_round1(
        &self,
        rng: &mut impl CryptoRngCore,
    ) -> Result<(Round1Signer, SignRound1Message)> {
        let paillier = self.core.paillier_public_key();
        let q = self.core.group_parameters().curve_cardinality();

        let secret_key_factor = random_below(rng, &q)?;
        let (secret_key_factor_share, secret_key_factor_randomness) =
            paillier.encrypt(rng, &secret_key_factor)?;
        let secret_key_multiple_share =
            paillier.mul(self.key.encrypted_secret_key(), &secret_key_factor);

        let (commitment, decommitment_key) = commitment::generate(
            rng,
            &[
                &secret_key_factor_share.to_bytes(),
                &secret_key_multiple_share.to_bytes(),
            ],
        )?;

        let message = SignRound1Message {
            sender_id: self.id().clone(),
            commitment,
        };
        let round1 = Round1Signer {
            signer: self.clone(),
            secret_key_factor,
            secret_key_factor_randomness,
            secret_key_factor_share,
            secret_key_multiple_share,
            decommitment_key,
        };

        debug!(signer_id = %self.id(), "Signing round 1 complete");
        Ok((round1, message))
    }
}

impl Round1Signer {
    /// Round 2: open the round 1 commitment and prove that `v_i` encrypts
    /// `rho_i * x` for the `rho_i` inside `u_i`.
    pub fn sign_round2(
        self,
        rng: &mut impl CryptoRngCore,
    ) -> Result<(Round2Signer, SignRound2Message)> {
        let proof = SecretKeyFactorRangeProof::prove(
            rng,
            &self.secret_key_multiple_share,
            self.signer.key.encrypted_secret_key(),
            &self.secret_key_factor_share,
            &self.secret_key_factor,
            &self.secret_key_factor_randomness,
            self.signer.core.zkp_parameters(),
        )?;

        let message = SignRound2Message {
            sender_id: self.signer.id().clone(),
            secret_key_factor_share: self.secret_key_factor_share.clone(),
            secret_key_multiple_share: self.secret_key_multiple_share.clone(),
            decommitment_key: self.decommitment_key,
            proof,
        };

        debug!(signer_id = %self.signer.id(), "Signing round 2 complete");
        Ok((Round2Signer { round1: self }, message))
    }
}

impl Round2Signer {
    /// Check every member's round 2 message against its round 1 commitment
    /// and sum the shares into `u = E(rho)` and `v = E(rho * x)`.
    pub fn combine_round2_messages(
        &self,
        round1_messages: &[SignRound1Message],
        round2_messages: &[SignRound2Message],
    ) -> Result<CombinedRound2> {
        let signer = &self.round1.signer;
        let zkp_parameters = signer.core.zkp_parameters();
        let encrypted_secret_key = signer.key.encrypted_secret_key();

        let pairs = pair_by_sender(
            ROUND1_MESSAGE,
            round1_messages,
            ROUND2_MESSAGE,
            round2_messages,
            signer.core.group_parameters().group_size(),
        )?;
        verify_all(ROUND2_MESSAGE, &pairs, |round1, round2| {
            round2.is_valid(&round1.commitment, encrypted_secret_key, zkp_parameters)
        })?;

        let paillier = signer.core.paillier_public_key();
        let combined = CombinedRound2 {
            secret_key_factor: paillier
                .sum(round2_messages.iter().map(|m| &m.secret_key_factor_share)),
            secret_key_multiple: paillier
                .sum(round2_messages.iter().map(|m| &m.secret_key_multiple_share)),
        };

        debug!(signer_id = %signer.id(), "Round 2 messages combined");
        Ok(combined)
    }

    /// Round 3: pick the signature factor share `k_i` and the mask `c_i`,
    /// then commit to `r_i = g^k_i` and `w_i = k_i * u + E(c_i * q)`.
    pub fn sign_round3(
        self,
        combined: CombinedRound2,
        rng: &mut impl CryptoRngCore,
    ) -> Result<(Round3Signer, SignRound3Message)> {
        let signer = self.round1.signer;
        let params = signer.core.group_parameters();
        let paillier = signer.core.paillier_public_key();
        let q = params.curve_cardinality();

        let signature_factor_secret_share = random_below(rng, &q)?;
        let signature_factor_public_share =
            params.curve().scalar_base_mult(&signature_factor_secret_share);

        let signature_factor_mask_share = random_below(rng, &q.pow(MASK_BOUND_EXPONENT))?;
        let (masked, signature_unmask_randomness) =
            paillier.encrypt(rng, &(&signature_factor_mask_share * &q))?;
        let signature_unmask_share = paillier.add(
            &paillier.mul(&combined.secret_key_factor, &signature_factor_secret_share),
            &masked,
        );

        let (commitment, decommitment_key) = commitment::generate(
            rng,
            &[
                &point_to_bytes(&signature_factor_public_share),
                &signature_unmask_share.to_bytes(),
            ],
        )?;

        let message = SignRound3Message {
            sender_id: signer.id().clone(),
            commitment,
        };

        debug!(signer_id = %signer.id(), "Signing round 3 complete");
        Ok((
            Round3Signer {
                signer,
                combined,
                signature_factor_secret_share,
                signature_factor_mask_share,
                signature_unmask_randomness,
                signature_factor_public_share,
                signature_unmask_share,
                decommitment_key,
            },
            message,
        ))
    }
}

impl Round3Signer {
    /// Round 4: open the round 3 commitment and prove that `w_i` was built
    /// from the discrete log of `r_i` and an in-range mask.
    pub fn sign_round4(
        self,
        rng: &mut impl CryptoRngCore,
    ) -> Result<(Round4Signer, SignRound4Message)> {
        let proof = SignatureFactorRangeProof::prove(
            rng,
            &self.signature_factor_public_share,
            &self.signature_unmask_share,
            &self.combined.secret_key_factor,
            &self.signature_factor_secret_share,
            &self.signature_factor_mask_share,
            &self.signature_unmask_randomness,
            self.signer.core.zkp_parameters(),
        )?;

        let message = SignRound4Message {
            sender_id: self.signer.id().clone(),
            signature_factor_public_share: self.signature_factor_public_share,
            signature_unmask_share: self.signature_unmask_share.clone(),
            decommitment_key: self.decommitment_key,
            proof,
        };

        debug!(signer_id = %self.signer.id(), "Signing round 4 complete");
        Ok((Round4Signer { round3: self }, message))
    }
}

impl Round4Signer {
    /// Check every member's round 4 message against its round 3 commitment
    /// and sum the shares into `w` and `R`.
    pub fn combine_round4_messages(
        &self,
        round3_messages: &[SignRound3Message],
        round4_messages: &[SignRound4Message],
    ) -> Result<CombinedRound4> {
        let signer = &self.round3.signer;
        let zkp_parameters = signer.core.zkp_parameters();
        let secret_key_factor = &self.round3.combined.secret_key_factor;

        let pairs = pair_by_sender(
            ROUND3_MESSAGE,
            round3_messages,
            ROUND4_MESSAGE,
            round4_messages,
            signer.core.group_parameters().group_size(),
        )?;
        verify_all(ROUND4_MESSAGE, &pairs, |round3, round4| {
            round4.is_valid(&round3.commitment, secret_key_factor, zkp_parameters)
        })?;

        let combined = CombinedRound4 {
            signature_unmask: signer
                .core
                .paillier_public_key()
                .sum(round4_messages.iter().map(|m| &m.signature_unmask_share)),
            signature_factor_public: round4_messages
                .iter()
                .fold(ProjectivePoint::IDENTITY, |acc, m| {
                    acc + m.signature_factor_public_share
                }),
            senders: pairs.iter().map(|(_, m)| m.sender_id.clone()).collect(),
        };

        debug!(signer_id = %signer.id(), "Round 4 messages combined");
        Ok(combined)
    }

    /// Round 5: derive `r = R.x mod q` and partially decrypt `w`.
    pub fn sign_round5(self, combined: CombinedRound4) -> Result<(Round5Signer, SignRound5Message)> {
        let round3 = self.round3;
        let signer = round3.signer;
        let q = signer.core.group_parameters().curve_cardinality();

        let signature_r = point_x(&combined.signature_factor_public)
            .map(|x| x % &q)
            .ok_or_else(|| Error::crypto("signing round 5", "R is the point at infinity"))?;
        if signature_r.is_zero() {
            return Err(Error::crypto("signing round 5", "r = R.x mod q is zero"));
        }

        let message = SignRound5Message {
            sender_id: signer.id().clone(),
            signature_unmask_partial_decryption: signer
                .core
                .paillier_key()
                .partial_decrypt(&combined.signature_unmask),
        };

        debug!(signer_id = %signer.id(), "Signing round 5 complete");
        Ok((
            Round5Signer {
                signer,
                combined: round3.combined,
                signature_r,
                senders: combined.senders,
            },
            message,
        ))
    }
}

impl Round5Signer {
    pub fn signature_r(&self) -> &BigUint {
        &self.signature_r
    }

    /// Threshold-decrypt `w`, giving `k * rho + c * q`.
    ///
    /// Needs one message from every member that took part in round 4.
    pub fn combine_round5_messages(&self, round5_messages: &[SignRound5Message]) -> Result<BigUint> {
        let partials = partial_decryptions(
            ROUND5_MESSAGE,
            round5_messages,
            &self.senders,
            &self.signer.core,
            |m| &m.signature_unmask_partial_decryption,
        )?;
        let signature_unmask = self
            .signer
            .core
            .paillier_key()
            .combine_partial_decryptions(&partials)?;

        debug!(signer_id = %self.signer.id(), "Round 5 messages combined");
        Ok(signature_unmask)
    }

    /// Round 6: partially decrypt `(k * rho)^-1 * (m * u + r * v)`, the
    /// encrypted `s` for the 32-byte message digest `message_hash`.
    ///
    /// Consumes the state, so a nonce signs at most one digest:
    ///
    /// ```compile_fail
    /// # fn replay(round5: tecdsa_core::sign::Round5Signer, unmask: num_bigint::BigUint) {
    /// let first = round5.sign_round6(&unmask, &[1u8; 32]);
    /// let second = round5.sign_round6(&unmask, &[2u8; 32]);
    /// # }
    /// ```
    pub fn sign_round6(
        self,
        signature_unmask: &BigUint,
        message_hash: &[u8],
    ) -> Result<(Round6Signer, SignRound6Message)> {
        if message_hash.len() != MESSAGE_HASH_LENGTH {
            return Err(Error::InvalidMessageHash(message_hash.len()));
        }

        let paillier = self.signer.core.paillier_public_key();
        let q = self.signer.core.group_parameters().curve_cardinality();

        let signature_unmask_inverse = (signature_unmask % &q).modinv(&q).ok_or_else(|| {
            Error::crypto("signing round 6", "signature unmask is not invertible mod q")
        })?;
        let m = BigUint::from_bytes_be(message_hash) % &q;

        let encrypted_signature = paillier.mul(
            &paillier.add(
                &paillier.mul(&self.combined.secret_key_factor, &m),
                &paillier.mul(&self.combined.secret_key_multiple, &self.signature_r),
            ),
            &signature_unmask_inverse,
        );

        let message = SignRound6Message {
            sender_id: self.signer.id().clone(),
            signature_partial_decryption: self
                .signer
                .core
                .paillier_key()
                .partial_decrypt(&encrypted_signature),
        };

        debug!(signer_id = %self.signer.id(), "Signing round 6 complete");
        Ok((
            Round6Signer {
                signer: self.signer,
                signature_r: self.signature_r,
                senders: self.senders,
            },
            message,
        ))
    }
}

impl Round6Signer {
    /// Threshold-decrypt the signature and bring `s` to its low form.
    pub fn combine_round6_messages(&self, round6_messages: &[SignRound6Message]) -> Result<Signature> {
        let partials = partial_decryptions(
            ROUND6_MESSAGE,
            round6_messages,
            &self.senders,
            &self.signer.core,
            |m| &m.signature_partial_decryption,
        )?;
        let q = self.signer.core.group_parameters().curve_cardinality();
        let s = self
            .signer
            .core
            .paillier_key()
            .combine_partial_decryptions(&partials)?
            % &q;

        Signature::new(self.signature_r.clone(), s, &q)
    }
}

/// Partial decryptions of a round, one per sender of `senders`, each carrying
/// the Paillier share index the group assigned to its sender.
fn partial_decryptions<M: Message>(
    what: &'static str,
    messages: &[M],
    senders: &[SignerId],
    core: &ParticipantCore,
    partial: impl Fn(&M) -> &PartialDecryption,
) -> Result<Vec<PartialDecryption>> {
    match_senders(what, messages, senders)?
        .into_iter()
        .map(|message| {
            let sender = message.sender_id();
            let decryption = partial(message);
            if core.member_index(sender) != Some(decryption.index) {
                warn!(what, sender = %sender, index = decryption.index, "share index does not belong to sender");
                return Err(Error::MessageRejected {
                    what,
                    sender: sender.clone(),
                });
            }
            Ok(decryption.clone())
        })
        .collect()
}

/// Run all six signing rounds over `relay`
///
/// Every group member must take part; each round blocks until all
/// `group_size` messages have arrived.
///
/// # Arguments
/// * `signer` - This member's signer from DKG
/// * `message_hash` - 32-byte digest to sign
/// * `session_id` - Session shared by all members for this signature
/// * `relay` - Message relay for communication
#[instrument(skip_all, fields(signer_id = %signer.id()))]
pub async fn run_dsg<R: Relay>(
    signer: &Signer,
    message_hash: &[u8],
    session_id: &SessionId,
    relay: &R,
) -> Result<Signature> {
    if message_hash.len() != MESSAGE_HASH_LENGTH {
        return Err(Error::InvalidMessageHash(message_hash.len()));
    }

    let group_size = signer.core.group_parameters().group_size();
    info!(
        group_size,
        message_hash = hex::encode(message_hash),
        "Starting DSG"
    );

    let (round1, message) = signer.sign_round1(&mut OsRng)?;
    relay.broadcast(session_id, 1, &message).await?;
    let round1_messages = relay
        .collect_broadcasts::<SignRound1Message>(session_id, 1, group_size)
        .await?;

    let (round2, message) = round1.sign_round2(&mut OsRng)?;
    relay.broadcast(session_id, 2, &message).await?;
    let round2_messages = relay
        .collect_broadcasts::<SignRound2Message>(session_id, 2, group_size)
        .await?;
    let combined = round2.combine_round2_messages(&round1_messages, &round2_messages)?;

    let (round3, message) = round2.sign_round3(combined, &mut OsRng)?;
    relay.broadcast(session_id, 3, &message).await?;
    let round3_messages = relay
        .collect_broadcasts::<SignRound3Message>(session_id, 3, group_size)
        .await?;

    let (round4, message) = round3.sign_round4(&mut OsRng)?;
    relay.broadcast(session_id, 4, &message).await?;
    let round4_messages = relay
        .collect_broadcasts::<SignRound4Message>(session_id, 4, group_size)
        .await?;
    let combined = round4.combine_round4_messages(&round3_messages, &round4_messages)?;

    let (round5, message) = round4.sign_round5(combined)?;
    relay.broadcast(session_id, 5, &message).await?;
    let round5_messages = relay
        .collect_broadcasts::<SignRound5Message>(session_id, 5, group_size)
        .await?;
    let signature_unmask = round5.combine_round5_messages(&round5_messages)?;

    let (round6, message) = round5.sign_round6(&signature_unmask, message_hash)?;
    relay.broadcast(session_id, 6, &message).await?;
    let round6_messages = relay
        .collect_broadcasts::<SignRound6Message>(session_id, 6, group_size)
        .await?;
    let signature = round6.combine_round6_messages(&round6_messages)?;

    info!(
        r = hex::encode(&signature.to_bytes()[..32]),
        s = hex::encode(&signature.to_bytes()[32..]),
        "DSG completed successfully"
    );

    Ok(signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, FailingRng};
    use crate::mpc::MemoryRelay;
    use sha2::{Digest, Sha256};
    use std::sync::Arc;

    fn digest(message: &[u8]) -> [u8; 32] {
        Sha256::digest(message).into()
    }

    struct Rounds {
        round2: Vec<Round2Signer>,
        round1_messages: Vec<SignRound1Message>,
        round2_messages: Vec<SignRound2Message>,
    }

    fn run_rounds_1_2(signers: &[Signer]) -> Rounds {
        let (round1, round1_messages): (Vec<_>, Vec<_>) = signers
            .iter()
            .map(|s| s.sign_round1(&mut OsRng).unwrap())
            .unzip();
        let (round2, round2_messages): (Vec<_>, Vec<_>) = round1
            .into_iter()
            .map(|s| s.sign_round2(&mut OsRng).unwrap())
            .unzip();

        Rounds {
            round2,
            round1_messages,
            round2_messages,
        }
    }

    struct Rounds34 {
        round4: Vec<Round4Signer>,
        round3_messages: Vec<SignRound3Message>,
        round4_messages: Vec<SignRound4Message>,
    }

    fn run_rounds_3_4(rounds: Rounds) -> Rounds34 {
        let (round3, round3_messages): (Vec<_>, Vec<_>) = rounds
            .round2
            .into_iter()
            .map(|s| {
                let combined = s
                    .combine_round2_messages(&rounds.round1_messages, &rounds.round2_messages)
                    .unwrap();
                s.sign_round3(combined, &mut OsRng).unwrap()
            })
            .unzip();
        let (round4, round4_messages): (Vec<_>, Vec<_>) = round3
            .into_iter()
            .map(|s| s.sign_round4(&mut OsRng).unwrap())
            .unzip();

        Rounds34 {
            round4,
            round3_messages,
            round4_messages,
        }
    }

    fn run_round_5(rounds: Rounds34) -> (Vec<Round5Signer>, Vec<SignRound5Message>) {
        rounds
            .round4
            .into_iter()
            .map(|s| {
                let combined = s
                    .combine_round4_messages(&rounds.round3_messages, &rounds.round4_messages)
                    .unwrap();
                s.sign_round5(combined).unwrap()
            })
            .unzip()
    }

    fn run_rounds_to_unmask(rounds: Rounds34) -> (Vec<Round5Signer>, BigUint) {
        let (round5, round5_messages) = run_round_5(rounds);

        let unmasks: Vec<_> = round5
            .iter()
            .map(|s| s.combine_round5_messages(&round5_messages).unwrap())
            .collect();
        assert!(unmasks.iter().all(|u| u == &unmasks[0]));

        let unmask = unmasks[0].clone();
        (round5, unmask)
    }

    fn run_round_6(
        round5: Vec<Round5Signer>,
        unmask: &BigUint,
        message_hash: &[u8],
    ) -> (Vec<Round6Signer>, Vec<SignRound6Message>) {
        round5
            .into_iter()
            .map(|s| s.sign_round6(unmask, message_hash).unwrap())
            .unzip()
    }

    fn sign(signers: &[Signer], message_hash: &[u8]) -> Signature {
        let (round5, unmask) = run_rounds_to_unmask(run_rounds_3_4(run_rounds_1_2(signers)));

        let (round6, round6_messages) = run_round_6(round5, &unmask, message_hash);
        let signatures: Vec<_> = round6
            .iter()
            .map(|s| s.combine_round6_messages(&round6_messages).unwrap())
            .collect();
        assert!(signatures.iter().all(|s| s == &signatures[0]));

        signatures[0].clone()
    }

    #[test]
    fn test_signature_verifies_under_group_key() {
        let signers = fixtures::signers();
        let message_hash = digest(b"threshold ecdsa");

        let first = sign(&signers, &message_hash);
        let public_key = signers[0].public_key();
        assert!(first.verify(public_key, &message_hash));
        assert!(!first.verify(public_key, &digest(b"another message")));

        // fresh nonces give another valid signature
        let second = sign(&signers, &message_hash);
        assert_ne!(first, second);
        assert!(second.verify(public_key, &message_hash));
    }

    #[test]
    fn test_signature_is_low_s() {
        let signers = fixtures::signers();
        let q = signers[0].core().group_parameters().curve_cardinality();
        let half_order = &q >> 1u32;

        let signature = sign(&signers, &digest(b"low s"));
        assert!(!signature.s().is_zero());
        assert!(signature.s() <= &half_order);
        assert!(signature.to_ecdsa().unwrap().normalize_s().is_none());
    }

    #[test]
    fn test_round6_rejects_wrong_hash_length() {
        let signers = fixtures::signers();
        let (round5, unmask) = run_rounds_to_unmask(run_rounds_3_4(run_rounds_1_2(&signers)));

        for (signer, length) in round5.into_iter().zip([0, 31, 64]) {
            assert!(matches!(
                signer.sign_round6(&unmask, &vec![1u8; length]),
                Err(Error::InvalidMessageHash(l)) if l == length
            ));
        }
    }

    #[test]
    fn test_round2_combine_requires_every_member() {
        let signers = fixtures::signers();
        let rounds = run_rounds_1_2(&signers);

        let err = rounds.round2[0]
            .combine_round2_messages(&rounds.round1_messages, &rounds.round2_messages[..2])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::IncompleteGroup {
                what: ROUND2_MESSAGE,
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_round2_combine_rejects_tampered_reveal() {
        let signers = fixtures::signers();
        let mut rounds = run_rounds_1_2(&signers);
        let sender = rounds.round2_messages[2].sender_id.clone();
        rounds.round2_messages[2].secret_key_factor_share =
            rounds.round2_messages[1].secret_key_factor_share.clone();

        let err = rounds.round2[0]
            .combine_round2_messages(&rounds.round1_messages, &rounds.round2_messages)
            .unwrap_err();
        assert!(matches!(err, Error::MessageRejected { sender: ref s, .. } if *s == sender));
    }

    #[test]
    fn test_round2_combine_detects_duplicate_sender() {
        let signers = fixtures::signers();
        let mut rounds = run_rounds_1_2(&signers);
        rounds.round2_messages[1] = rounds.round2_messages[0].clone();

        let err = rounds.round2[0]
            .combine_round2_messages(&rounds.round1_messages, &rounds.round2_messages)
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateSender { .. }));
    }

    #[test]
    fn test_round4_combine_rejects_tampered_reveal() {
        let signers = fixtures::signers();
        let mut rounds = run_rounds_3_4(run_rounds_1_2(&signers));
        let sender = rounds.round4_messages[0].sender_id.clone();
        rounds.round4_messages[0].decommitment_key = rounds.round4_messages[1].decommitment_key;

        let err = rounds.round4[1]
            .combine_round4_messages(&rounds.round3_messages, &rounds.round4_messages)
            .unwrap_err();
        assert!(matches!(err, Error::MessageRejected { sender: ref s, .. } if *s == sender));
    }

    #[test]
    fn test_round4_combine_requires_matching_sender() {
        let signers = fixtures::signers();
        let mut rounds = run_rounds_3_4(run_rounds_1_2(&signers));
        rounds.round4_messages[2].sender_id = "0".to_string();

        let err = rounds.round4[0]
            .combine_round4_messages(&rounds.round3_messages, &rounds.round4_messages)
            .unwrap_err();
        assert!(matches!(err, Error::NoMatchingMessage { what: ROUND4_MESSAGE, .. }));
    }

    #[test]
    fn test_round6_combine_requires_every_member() {
        let signers = fixtures::signers();
        let message_hash = digest(b"attendance");
        let (round5, unmask) = run_rounds_to_unmask(run_rounds_3_4(run_rounds_1_2(&signers)));
        let (round6, round6_messages) = run_round_6(round5, &unmask, &message_hash);

        let err = round6[0]
            .combine_round6_messages(&round6_messages[..2])
            .unwrap_err();
        assert!(err.is_attendance_failure());

        let mut duplicated = round6_messages.clone();
        duplicated[2] = duplicated[0].clone();
        let err = round6[0].combine_round6_messages(&duplicated).unwrap_err();
        assert!(matches!(err, Error::DuplicateSender { what: ROUND6_MESSAGE, .. }));
    }

    #[test]
    fn test_round6_combine_binds_share_index_to_sender() {
        let signers = fixtures::signers();
        let message_hash = digest(b"share index");
        let (round5, unmask) = run_rounds_to_unmask(run_rounds_3_4(run_rounds_1_2(&signers)));
        let (round6, mut round6_messages) = run_round_6(round5, &unmask, &message_hash);

        // both partial decryptions are genuine but published under the
        // other member's ID
        let first = round6_messages[0].signature_partial_decryption.clone();
        round6_messages[0].signature_partial_decryption =
            round6_messages[1].signature_partial_decryption.clone();
        round6_messages[1].signature_partial_decryption = first;
        let sender = round6_messages[0].sender_id.clone();

        let err = round6[2]
            .combine_round6_messages(&round6_messages)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::MessageRejected { what: ROUND6_MESSAGE, sender: ref s } if *s == sender
        ));
    }

    #[test]
    fn test_round5_combine_requires_every_member() {
        let signers = fixtures::signers();
        let (round5, round5_messages) = run_round_5(run_rounds_3_4(run_rounds_1_2(&signers)));

        let err = round5[0]
            .combine_round5_messages(&round5_messages[1..])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::IncompleteGroup {
                what: ROUND5_MESSAGE,
                expected: 3,
                actual: 2
            }
        ));

        let mut duplicated = round5_messages.clone();
        duplicated[1] = duplicated[2].clone();
        let err = round5[0].combine_round5_messages(&duplicated).unwrap_err();
        assert!(matches!(err, Error::DuplicateSender { what: ROUND5_MESSAGE, .. }));
    }

    #[test]
    fn test_round5_combine_rejects_foreign_sender() {
        let signers = fixtures::signers();
        let (round5, mut round5_messages) = run_round_5(run_rounds_3_4(run_rounds_1_2(&signers)));
        let missing = round5_messages[1].sender_id.clone();
        round5_messages[1].sender_id = "0".to_string();

        let err = round5[0]
            .combine_round5_messages(&round5_messages)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::NoMatchingMessage { what: ROUND5_MESSAGE, sender: ref s } if *s == missing
        ));
    }

    #[test]
    fn test_signing_rounds_chain_by_value() {
        let signers = fixtures::signers();
        let message_hash = digest(b"one nonce, one digest");
        let public_key = signers[0].public_key();

        // every round hands its state on to the next, so each digest needs a
        // fresh run from round 1 and a fresh nonce
        let first = sign(&signers, &message_hash);
        let second = sign(&signers, &digest(b"another digest"));
        assert_ne!(first.r(), second.r());
        assert!(first.verify(public_key, &message_hash));
        assert!(second.verify(public_key, &digest(b"another digest")));
    }

    #[test]
    fn test_round1_needs_randomness() {
        let signers = fixtures::signers();
        assert!(matches!(
            signers[0].sign_round1(&mut FailingRng),
            Err(Error::Randomness(_))
        ));
    }

    #[tokio::test]
    async fn test_run_dsg_rejects_wrong_hash_length() {
        let signers = fixtures::signers();
        let relay = MemoryRelay::new();

        let err = run_dsg(&signers[0], &[0u8; 20], &[1u8; 32], &relay)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidMessageHash(20)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 3)]
    async fn test_run_dsg_over_memory_relay() {
        fixtures::init_tracing();
        let signers = fixtures::signers();
        let relay = Arc::new(MemoryRelay::new());
        let session_id = [3u8; 32];
        let message_hash = digest(b"relayed");

        let handles: Vec<_> = signers
            .iter()
            .cloned()
            .map(|signer| {
                let relay = Arc::clone(&relay);
                tokio::spawn(async move {
                    run_dsg(&signer, &message_hash, &session_id, relay.as_ref()).await
                })
            })
            .collect();

        let mut signatures = Vec::new();
        for handle in handles {
            signatures.push(handle.await.unwrap().unwrap());
        }

        assert!(signatures.iter().all(|s| s == &signatures[0]));
        assert!(signatures[0].verify(signers[0].public_key(), &message_hash));
    }
}
