//! Distributed Key Generation (DKG) module
//!
//! Two broadcast rounds. Every member first commits to its public key share,
//! then reveals it together with the Paillier encryption of the secret share
//! and a range proof tying the two. The combined key is the homomorphic sum
//! of the encrypted secret shares plus the sum of the public shares; nobody
//! ever learns the secret key itself.

mod dkg;
mod messages;
mod setup;

pub use dkg::run_dkg;
pub use messages::*;
pub use setup::{new_group, new_group_from_primes};

use k256::{ProjectivePoint, Scalar};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::commitment::DecommitmentKey;
use crate::curve::point_serde;
use crate::paillier::Ciphertext;
use crate::types::ParticipantCore;
use crate::SignerId;

/// A member's own contribution to the group key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyShare {
    secret_share: Scalar,
    #[zeroize(skip)]
    public_share: ProjectivePoint,
}

impl KeyShare {
    pub fn public_share(&self) -> &ProjectivePoint {
        &self.public_share
    }
}

/// Group member that has not started key generation yet
#[derive(Debug, Clone)]
pub struct LocalSigner {
    core: ParticipantCore,
}

/// Group member that published the commitment to its key share
pub struct CommittedLocalSigner {
    core: ParticipantCore,
    key_share: KeyShare,
    decommitment_key: DecommitmentKey,
}

/// Output of key generation, identical for every member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdDsaKey {
    /// Paillier encryption of the group secret key
    encrypted_secret_key: Ciphertext,
    #[serde(with = "point_serde")]
    public_key: ProjectivePoint,
}

impl LocalSigner {
    pub(crate) fn new(core: ParticipantCore) -> Self {
        Self { core }
    }

    pub fn id(&self) -> &SignerId {
        self.core.id()
    }

    pub fn core(&self) -> &ParticipantCore {
        &self.core
    }
}

impl CommittedLocalSigner {
    pub fn id(&self) -> &SignerId {
        self.core.id()
    }

    pub fn key_share(&self) -> &KeyShare {
        &self.key_share
    }
}

impl ThresholdDsaKey {
    pub fn encrypted_secret_key(&self) -> &Ciphertext {
        &self.encrypted_secret_key
    }

    pub fn public_key(&self) -> &ProjectivePoint {
        &self.public_key
    }

    /// Compressed SEC1 encoding of the group public key
    pub fn public_key_bytes(&self) -> Vec<u8> {
        crate::curve::point_to_bytes(&self.public_key)
    }
}
