//! Core types shared by key generation and signing

use std::collections::BTreeMap;
use std::sync::Arc;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::curve::Curve;
use crate::paillier::{self, ThresholdPrivateKey};
use crate::zkp::ZkpPublicParameters;
use crate::{Error, Result};

/// Identifier of a group member, unique within a session
pub type SignerId = String;

/// Unique identifier for a session
pub type SessionId = [u8; 32];

/// Immutable group configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicParameters {
    group_size: usize,
    threshold: usize,
    curve: Curve,
    paillier_key_bit_length: u64,
}

impl PublicParameters {
    pub fn new(
        group_size: usize,
        threshold: usize,
        curve: Curve,
        paillier_key_bit_length: u64,
    ) -> Result<Self> {
        let params = Self {
            group_size,
            threshold,
            curve,
            paillier_key_bit_length,
        };
        params.validate()?;
        Ok(params)
    }

    /// Load parameters from a JSON document and validate them.
    pub fn from_json(json: &str) -> Result<Self> {
        let params: Self =
            serde_json::from_str(json).map_err(|e| Error::Deserialization(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    fn validate(&self) -> Result<()> {
        if self.group_size < 1 {
            return Err(Error::InvalidConfig("group size must be at least 1".into()));
        }
        if self.threshold < 1 {
            return Err(Error::InvalidConfig("threshold must be at least 1".into()));
        }
        if self.threshold > self.group_size {
            return Err(Error::InvalidConfig(format!(
                "threshold {} cannot exceed group size {}",
                self.threshold, self.group_size
            )));
        }

        // Intermediate plaintexts reach q^8, they must not wrap modulo N
        let minimum_bits = 8 * self.curve.bit_length();
        if self.paillier_key_bit_length < minimum_bits {
            return Err(Error::InvalidConfig(format!(
                "paillier key must be at least {} bits, got {}",
                minimum_bits, self.paillier_key_bit_length
            )));
        }

        Ok(())
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn curve(&self) -> Curve {
        self.curve
    }

    pub fn paillier_key_bit_length(&self) -> u64 {
        self.paillier_key_bit_length
    }

    /// Order `q` of the curve group
    pub fn curve_cardinality(&self) -> BigUint {
        self.curve.order()
    }
}

/// Per-session identity and key material of one group member.
///
/// Owned by that member only; round states embed it unchanged.
#[derive(Debug, Clone)]
pub struct ParticipantCore {
    id: SignerId,
    paillier_key: Arc<ThresholdPrivateKey>,
    /// Every member's ID with its Paillier share index
    members: Arc<BTreeMap<SignerId, u32>>,
    group_parameters: Arc<PublicParameters>,
    zkp_parameters: Arc<ZkpPublicParameters>,
}

impl ParticipantCore {
    pub(crate) fn new(
        id: SignerId,
        paillier_key: ThresholdPrivateKey,
        members: Arc<BTreeMap<SignerId, u32>>,
        group_parameters: Arc<PublicParameters>,
        zkp_parameters: Arc<ZkpPublicParameters>,
    ) -> Self {
        Self {
            id,
            paillier_key: Arc::new(paillier_key),
            members,
            group_parameters,
            zkp_parameters,
        }
    }

    pub fn id(&self) -> &SignerId {
        &self.id
    }

    pub fn paillier_key(&self) -> &ThresholdPrivateKey {
        &self.paillier_key
    }

    pub fn paillier_public_key(&self) -> &paillier::PublicKey {
        self.paillier_key.public_key()
    }

    /// Paillier share index of a group member, `None` for a foreign ID
    pub fn member_index(&self, id: &str) -> Option<u32> {
        self.members.get(id).copied()
    }

    pub fn group_parameters(&self) -> &PublicParameters {
        &self.group_parameters
    }

    pub fn zkp_parameters(&self) -> &ZkpPublicParameters {
        &self.zkp_parameters
    }
}

/// A broadcast protocol message tagged with its sender
pub trait Message {
    fn sender_id(&self) -> &SignerId;
}
