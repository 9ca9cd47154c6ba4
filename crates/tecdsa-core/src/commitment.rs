//! Hash-based commitment scheme
//!
//! A commitment is `SHA-256(label || key || len(v_1) || v_1 || ...)` for a
//! fresh 256-bit decommitment key. Binding follows from collision resistance,
//! hiding from the secret key until it is revealed.

use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::Result;

const COMMIT_LABEL: &[u8] = b"tecdsa v0.1.0 commitment";
const COMMIT_LEN: usize = 32;

/// Binding and hiding commitment to a list of byte strings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment([u8; COMMIT_LEN]);

/// Secret opening of a [`Commitment`], published together with the values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecommitmentKey([u8; COMMIT_LEN]);

impl AsRef<[u8]> for Commitment {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

fn digest(key: &DecommitmentKey, values: &[&[u8]]) -> [u8; COMMIT_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(COMMIT_LABEL);
    hasher.update(key.0);
    for value in values {
        hasher.update((value.len() as u64).to_be_bytes());
        hasher.update(value);
    }
    hasher.finalize().into()
}

/// Commit to the given values.
pub fn generate(
    rng: &mut impl CryptoRngCore,
    values: &[&[u8]],
) -> Result<(Commitment, DecommitmentKey)> {
    let mut key = [0u8; COMMIT_LEN];
    rng.try_fill_bytes(&mut key)?;
    let key = DecommitmentKey(key);

    Ok((Commitment(digest(&key, values)), key))
}

impl Commitment {
    /// Check that `key` opens this commitment to exactly `values`.
    #[must_use]
    pub fn verify(&self, key: &DecommitmentKey, values: &[&[u8]]) -> bool {
        digest(key, values).ct_eq(&self.0).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::FailingRng;
    use crate::Error;
    use rand_core::OsRng;

    #[test]
    fn test_commitment_opens_to_committed_values() {
        let (commitment, key) = generate(&mut OsRng, &[b"first", b"second"]).unwrap();
        assert!(commitment.verify(&key, &[b"first", b"second"]));
    }

    #[test]
    fn test_commitment_rejects_other_values() {
        let (commitment, key) = generate(&mut OsRng, &[b"first", b"second"]).unwrap();
        assert!(!commitment.verify(&key, &[b"first", b"third"]));
        // length prefixes keep value boundaries apart
        assert!(!commitment.verify(&key, &[b"firsts", b"econd"]));

        let (_, other_key) = generate(&mut OsRng, &[b"first", b"second"]).unwrap();
        assert!(!commitment.verify(&other_key, &[b"first", b"second"]));
    }

    #[test]
    fn test_commitment_is_randomized() {
        let (first, _) = generate(&mut OsRng, &[b"value"]).unwrap();
        let (second, _) = generate(&mut OsRng, &[b"value"]).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_generate_surfaces_rng_failure() {
        let err = generate(&mut FailingRng, &[b"value"]).unwrap_err();
        assert!(matches!(err, Error::Randomness(_)));
    }
}
