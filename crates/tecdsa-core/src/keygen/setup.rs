//! Dealer-side group setup
//!
//! The threshold Paillier key and the proof parameters come from a trusted
//! dealer; only the ECDSA key itself is generated distributedly.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use num_bigint::BigUint;
use rand_core::CryptoRngCore;
use tracing::{debug, info};

use super::LocalSigner;
use crate::paillier::{self, ThresholdPrivateKey};
use crate::types::{ParticipantCore, PublicParameters};
use crate::zkp::ZkpPublicParameters;
use crate::{Error, Result, SignerId};

/// Create all members of a new group with freshly generated Paillier and
/// proof parameters.
pub fn new_group(
    rng: &mut impl CryptoRngCore,
    params: PublicParameters,
) -> Result<Vec<LocalSigner>> {
    info!(
        group_size = params.group_size(),
        threshold = params.threshold(),
        paillier_bits = params.paillier_key_bit_length(),
        "Setting up signing group"
    );

    let paillier_keys = paillier::generate_threshold_keys(
        rng,
        params.paillier_key_bit_length(),
        params.group_size(),
        params.threshold(),
    )?;
    let zkp_parameters = ZkpPublicParameters::generate(
        rng,
        params.curve(),
        paillier_keys[0].public_key().clone(),
        params.paillier_key_bit_length(),
    )?;

    assemble(rng, params, paillier_keys, zkp_parameters)
}

/// Like [`new_group`], over the given Paillier and auxiliary RSA primes.
pub fn new_group_from_primes(
    rng: &mut impl CryptoRngCore,
    params: PublicParameters,
    paillier_primes: (BigUint, BigUint),
    zkp_primes: (BigUint, BigUint),
) -> Result<Vec<LocalSigner>> {
    let (p, q) = paillier_primes;
    let n_bits = (&p * &q).bits();
    if n_bits < params.paillier_key_bit_length() {
        return Err(Error::InvalidConfig(format!(
            "paillier primes give a {} bit modulus, {} bits required",
            n_bits,
            params.paillier_key_bit_length()
        )));
    }

    let paillier_keys = paillier::threshold_keys_from_primes(
        rng,
        &p,
        &q,
        params.group_size(),
        params.threshold(),
    )?;
    let (n_tilde_p, n_tilde_q) = zkp_primes;
    let zkp_parameters = ZkpPublicParameters::from_primes(
        rng,
        params.curve(),
        paillier_keys[0].public_key().clone(),
        &n_tilde_p,
        &n_tilde_q,
    )?;

    assemble(rng, params, paillier_keys, zkp_parameters)
}

fn assemble(
    rng: &mut impl CryptoRngCore,
    params: PublicParameters,
    paillier_keys: Vec<ThresholdPrivateKey>,
    zkp_parameters: ZkpPublicParameters,
) -> Result<Vec<LocalSigner>> {
    let ids = generate_member_ids(rng, params.group_size())?;
    let members: Arc<BTreeMap<SignerId, u32>> = Arc::new(
        ids.iter()
            .cloned()
            .zip(paillier_keys.iter().map(ThresholdPrivateKey::index))
            .collect(),
    );
    let group_parameters = Arc::new(params);
    let zkp_parameters = Arc::new(zkp_parameters);

    let signers: Vec<_> = ids
        .into_iter()
        .zip(paillier_keys)
        .map(|(id, paillier_key)| {
            LocalSigner::new(ParticipantCore::new(
                id,
                paillier_key,
                Arc::clone(&members),
                Arc::clone(&group_parameters),
                Arc::clone(&zkp_parameters),
            ))
        })
        .collect();

    debug!(members = ?signers.iter().map(LocalSigner::id).collect::<Vec<_>>(), "Group created");
    Ok(signers)
}

/// Distinct random decimal member IDs, none of them "0".
fn generate_member_ids(rng: &mut impl CryptoRngCore, count: usize) -> Result<Vec<SignerId>> {
    let mut seen = HashSet::with_capacity(count);
    let mut ids = Vec::with_capacity(count);

    while ids.len() < count {
        let mut buf = [0u8; 4];
        rng.try_fill_bytes(&mut buf)?;
        let id = u32::from_be_bytes(buf);
        if id != 0 && seen.insert(id) {
            ids.push(id.to_string());
        }
    }

    Ok(ids)
}
