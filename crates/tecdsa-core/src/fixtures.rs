//! Shared test fixtures
//!
//! Fixed 1024-bit primes keep tests away from prime generation, which would
//! dominate their running time.

use std::sync::OnceLock;

use num_bigint::BigUint;
use rand_core::{CryptoRng, OsRng, RngCore};

use crate::curve::Curve;
use crate::keygen::{self, LocalSigner};
use crate::paillier::{self, ThresholdPrivateKey};
use crate::sign::Signer;
use crate::types::PublicParameters;
use crate::zkp::ZkpPublicParameters;

const PAILLIER_P: &str = "e5becbe8c0cec33ed2bb70728b8103cd15d9df98e824538a779745a115a361888465abd5c41eeda176dc2c3b653aef42c278de3bed3b37802f8c919b779f0d691c9e79baae7ff4f7558b308dbf147a2d9ce7812c47331fdfb5f1e355b83312fe89a0bab61a74ec504382022b0f55dd07a504d77bb25a98011b03ddddc1ffdadb";
const PAILLIER_Q: &str = "f66a7e3af8958fb856b821405f8b2cfb59457c7340c39c504fa9209eb6a9b72c696d87752425df9224af38fffac8fe15a7aefec6b9223fbcb6b87b1e5d7dcc059697f1cd9164ebaa27173f88844a7e537f46a83f66deb4daa8f131d58667f82adef883af43121eae82cc03a929d9fb7fa0d04934e1f817aeb25cafbab9859a79";
const N_TILDE_P: &str = "f4c225e400ff78af98f3bca9e2da7ad459708cbeddb2ce96f60cfd9f5dd9cd3a7ea16988ae8453284b4725ad29e6fb53cb3131eb2b600e1e156676d55d387b3659e29059bc402d4b2a6fcddf632337bf8315767c1aff84d1b7fa97df8a461f92fc9e22adef1025897ef37ec8f925b8cdabf8b7a0af50121c01341013083cdfb1";
const N_TILDE_Q: &str = "f0b5ad373f39fedcd9a5a3ee8e75f8efefd051ec10af95a0a6b1a8e90d6b7e212973b34394414682392a3d4eddcd1f59139b80e1c4cae9fc01c480a3e63a1a95326c510cc1a68976f58525b7ac3f4e80bf9214d8e4d9876628a5111766e3d8203fe7faea2d0d1c83118ba27dacb3ca1236ed0bc4e808ed8d8202687e4d5acb13";

pub const GROUP_SIZE: usize = 3;
pub const THRESHOLD: usize = 2;

fn parse(hex: &str) -> BigUint {
    BigUint::parse_bytes(hex.as_bytes(), 16).unwrap()
}

pub fn paillier_primes() -> (BigUint, BigUint) {
    (parse(PAILLIER_P), parse(PAILLIER_Q))
}

pub fn zkp_primes() -> (BigUint, BigUint) {
    (parse(N_TILDE_P), parse(N_TILDE_Q))
}

pub fn paillier_keys(total: usize, threshold: usize) -> Vec<ThresholdPrivateKey> {
    let (p, q) = paillier_primes();
    paillier::threshold_keys_from_primes(&mut OsRng, &p, &q, total, threshold).unwrap()
}

pub fn zkp_parameters() -> ZkpPublicParameters {
    let keys = paillier_keys(GROUP_SIZE, THRESHOLD);
    let (p, q) = zkp_primes();
    ZkpPublicParameters::from_primes(
        &mut OsRng,
        Curve::Secp256k1,
        keys[0].public_key().clone(),
        &p,
        &q,
    )
    .unwrap()
}

pub fn public_parameters(group_size: usize, threshold: usize) -> PublicParameters {
    PublicParameters::new(group_size, threshold, Curve::Secp256k1, 2048).unwrap()
}

/// Fresh local signers for a group, before key generation.
pub fn group(group_size: usize, threshold: usize) -> Vec<LocalSigner> {
    keygen::new_group_from_primes(
        &mut OsRng,
        public_parameters(group_size, threshold),
        paillier_primes(),
        zkp_primes(),
    )
    .unwrap()
}

/// Run both key generation rounds in memory for every member of `group`.
pub fn generate_keys(group: Vec<LocalSigner>) -> Vec<Signer> {
    let (committed, commitments): (Vec<_>, Vec<_>) = group
        .into_iter()
        .map(|signer| signer.initialize_key_shares(&mut OsRng).unwrap())
        .unzip();
    let reveals: Vec<_> = committed
        .iter()
        .map(|signer| signer.reveal_key_shares(&mut OsRng).unwrap())
        .collect();

    committed
        .into_iter()
        .map(|signer| {
            let key = signer.combine_key_shares(&commitments, &reveals).unwrap();
            signer.into_signer(key)
        })
        .collect()
}

/// Signers of a 2-of-3 group that already ran key generation, shared by all
/// signing tests.
pub fn signers() -> Vec<Signer> {
    static SIGNERS: OnceLock<Vec<Signer>> = OnceLock::new();
    SIGNERS
        .get_or_init(|| generate_keys(group(GROUP_SIZE, THRESHOLD)))
        .clone()
}

/// Route protocol logs to the test harness, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Randomness source that always fails.
pub struct FailingRng;

impl RngCore for FailingRng {
    fn next_u32(&mut self) -> u32 {
        panic!("FailingRng used through an infallible method")
    }

    fn next_u64(&mut self) -> u64 {
        panic!("FailingRng used through an infallible method")
    }

    fn fill_bytes(&mut self, _dest: &mut [u8]) {
        panic!("FailingRng used through an infallible method")
    }

    fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand_core::Error> {
        Err(rand_core::Error::new("entropy source unavailable"))
    }
}

impl CryptoRng for FailingRng {}
