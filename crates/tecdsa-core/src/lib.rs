//! # tECDSA Core
//!
//! Threshold ECDSA over secp256k1. A group of `n` members jointly holds a
//! signing key that is never reconstructed; signing requires every member's
//! participation and produces a standard, low-s ECDSA signature.
//!
//! This crate provides:
//! - Distributed Key Generation (DKG), two commit-then-reveal rounds
//! - Distributed Signature Generation (DSG), six rounds
//! - The threshold Paillier cryptosystem, hash commitments and range proofs
//!   both protocols are built on
//!
//! ## Protocol Overview
//!
//! The group secret key `x` only ever exists encrypted under a threshold
//! Paillier key shared by the group. Signing blinds `x` with a jointly chosen
//! factor `rho`, decrypts `k * rho` to invert the nonce, and finally decrypts
//! `s = k^-1 * (m + r * x)`. Every ciphertext a member contributes comes with
//! a zero-knowledge range proof, checked by everybody before combining.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tecdsa_core::{keygen, sign, Curve, PublicParameters};
//!
//! let params = PublicParameters::new(3, 2, Curve::Secp256k1, 2048)?;
//! let group = keygen::new_group(&mut OsRng, params)?;
//!
//! // on every member, with its own LocalSigner
//! let signer = keygen::run_dkg(local_signer, &session_id, &relay).await?;
//! let signature = sign::run_dsg(&signer, &message_hash, &session_id, &relay).await?;
//! ```

pub mod arith;
pub mod commitment;
pub mod curve;
pub mod error;
pub mod keygen;
pub mod mpc;
pub mod paillier;
pub mod sign;
pub mod types;
pub mod validation;
pub mod zkp;

#[cfg(test)]
mod fixtures;

pub use curve::Curve;
pub use error::{Error, Result};
pub use keygen::{LocalSigner, ThresholdDsaKey};
pub use sign::{Signature, Signer};
pub use types::{PublicParameters, SessionId, SignerId};

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
