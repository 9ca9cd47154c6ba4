//! Elliptic curve descriptor and secp256k1 helpers
//!
//! The protocol keeps most secrets as big integers because they also flow into
//! the homomorphic cryptosystem, so this module converts between `BigUint` and
//! `k256` scalars/points.

use elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use k256::{
    elliptic_curve::{bigint::U256, ops::Reduce},
    AffinePoint, EncodedPoint, ProjectivePoint, Scalar,
};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// Order of the secp256k1 group, big-endian.
const SECP256K1_ORDER: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe,
    0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];

/// Elliptic curve used for signing and all intermediate constructions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Curve {
    /// SEC 2 secp256k1, as used by Bitcoin and Ethereum
    Secp256k1,
}

impl Curve {
    /// Cardinality `q` of the curve group
    pub fn order(&self) -> BigUint {
        match self {
            Curve::Secp256k1 => BigUint::from_bytes_be(&SECP256K1_ORDER),
        }
    }

    /// Bit length of the curve order
    pub fn bit_length(&self) -> u64 {
        match self {
            Curve::Secp256k1 => 256,
        }
    }

    /// `g^k` for an arbitrary non-negative integer `k`
    pub fn scalar_base_mult(&self, k: &BigUint) -> ProjectivePoint {
        ProjectivePoint::GENERATOR * scalar_from_biguint(k)
    }

    /// `point^k` for an arbitrary non-negative integer `k`
    pub fn scalar_mult(&self, point: &ProjectivePoint, k: &BigUint) -> ProjectivePoint {
        *point * scalar_from_biguint(k)
    }
}

/// Reduce an integer modulo the curve order into a scalar.
pub fn scalar_from_biguint(value: &BigUint) -> Scalar {
    let reduced = value % Curve::Secp256k1.order();
    let be = reduced.to_bytes_be();

    let mut bytes = [0u8; 32];
    bytes[32 - be.len()..].copy_from_slice(&be);
    <Scalar as Reduce<U256>>::reduce_bytes(&bytes.into())
}

pub fn scalar_to_biguint(scalar: &Scalar) -> BigUint {
    BigUint::from_bytes_be(&scalar.to_bytes())
}

/// Compressed SEC1 encoding; the identity encodes as a single zero byte.
pub fn point_to_bytes(point: &ProjectivePoint) -> Vec<u8> {
    point.to_affine().to_encoded_point(true).as_bytes().to_vec()
}

pub fn point_from_bytes(bytes: &[u8]) -> Option<ProjectivePoint> {
    let encoded = EncodedPoint::from_bytes(bytes).ok()?;
    let affine: Option<AffinePoint> = AffinePoint::from_encoded_point(&encoded).into();
    affine.map(ProjectivePoint::from)
}

/// Affine x coordinate, `None` for the point at infinity.
pub fn point_x(point: &ProjectivePoint) -> Option<BigUint> {
    let encoded = point.to_affine().to_encoded_point(false);
    encoded.x().map(|x| BigUint::from_bytes_be(x))
}

/// Serde adapter storing points as compressed SEC1 bytes
pub mod point_serde {
    use k256::ProjectivePoint;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(point: &ProjectivePoint, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&super::point_to_bytes(point))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<ProjectivePoint, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes: Vec<u8> = Vec::deserialize(deserializer)?;
        super::point_from_bytes(&bytes)
            .ok_or_else(|| serde::de::Error::custom("Invalid curve point"))
    }
}
