//! Error types for threshold ECDSA operations

use thiserror::Error;

use crate::SignerId;

/// Result type alias for threshold ECDSA operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during key generation or signing
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid group configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The secure randomness source failed
    #[error("Randomness source failure: {0}")]
    Randomness(String),

    /// Homomorphic encryption or proof construction failed
    #[error("Cryptographic error in {context}: {reason}")]
    Crypto {
        context: &'static str,
        reason: String,
    },

    /// Messages were not received from every group member
    #[error("{what} required from all group members; got {actual}, expected {expected}")]
    IncompleteGroup {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A message failed its commitment or zero-knowledge proof check
    #[error("{what} from signer {sender} rejected")]
    MessageRejected {
        what: &'static str,
        sender: SignerId,
    },

    /// A message from an earlier round has no counterpart from the same sender
    #[error("No matching {what} for signer with ID = {sender}")]
    NoMatchingMessage {
        what: &'static str,
        sender: SignerId,
    },

    /// The same sender appears twice in one round
    #[error("Duplicate {what} from signer with ID = {sender}")]
    DuplicateSender {
        what: &'static str,
        sender: SignerId,
    },

    /// Message digest passed to the last signing round has the wrong length
    #[error("Message hash is required to be exactly 32 bytes and it's {0} bytes")]
    InvalidMessageHash(usize),

    /// Threshold requirements not met
    #[error("Threshold not met: required {required}, got {actual}")]
    ThresholdNotMet { required: usize, actual: usize },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Timeout waiting for message
    #[error("Timeout waiting for {0}")]
    Timeout(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub(crate) fn crypto(context: &'static str, reason: impl ToString) -> Self {
        Error::Crypto {
            context,
            reason: reason.to_string(),
        }
    }

    /// Whether the error means some group member did not take part.
    ///
    /// The orchestrator may wait longer or abandon the session; any other
    /// error means the session is unusable.
    pub fn is_attendance_failure(&self) -> bool {
        matches!(
            self,
            Error::IncompleteGroup { .. } | Error::ThresholdNotMet { .. } | Error::Timeout(_)
        )
    }

    /// Whether the error was caused by a malformed or dishonest message.
    pub fn is_validation_failure(&self) -> bool {
        matches!(
            self,
            Error::MessageRejected { .. }
                | Error::NoMatchingMessage { .. }
                | Error::DuplicateSender { .. }
        )
    }
}

impl From<rand_core::Error> for Error {
    fn from(e: rand_core::Error) -> Self {
        Error::Randomness(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
