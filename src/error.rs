//! Error types for pre-signing and compilation

use thiserror::Error;

use crate::types::OutPoint;

#[derive(Error, Debug)]
pub enum SigningError {
    #[error("Malformed encoding: {0}")]
    MalformedEncoding(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Transaction has no inputs")]
    EmptyInputs,

    #[error("Transaction has no outputs")]
    EmptyOutputs,

    #[error("Total output value overflows 64 bits")]
    ValueOverflow,

    #[error("Unknown sighash flag: {0:#x}")]
    UnknownSighashFlag(u32),

    #[error("Missing value commitment for claim {0}")]
    MissingValueCommitment(OutPoint),

    #[error("No claims supplied")]
    NoClaims,

    #[error("Claim {index} ({claim}) could not be resolved: {source}")]
    ClaimResolutionFailed {
        index: usize,
        claim: OutPoint,
        #[source]
        source: Box<SigningError>,
    },

    #[error("Signature count mismatch: expected {expected}, got {actual}")]
    SignatureCountMismatch { expected: usize, actual: usize },

    #[error("Claim {0} does not correspond to any input")]
    UnresolvedClaim(OutPoint),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SigningError {
    /// Stable name of the variant, used in boundary responses.
    pub fn kind(&self) -> &'static str {
        match self {
            SigningError::MalformedEncoding(_) => "MalformedEncoding",
            SigningError::InvalidParameters(_) => "InvalidParameters",
            SigningError::EmptyInputs => "EmptyInputs",
            SigningError::EmptyOutputs => "EmptyOutputs",
            SigningError::ValueOverflow => "ValueOverflow",
            SigningError::UnknownSighashFlag(_) => "UnknownSighashFlag",
            SigningError::MissingValueCommitment(_) => "MissingValueCommitment",
            SigningError::NoClaims => "NoClaims",
            SigningError::ClaimResolutionFailed { .. } => "ClaimResolutionFailed",
            SigningError::SignatureCountMismatch { .. } => "SignatureCountMismatch",
            SigningError::UnresolvedClaim(_) => "UnresolvedClaim",
            SigningError::InvalidSignature(_) => "InvalidSignature",
            SigningError::Serialization(_) => "Serialization",
        }
    }
}

impl From<serde_json::Error> for SigningError {
    fn from(err: serde_json::Error) -> Self {
        SigningError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SigningError>;
