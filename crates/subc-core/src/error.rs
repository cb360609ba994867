//! # Error Types — Structured Error Hierarchy
//!
//! Defines the error types shared by every `subc-*` crate. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Codec errors name the record and field that failed, with the declared
//!   width, so a mismatch against the on-chain layout is diagnosable.
//! - Cryptographic errors fail loudly with full context.
//! - Nothing here is fatal: every variant is a recoverable condition that the
//!   caller decides how to handle.

use thiserror::Error;

/// Top-level error type for the commitment stack.
#[derive(Error, Debug)]
pub enum SubcError {
    /// Canonicalization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// Record encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Merkle commitment operation failed.
    #[error("commitment error: {0}")]
    Commitment(#[from] CommitmentError),

    /// Signing or signature recovery failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Value could not be parsed from its textual form.
    #[error("parse error: {0}")]
    Parse(String),
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    /// Amounts must be strings or integers.
    #[error("float values are not permitted in canonical representations; use string or integer for amount: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Error in the fixed-width record codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Input to a decoder had the wrong length, or carried non-zero
    /// reserved bits.
    #[error("malformed {record} record: {reason}")]
    MalformedRecord {
        /// Record kind (`plan`, `discount`, `balance validator`).
        record: &'static str,
        /// What was wrong with the input.
        reason: String,
    },

    /// A field value does not fit its declared byte width.
    #[error("field {field} overflows its {bits}-bit width")]
    FieldOverflow {
        /// Field name as it appears in the record layout.
        field: &'static str,
        /// Declared width in bits.
        bits: u32,
    },

    /// A discount type byte the codec does not recognize.
    #[error("unsupported discount type {0}")]
    UnsupportedDiscountType(u8),
}

/// Error in Merkle commitment operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommitmentError {
    /// A proof was requested for a leaf that is not in the tree.
    #[error("leaf {leaf} is not part of the commitment")]
    LeafNotFound {
        /// Hex rendering of the missing leaf hash.
        leaf: String,
    },
}

/// Error in cryptographic operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// The private key material is malformed or out of range.
    #[error("invalid signing key: {0}")]
    InvalidSigningKey(String),

    /// The signature bytes are malformed.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Public key recovery from a signature failed.
    #[error("signature recovery failed: {0}")]
    RecoveryFailed(String),

    /// No key material is configured for the requested source.
    #[error("signing key not configured: {0}")]
    KeyNotConfigured(String),
}
