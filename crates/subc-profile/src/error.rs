//! # Profile Errors
//!
//! Every failure a provider or consumer can hit while editing, signing,
//! publishing, loading or pricing against a profile. All variants are
//! recoverable; none of them is retried internally.
//!
//! `StaleNonce` in particular is never corrected automatically. It means the
//! caller signed or published out of order and must re-sequence its
//! edit / increment / sign / publish calls.

use subc_core::{
    Address, Bytes32, CanonicalizationError, CodecError, CommitmentError, CryptoError, DiscountId,
    DiscountType, Nonce, PlanId,
};
use subc_crypto::StoreError;
use thiserror::Error;

/// Errors from profile operations.
#[derive(Error, Debug)]
pub enum ProfileError {
    /// No plan with this id in the profile.
    #[error("unknown plan {0}")]
    UnknownPlan(PlanId),

    /// No discount with this id in the profile.
    #[error("unknown discount {0}")]
    UnknownDiscount(DiscountId),

    /// Signing or publishing at or behind the already-published nonce.
    #[error(
        "stale nonce: local nonce {nonce} is not ahead of published nonce {published}; \
         call increment_nonce() after the last edit and sign again"
    )]
    StaleNonce {
        /// The profile's local nonce.
        nonce: Nonce,
        /// The nonce last seen published.
        published: Nonce,
    },

    /// Plans or discounts changed since the roots were last recomputed.
    #[error("merkle roots are stale; call update_merkle_roots() first")]
    StaleRoots,

    /// Publishing or authorizing without a signature over the current roots.
    #[error("roots are not signed at the current nonce")]
    NotSigned,

    /// The nonce cannot be incremented further.
    #[error("nonce overflow")]
    NonceOverflow,

    /// The discount is restricted to a different plan.
    #[error("discount applies only to plan {discount_plan}, not {requested}")]
    DiscountPlanMismatch {
        /// Plan the discount is restricted to.
        discount_plan: u32,
        /// Plan the charge is for.
        requested: PlanId,
    },

    /// The discount's validity window has not opened yet.
    #[error("discount is not valid before {valid_after} (now {now})")]
    DiscountNotYetValid {
        /// Unix seconds the discount becomes valid.
        valid_after: u32,
        /// Current Unix seconds.
        now: i64,
    },

    /// The discount has expired.
    #[error("discount expired at {expires_at} (now {now})")]
    DiscountExpired {
        /// Unix seconds the discount expired.
        expires_at: u32,
        /// Current Unix seconds.
        now: i64,
    },

    /// The discount has been redeemed the maximum number of times.
    #[error("discount exhausted after {max_redemptions} redemptions")]
    DiscountExhausted {
        /// Redemption limit.
        max_redemptions: u32,
    },

    /// A discount record's type does not match the identity it is stored under.
    #[error("discount record has type {actual} but its identity is {expected}")]
    DiscountTypeMismatch {
        /// Type implied by the identity.
        expected: DiscountType,
        /// Type carried by the record.
        actual: DiscountType,
    },

    /// The plan cannot be committed.
    #[error("invalid plan {plan_id}: {reason}")]
    InvalidPlan {
        /// Offending plan id.
        plan_id: u32,
        /// What is wrong with it.
        reason: String,
    },

    /// Discount codes must be non-empty.
    #[error("invalid discount code: {0}")]
    InvalidDiscountCode(String),

    /// The profile document declares a version this crate cannot read.
    #[error("unsupported profile document version {0}")]
    UnsupportedVersion(u32),

    /// A root stored in a document differs from the root recomputed from
    /// its plans or discounts.
    #[error("{which} root mismatch: document says {stored}, entries give {computed}")]
    RootMismatch {
        /// `plan` or `discount`.
        which: &'static str,
        /// Root stored in the document.
        stored: Bytes32,
        /// Root recomputed from the entries.
        computed: Bytes32,
    },

    /// A roots signature does not recover to the provider's address.
    #[error("roots signature does not belong to provider {expected}: {reason}")]
    SignatureMismatch {
        /// Provider address the signature should recover to.
        expected: Address,
        /// Recovered address or recovery failure.
        reason: String,
    },

    /// A Merkle inclusion proof does not reach the claimed root.
    #[error("{0} inclusion proof does not verify against its root")]
    InvalidProof(&'static str),

    /// The profile document is structurally invalid.
    #[error("invalid profile document: {0}")]
    Document(String),

    /// Record encoding or decoding failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A value cannot be canonicalized for publishing.
    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),

    /// Merkle proof construction failed.
    #[error(transparent)]
    Commitment(#[from] CommitmentError),

    /// Signing failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Blob store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}
