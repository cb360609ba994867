//! # subc-core — Foundational Types for Subscription Commitments
//!
//! The leaf of the `subc-*` crate DAG. Defines the fixed-width record codec
//! that the on-chain verifier recomputes, the identifier newtypes, and the
//! canonical serialization used to content-address profile documents.
//!
//! ## Key Design Principles
//!
//! 1. **Byte layouts are a wire contract.** `codec` encodes plans, discounts
//!    and balance validators into exactly 32 bytes, big-endian, left-padded.
//!    Encoders fail with `FieldOverflow` rather than truncate.
//!
//! 2. **Newtypes for identifiers.** `PlanId`, `DiscountId`, `Address`,
//!    `Bytes32`, `Nonce` — no bare integers or byte arrays crossing APIs.
//!
//! 3. **`CanonicalBytes` for content ids.** Documents saved to a blob store
//!    are addressed by the digest of their JCS bytes.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `subc-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod codec;
pub mod digest;
pub mod error;
pub mod hex;
pub mod identity;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use canonical::{reject_floats, CanonicalBytes};
pub use codec::{
    decode_balance_validator, decode_discount, decode_plan, encode_balance_validator,
    encode_discount, encode_plan, BalanceValidator, DiscountRecord, DiscountType, PlanRecord,
    RECORD_LEN, U96_MAX,
};
pub use digest::{sha256_digest, ContentDigest, ContentId};
pub use error::{CanonicalizationError, CodecError, CommitmentError, CryptoError, SubcError};
pub use identity::{Address, Bytes32, DiscountId, Nonce, PlanId};
pub use temporal::Timestamp;
