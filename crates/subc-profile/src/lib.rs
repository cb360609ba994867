//! # subc-profile — Provider Profiles
//!
//! The mutable aggregate a subscription provider edits and publishes, and
//! the verified view consumers load to build subscription authorizations.
//!
//! ## Modules
//!
//! - `discount`: discount ids derived from codes and token-balance rules.
//! - `profile`: [`ProviderProfile`], its publish cycle and proof queries.
//! - `pricing`: amount due for a plan with an optional discount.
//! - `document`: the version 1 JSON document saved to the blob store.
//! - `authorization`: the plan, discount and roots tuples the on-chain
//!   verifier checks.
//! - `cache`: verified profiles keyed by provider address.
//!
//! ## Publish Cycle
//!
//! ```text
//! set_plan / set_discount ... → update_merkle_roots → increment_nonce
//!     → sign_roots(signer) → publish(store) → cid
//! ```

pub mod authorization;
pub mod cache;
pub mod discount;
pub mod document;
pub mod error;
pub mod pricing;
pub mod profile;

pub use authorization::{
    roots_message, DiscountAuthorization, PlanAuthorization, RootsAuthorization,
};
pub use cache::ProfileCache;
pub use discount::{
    discount_id_for_balance, discount_id_for_code, discount_id_for_validator,
    parse_balance_validator, DiscountIdentity,
};
pub use document::{DiscountEntryDoc, PlanEntry, ProfileDocument, PROFILE_DOCUMENT_VERSION};
pub use error::ProfileError;
pub use pricing::{apply_discount, check_redeemable, ChargeContext, BASIS_POINTS};
pub use profile::{DiscountEntry, ProfileState, ProviderProfile};
