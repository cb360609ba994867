//! # Profile Document (version 1)
//!
//! The JSON object a provider saves to the blob store on publish, and the
//! only thing a consumer needs to rebuild the provider's profile.
//!
//! ```json
//! {
//!   "version": 1,
//!   "address": "0x…", "paymentAddress": "0x…",
//!   "nonce": "4",
//!   "planMerkleRoot": "0x…", "discountMerkleRoot": "0x…",
//!   "signedRoots": "0x…65 bytes…",
//!   "plans": [ { "planId": 100, "price": "1045", "period": 604800, … } ],
//!   "discounts": [ { "discountId": "0x…", "discountType": 1, "value": "2000", … } ],
//!   "metadata": { … },
//!   "updatedAt": "2026-01-15T12:00:00Z"
//! }
//! ```
//!
//! Prices and discount values are decimal strings; they are 96-bit and
//! would lose precision as JSON numbers in other readers. Every other
//! integer is a JSON number read as `u64` and narrowed to its record width,
//! failing with `FieldOverflow` rather than truncating.
//!
//! Code discounts publish only their id. Balance discounts also publish the
//! encoded validator so consumers can build authorizations.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use subc_core::codec::{check_u96, narrow};
use subc_core::{
    decode_balance_validator, encode_balance_validator, Address, BalanceValidator, Bytes32,
    DiscountId, DiscountRecord, DiscountType, Nonce, PlanRecord,
};
use subc_crypto::RecoverableSignature;

use crate::error::ProfileError;

/// The document version this crate writes and reads.
pub const PROFILE_DOCUMENT_VERSION: u32 = 1;

/// A published provider profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDocument {
    /// Document schema version.
    pub version: u32,
    /// Provider (signer) address.
    pub address: Address,
    /// Where subscription payments go.
    pub payment_address: Address,
    /// Publish nonce the roots were signed at.
    pub nonce: Nonce,
    /// Root over the plan leaves.
    pub plan_merkle_root: Bytes32,
    /// Root over the discount leaves.
    pub discount_merkle_root: Bytes32,
    /// Provider signature over the roots at `nonce`.
    pub signed_roots: RecoverableSignature,
    /// Plan terms, ordered by plan id.
    pub plans: Vec<PlanEntry>,
    /// Discount terms, ordered by discount id.
    pub discounts: Vec<DiscountEntryDoc>,
    /// Free-form provider metadata (name, description, links).
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// When the document was written, `YYYY-MM-DDTHH:MM:SSZ`.
    pub updated_at: String,
}

/// One plan in a [`ProfileDocument`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanEntry {
    pub plan_id: u64,
    pub price: String,
    pub period: u64,
    pub free_trial: u64,
    pub max_active: u64,
    pub min_periods: u64,
    pub grace_period: u64,
    pub can_pause: bool,
    pub can_transfer: bool,
}

/// One discount in a [`ProfileDocument`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountEntryDoc {
    pub discount_id: DiscountId,
    pub discount_type: u64,
    pub value: String,
    pub valid_after: u64,
    pub expires_at: u64,
    pub max_redemptions: u64,
    pub plan_id: u64,
    pub apply_periods: u64,
    pub is_fixed: bool,
    /// Encoded balance validator, balance discounts only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<Bytes32>,
}

fn parse_amount(field: &'static str, value: &str) -> Result<u128, ProfileError> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ProfileError::Document(format!(
            "{field} must be a decimal string, got {value:?}"
        )));
    }
    let wide = value
        .parse::<u128>()
        .map_err(|_| subc_core::CodecError::FieldOverflow { field, bits: 96 })?;
    Ok(check_u96(field, wide)?)
}

impl From<&PlanRecord> for PlanEntry {
    fn from(plan: &PlanRecord) -> Self {
        Self {
            plan_id: u64::from(plan.plan_id),
            price: plan.price.to_string(),
            period: u64::from(plan.period),
            free_trial: u64::from(plan.free_trial),
            max_active: u64::from(plan.max_active),
            min_periods: u64::from(plan.min_periods),
            grace_period: u64::from(plan.grace_period),
            can_pause: plan.can_pause,
            can_transfer: plan.can_transfer,
        }
    }
}

impl PlanEntry {
    /// Narrow into a [`PlanRecord`].
    pub fn to_record(&self) -> Result<PlanRecord, ProfileError> {
        Ok(PlanRecord {
            plan_id: narrow("planId", u128::from(self.plan_id))?,
            price: parse_amount("price", &self.price)?,
            period: narrow("period", u128::from(self.period))?,
            free_trial: narrow("freeTrial", u128::from(self.free_trial))?,
            max_active: narrow("maxActive", u128::from(self.max_active))?,
            min_periods: narrow("minPeriods", u128::from(self.min_periods))?,
            grace_period: narrow("gracePeriod", u128::from(self.grace_period))?,
            can_pause: self.can_pause,
            can_transfer: self.can_transfer,
        })
    }
}

impl DiscountEntryDoc {
    /// Build the document form of a stored discount.
    pub fn new(
        id: DiscountId,
        record: &DiscountRecord,
        validator: Option<&BalanceValidator>,
    ) -> Self {
        Self {
            discount_id: id,
            discount_type: u64::from(record.discount_type.as_u8()),
            value: record.value.to_string(),
            valid_after: u64::from(record.valid_after),
            expires_at: u64::from(record.expires_at),
            max_redemptions: u64::from(record.max_redemptions),
            plan_id: u64::from(record.plan_id),
            apply_periods: u64::from(record.apply_periods),
            is_fixed: record.is_fixed,
            validator: validator.map(|v| Bytes32(encode_balance_validator(v))),
        }
    }

    /// Narrow into a [`DiscountRecord`].
    pub fn to_record(&self) -> Result<DiscountRecord, ProfileError> {
        let type_byte: u8 = narrow("discountType", u128::from(self.discount_type))?;
        Ok(DiscountRecord {
            value: parse_amount("value", &self.value)?,
            valid_after: narrow("validAfter", u128::from(self.valid_after))?,
            expires_at: narrow("expiresAt", u128::from(self.expires_at))?,
            max_redemptions: narrow("maxRedemptions", u128::from(self.max_redemptions))?,
            plan_id: narrow("planId", u128::from(self.plan_id))?,
            apply_periods: narrow("applyPeriods", u128::from(self.apply_periods))?,
            is_fixed: self.is_fixed,
            discount_type: DiscountType::try_from(type_byte)?,
        })
    }

    /// Decode the validator of a balance discount. Code discounts must not
    /// carry one and balance discounts must.
    pub fn to_validator(
        &self,
        discount_type: DiscountType,
    ) -> Result<Option<BalanceValidator>, ProfileError> {
        match (discount_type, &self.validator) {
            (DiscountType::Code, None) => Ok(None),
            (DiscountType::TokenBalance, Some(bytes)) => {
                Ok(Some(decode_balance_validator(bytes.as_bytes())?))
            }
            (DiscountType::Code, Some(_)) => Err(ProfileError::Document(format!(
                "code discount {} carries a validator",
                self.discount_id
            ))),
            (DiscountType::TokenBalance, None) => Err(ProfileError::Document(format!(
                "balance discount {} is missing its validator",
                self.discount_id
            ))),
        }
    }
}

impl ProfileDocument {
    /// Parse a document from a blob store value, checking its version.
    pub fn from_value(value: Value) -> Result<Self, ProfileError> {
        let version = value
            .get("version")
            .and_then(Value::as_u64)
            .ok_or_else(|| ProfileError::Document("missing numeric version".into()))?;
        if version != u64::from(PROFILE_DOCUMENT_VERSION) {
            return Err(ProfileError::UnsupportedVersion(
                u32::try_from(version).unwrap_or(u32::MAX),
            ));
        }
        serde_json::from_value(value).map_err(|e| ProfileError::Document(e.to_string()))
    }

    /// Serialize for the blob store.
    pub fn to_value(&self) -> Result<Value, ProfileError> {
        serde_json::to_value(self).map_err(|e| ProfileError::Document(e.to_string()))
    }
}
