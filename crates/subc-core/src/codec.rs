//! # Record Codec — Fixed-Width Binary Layouts
//!
//! Deterministic 32-byte encodings of plan, discount and balance-validator
//! records. The on-chain verifier recomputes these bytes independently, so
//! the layouts below are a wire contract and must match it byte for byte.
//!
//! ## Encoding Rule
//!
//! Each field is zero-padded on the left to its declared width; fields are
//! concatenated big-endian in declared order.
//!
//! ```text
//! plan      price:12 | planId:4 | period:4 | freeTrial:4 | maxActive:4 | minPeriods:2 | gracePeriod:1 | options:1
//! discount  value:12 | validAfter:4 | expiresAt:4 | maxRedemptions:4 | planId:4 | applyPeriods:2 | options:1 | discountType:1
//! balance   token:20 | decimals:1 | reserved:3 | minBalance:8
//! ```
//!
//! Plan options: bit0 `canPause`, bit1 `canTransfer`. Discount options:
//! bit0 `isFixed`. All other option bits and the balance validator's
//! reserved bytes are zero; decoders reject anything else.
//!
//! ## Overflow
//!
//! Encoders never truncate. A value wider than its slot fails with
//! [`CodecError::FieldOverflow`]. Values arriving from wider representations
//! (JSON documents, user input) are narrowed with [`narrow`] at the same
//! boundary.

use crate::error::CodecError;
use crate::identity::Address;

/// Byte length of every encoded record.
pub const RECORD_LEN: usize = 32;

/// Largest value representable in a 96-bit slot (`price`, `value`).
pub const U96_MAX: u128 = (1u128 << 96) - 1;

const PLAN_CAN_PAUSE: u8 = 0b0000_0001;
const PLAN_CAN_TRANSFER: u8 = 0b0000_0010;
const DISCOUNT_IS_FIXED: u8 = 0b0000_0001;

// ---------------------------------------------------------------------------
// Record types
// ---------------------------------------------------------------------------

/// Terms of one subscription plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlanRecord {
    /// Provider-chosen identifier.
    pub plan_id: u32,
    /// Price per period in token base units (96-bit).
    pub price: u128,
    /// Billing period in seconds.
    pub period: u32,
    /// Free trial length in seconds.
    pub free_trial: u32,
    /// Maximum concurrently active subscriptions (0 = unlimited).
    pub max_active: u32,
    /// Minimum number of periods a subscriber commits to.
    pub min_periods: u16,
    /// Grace period in days after a missed payment.
    pub grace_period: u8,
    /// Subscribers may pause.
    pub can_pause: bool,
    /// Subscriptions may be transferred.
    pub can_transfer: bool,
}

/// How a discount identity is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum DiscountType {
    /// Human-entered discount code.
    Code = 1,
    /// Minimum ERC20/NFT token balance held by the subscriber.
    TokenBalance = 2,
}

impl DiscountType {
    /// The wire byte for this type.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for DiscountType {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Code),
            2 => Ok(Self::TokenBalance),
            other => Err(CodecError::UnsupportedDiscountType(other)),
        }
    }
}

impl std::fmt::Display for DiscountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Code => f.write_str("code"),
            Self::TokenBalance => f.write_str("token-balance"),
        }
    }
}

/// Terms of one discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiscountRecord {
    /// Fixed amount in token base units, or basis points when not fixed.
    pub value: u128,
    /// Unix seconds before which the discount cannot be redeemed.
    pub valid_after: u32,
    /// Unix seconds at which the discount expires (0 = never).
    pub expires_at: u32,
    /// Maximum redemptions (0 = unlimited).
    pub max_redemptions: u32,
    /// Plan the discount is restricted to (0 = any plan).
    pub plan_id: u32,
    /// Number of billing periods the discount applies to.
    pub apply_periods: u16,
    /// `value` is a fixed amount rather than basis points.
    pub is_fixed: bool,
    /// How the discount id was derived.
    pub discount_type: DiscountType,
}

/// Token-balance rule behind a [`DiscountType::TokenBalance`] discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BalanceValidator {
    /// ERC20 or NFT contract address.
    pub token: Address,
    /// Token decimals, or [`BalanceValidator::QUERY_DECIMALS`].
    pub decimals: u8,
    /// Minimum balance, scaled by `decimals`.
    pub min_balance: u64,
}

impl BalanceValidator {
    /// Sentinel: the verifier queries the token contract for its decimals.
    pub const QUERY_DECIMALS: u8 = 255;

    /// Whether decimals must be looked up on the token contract.
    pub fn queries_decimals(&self) -> bool {
        self.decimals == Self::QUERY_DECIMALS
    }
}

// ---------------------------------------------------------------------------
// Width helpers
// ---------------------------------------------------------------------------

/// Narrow a wide integer into the field type `T`, failing with
/// `FieldOverflow` instead of truncating.
pub fn narrow<T>(field: &'static str, value: u128) -> Result<T, CodecError>
where
    T: TryFrom<u128>,
{
    T::try_from(value).map_err(|_| CodecError::FieldOverflow {
        field,
        bits: (std::mem::size_of::<T>() * 8) as u32,
    })
}

/// Check that `value` fits a 96-bit slot.
pub fn check_u96(field: &'static str, value: u128) -> Result<u128, CodecError> {
    if value > U96_MAX {
        return Err(CodecError::FieldOverflow { field, bits: 96 });
    }
    Ok(value)
}

struct FieldWriter {
    buf: [u8; RECORD_LEN],
    pos: usize,
}

impl FieldWriter {
    fn new() -> Self {
        Self {
            buf: [0u8; RECORD_LEN],
            pos: 0,
        }
    }

    fn put_uint(&mut self, field: &'static str, value: u128, width: usize) -> Result<(), CodecError> {
        let bits = (width * 8) as u32;
        if bits < 128 && value >> bits != 0 {
            return Err(CodecError::FieldOverflow { field, bits });
        }
        let be = value.to_be_bytes();
        self.buf[self.pos..self.pos + width].copy_from_slice(&be[16 - width..]);
        self.pos += width;
        Ok(())
    }

    fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    fn finish(self) -> [u8; RECORD_LEN] {
        debug_assert_eq!(self.pos, RECORD_LEN);
        self.buf
    }
}

struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn new(record: &'static str, buf: &'a [u8]) -> Result<Self, CodecError> {
        if buf.len() != RECORD_LEN {
            return Err(CodecError::MalformedRecord {
                record,
                reason: format!("expected {RECORD_LEN} bytes, got {}", buf.len()),
            });
        }
        Ok(Self { buf, pos: 0 })
    }

    fn take_uint(&mut self, width: usize) -> u128 {
        let mut be = [0u8; 16];
        be[16 - width..].copy_from_slice(&self.buf[self.pos..self.pos + width]);
        self.pos += width;
        u128::from_be_bytes(be)
    }

    fn take_bytes(&mut self, width: usize) -> &'a [u8] {
        let out = &self.buf[self.pos..self.pos + width];
        self.pos += width;
        out
    }
}

// Reads below never fail: the slot width equals the target type width.
fn as_u32(v: u128) -> u32 {
    v as u32
}

fn as_u16(v: u128) -> u16 {
    v as u16
}

fn as_u8(v: u128) -> u8 {
    v as u8
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// Encode a plan into its 32-byte layout.
pub fn encode_plan(plan: &PlanRecord) -> Result<[u8; RECORD_LEN], CodecError> {
    let mut options = 0u8;
    if plan.can_pause {
        options |= PLAN_CAN_PAUSE;
    }
    if plan.can_transfer {
        options |= PLAN_CAN_TRANSFER;
    }

    let mut w = FieldWriter::new();
    w.put_uint("price", plan.price, 12)?;
    w.put_uint("planId", plan.plan_id.into(), 4)?;
    w.put_uint("period", plan.period.into(), 4)?;
    w.put_uint("freeTrial", plan.free_trial.into(), 4)?;
    w.put_uint("maxActive", plan.max_active.into(), 4)?;
    w.put_uint("minPeriods", plan.min_periods.into(), 2)?;
    w.put_uint("gracePeriod", plan.grace_period.into(), 1)?;
    w.put_uint("options", options.into(), 1)?;
    Ok(w.finish())
}

/// Decode a plan from its 32-byte layout.
pub fn decode_plan(bytes: &[u8]) -> Result<PlanRecord, CodecError> {
    let mut r = FieldReader::new("plan", bytes)?;
    let price = r.take_uint(12);
    let plan_id = as_u32(r.take_uint(4));
    let period = as_u32(r.take_uint(4));
    let free_trial = as_u32(r.take_uint(4));
    let max_active = as_u32(r.take_uint(4));
    let min_periods = as_u16(r.take_uint(2));
    let grace_period = as_u8(r.take_uint(1));
    let options = as_u8(r.take_uint(1));

    if options & !(PLAN_CAN_PAUSE | PLAN_CAN_TRANSFER) != 0 {
        return Err(CodecError::MalformedRecord {
            record: "plan",
            reason: format!("unknown option bits {options:#010b}"),
        });
    }

    Ok(PlanRecord {
        plan_id,
        price,
        period,
        free_trial,
        max_active,
        min_periods,
        grace_period,
        can_pause: options & PLAN_CAN_PAUSE != 0,
        can_transfer: options & PLAN_CAN_TRANSFER != 0,
    })
}

// ---------------------------------------------------------------------------
// Discount
// ---------------------------------------------------------------------------

/// Encode a discount into its 32-byte layout.
pub fn encode_discount(discount: &DiscountRecord) -> Result<[u8; RECORD_LEN], CodecError> {
    let options = if discount.is_fixed { DISCOUNT_IS_FIXED } else { 0 };

    let mut w = FieldWriter::new();
    w.put_uint("value", discount.value, 12)?;
    w.put_uint("validAfter", discount.valid_after.into(), 4)?;
    w.put_uint("expiresAt", discount.expires_at.into(), 4)?;
    w.put_uint("maxRedemptions", discount.max_redemptions.into(), 4)?;
    w.put_uint("planId", discount.plan_id.into(), 4)?;
    w.put_uint("applyPeriods", discount.apply_periods.into(), 2)?;
    w.put_uint("options", options.into(), 1)?;
    w.put_uint("discountType", discount.discount_type.as_u8().into(), 1)?;
    Ok(w.finish())
}

/// Decode a discount from its 32-byte layout.
pub fn decode_discount(bytes: &[u8]) -> Result<DiscountRecord, CodecError> {
    let mut r = FieldReader::new("discount", bytes)?;
    let value = r.take_uint(12);
    let valid_after = as_u32(r.take_uint(4));
    let expires_at = as_u32(r.take_uint(4));
    let max_redemptions = as_u32(r.take_uint(4));
    let plan_id = as_u32(r.take_uint(4));
    let apply_periods = as_u16(r.take_uint(2));
    let options = as_u8(r.take_uint(1));
    let discount_type = DiscountType::try_from(as_u8(r.take_uint(1)))?;

    if options & !DISCOUNT_IS_FIXED != 0 {
        return Err(CodecError::MalformedRecord {
            record: "discount",
            reason: format!("unknown option bits {options:#010b}"),
        });
    }

    Ok(DiscountRecord {
        value,
        valid_after,
        expires_at,
        max_redemptions,
        plan_id,
        apply_periods,
        is_fixed: options & DISCOUNT_IS_FIXED != 0,
        discount_type,
    })
}

// ---------------------------------------------------------------------------
// Balance validator
// ---------------------------------------------------------------------------

/// Encode a balance validator into its 32-byte layout.
pub fn encode_balance_validator(validator: &BalanceValidator) -> [u8; RECORD_LEN] {
    let mut w = FieldWriter::new();
    w.put_bytes(validator.token.as_bytes());
    w.put_bytes(&[validator.decimals]);
    w.put_bytes(&[0u8; 3]);
    w.put_bytes(&validator.min_balance.to_be_bytes());
    w.finish()
}

/// Decode a balance validator from its 32-byte layout.
pub fn decode_balance_validator(bytes: &[u8]) -> Result<BalanceValidator, CodecError> {
    let mut r = FieldReader::new("balance validator", bytes)?;
    let mut token = [0u8; 20];
    token.copy_from_slice(r.take_bytes(20));
    let decimals = as_u8(r.take_uint(1));
    if r.take_bytes(3).iter().any(|b| *b != 0) {
        return Err(CodecError::MalformedRecord {
            record: "balance validator",
            reason: "reserved bytes must be zero".to_string(),
        });
    }
    let min_balance = r.take_uint(8) as u64;

    Ok(BalanceValidator {
        token: Address::from_bytes(token),
        decimals,
        min_balance,
    })
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn plan_strategy() -> impl Strategy<Value = PlanRecord> {
        (
            (any::<u32>(), 0..=U96_MAX, any::<u32>(), any::<u32>(), any::<u32>()),
            (any::<u16>(), any::<u8>(), any::<bool>(), any::<bool>()),
        )
            .prop_map(
                |((plan_id, price, period, free_trial, max_active), (min_periods, grace_period, can_pause, can_transfer))| {
                    PlanRecord {
                        plan_id,
                        price,
                        period,
                        free_trial,
                        max_active,
                        min_periods,
                        grace_period,
                        can_pause,
                        can_transfer,
                    }
                },
            )
    }

    fn discount_strategy() -> impl Strategy<Value = DiscountRecord> {
        (
            (0..=U96_MAX, any::<u32>(), any::<u32>(), any::<u32>(), any::<u32>()),
            (any::<u16>(), any::<bool>(), prop_oneof![Just(DiscountType::Code), Just(DiscountType::TokenBalance)]),
        )
            .prop_map(
                |((value, valid_after, expires_at, max_redemptions, plan_id), (apply_periods, is_fixed, discount_type))| {
                    DiscountRecord {
                        value,
                        valid_after,
                        expires_at,
                        max_redemptions,
                        plan_id,
                        apply_periods,
                        is_fixed,
                        discount_type,
                    }
                },
            )
    }

    proptest! {
        /// Every in-range plan survives encode then decode unchanged.
        #[test]
        fn plan_roundtrip(plan in plan_strategy()) {
            let bytes = encode_plan(&plan).unwrap();
            prop_assert_eq!(decode_plan(&bytes).unwrap(), plan);
        }

        /// Every in-range discount survives encode then decode unchanged.
        #[test]
        fn discount_roundtrip(discount in discount_strategy()) {
            let bytes = encode_discount(&discount).unwrap();
            prop_assert_eq!(decode_discount(&bytes).unwrap(), discount);
        }

        /// Every balance validator survives encode then decode unchanged.
        #[test]
        fn balance_validator_roundtrip(
            token in any::<[u8; 20]>(),
            decimals in any::<u8>(),
            min_balance in any::<u64>(),
        ) {
            let v = BalanceValidator { token: Address::from_bytes(token), decimals, min_balance };
            prop_assert_eq!(decode_balance_validator(&encode_balance_validator(&v)).unwrap(), v);
        }

        /// Prices above 96 bits are always rejected, never truncated.
        #[test]
        fn price_overflow_rejected(price in (U96_MAX + 1)..=u128::MAX) {
            let plan = PlanRecord {
                plan_id: 1, price, period: 1, free_trial: 0, max_active: 0,
                min_periods: 0, grace_period: 0, can_pause: false, can_transfer: false,
            };
            let is_overflow = matches!(encode_plan(&plan), Err(CodecError::FieldOverflow { .. }));
            prop_assert!(is_overflow);
        }
    }
}
