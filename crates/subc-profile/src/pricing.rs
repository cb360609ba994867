//! # Pricing
//!
//! The amount due for one billing period of a plan, with an optional
//! discount applied.
//!
//! A fixed discount subtracts `value` from the price, clamped at zero. A
//! percentage discount reads `value` as basis points:
//! `price * (10000 - min(value, 10000)) / 10000`, rounded down.
//!
//! Before a discount is applied it must be redeemable for this plan at this
//! moment. The checks run in a fixed order and the first failure wins:
//! plan restriction, validity start, expiry, redemption limit.

use subc_core::{DiscountRecord, PlanId, PlanRecord, Timestamp};

use crate::error::ProfileError;

/// Denominator for percentage discounts.
pub const BASIS_POINTS: u128 = 10_000;

/// Inputs to pricing that live outside the profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChargeContext {
    /// Time of the charge.
    pub now: Timestamp,
    /// Times the discount has already been redeemed, as known on chain.
    pub redemptions: u32,
}

impl ChargeContext {
    /// A context at `now` with no prior redemptions.
    pub fn new(now: Timestamp) -> Self {
        Self {
            now,
            redemptions: 0,
        }
    }

    /// Set the prior redemption count.
    pub fn with_redemptions(mut self, redemptions: u32) -> Self {
        self.redemptions = redemptions;
        self
    }
}

/// Check that `discount` may be redeemed against `plan_id` in `ctx`.
pub fn check_redeemable(
    discount: &DiscountRecord,
    plan_id: PlanId,
    ctx: &ChargeContext,
) -> Result<(), ProfileError> {
    if discount.plan_id != 0 && discount.plan_id != plan_id.get() {
        return Err(ProfileError::DiscountPlanMismatch {
            discount_plan: discount.plan_id,
            requested: plan_id,
        });
    }
    let now = ctx.now.epoch_secs();
    if now < i64::from(discount.valid_after) {
        return Err(ProfileError::DiscountNotYetValid {
            valid_after: discount.valid_after,
            now,
        });
    }
    if discount.expires_at != 0 && now >= i64::from(discount.expires_at) {
        return Err(ProfileError::DiscountExpired {
            expires_at: discount.expires_at,
            now,
        });
    }
    if discount.max_redemptions != 0 && ctx.redemptions >= discount.max_redemptions {
        return Err(ProfileError::DiscountExhausted {
            max_redemptions: discount.max_redemptions,
        });
    }
    Ok(())
}

/// Apply `discount` to `price` without redeemability checks.
pub fn apply_discount(price: u128, discount: &DiscountRecord) -> u128 {
    if discount.is_fixed {
        price.saturating_sub(discount.value)
    } else {
        let bps = discount.value.min(BASIS_POINTS);
        // price < 2^96, so the product stays well inside u128.
        price * (BASIS_POINTS - bps) / BASIS_POINTS
    }
}

/// Amount due for one period of `plan`, after `discount` if given.
pub fn due_now(
    plan: &PlanRecord,
    discount: Option<&DiscountRecord>,
    ctx: &ChargeContext,
) -> Result<u128, ProfileError> {
    match discount {
        None => Ok(plan.price),
        Some(discount) => {
            check_redeemable(discount, PlanId(plan.plan_id), ctx)?;
            Ok(apply_discount(plan.price, discount))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use subc_core::DiscountType;

    fn plan(price: u128) -> PlanRecord {
        PlanRecord {
            plan_id: 7,
            price,
            period: 2_592_000,
            free_trial: 0,
            max_active: 0,
            min_periods: 0,
            grace_period: 0,
            can_pause: false,
            can_transfer: false,
        }
    }

    fn discount(value: u128, is_fixed: bool) -> DiscountRecord {
        DiscountRecord {
            value,
            valid_after: 0,
            expires_at: 0,
            max_redemptions: 0,
            plan_id: 0,
            apply_periods: 1,
            is_fixed,
            discount_type: DiscountType::Code,
        }
    }

    fn ctx_at(secs: i64) -> ChargeContext {
        ChargeContext::new(Timestamp::from_epoch_secs(secs).unwrap())
    }

    #[test]
    fn test_percentage_fixed_and_clamped() {
        let ctx = ctx_at(1_700_000_000);
        let p = plan(1000);
        assert_eq!(due_now(&p, Some(&discount(2000, false)), &ctx).unwrap(), 800);
        assert_eq!(due_now(&p, Some(&discount(300, true)), &ctx).unwrap(), 700);
        assert_eq!(due_now(&p, Some(&discount(5000, true)), &ctx).unwrap(), 0);
    }

    #[test]
    fn test_no_discount_is_full_price() {
        assert_eq!(due_now(&plan(1045), None, &ctx_at(0)).unwrap(), 1045);
    }

    #[test]
    fn test_percentage_over_full_clamps_to_zero() {
        assert_eq!(apply_discount(1000, &discount(10_000, false)), 0);
        assert_eq!(apply_discount(1000, &discount(65_535, false)), 0);
    }

    #[test]
    fn test_percentage_floors() {
        // 33.33% of 10 = 3.333; due = floor(6.667) = 6.
        assert_eq!(apply_discount(10, &discount(3333, false)), 6);
    }

    #[test]
    fn test_plan_restriction() {
        let mut d = discount(100, true);
        d.plan_id = 8;
        assert!(matches!(
            due_now(&plan(1000), Some(&d), &ctx_at(0)),
            Err(ProfileError::DiscountPlanMismatch { discount_plan: 8, .. })
        ));
        d.plan_id = 7;
        assert_eq!(due_now(&plan(1000), Some(&d), &ctx_at(0)).unwrap(), 900);
    }

    #[test]
    fn test_validity_window() {
        let mut d = discount(100, true);
        d.valid_after = 1_000;
        d.expires_at = 2_000;
        let p = plan(1000);
        assert!(matches!(
            due_now(&p, Some(&d), &ctx_at(999)),
            Err(ProfileError::DiscountNotYetValid { .. })
        ));
        assert_eq!(due_now(&p, Some(&d), &ctx_at(1_000)).unwrap(), 900);
        assert_eq!(due_now(&p, Some(&d), &ctx_at(1_999)).unwrap(), 900);
        assert!(matches!(
            due_now(&p, Some(&d), &ctx_at(2_000)),
            Err(ProfileError::DiscountExpired { .. })
        ));
    }

    #[test]
    fn test_redemption_limit() {
        let mut d = discount(100, true);
        d.max_redemptions = 3;
        let p = plan(1000);
        let ctx = ctx_at(0).with_redemptions(2);
        assert_eq!(due_now(&p, Some(&d), &ctx).unwrap(), 900);
        assert!(matches!(
            due_now(&p, Some(&d), &ctx.with_redemptions(3)),
            Err(ProfileError::DiscountExhausted { max_redemptions: 3 })
        ));
    }

    #[test]
    fn test_plan_mismatch_reported_before_expiry() {
        let mut d = discount(100, true);
        d.plan_id = 99;
        d.expires_at = 1;
        assert!(matches!(
            due_now(&plan(1000), Some(&d), &ctx_at(10)),
            Err(ProfileError::DiscountPlanMismatch { .. })
        ));
    }
}
