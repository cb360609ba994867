//! # Discount Identity
//!
//! A discount's id is derived from what the subscriber presents, so
//! consumers can find it without asking the provider:
//!
//! - **Code**: `keccak256(uppercase(code))`. Codes are case-insensitive;
//!   `"Summer20"` and `"SUMMER20"` are the same discount.
//! - **Token balance**: `keccak256(encode_balance_validator(v))`.
//!
//! The two kinds are deliberately asymmetric. A code id is a one-way hash
//! of the code, so the verifier must be handed the id. A balance id hashes
//! self-describing bytes, so the authorization carries the 32 validator
//! bytes themselves and the verifier both parses the rule from them and
//! re-derives the id.

use subc_core::{
    encode_balance_validator, Address, BalanceValidator, CodecError, DiscountId, DiscountType,
};
use subc_crypto::keccak256;

use crate::error::ProfileError;

/// Id of a code discount.
pub fn discount_id_for_code(code: &str) -> Result<DiscountId, ProfileError> {
    let normalized = normalize_code(code)?;
    Ok(DiscountId(keccak256(normalized.as_bytes())))
}

/// Id of a token-balance discount.
pub fn discount_id_for_balance(token: Address, decimals: u8, min_balance: u64) -> DiscountId {
    discount_id_for_validator(&BalanceValidator {
        token,
        decimals,
        min_balance,
    })
}

/// Id of a token-balance discount from its validator.
pub fn discount_id_for_validator(validator: &BalanceValidator) -> DiscountId {
    DiscountId(keccak256(&encode_balance_validator(validator)))
}

/// Decode the validator carried in a balance-discount authorization.
pub fn parse_balance_validator(bytes: &[u8]) -> Result<BalanceValidator, CodecError> {
    subc_core::decode_balance_validator(bytes)
}

fn normalize_code(code: &str) -> Result<String, ProfileError> {
    if code.is_empty() {
        return Err(ProfileError::InvalidDiscountCode(
            "code must not be empty".into(),
        ));
    }
    Ok(code.to_uppercase())
}

/// What a discount id was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscountIdentity {
    /// An upper-cased discount code.
    Code(String),
    /// A minimum token balance.
    Balance(BalanceValidator),
}

impl DiscountIdentity {
    /// A code identity. The code is upper-cased; empty codes are rejected.
    pub fn code(code: &str) -> Result<Self, ProfileError> {
        normalize_code(code).map(Self::Code)
    }

    /// A token-balance identity.
    pub fn balance(token: Address, decimals: u8, min_balance: u64) -> Self {
        Self::Balance(BalanceValidator {
            token,
            decimals,
            min_balance,
        })
    }

    /// The derived discount id.
    pub fn discount_id(&self) -> DiscountId {
        match self {
            Self::Code(code) => DiscountId(keccak256(code.to_uppercase().as_bytes())),
            Self::Balance(validator) => discount_id_for_validator(validator),
        }
    }

    /// The record type this identity must be stored with.
    pub fn discount_type(&self) -> DiscountType {
        match self {
            Self::Code(_) => DiscountType::Code,
            Self::Balance(_) => DiscountType::TokenBalance,
        }
    }

    /// The validator behind a balance identity.
    pub fn validator(&self) -> Option<&BalanceValidator> {
        match self {
            Self::Code(_) => None,
            Self::Balance(validator) => Some(validator),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_case_normalized() {
        assert_eq!(
            discount_id_for_code("abc").unwrap(),
            discount_id_for_code("ABC").unwrap()
        );
        assert_eq!(
            discount_id_for_code("Summer20").unwrap(),
            discount_id_for_code("SUMMER20").unwrap()
        );
    }

    #[test]
    fn test_code_vector() {
        assert_eq!(
            discount_id_for_code("summer20").unwrap().to_hex(),
            "0xd410744548de52000e58d43d23726adf61e5aee1190e043c583929f9f4840dae"
        );
    }

    #[test]
    fn test_distinct_codes_distinct_ids() {
        assert_ne!(
            discount_id_for_code("SUMMER20").unwrap(),
            discount_id_for_code("SUMMER21").unwrap()
        );
    }

    #[test]
    fn test_empty_code_rejected() {
        assert!(matches!(
            discount_id_for_code(""),
            Err(ProfileError::InvalidDiscountCode(_))
        ));
        assert!(DiscountIdentity::code("").is_err());
    }

    #[test]
    fn test_non_ascii_code_uppercased() {
        assert_eq!(
            discount_id_for_code("straße").unwrap(),
            discount_id_for_code("STRASSE").unwrap()
        );
    }

    #[test]
    fn test_balance_vector() {
        let id = discount_id_for_balance(Address::from_bytes([0x11; 20]), 6, 1_000_000);
        assert_eq!(
            id.to_hex(),
            "0xee6751a8049e73cb73a28b2eb7c23b1b50f501443b08e477809210878451fb3d"
        );
    }

    #[test]
    fn test_balance_id_depends_on_every_field() {
        let token = Address::from_bytes([0x11; 20]);
        let base = discount_id_for_balance(token, 6, 1_000_000);
        assert_ne!(base, discount_id_for_balance(token, 18, 1_000_000));
        assert_ne!(base, discount_id_for_balance(token, 6, 1_000_001));
        assert_ne!(
            base,
            discount_id_for_balance(Address::from_bytes([0x12; 20]), 6, 1_000_000)
        );
    }

    #[test]
    fn test_parse_validator_round_trip() {
        let validator = BalanceValidator {
            token: Address::from_bytes([0xab; 20]),
            decimals: BalanceValidator::QUERY_DECIMALS,
            min_balance: 1,
        };
        let bytes = encode_balance_validator(&validator);
        let parsed = parse_balance_validator(&bytes).unwrap();
        assert_eq!(parsed, validator);
        assert!(parsed.queries_decimals());
    }

    #[test]
    fn test_parse_validator_wrong_length() {
        assert!(matches!(
            parse_balance_validator(&[0u8; 31]),
            Err(CodecError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_identity_matches_free_functions() {
        let code = DiscountIdentity::code("welcome").unwrap();
        assert_eq!(code, DiscountIdentity::Code("WELCOME".into()));
        assert_eq!(code.discount_id(), discount_id_for_code("WELCOME").unwrap());
        assert_eq!(code.discount_type(), DiscountType::Code);
        assert!(code.validator().is_none());

        let token = Address::from_bytes([0x22; 20]);
        let balance = DiscountIdentity::balance(token, 0, 1);
        assert_eq!(balance.discount_id(), discount_id_for_balance(token, 0, 1));
        assert_eq!(balance.discount_type(), DiscountType::TokenBalance);
    }
}
