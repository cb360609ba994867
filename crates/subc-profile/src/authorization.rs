//! # Authorization Tuples
//!
//! What a subscriber hands the on-chain verifier at subscription time. Each
//! tuple carries raw record bytes and a proof rather than decoded structs,
//! because the verifier recomputes the leaf from exactly these bytes.
//!
//! - [`PlanAuthorization`]: `(provider, referrer, encodedPlan, planMerkleRoot, proof)`.
//! - [`DiscountAuthorization`]: `(identity, encodedDiscount, discountMerkleRoot, proof)`.
//!   `identity` is the discount id for code discounts and the encoded
//!   validator for balance discounts.
//! - [`RootsAuthorization`]: `(nonce, planMerkleRoot, discountMerkleRoot, signature)`.
//!
//! The `verify` methods repeat the verifier's checks locally so a bad tuple
//! is caught before a transaction is sent.

use serde::{Deserialize, Serialize};
use subc_core::{
    decode_discount, decode_plan, Address, Bytes32, DiscountId, DiscountRecord, DiscountType,
    Nonce, PlanRecord,
};
use subc_crypto::{
    discount_leaf, keccak256, keccak256_concat, verify_proof, verify_signer, MerkleProof,
    RecoverableSignature,
};

use crate::discount::{discount_id_for_validator, parse_balance_validator};
use crate::error::ProfileError;

/// The 32-byte message a provider signs to authorize a pair of roots:
/// `keccak256(uint256(nonce) || planRoot || discountRoot)`.
pub fn roots_message(nonce: Nonce, plan_root: &Bytes32, discount_root: &Bytes32) -> Bytes32 {
    Bytes32(keccak256_concat(&[
        &nonce.to_word(),
        plan_root.as_bytes(),
        discount_root.as_bytes(),
    ]))
}

/// Proof that a plan belongs to a provider's committed plan set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanAuthorization {
    /// Provider offering the plan.
    pub provider: Address,
    /// Referrer credited with the subscription, zero when there is none.
    pub referrer: Address,
    /// The 32-byte encoded plan record.
    pub encoded_plan: Bytes32,
    /// Root the proof leads to.
    pub plan_merkle_root: Bytes32,
    /// Sibling hashes, leaf to root.
    pub proof: MerkleProof,
}

impl PlanAuthorization {
    /// Decode the plan and check its proof against `plan_merkle_root`.
    pub fn verify(&self) -> Result<PlanRecord, ProfileError> {
        let plan = decode_plan(self.encoded_plan.as_bytes())?;
        let leaf = Bytes32(keccak256(self.encoded_plan.as_bytes()));
        if !verify_proof(&leaf, &self.proof, &self.plan_merkle_root) {
            return Err(ProfileError::InvalidProof("plan"));
        }
        Ok(plan)
    }
}

/// Proof that a discount belongs to a provider's committed discount set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountAuthorization {
    /// Discount id (code) or encoded balance validator (token balance).
    pub identity: Bytes32,
    /// The 32-byte encoded discount record.
    pub encoded_discount: Bytes32,
    /// Root the proof leads to.
    pub discount_merkle_root: Bytes32,
    /// Sibling hashes, leaf to root.
    pub proof: MerkleProof,
}

impl DiscountAuthorization {
    /// The discount id `identity` stands for, given the record's type.
    pub fn discount_id(&self, discount_type: DiscountType) -> Result<DiscountId, ProfileError> {
        match discount_type {
            DiscountType::Code => Ok(DiscountId(self.identity.0)),
            DiscountType::TokenBalance => {
                let validator = parse_balance_validator(self.identity.as_bytes())?;
                Ok(discount_id_for_validator(&validator))
            }
        }
    }

    /// Decode the discount, derive its id and check the proof against
    /// `discount_merkle_root`.
    pub fn verify(&self) -> Result<(DiscountId, DiscountRecord), ProfileError> {
        let record = decode_discount(self.encoded_discount.as_bytes())?;
        let id = self.discount_id(record.discount_type)?;
        let leaf = discount_leaf(&id, &record)?;
        if !verify_proof(&leaf, &self.proof, &self.discount_merkle_root) {
            return Err(ProfileError::InvalidProof("discount"));
        }
        Ok((id, record))
    }
}

/// A provider's signature over a pair of roots at a nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootsAuthorization {
    /// Publish nonce the roots were signed at.
    pub nonce: Nonce,
    /// Committed plan root.
    pub plan_merkle_root: Bytes32,
    /// Committed discount root.
    pub discount_merkle_root: Bytes32,
    /// Signature over [`roots_message`].
    pub signature: RecoverableSignature,
}

impl RootsAuthorization {
    /// The signed message.
    pub fn message(&self) -> Bytes32 {
        roots_message(self.nonce, &self.plan_merkle_root, &self.discount_merkle_root)
    }

    /// Check that the signature recovers to `provider`.
    pub fn verify(&self, provider: &Address) -> Result<(), ProfileError> {
        verify_signer(self.message().as_bytes(), &self.signature, provider).map_err(|e| {
            ProfileError::SignatureMismatch {
                expected: *provider,
                reason: e.to_string(),
            }
        })
    }

    /// Whether these roots are the ones a plan authorization proves against.
    pub fn covers_plan(&self, plan: &PlanAuthorization) -> bool {
        self.plan_merkle_root == plan.plan_merkle_root
    }

    /// Whether these roots are the ones a discount authorization proves against.
    pub fn covers_discount(&self, discount: &DiscountAuthorization) -> bool {
        self.discount_merkle_root == discount.discount_merkle_root
    }
}
