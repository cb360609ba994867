//! # Provider Profile
//!
//! The aggregate a provider edits locally before publishing, and the
//! read-only view a consumer loads to obtain proofs.
//!
//! ## Lifecycle
//!
//! ```text
//! Unpublished ──update_merkle_roots / increment_nonce / sign_roots──▶ Signed
//! Signed ──publish──▶ Published
//! any ──set_* / remove_* / increment_nonce──▶ Unpublished (signature dropped)
//! ```
//!
//! A publish therefore always runs: edits, `update_merkle_roots()`,
//! `increment_nonce()`, `sign_roots(signer)`, `publish(store)`.
//!
//! ## Invariants
//!
//! - A signature, when present, covers the current nonce and the current
//!   roots. Any edit or nonce change drops it.
//! - The roots are a pure function of the plan and discount maps once
//!   `update_merkle_roots()` has run; until then the profile is dirty and
//!   neither signing nor proofs are available.
//! - The nonce only grows. Signing or publishing at or behind the last
//!   published nonce fails with `StaleNonce` and is never corrected here.
//!
//! A profile is plain owned data with `&mut self` mutators and no locking.
//! Sessions that share a provider reload and merge rather than mutate one
//! instance concurrently.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use subc_core::codec::check_u96;
use subc_core::reject_floats;
use subc_core::{
    Address, BalanceValidator, Bytes32, ContentId, DiscountId, DiscountRecord, Nonce, PlanId,
    PlanRecord, Timestamp,
};
use subc_crypto::{
    discount_leaf, plan_leaf, recover_signer, BlobStore, MerkleProof, MerkleTree, Signer,
    EMPTY_ROOT,
};

use crate::authorization::{
    roots_message, DiscountAuthorization, PlanAuthorization, RootsAuthorization,
};
use crate::discount::{discount_id_for_validator, DiscountIdentity};
use crate::document::{DiscountEntryDoc, PlanEntry, ProfileDocument, PROFILE_DOCUMENT_VERSION};
use crate::error::ProfileError;
use crate::pricing::{self, ChargeContext};

/// A stored discount: its terms plus, for balance discounts, the validator
/// its id was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscountEntry {
    /// Discount terms.
    pub record: DiscountRecord,
    /// Balance rule, `None` for code discounts.
    pub validator: Option<BalanceValidator>,
}

impl DiscountEntry {
    /// The 32 bytes a discount authorization carries as identity.
    fn identity_bytes(&self, id: &DiscountId) -> Bytes32 {
        match &self.validator {
            Some(validator) => Bytes32(subc_core::encode_balance_validator(validator)),
            None => Bytes32(id.0),
        }
    }
}

/// Where a profile stands in its publish cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileState {
    /// Local changes are not covered by a signature.
    Unpublished,
    /// Roots are signed at the current nonce but not yet published.
    Signed,
    /// The signed state has been published at the current nonce.
    Published,
}

impl std::fmt::Display for ProfileState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unpublished => f.write_str("unpublished"),
            Self::Signed => f.write_str("signed"),
            Self::Published => f.write_str("published"),
        }
    }
}

/// A provider's plans, discounts and signed commitment to them.
#[derive(Debug, Clone)]
pub struct ProviderProfile {
    address: Address,
    payment_address: Address,
    nonce: Nonce,
    remote_nonce: Option<Nonce>,
    plans: BTreeMap<PlanId, PlanRecord>,
    discounts: BTreeMap<DiscountId, DiscountEntry>,
    plan_merkle_root: Bytes32,
    discount_merkle_root: Bytes32,
    signed_roots: Option<RootsAuthorization>,
    dirty: bool,
    metadata: Map<String, Value>,
}

impl ProviderProfile {
    /// An empty, never-published profile at nonce 0.
    pub fn new(address: Address, payment_address: Address) -> Self {
        Self {
            address,
            payment_address,
            nonce: Nonce::ZERO,
            remote_nonce: None,
            plans: BTreeMap::new(),
            discounts: BTreeMap::new(),
            plan_merkle_root: EMPTY_ROOT,
            discount_merkle_root: EMPTY_ROOT,
            signed_roots: None,
            dirty: false,
            metadata: Map::new(),
        }
    }

    // ── Accessors ───────────────────────────────────────────────────────

    /// Provider (signer) address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Payment recipient.
    pub fn payment_address(&self) -> Address {
        self.payment_address
    }

    /// Local publish nonce.
    pub fn nonce(&self) -> Nonce {
        self.nonce
    }

    /// Nonce last published or loaded, if any.
    pub fn remote_nonce(&self) -> Option<Nonce> {
        self.remote_nonce
    }

    /// Committed plan root as of the last `update_merkle_roots()`.
    pub fn plan_merkle_root(&self) -> Bytes32 {
        self.plan_merkle_root
    }

    /// Committed discount root as of the last `update_merkle_roots()`.
    pub fn discount_merkle_root(&self) -> Bytes32 {
        self.discount_merkle_root
    }

    /// Whether edits happened since the roots were last recomputed.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// All plans, by id.
    pub fn plans(&self) -> &BTreeMap<PlanId, PlanRecord> {
        &self.plans
    }

    /// All discounts, by id.
    pub fn discounts(&self) -> &BTreeMap<DiscountId, DiscountEntry> {
        &self.discounts
    }

    /// Free-form provider metadata.
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// The signature over the current roots, if any.
    pub fn signed_roots(&self) -> Option<&RootsAuthorization> {
        self.signed_roots.as_ref()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProfileState {
        match (&self.signed_roots, self.remote_nonce) {
            (Some(_), Some(remote)) if remote == self.nonce => ProfileState::Published,
            (Some(_), _) => ProfileState::Signed,
            (None, _) => ProfileState::Unpublished,
        }
    }

    // ── Edits ───────────────────────────────────────────────────────────

    fn touch(&mut self) {
        self.dirty = true;
        self.signed_roots = None;
    }

    /// Change where payments go. Takes effect at the next publish.
    pub fn set_payment_address(&mut self, payment_address: Address) {
        self.payment_address = payment_address;
    }

    /// Replace the metadata published with the next document.
    ///
    /// Metadata is canonicalized with the rest of the document, so it may
    /// not contain floats.
    pub fn set_metadata(&mut self, metadata: Map<String, Value>) -> Result<(), ProfileError> {
        metadata.values().try_for_each(reject_floats)?;
        self.metadata = metadata;
        Ok(())
    }

    /// Insert or replace a plan.
    ///
    /// Plan id 0 is reserved (discounts use it for "any plan") and a
    /// zero-length period can never be billed; both are rejected.
    pub fn set_plan(&mut self, plan: PlanRecord) -> Result<(), ProfileError> {
        validate_plan(&plan)?;
        self.plans.insert(PlanId(plan.plan_id), plan);
        self.touch();
        tracing::debug!(plan_id = plan.plan_id, "plan set");
        Ok(())
    }

    /// Remove a plan, returning it.
    pub fn remove_plan(&mut self, plan_id: PlanId) -> Result<PlanRecord, ProfileError> {
        let plan = self
            .plans
            .remove(&plan_id)
            .ok_or(ProfileError::UnknownPlan(plan_id))?;
        self.touch();
        tracing::debug!(plan_id = plan_id.get(), "plan removed");
        Ok(plan)
    }

    /// Insert or replace a discount under the id derived from `identity`.
    pub fn set_discount(
        &mut self,
        identity: &DiscountIdentity,
        record: DiscountRecord,
    ) -> Result<DiscountId, ProfileError> {
        let expected = identity.discount_type();
        if record.discount_type != expected {
            return Err(ProfileError::DiscountTypeMismatch {
                expected,
                actual: record.discount_type,
            });
        }
        if let DiscountIdentity::Code(code) = identity {
            if code.is_empty() {
                return Err(ProfileError::InvalidDiscountCode(
                    "code must not be empty".into(),
                ));
            }
        }
        check_u96("value", record.value)?;
        let id = identity.discount_id();
        self.discounts.insert(
            id,
            DiscountEntry {
                record,
                validator: identity.validator().copied(),
            },
        );
        self.touch();
        tracing::debug!(discount_id = %id, discount_type = %expected, "discount set");
        Ok(id)
    }

    /// Remove a discount, returning it.
    pub fn remove_discount(&mut self, id: &DiscountId) -> Result<DiscountEntry, ProfileError> {
        let entry = self
            .discounts
            .remove(id)
            .ok_or(ProfileError::UnknownDiscount(*id))?;
        self.touch();
        tracing::debug!(discount_id = %id, "discount removed");
        Ok(entry)
    }

    // ── Commitment ──────────────────────────────────────────────────────

    fn plan_tree(&self) -> Result<MerkleTree, ProfileError> {
        let leaves = self
            .plans
            .values()
            .map(plan_leaf)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MerkleTree::new(leaves))
    }

    fn discount_tree(&self) -> Result<MerkleTree, ProfileError> {
        let leaves = self
            .discounts
            .iter()
            .map(|(id, entry)| discount_leaf(id, &entry.record))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MerkleTree::new(leaves))
    }

    /// Recompute both roots from the current maps.
    pub fn update_merkle_roots(&mut self) -> Result<(), ProfileError> {
        let plan_root = self.plan_tree()?.root();
        let discount_root = self.discount_tree()?.root();
        self.plan_merkle_root = plan_root;
        self.discount_merkle_root = discount_root;
        self.dirty = false;
        tracing::debug!(
            plans = self.plans.len(),
            discounts = self.discounts.len(),
            plan_root = %plan_root,
            discount_root = %discount_root,
            "merkle roots updated"
        );
        Ok(())
    }

    /// Advance the nonce by one. Call once per publish, after the last edit
    /// it should cover.
    pub fn increment_nonce(&mut self) -> Result<Nonce, ProfileError> {
        self.nonce = self.nonce.checked_next().ok_or(ProfileError::NonceOverflow)?;
        self.signed_roots = None;
        Ok(self.nonce)
    }

    /// `keccak256(uint256(nonce) || planRoot || discountRoot)` for the
    /// current state.
    pub fn roots_hash(&self) -> Bytes32 {
        roots_message(self.nonce, &self.plan_merkle_root, &self.discount_merkle_root)
    }

    fn check_nonce_ahead(&self) -> Result<(), ProfileError> {
        match self.remote_nonce {
            Some(published) if published >= self.nonce => Err(ProfileError::StaleNonce {
                nonce: self.nonce,
                published,
            }),
            _ => Ok(()),
        }
    }

    /// Sign the current roots at the current nonce.
    pub fn sign_roots(&mut self, signer: &dyn Signer) -> Result<&RootsAuthorization, ProfileError> {
        self.check_nonce_ahead()?;
        if self.dirty {
            return Err(ProfileError::StaleRoots);
        }
        let signer_address = signer.address();
        if signer_address != self.address {
            return Err(ProfileError::SignatureMismatch {
                expected: self.address,
                reason: format!(
                    "{} signs for {signer_address}",
                    signer.provider_name()
                ),
            });
        }
        let message = self.roots_hash();
        let signature = signer.sign(message.as_bytes())?;
        tracing::info!(
            provider = %self.address,
            nonce = %self.nonce,
            signer = signer.provider_name(),
            "roots signed"
        );
        Ok(&*self.signed_roots.insert(RootsAuthorization {
            nonce: self.nonce,
            plan_merkle_root: self.plan_merkle_root,
            discount_merkle_root: self.discount_merkle_root,
            signature,
        }))
    }

    // ── Persistence ─────────────────────────────────────────────────────

    /// The document this profile would publish, stamped `updated_at`.
    pub fn to_document(&self, updated_at: Timestamp) -> Result<ProfileDocument, ProfileError> {
        let signed = self.signed_roots.as_ref().ok_or(ProfileError::NotSigned)?;
        Ok(ProfileDocument {
            version: PROFILE_DOCUMENT_VERSION,
            address: self.address,
            payment_address: self.payment_address,
            nonce: self.nonce,
            plan_merkle_root: self.plan_merkle_root,
            discount_merkle_root: self.discount_merkle_root,
            signed_roots: signed.signature.clone(),
            plans: self.plans.values().map(PlanEntry::from).collect(),
            discounts: self
                .discounts
                .iter()
                .map(|(id, entry)| {
                    DiscountEntryDoc::new(*id, &entry.record, entry.validator.as_ref())
                })
                .collect(),
            metadata: self.metadata.clone(),
            updated_at: updated_at.to_iso8601(),
        })
    }

    /// Save the signed profile to `store` and mark it published.
    pub fn publish(&mut self, store: &mut dyn BlobStore) -> Result<ContentId, ProfileError> {
        if self.signed_roots.is_none() {
            return Err(ProfileError::NotSigned);
        }
        self.check_nonce_ahead()?;
        let document = self.to_document(Timestamp::now())?.to_value()?;
        let cid = store.save(&document)?;
        self.remote_nonce = Some(self.nonce);
        tracing::info!(
            provider = %self.address,
            nonce = %self.nonce,
            cid = %cid,
            "profile published"
        );
        Ok(cid)
    }

    /// Rebuild a profile from a published document.
    ///
    /// Both roots are recomputed from the entries and must match the
    /// document, and the roots signature must recover to the document's
    /// address.
    pub fn from_document(document: ProfileDocument) -> Result<Self, ProfileError> {
        if document.version != PROFILE_DOCUMENT_VERSION {
            return Err(ProfileError::UnsupportedVersion(document.version));
        }
        let mut profile = Self::new(document.address, document.payment_address);
        profile.nonce = document.nonce;
        profile.metadata = document.metadata;

        for entry in &document.plans {
            let plan = entry.to_record()?;
            validate_plan(&plan)?;
            if profile.plans.insert(PlanId(plan.plan_id), plan).is_some() {
                return Err(ProfileError::Document(format!(
                    "duplicate plan {}",
                    plan.plan_id
                )));
            }
        }
        for entry in &document.discounts {
            let record = entry.to_record()?;
            let validator = entry.to_validator(record.discount_type)?;
            if let Some(validator) = &validator {
                let derived = discount_id_for_validator(validator);
                if derived != entry.discount_id {
                    return Err(ProfileError::Document(format!(
                        "balance discount {} does not match its validator (derives {derived})",
                        entry.discount_id
                    )));
                }
            }
            let stored = DiscountEntry { record, validator };
            if profile.discounts.insert(entry.discount_id, stored).is_some() {
                return Err(ProfileError::Document(format!(
                    "duplicate discount {}",
                    entry.discount_id
                )));
            }
        }

        profile.update_merkle_roots()?;
        if profile.plan_merkle_root != document.plan_merkle_root {
            return Err(ProfileError::RootMismatch {
                which: "plan",
                stored: document.plan_merkle_root,
                computed: profile.plan_merkle_root,
            });
        }
        if profile.discount_merkle_root != document.discount_merkle_root {
            return Err(ProfileError::RootMismatch {
                which: "discount",
                stored: document.discount_merkle_root,
                computed: profile.discount_merkle_root,
            });
        }

        let message = profile.roots_hash();
        let recovered = recover_signer(message.as_bytes(), &document.signed_roots).map_err(|e| {
            ProfileError::SignatureMismatch {
                expected: profile.address,
                reason: e.to_string(),
            }
        })?;
        if recovered != profile.address {
            return Err(ProfileError::SignatureMismatch {
                expected: profile.address,
                reason: format!("signature recovers to {recovered}"),
            });
        }

        profile.signed_roots = Some(RootsAuthorization {
            nonce: profile.nonce,
            plan_merkle_root: profile.plan_merkle_root,
            discount_merkle_root: profile.discount_merkle_root,
            signature: document.signed_roots,
        });
        profile.remote_nonce = Some(profile.nonce);
        Ok(profile)
    }

    /// Load and verify a published profile from `store`.
    pub fn load(store: &dyn BlobStore, cid: &ContentId) -> Result<Self, ProfileError> {
        let value = store.load(cid)?;
        let profile = ProfileDocument::from_value(value)
            .and_then(Self::from_document)
            .map_err(|e| {
                tracing::warn!(cid = %cid, error = %e, "profile document rejected");
                e
            })?;
        tracing::info!(
            provider = %profile.address,
            nonce = %profile.nonce,
            cid = %cid,
            plans = profile.plans.len(),
            discounts = profile.discounts.len(),
            "profile loaded"
        );
        Ok(profile)
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// A plan by id.
    pub fn get_plan(&self, plan_id: PlanId) -> Result<&PlanRecord, ProfileError> {
        self.plans
            .get(&plan_id)
            .ok_or(ProfileError::UnknownPlan(plan_id))
    }

    /// A discount by id.
    pub fn get_discount(&self, id: &DiscountId) -> Result<&DiscountEntry, ProfileError> {
        self.discounts
            .get(id)
            .ok_or(ProfileError::UnknownDiscount(*id))
    }

    /// Inclusion proof for a plan against the current plan root.
    pub fn proof_for_plan(&self, plan_id: PlanId) -> Result<MerkleProof, ProfileError> {
        let plan = self.get_plan(plan_id)?;
        if self.dirty {
            return Err(ProfileError::StaleRoots);
        }
        Ok(self.plan_tree()?.proof(&plan_leaf(plan)?)?)
    }

    /// Inclusion proof for a discount against the current discount root.
    pub fn proof_for_discount(&self, id: &DiscountId) -> Result<MerkleProof, ProfileError> {
        let entry = self.get_discount(id)?;
        if self.dirty {
            return Err(ProfileError::StaleRoots);
        }
        Ok(self.discount_tree()?.proof(&discount_leaf(id, &entry.record)?)?)
    }

    /// Amount due now for one period of a plan, after an optional discount.
    pub fn due_now(
        &self,
        plan_id: PlanId,
        discount_id: Option<&DiscountId>,
        ctx: &ChargeContext,
    ) -> Result<u128, ProfileError> {
        let plan = self.get_plan(plan_id)?;
        let discount = discount_id
            .map(|id| self.get_discount(id).map(|entry| &entry.record))
            .transpose()?;
        pricing::due_now(plan, discount, ctx)
    }

    // ── Authorizations ──────────────────────────────────────────────────

    /// The plan tuple a subscriber submits, crediting `referrer` (zero for
    /// none).
    pub fn plan_authorization(
        &self,
        plan_id: PlanId,
        referrer: Address,
    ) -> Result<PlanAuthorization, ProfileError> {
        let proof = self.proof_for_plan(plan_id)?;
        let plan = self.get_plan(plan_id)?;
        Ok(PlanAuthorization {
            provider: self.address,
            referrer,
            encoded_plan: Bytes32(subc_core::encode_plan(plan)?),
            plan_merkle_root: self.plan_merkle_root,
            proof,
        })
    }

    /// The discount tuple a subscriber submits.
    pub fn discount_authorization(
        &self,
        id: &DiscountId,
    ) -> Result<DiscountAuthorization, ProfileError> {
        let proof = self.proof_for_discount(id)?;
        let entry = self.get_discount(id)?;
        Ok(DiscountAuthorization {
            identity: entry.identity_bytes(id),
            encoded_discount: Bytes32(subc_core::encode_discount(&entry.record)?),
            discount_merkle_root: self.discount_merkle_root,
            proof,
        })
    }

    /// The roots tuple proving the provider authorized the current roots.
    pub fn roots_authorization(&self) -> Result<&RootsAuthorization, ProfileError> {
        self.signed_roots.as_ref().ok_or(ProfileError::NotSigned)
    }
}

fn validate_plan(plan: &PlanRecord) -> Result<(), ProfileError> {
    if plan.plan_id == 0 {
        return Err(ProfileError::InvalidPlan {
            plan_id: 0,
            reason: "plan id 0 is reserved".into(),
        });
    }
    if plan.period == 0 {
        return Err(ProfileError::InvalidPlan {
            plan_id: plan.plan_id,
            reason: "period must be greater than zero".into(),
        });
    }
    check_u96("price", plan.price)?;
    Ok(())
}
