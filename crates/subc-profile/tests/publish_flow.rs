//! # Publish Flow
//!
//! End-to-end: a provider edits, commits, signs and publishes a profile; a
//! consumer loads it and builds authorizations from it.

use subc_core::{
    encode_discount, encode_plan, Address, Bytes32, DiscountRecord, DiscountType, Nonce, PlanId,
    PlanRecord, Timestamp,
};
use subc_crypto::{
    keccak256, keccak256_concat, plan_leaf, verify_proof, BlobStore, FsBlobStore, LocalSigner,
    MemoryBlobStore, Signer, StoreError,
};
use subc_profile::{
    ChargeContext, DiscountIdentity, ProfileError, ProfileState, ProviderProfile,
};

const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

fn weekly_plan() -> PlanRecord {
    PlanRecord {
        plan_id: 100,
        price: 1045,
        period: 604_800,
        free_trial: 0,
        max_active: 0,
        min_periods: 0,
        grace_period: 7,
        can_pause: true,
        can_transfer: false,
    }
}

fn plan(plan_id: u32, price: u128) -> PlanRecord {
    PlanRecord {
        plan_id,
        price,
        ..weekly_plan()
    }
}

fn discount(value: u128, is_fixed: bool, discount_type: DiscountType) -> DiscountRecord {
    DiscountRecord {
        value,
        valid_after: 0,
        expires_at: 0,
        max_redemptions: 0,
        plan_id: 0,
        apply_periods: 3,
        is_fixed,
        discount_type,
    }
}

fn signed_profile(signer: &LocalSigner) -> ProviderProfile {
    let mut profile = ProviderProfile::new(signer.address(), Address::from_bytes([0xaa; 20]));
    profile.set_plan(weekly_plan()).unwrap();
    profile.set_plan(plan(200, 5000)).unwrap();
    profile
        .set_discount(
            &DiscountIdentity::code("summer20").unwrap(),
            discount(2000, false, DiscountType::Code),
        )
        .unwrap();
    profile
        .set_discount(
            &DiscountIdentity::balance(Address::from_bytes([0x11; 20]), 6, 1_000_000),
            discount(300, true, DiscountType::TokenBalance),
        )
        .unwrap();
    let mut metadata = serde_json::Map::new();
    metadata.insert("name".into(), "Example Provider".into());
    profile.set_metadata(metadata).unwrap();
    profile.update_merkle_roots().unwrap();
    profile.increment_nonce().unwrap();
    profile.sign_roots(signer).unwrap();
    profile
}

// ---------------------------------------------------------------------------
// Plan commitment
// ---------------------------------------------------------------------------

#[test]
fn plan_proof_verifies_then_fails_after_removal() {
    let mut profile = ProviderProfile::new(Address::default(), Address::default());
    profile.set_plan(weekly_plan()).unwrap();
    profile.update_merkle_roots().unwrap();

    let proof = profile.proof_for_plan(PlanId(100)).unwrap();
    assert!(!proof.is_empty());
    let leaf = plan_leaf(&weekly_plan()).unwrap();
    let old_root = profile.plan_merkle_root();
    assert!(verify_proof(&leaf, &proof, &old_root));

    profile.remove_plan(PlanId(100)).unwrap();
    profile.update_merkle_roots().unwrap();
    assert_ne!(profile.plan_merkle_root(), old_root);
    assert!(!verify_proof(&leaf, &proof, &profile.plan_merkle_root()));
    assert!(matches!(
        profile.proof_for_plan(PlanId(100)),
        Err(ProfileError::UnknownPlan(_))
    ));
}

#[test]
fn plan_insertion_order_does_not_change_root() {
    let mut a = ProviderProfile::new(Address::default(), Address::default());
    let mut b = ProviderProfile::new(Address::default(), Address::default());
    for id in [5, 1, 9, 3] {
        a.set_plan(plan(id, u128::from(id) * 10)).unwrap();
    }
    for id in [1, 3, 5, 9] {
        b.set_plan(plan(id, u128::from(id) * 10)).unwrap();
    }
    a.update_merkle_roots().unwrap();
    b.update_merkle_roots().unwrap();
    assert_eq!(a.plan_merkle_root(), b.plan_merkle_root());
}

// ---------------------------------------------------------------------------
// Pricing
// ---------------------------------------------------------------------------

#[test]
fn discounts_price_a_plan_of_one_thousand() {
    let mut profile = ProviderProfile::new(Address::default(), Address::default());
    profile.set_plan(plan(1, 1000)).unwrap();
    let twenty_percent = profile
        .set_discount(
            &DiscountIdentity::code("twenty").unwrap(),
            discount(2000, false, DiscountType::Code),
        )
        .unwrap();
    let three_hundred_off = profile
        .set_discount(
            &DiscountIdentity::code("threehundred").unwrap(),
            discount(300, true, DiscountType::Code),
        )
        .unwrap();
    let everything_off = profile
        .set_discount(
            &DiscountIdentity::code("free").unwrap(),
            discount(1500, true, DiscountType::Code),
        )
        .unwrap();

    let ctx = ChargeContext::new(Timestamp::now());
    assert_eq!(profile.due_now(PlanId(1), Some(&twenty_percent), &ctx).unwrap(), 800);
    assert_eq!(profile.due_now(PlanId(1), Some(&three_hundred_off), &ctx).unwrap(), 700);
    assert_eq!(profile.due_now(PlanId(1), Some(&everything_off), &ctx).unwrap(), 0);
}

#[test]
fn restricted_discount_rejected_for_other_plan() {
    let mut profile = ProviderProfile::new(Address::default(), Address::default());
    profile.set_plan(plan(1, 1000)).unwrap();
    profile.set_plan(plan(2, 1000)).unwrap();
    let mut record = discount(100, true, DiscountType::Code);
    record.plan_id = 2;
    let id = profile
        .set_discount(&DiscountIdentity::code("only-two").unwrap(), record)
        .unwrap();
    let ctx = ChargeContext::new(Timestamp::now());
    assert!(matches!(
        profile.due_now(PlanId(1), Some(&id), &ctx),
        Err(ProfileError::DiscountPlanMismatch { discount_plan: 2, .. })
    ));
    assert_eq!(profile.due_now(PlanId(2), Some(&id), &ctx).unwrap(), 900);
}

// ---------------------------------------------------------------------------
// Publish and load
// ---------------------------------------------------------------------------

#[test]
fn publish_then_load_restores_equivalent_profile() {
    let signer = LocalSigner::from_hex(DEV_KEY).unwrap();
    let mut provider = signed_profile(&signer);
    let mut store = MemoryBlobStore::new();
    let cid = provider.publish(&mut store).unwrap();
    assert_eq!(provider.state(), ProfileState::Published);

    let loaded = ProviderProfile::load(&store, &cid).unwrap();
    assert_eq!(loaded.address(), provider.address());
    assert_eq!(loaded.payment_address(), provider.payment_address());
    assert_eq!(loaded.nonce(), Nonce(1));
    assert_eq!(loaded.remote_nonce(), Some(Nonce(1)));
    assert_eq!(loaded.plans(), provider.plans());
    assert_eq!(loaded.discounts(), provider.discounts());
    assert_eq!(loaded.plan_merkle_root(), provider.plan_merkle_root());
    assert_eq!(loaded.discount_merkle_root(), provider.discount_merkle_root());
    assert_eq!(loaded.metadata(), provider.metadata());
    assert_eq!(loaded.state(), ProfileState::Published);

    // A consumer builds a full set of authorizations from the loaded copy.
    let plan_auth = loaded
        .plan_authorization(PlanId(100), Address::default())
        .unwrap();
    assert_eq!(plan_auth.verify().unwrap(), weekly_plan());
    let code_id = subc_profile::discount_id_for_code("SUMMER20").unwrap();
    let (id, _) = loaded
        .discount_authorization(&code_id)
        .unwrap()
        .verify()
        .unwrap();
    assert_eq!(id, code_id);
    let roots = loaded.roots_authorization().unwrap();
    roots.verify(&signer.address()).unwrap();
    assert!(roots.covers_plan(&plan_auth));
}

#[test]
fn loaded_profile_cannot_republish_without_new_nonce() {
    let signer = LocalSigner::generate();
    let mut provider = signed_profile(&signer);
    let mut store = MemoryBlobStore::new();
    let cid = provider.publish(&mut store).unwrap();

    let mut session = ProviderProfile::load(&store, &cid).unwrap();
    session.set_plan(plan(300, 9000)).unwrap();
    session.update_merkle_roots().unwrap();
    assert!(matches!(
        session.sign_roots(&signer),
        Err(ProfileError::StaleNonce { .. })
    ));
    session.increment_nonce().unwrap();
    session.sign_roots(&signer).unwrap();
    let next = session.publish(&mut store).unwrap();
    assert_eq!(ProviderProfile::load(&store, &next).unwrap().nonce(), Nonce(2));
}

#[test]
fn filesystem_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let signer = LocalSigner::generate();
    let mut provider = signed_profile(&signer);
    let mut store = FsBlobStore::new(dir.path().join("profiles"));
    let cid = provider.publish(&mut store).unwrap();

    let reopened = FsBlobStore::new(dir.path().join("profiles"));
    let loaded = ProviderProfile::load(&reopened, &cid).unwrap();
    assert_eq!(loaded.plans(), provider.plans());
}

// ---------------------------------------------------------------------------
// Tampering
// ---------------------------------------------------------------------------

fn published_document(signer: &LocalSigner) -> serde_json::Value {
    let mut provider = signed_profile(signer);
    let mut store = MemoryBlobStore::new();
    let cid = provider.publish(&mut store).unwrap();
    store.load(&cid).unwrap()
}

#[test]
fn any_flipped_record_byte_breaks_inclusion() {
    let signer = LocalSigner::generate();
    let profile = signed_profile(&signer);

    for (id, plan) in profile.plans() {
        let proof = profile.proof_for_plan(*id).unwrap();
        let encoded = encode_plan(plan).unwrap();
        assert!(verify_proof(
            &Bytes32(keccak256(&encoded)),
            &proof,
            &profile.plan_merkle_root()
        ));
        for i in 0..encoded.len() {
            let mut tampered = encoded;
            tampered[i] ^= 0x01;
            let leaf = Bytes32(keccak256(&tampered));
            assert!(
                !verify_proof(&leaf, &proof, &profile.plan_merkle_root()),
                "plan {id} byte {i}"
            );
        }
    }

    for (id, entry) in profile.discounts() {
        let proof = profile.proof_for_discount(id).unwrap();
        let mut preimage = id.as_bytes().to_vec();
        preimage.extend_from_slice(&encode_discount(&entry.record).unwrap());
        assert!(verify_proof(
            &Bytes32(keccak256(&preimage)),
            &proof,
            &profile.discount_merkle_root()
        ));
        for i in 0..preimage.len() {
            let mut tampered = preimage.clone();
            tampered[i] ^= 0x80;
            let leaf = Bytes32(keccak256_concat(&[&tampered[..32], &tampered[32..]]));
            assert!(
                !verify_proof(&leaf, &proof, &profile.discount_merkle_root()),
                "discount {id} byte {i}"
            );
        }
    }
}

#[test]
fn tampered_plan_price_fails_root_check() {
    let signer = LocalSigner::generate();
    let mut doc = published_document(&signer);
    doc["plans"][0]["price"] = "1".into();

    let mut store = MemoryBlobStore::new();
    let cid = store.save(&doc).unwrap();
    assert!(matches!(
        ProviderProfile::load(&store, &cid),
        Err(ProfileError::RootMismatch { which: "plan", .. })
    ));
}

#[test]
fn tampered_roots_fail_signature_check() {
    let signer = LocalSigner::generate();
    let mut doc = published_document(&signer);
    // Drop a plan and restate the root so the root check passes.
    let plans = doc["plans"].as_array().cloned().unwrap();
    assert_eq!(plans[1]["planId"], 200);
    doc["plans"] = serde_json::Value::Array(vec![plans[1].clone()]);
    let root = subc_crypto::MerkleTree::new(vec![plan_leaf(&plan(200, 5000)).unwrap()]).root();
    doc["planMerkleRoot"] = serde_json::to_value(root).unwrap();

    let mut store = MemoryBlobStore::new();
    let cid = store.save(&doc).unwrap();
    assert!(matches!(
        ProviderProfile::load(&store, &cid),
        Err(ProfileError::SignatureMismatch { .. })
    ));
}

#[test]
fn document_signed_by_someone_else_rejected() {
    let signer = LocalSigner::generate();
    let mut doc = published_document(&signer);
    doc["address"] = serde_json::to_value(Address::from_bytes([0x01; 20])).unwrap();

    let mut store = MemoryBlobStore::new();
    let cid = store.save(&doc).unwrap();
    assert!(matches!(
        ProviderProfile::load(&store, &cid),
        Err(ProfileError::SignatureMismatch { .. })
    ));
}

#[test]
fn corrupted_blob_fails_integrity_check() {
    let signer = LocalSigner::generate();
    let mut provider = signed_profile(&signer);
    let mut store = MemoryBlobStore::new();
    let cid = provider.publish(&mut store).unwrap();

    let mut doc = store.load(&cid).unwrap();
    doc["nonce"] = "99".into();
    store.insert_raw(cid.clone(), serde_json::to_vec(&doc).unwrap());
    assert!(matches!(
        ProviderProfile::load(&store, &cid),
        Err(ProfileError::Store(StoreError::Integrity { .. }))
    ));
}

#[test]
fn unsupported_version_rejected() {
    let signer = LocalSigner::generate();
    let mut doc = published_document(&signer);
    doc["version"] = 2.into();
    let mut store = MemoryBlobStore::new();
    let cid = store.save(&doc).unwrap();
    assert!(matches!(
        ProviderProfile::load(&store, &cid),
        Err(ProfileError::UnsupportedVersion(2))
    ));
}
