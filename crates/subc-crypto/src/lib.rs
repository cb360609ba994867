//! # subc-crypto — Cryptographic Primitives for Subscription Commitments
//!
//! Everything a provider needs to commit to its plan and discount sets and
//! prove that commitment on chain:
//!
//! - **Keccak-256** (`keccak`): the EVM hash, used for leaves, nodes,
//!   discount identities and the roots commitment.
//! - **Sorted-pair Merkle trees** (`merkle`): order-independent roots and
//!   direction-free inclusion proofs.
//! - **Signers** (`signer`): secp256k1 recoverable signatures behind the
//!   [`Signer`] trait, with in-memory and environment-backed keys.
//! - **Blob storage** (`cas`): content-addressed persistence for published
//!   profile documents, with digest verification on load.
//!
//! ## Crate Policy
//!
//! - Depends only on `subc-core` among internal crates.
//! - Private keys never appear in `Debug` output or logs.

pub mod cas;
pub mod keccak;
pub mod merkle;
pub mod signer;

pub use cas::{content_id_of, BlobStore, FsBlobStore, MemoryBlobStore, StoreError};
pub use keccak::{keccak256, keccak256_concat, keccak_bytes32};
pub use merkle::{
    discount_leaf, hash_pair, plan_leaf, verify as verify_proof, MerkleProof, MerkleTree,
    EMPTY_ROOT,
};
pub use signer::{
    address_of, personal_message_hash, recover_signer, verify_signer, EnvSigner, LocalSigner,
    RecoverableSignature, Signer, DEFAULT_SIGNING_KEY_VAR,
};
