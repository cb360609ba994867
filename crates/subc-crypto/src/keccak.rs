//! # Keccak-256
//!
//! The EVM's hash function (pre-standard Keccak, not NIST SHA3-256). Every
//! leaf, node, discount id and roots commitment uses it, because the
//! on-chain verifier recomputes them with `keccak256`.

use sha3::{Digest, Keccak256};
use subc_core::Bytes32;

/// Keccak-256 of a byte string.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let hash = Keccak256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hash);
    out
}

/// Keccak-256 of the concatenation of `parts` (`abi.encodePacked`).
pub fn keccak256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    let hash = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&hash);
    out
}

/// Keccak-256 wrapped as a [`Bytes32`].
pub fn keccak_bytes32(data: &[u8]) -> Bytes32 {
    Bytes32(keccak256(data))
}
