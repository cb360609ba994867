//! # Signers — secp256k1 Recoverable Signatures
//!
//! Abstracts the provider's signing key behind the [`Signer`] trait. The
//! only thing the commitment core signs is the 32-byte roots commitment
//! `keccak256(nonce || planRoot || discountRoot)`; the verifier recovers the
//! signer's address from the signature and compares it with the provider.
//!
//! Backends:
//!
//! - [`LocalSigner`]: in-memory key for development and testing.
//! - [`EnvSigner`]: loads a hex-encoded 32-byte private key from an
//!   environment variable (default `SUBC_SIGNING_KEY`), for container
//!   deployments where secrets are injected via environment.
//!
//! ## Message Format
//!
//! Signatures follow EIP-191 `personal_sign`: the signed digest is
//! `keccak256("\x19Ethereum Signed Message:\n" || len(message) || message)`.
//! Signatures are 65 bytes `r || s || v` with `v ∈ {27, 28}` and low-S.
//!
//! ## Security Invariants
//!
//! - Private keys are never serialized or logged. Neither signer implements
//!   `Serialize`, and `Debug` prints `<private>`.
//! - `Signer` is `Send + Sync`.

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use subc_core::hex::{from_hex_fixed, hex_prefix, to_hex};
use subc_core::{Address, CryptoError};

use crate::keccak::{keccak256, keccak256_concat};

/// Environment variable read by [`EnvSigner::from_default_env`].
pub const DEFAULT_SIGNING_KEY_VAR: &str = "SUBC_SIGNING_KEY";

/// A 65-byte `r || s || v` secp256k1 signature.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RecoverableSignature(pub [u8; 65]);

impl RecoverableSignature {
    /// Wrap raw bytes.
    pub fn from_bytes(bytes: [u8; 65]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }

    /// The recovery byte `v`.
    pub fn v(&self) -> u8 {
        self.0[64]
    }

    /// Render as `0x`-prefixed hex.
    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }

    /// Parse from a 130-character hex string (prefix optional).
    pub fn from_hex(hex: &str) -> Result<Self, CryptoError> {
        from_hex_fixed::<65>(hex)
            .map(Self)
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))
    }
}

impl Serialize for RecoverableSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for RecoverableSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Debug for RecoverableSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RecoverableSignature({}...)", hex_prefix(&self.0))
    }
}

impl std::fmt::Display for RecoverableSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// EIP-191 personal message digest.
pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let prefix = format!("\x19Ethereum Signed Message:\n{}", message.len());
    keccak256_concat(&[prefix.as_bytes(), message])
}

/// The EVM address of a secp256k1 public key: the last 20 bytes of the
/// keccak-256 of its uncompressed encoding without the `0x04` tag.
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash[12..]);
    Address(addr)
}

/// Recover the address that produced `signature` over `message`.
pub fn recover_signer(
    message: &[u8],
    signature: &RecoverableSignature,
) -> Result<Address, CryptoError> {
    let sig = Signature::from_slice(&signature.0[..64])
        .map_err(|e| CryptoError::InvalidSignature(format!("bad r/s: {e}")))?;
    let v = match signature.v() {
        27 | 28 => signature.v() - 27,
        0 | 1 => signature.v(),
        other => {
            return Err(CryptoError::InvalidSignature(format!(
                "recovery byte must be 27 or 28, got {other}"
            )))
        }
    };
    let recovery_id = RecoveryId::from_byte(v)
        .ok_or_else(|| CryptoError::InvalidSignature(format!("invalid recovery id {v}")))?;
    let digest = personal_message_hash(message);
    let key = VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id)
        .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))?;
    Ok(address_of(&key))
}

/// Check that `signature` over `message` was produced by `expected`.
pub fn verify_signer(
    message: &[u8],
    signature: &RecoverableSignature,
    expected: &Address,
) -> Result<(), CryptoError> {
    let recovered = recover_signer(message, signature)?;
    if recovered != *expected {
        return Err(CryptoError::RecoveryFailed(format!(
            "signature recovers to {recovered}, expected {expected}"
        )));
    }
    Ok(())
}

/// Trait for signing backends.
pub trait Signer: Send + Sync {
    /// Sign `message` as an EIP-191 personal message.
    fn sign(&self, message: &[u8]) -> Result<RecoverableSignature, CryptoError>;

    /// The address signatures recover to.
    fn address(&self) -> Address;

    /// Human-readable backend name for diagnostics.
    fn provider_name(&self) -> &str;
}

// ─── LocalSigner ─────────────────────────────────────────────────────────

/// In-memory secp256k1 signer.
pub struct LocalSigner {
    key: SigningKey,
}

impl LocalSigner {
    /// Generate a random key using the OS CSPRNG.
    pub fn generate() -> Self {
        Self {
            key: SigningKey::random(&mut rand::rngs::OsRng),
        }
    }

    /// Create from a raw 32-byte private key.
    pub fn from_bytes(secret: &[u8; 32]) -> Result<Self, CryptoError> {
        SigningKey::from_slice(secret)
            .map(|key| Self { key })
            .map_err(|e| CryptoError::InvalidSigningKey(format!("key out of range: {e}")))
    }

    /// Create from a 64-character hex private key (prefix optional).
    pub fn from_hex(hex: &str) -> Result<Self, CryptoError> {
        let secret = from_hex_fixed::<32>(hex).map_err(|e| {
            CryptoError::InvalidSigningKey(format!("expected 32-byte hex key: {e}"))
        })?;
        Self::from_bytes(&secret)
    }

    /// The public key.
    pub fn verifying_key(&self) -> VerifyingKey {
        *self.key.verifying_key()
    }
}

impl Signer for LocalSigner {
    fn sign(&self, message: &[u8]) -> Result<RecoverableSignature, CryptoError> {
        let digest = personal_message_hash(message);
        let (sig, recovery_id) = self
            .key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| CryptoError::InvalidSignature(format!("signing failed: {e}")))?;
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&sig.to_bytes());
        out[64] = 27 + recovery_id.to_byte();
        Ok(RecoverableSignature(out))
    }

    fn address(&self) -> Address {
        address_of(self.key.verifying_key())
    }

    fn provider_name(&self) -> &str {
        "LocalSigner"
    }
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LocalSigner(<private>)")
    }
}

// ─── EnvSigner ───────────────────────────────────────────────────────────

/// Loads a secp256k1 private key from an environment variable.
///
/// ```bash
/// export SUBC_SIGNING_KEY="0x4c0883a6..."  # 64 hex chars
/// ```
pub struct EnvSigner {
    inner: LocalSigner,
    var_name: String,
}

impl EnvSigner {
    /// Load the key from the named environment variable.
    pub fn from_env(var_name: &str) -> Result<Self, CryptoError> {
        let hex = std::env::var(var_name).map_err(|_| {
            CryptoError::KeyNotConfigured(format!("environment variable {var_name} not set"))
        })?;
        let inner = LocalSigner::from_hex(&hex).map_err(|e| {
            CryptoError::InvalidSigningKey(format!("{var_name}: {e}"))
        })?;
        tracing::debug!(var = var_name, address = %inner.address(), "loaded signing key from environment");
        Ok(Self {
            inner,
            var_name: var_name.to_string(),
        })
    }

    /// Load the key from [`DEFAULT_SIGNING_KEY_VAR`].
    pub fn from_default_env() -> Result<Self, CryptoError> {
        Self::from_env(DEFAULT_SIGNING_KEY_VAR)
    }

    /// The environment variable this signer was loaded from.
    pub fn var_name(&self) -> &str {
        &self.var_name
    }
}

impl Signer for EnvSigner {
    fn sign(&self, message: &[u8]) -> Result<RecoverableSignature, CryptoError> {
        self.inner.sign(message)
    }

    fn address(&self) -> Address {
        self.inner.address()
    }

    fn provider_name(&self) -> &str {
        "EnvSigner"
    }
}

impl std::fmt::Debug for EnvSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EnvSigner({}, <private>)", self.var_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Widely published test key (private key = 1 is avoided; this is the
    // first Hardhat/Anvil development account).
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

    #[test]
    fn test_known_key_address() {
        let signer = LocalSigner::from_hex(DEV_KEY).unwrap();
        assert_eq!(signer.address().to_hex(), DEV_ADDRESS);
    }

    #[test]
    fn test_sign_and_recover() {
        let signer = LocalSigner::generate();
        let sig = signer.sign(b"roots").unwrap();
        assert!(sig.v() == 27 || sig.v() == 28);
        assert_eq!(recover_signer(b"roots", &sig).unwrap(), signer.address());
        verify_signer(b"roots", &sig, &signer.address()).expect("should verify");
    }

    #[test]
    fn test_recover_wrong_message_differs() {
        let signer = LocalSigner::generate();
        let sig = signer.sign(b"original").unwrap();
        let recovered = recover_signer(b"tampered", &sig);
        if let Ok(addr) = recovered {
            assert_ne!(addr, signer.address());
        }
        assert!(verify_signer(b"tampered", &sig, &signer.address()).is_err());
    }

    #[test]
    fn test_deterministic_signatures() {
        let a = LocalSigner::from_hex(DEV_KEY).unwrap();
        let b = LocalSigner::from_hex(DEV_KEY).unwrap();
        assert_eq!(a.sign(b"m").unwrap(), b.sign(b"m").unwrap());
    }

    #[test]
    fn test_bad_recovery_byte_rejected() {
        let signer = LocalSigner::generate();
        let mut sig = signer.sign(b"x").unwrap();
        sig.0[64] = 35;
        assert!(matches!(
            recover_signer(b"x", &sig),
            Err(CryptoError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_zero_key_rejected() {
        assert!(matches!(
            LocalSigner::from_bytes(&[0u8; 32]),
            Err(CryptoError::InvalidSigningKey(_))
        ));
        assert!(LocalSigner::from_hex("0x1234").is_err());
    }

    #[test]
    fn test_signature_serde_hex() {
        let signer = LocalSigner::generate();
        let sig = signer.sign(b"y").unwrap();
        let json = serde_json::to_string(&sig).unwrap();
        assert_eq!(json.len(), 2 + 2 + 130);
        let back: RecoverableSignature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sig);
    }

    #[test]
    fn test_personal_message_prefix() {
        let expected = keccak256(b"\x19Ethereum Signed Message:\n5hello");
        assert_eq!(personal_message_hash(b"hello"), expected);
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let signer = LocalSigner::from_hex(DEV_KEY).unwrap();
        let debug = format!("{signer:?}");
        assert_eq!(debug, "LocalSigner(<private>)");
    }

    #[test]
    fn test_env_signer_missing_var() {
        let err = EnvSigner::from_env("SUBC_TEST_KEY_THAT_IS_NOT_SET").unwrap_err();
        assert!(matches!(err, CryptoError::KeyNotConfigured(_)));
    }

    #[test]
    fn test_env_signer_loads_key() {
        std::env::set_var("SUBC_TEST_SIGNING_KEY_LOAD", DEV_KEY);
        let signer = EnvSigner::from_env("SUBC_TEST_SIGNING_KEY_LOAD").unwrap();
        assert_eq!(signer.address().to_hex(), DEV_ADDRESS);
        assert_eq!(signer.var_name(), "SUBC_TEST_SIGNING_KEY_LOAD");
        assert_eq!(signer.provider_name(), "EnvSigner");
    }
}
