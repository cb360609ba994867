//! # Domain Identity Newtypes
//!
//! Newtype wrappers for the identifiers that flow through the commitment
//! system. You cannot pass a `DiscountId` where a Merkle root is expected,
//! or a raw `u32` where a `PlanId` is.
//!
//! Fixed-width byte identifiers serialize as `0x`-prefixed hex strings. The
//! nonce serializes as a decimal string because it is semantically a
//! `uint256` and must survive JSON consumers that parse numbers as doubles.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SubcError;
use crate::hex::{from_hex_fixed, hex_prefix, to_hex};

macro_rules! hex_newtype {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Byte length of this identifier.
            pub const LEN: usize = $len;

            /// Wrap raw bytes.
            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Borrow the raw bytes.
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Render as `0x`-prefixed lowercase hex.
            pub fn to_hex(&self) -> String {
                to_hex(&self.0)
            }

            /// Parse from hex, with or without the `0x` prefix.
            pub fn from_hex(hex: &str) -> Result<Self, SubcError> {
                from_hex_fixed::<$len>(hex).map(Self)
            }

            /// True when every byte is zero.
            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let hex = String::deserialize(deserializer)?;
                Self::from_hex(&hex).map_err(serde::de::Error::custom)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({}...)", stringify!($name), hex_prefix(&self.0))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }
    };
}

hex_newtype!(
    /// A 20-byte EVM account address (provider, payment recipient, token).
    Address,
    20
);

hex_newtype!(
    /// A 32-byte hash value: Merkle roots, leaf hashes, proof elements.
    ///
    /// The all-zero value is the reserved "no commitments" root.
    Bytes32,
    32
);

hex_newtype!(
    /// Content-derived 32-byte discount identifier.
    ///
    /// Never chosen by the provider: it is the keccak-256 of either the
    /// upper-cased discount code or the encoded balance validator.
    DiscountId,
    32
);

/// Provider-chosen plan identifier (`uint32` on the wire).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlanId(pub u32);

impl PlanId {
    /// Access the inner value.
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "plan:{}", self.0)
    }
}

/// Monotonic publish counter binding a roots signature to one version of a
/// provider's plan and discount sets.
///
/// Semantically a `uint256`. Held as `u128` (it only ever grows by one) and
/// hashed as a left-padded 32-byte big-endian word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Nonce(pub u128);

impl Nonce {
    /// The nonce of a profile that has never been published.
    pub const ZERO: Nonce = Nonce(0);

    /// Access the inner value.
    pub fn get(&self) -> u128 {
        self.0
    }

    /// The next nonce, or `None` on overflow.
    pub fn checked_next(&self) -> Option<Nonce> {
        self.0.checked_add(1).map(Nonce)
    }

    /// Encode as a 32-byte big-endian `uint256` word.
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[16..].copy_from_slice(&self.0.to_be_bytes());
        word
    }
}

impl std::fmt::Display for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Nonce {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Nonce {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<u128>()
            .map(Nonce)
            .map_err(|e| serde::de::Error::custom(format!("invalid nonce {s:?}: {e}")))
    }
}
