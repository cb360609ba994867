//! # Hex Utilities
//!
//! `0x`-prefixed lowercase hex, the rendering every EVM tool expects for
//! addresses, hashes and signatures. Parsing accepts input with or without
//! the prefix and in either case.

use crate::error::SubcError;

/// Render bytes as `0x`-prefixed lowercase hex.
pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// First four bytes as hex, for `Debug` output of long values.
pub fn hex_prefix(bytes: &[u8]) -> String {
    bytes.iter().take(4).map(|b| format!("{b:02x}")).collect()
}

/// Decode a hex string of any even length.
pub fn from_hex(hex: &str) -> Result<Vec<u8>, SubcError> {
    let hex = hex.trim();
    let hex = hex
        .strip_prefix("0x")
        .or_else(|| hex.strip_prefix("0X"))
        .unwrap_or(hex);
    if hex.len() % 2 != 0 {
        return Err(SubcError::Parse(
            "hex string must have even length".to_string(),
        ));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            let pair = hex
                .get(i..i + 2)
                .ok_or_else(|| SubcError::Parse(format!("invalid hex at position {i}")))?;
            u8::from_str_radix(pair, 16)
                .map_err(|e| SubcError::Parse(format!("invalid hex at position {i}: {e}")))
        })
        .collect()
}

/// Decode a hex string that must be exactly `N` bytes long.
pub fn from_hex_fixed<const N: usize>(hex: &str) -> Result<[u8; N], SubcError> {
    let bytes = from_hex(hex)?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| SubcError::Parse(format!("expected {N} bytes of hex, got {len}")))
}
