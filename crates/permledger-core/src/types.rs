//! Strong type definitions for Permledger.
//!
//! All identifiers are 32-byte newtypes to prevent misuse at compile time:
//! a document hash can never be passed where a principal is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Decode a hex string into exactly 32 bytes, accepting an optional `0x` prefix.
fn decode_32(s: &str) -> Result<[u8; 32], hex::FromHexError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s)?;
    if bytes.len() != 32 {
        return Err(hex::FromHexError::InvalidStringLength);
    }
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

macro_rules! id_newtype {
    ($name:ident, $debug:literal) => {
        impl $name {
            /// Create from raw bytes.
            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Get the raw bytes.
            pub const fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Convert to hex string.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parse from hex string (an optional `0x` prefix is accepted).
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                decode_32(s).map(Self)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $debug, &self.to_hex()[..16])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", &self.to_hex()[..16])
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = std::array::TryFromSliceError;

            fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
                let arr: [u8; 32] = slice.try_into()?;
                Ok(Self(arr))
            }
        }
    };
}

/// The content hash of a document: its permanent, globally unique key.
///
/// Never reused once registered.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentHash(pub [u8; 32]);

id_newtype!(DocumentHash, "DocumentHash");

impl DocumentHash {
    /// Hash document content with Blake3.
    pub fn of(content: &[u8]) -> Self {
        Self(*blake3::hash(content).as_bytes())
    }

    /// Parse a `bytes32`-style hex value.
    ///
    /// Accepts up to 32 bytes of hex (optionally `0x`-prefixed) and right-pads
    /// shorter values with zero bytes, the way contract tooling coerces a short
    /// literal into a fixed 32-byte word.
    pub fn parse_bytes32(s: &str) -> Result<Self, hex::FromHexError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        if bytes.len() > 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr[..bytes.len()].copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

/// An opaque caller identity.
///
/// Supplied by whoever drives the ledger and trusted as-is. Identities minted
/// from a [`Keypair`](crate::Keypair) are the Ed25519 verifying key bytes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Principal(pub [u8; 32]);

id_newtype!(Principal, "Principal");

/// A 32-byte ledger event identifier, computed as Blake3(domain || canonical_bytes(event)).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(pub [u8; 32]);

id_newtype!(EventId, "EventId");

impl EventId {
    /// The zero event ID (used as a sentinel).
    pub const ZERO: Self = Self([0u8; 32]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_hash_hex_roundtrip() {
        let hash = DocumentHash::from_bytes([0x42; 32]);
        let recovered = DocumentHash::from_hex(&hash.to_hex()).unwrap();
        assert_eq!(hash, recovered);
    }

    #[test]
    fn test_from_hex_accepts_prefix() {
        let hex = format!("0x{}", "ab".repeat(32));
        let principal = Principal::from_hex(&hex).unwrap();
        assert_eq!(principal, Principal::from_bytes([0xab; 32]));
    }

    #[test]
    fn test_from_hex_rejects_short_input() {
        assert!(DocumentHash::from_hex("abcd").is_err());
    }

    #[test]
    fn test_parse_bytes32_right_pads() {
        // 31 bytes of hex, as submitted by contract tooling
        let hash = DocumentHash::parse_bytes32(
            "0x38626630313632393933366636616133303132646561616662663865323164",
        )
        .unwrap();
        assert_eq!(hash.as_bytes()[0], 0x38);
        assert_eq!(hash.as_bytes()[30], 0x64);
        assert_eq!(hash.as_bytes()[31], 0x00);
    }

    #[test]
    fn test_parse_bytes32_rejects_oversized() {
        assert!(DocumentHash::parse_bytes32(&"00".repeat(33)).is_err());
    }

    #[test]
    fn test_document_hash_of_content() {
        assert_eq!(DocumentHash::of(b"contract.pdf"), DocumentHash::of(b"contract.pdf"));
        assert_ne!(DocumentHash::of(b"contract.pdf"), DocumentHash::of(b"contract-v2.pdf"));
    }

    #[test]
    fn test_display_and_debug() {
        let id = EventId::from_bytes([0xcd; 32]);
        assert_eq!(format!("{}", id), "cdcdcdcdcdcdcdcd");
        assert!(format!("{:?}", id).starts_with("EventId("));
    }
}
