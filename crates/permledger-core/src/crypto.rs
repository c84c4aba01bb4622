//! Identity keypairs.
//!
//! Principals are opaque to the ledger, but tools and tests need a way to
//! mint distinct, reproducible identities. A [`Keypair`] wraps an Ed25519
//! signing key and exposes its verifying key as a [`Principal`].

use ed25519_dalek::SigningKey;
use std::fmt;

use crate::types::Principal;

/// An Ed25519 keypair backing a principal identity.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Create from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        Self { signing_key }
    }

    /// The principal identified by this keypair.
    pub fn principal(&self) -> Principal {
        Principal(self.signing_key.verifying_key().to_bytes())
    }

    /// Get the raw seed bytes (secret key material).
    pub fn seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({:?})", self.principal())
    }
}
