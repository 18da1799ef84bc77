//! Ed25519 identity wrapper.
//!
//! A node's position on the snake is its Ed25519 public key. Key
//! generation and payload authentication live outside the routing core;
//! this is the thin wrapper the node and tests use to mint identities
//! and sign root announcements.

use ed25519_dalek::{Signer, Verifier};

use crate::types::PublicKey;

/// A node identity holding the Ed25519 signing key.
#[must_use]
pub struct Identity {
    signing: ed25519_dalek::SigningKey,
}

/// A detached Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct Signature(ed25519_dalek::Signature);

impl Identity {
    /// Generate a new random identity.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self {
            signing: ed25519_dalek::SigningKey::generate(&mut csprng),
        }
    }

    /// Reconstruct an identity from its 32 raw private key bytes.
    pub fn from_private_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            signing: ed25519_dalek::SigningKey::from_bytes(bytes),
        }
    }

    /// The overlay public key derived from this identity.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::new(self.signing.verifying_key().to_bytes())
    }

    /// Raw private key bytes, for persistence.
    #[must_use]
    pub fn to_private_bytes(&self) -> [u8; 32] {
        self.signing.to_bytes()
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing.sign(message))
    }
}

/// Verify a detached signature against a public key.
#[must_use]
pub fn verify(key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
    let Ok(verifying) = ed25519_dalek::VerifyingKey::from_bytes(key.as_bytes()) else {
        return false;
    };
    verifying.verify(message, &signature.0).is_ok()
}

impl Signature {
    pub const SIZE: usize = 64;

    pub fn from_bytes(bytes: &[u8; 64]) -> Self {
        Self(ed25519_dalek::Signature::from_bytes(bytes))
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; 64] {
        self.0.to_bytes()
    }
}

impl core::fmt::Debug for Signature {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Signature(..)")
    }
}
