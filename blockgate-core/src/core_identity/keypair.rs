//! Keypair module
//!
//! Handles the ed25519 signing key an issuer or administrator uses to sign
//! invite codes and revocation records.
//!
//! Security: secret key bytes are zeroized on drop and never printed.

use crate::core_identity::{AgentId, IdentityError};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier};
use rand::Rng;
use std::fmt;
use std::path::Path;
use zeroize::Zeroize;

/// Length of an ed25519 signature in bytes
pub const SIGNATURE_LEN: usize = 64;

/// Ed25519 signing keypair
#[derive(Clone)]
pub struct SigningKeypair {
    signing_key: SigningKey,
}

impl SigningKeypair {
    /// Generate a new keypair from the thread-local CSPRNG
    pub fn generate() -> Self {
        let mut seed: [u8; 32] = rand::rng().random();
        let keypair = Self::from_secret_bytes(&seed);
        seed.zeroize();
        keypair
    }

    /// Rebuild a keypair from its 32-byte secret seed
    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        SigningKeypair { signing_key: SigningKey::from_bytes(secret) }
    }

    /// The public identity of this keypair
    pub fn agent_id(&self) -> AgentId {
        AgentId::from_verifying_key(&self.signing_key.verifying_key())
    }

    /// Sign a message, returning the 64-byte signature
    pub fn sign(&self, msg: &[u8]) -> Vec<u8> {
        self.signing_key.sign(msg).to_bytes().to_vec()
    }

    /// Verify a signature made by `agent` over `msg`
    pub fn verify(agent: &AgentId, msg: &[u8], sig: &[u8]) -> bool {
        if sig.len() != SIGNATURE_LEN {
            return false;
        }

        let verifying_key = match agent.verifying_key() {
            Ok(vk) => vk,
            Err(_) => return false,
        };

        let signature = match Signature::from_slice(sig) {
            Ok(sig) => sig,
            Err(_) => return false,
        };

        verifying_key.verify(msg, &signature).is_ok()
    }

    /// Write the secret seed to `path` as hex
    pub fn save_to_file(&self, path: &Path) -> Result<(), IdentityError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut encoded = hex::encode(self.signing_key.to_bytes());
        let result = std::fs::write(path, encoded.as_bytes());
        encoded.zeroize();
        result?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// Load a keypair previously written by [`SigningKeypair::save_to_file`]
    pub fn load_from_file(path: &Path) -> Result<Self, IdentityError> {
        let mut contents = std::fs::read_to_string(path)?;
        let decoded = hex::decode(contents.trim());
        contents.zeroize();

        let mut bytes = decoded.map_err(|e| IdentityError::InvalidKey(e.to_string()))?;
        let seed: Result<[u8; 32], _> = bytes.as_slice().try_into();
        bytes.zeroize();

        let mut seed = seed.map_err(|_| IdentityError::InvalidKey("secret key must be 32 bytes".into()))?;
        let keypair = Self::from_secret_bytes(&seed);
        seed.zeroize();
        Ok(keypair)
    }
}

impl fmt::Debug for SigningKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeypair")
            .field("agent", &self.agent_id().to_hex())
            .field("secret", &"<redacted>")
            .finish()
    }
}
