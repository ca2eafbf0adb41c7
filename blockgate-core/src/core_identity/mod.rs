//! Identity module
//!
//! Agents are identified by their ed25519 public key. Issuers and
//! administrators hold a [`SigningKeypair`]; everyone else only ever needs
//! the [`AgentId`] to verify what was signed.

mod agent_id;
mod keypair;

pub use agent_id::{AgentId, AGENT_ID_LEN};
pub use keypair::{SigningKeypair, SIGNATURE_LEN};

/// Errors that can occur during identity operations
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
