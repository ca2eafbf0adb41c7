//! Revocation error types

use crate::core_identity::AgentId;
use crate::core_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RevocationError {
    #[error("Agent {0} is already revoked")]
    AlreadyRevoked(AgentId),

    #[error("Agent {0} is not an administrator of this network")]
    Unauthorized(AgentId),

    #[error("Revocation record signature is invalid")]
    InvalidSignature,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}
