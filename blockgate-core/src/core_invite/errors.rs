//! Invite error types

use crate::config::ConfigError;
use crate::core_identity::IdentityError;
use crate::core_store::StoreError;
use crate::time::Timestamp;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Structural problems with an invite string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Invite code is empty")]
    Empty,

    #[error("Unknown invite format: {0}")]
    UnknownVersion(String),

    #[error("Expected at least {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid base64 in {field}: {reason}")]
    InvalidBase64 { field: &'static str, reason: String },

    #[error("Invalid JSON payload: {0}")]
    InvalidJson(String),

    #[error("Invalid key in {field}: {reason}")]
    InvalidKey { field: &'static str, reason: String },

    #[error("Field {field} cannot be encoded: {reason}")]
    Unencodable { field: &'static str, reason: String },
}

/// Outcome of the cheap, crypto-free pre-check of an invite string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("Malformed invite: {0}")]
    Malformed(#[from] ParseError),

    #[error("Malformed invite: {0}")]
    Structure(String),

    #[error("Invite expired at {expired_at}")]
    Expired { expired_at: Timestamp },
}

/// Invite issuance errors
#[derive(Debug, Error)]
pub enum InviteError {
    #[error("Signing key not found at {0}")]
    MissingSigningKey(PathBuf),

    #[error("Signing key does not match the configured issuer key")]
    KeyMismatch,

    #[error("Validity duration must be greater than zero")]
    InvalidValidity,

    #[error("Validity {requested:?} exceeds the network's invite window of {window:?}")]
    ValidityTooLong { requested: Duration, window: Duration },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invitation not found: {0}")]
    NotFound(String),

    #[error("Invitation {0} is already revoked")]
    AlreadyRevoked(String),

    #[error(transparent)]
    Encoding(#[from] ParseError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StoreError),
}
