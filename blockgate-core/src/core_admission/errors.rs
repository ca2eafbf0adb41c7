//! Admission rejection reasons
//!
//! Every variant is final: a proof that is rejected once is rejected on
//! every retry, so the join flow shows the reason and stops.

use crate::core_identity::AgentId;
use crate::core_invite::{FormatError, ParseError};
use crate::time::Timestamp;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("Malformed membrane proof: {0}")]
    MalformedInput(String),

    #[error("Invite expired at {expired_at}")]
    Expired { expired_at: Timestamp },

    #[error("Invite was revoked at {revoked_at}")]
    InvitationRevoked { revoked_at: Timestamp },

    #[error("Invite belongs to network '{found}', expected '{expected}'")]
    NetworkMismatch { expected: String, found: String },

    #[error("Invite signature does not verify against the issuer key")]
    SignatureInvalid,

    #[error("This network requires a voucher")]
    VoucherRequired,

    #[error("Voucher {0} is not a trusted member")]
    VoucherInvalid(AgentId),
}

impl AdmissionError {
    /// Stable label for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            AdmissionError::MalformedInput(_) => "malformed_input",
            AdmissionError::Expired { .. } => "expired",
            AdmissionError::InvitationRevoked { .. } => "invitation_revoked",
            AdmissionError::NetworkMismatch { .. } => "network_mismatch",
            AdmissionError::SignatureInvalid => "signature_invalid",
            AdmissionError::VoucherRequired => "voucher_required",
            AdmissionError::VoucherInvalid(_) => "voucher_invalid",
        }
    }

    /// What the joining neighbour should do next
    pub fn user_hint(&self) -> &'static str {
        match self {
            AdmissionError::MalformedInput(_) => {
                "This doesn't look like an invite code. Copy the whole code and try again."
            }
            AdmissionError::Expired { .. } => {
                "This invite has expired. Ask your neighbourhood admin for a new code."
            }
            AdmissionError::InvitationRevoked { .. } => {
                "This invite was withdrawn by your neighbourhood admin. Ask them for a new code."
            }
            AdmissionError::NetworkMismatch { .. } => {
                "This invite is for a different neighbourhood. Check that you are joining the right one."
            }
            AdmissionError::SignatureInvalid => {
                "This invite code is damaged or was altered. Copy the full code again."
            }
            AdmissionError::VoucherRequired => {
                "This neighbourhood needs an existing neighbour to vouch for you. Ask for a vouched invite."
            }
            AdmissionError::VoucherInvalid(_) => {
                "The neighbour vouching for you is not a trusted member. Ask someone else to vouch."
            }
        }
    }

    /// Proof rejections never change on retry
    pub fn is_retryable(&self) -> bool {
        false
    }
}

impl From<ParseError> for AdmissionError {
    fn from(err: ParseError) -> Self {
        AdmissionError::MalformedInput(err.to_string())
    }
}

impl From<FormatError> for AdmissionError {
    fn from(err: FormatError) -> Self {
        match err {
            FormatError::Malformed(parse) => parse.into(),
            FormatError::Structure(reason) => AdmissionError::MalformedInput(reason),
            FormatError::Expired { expired_at } => AdmissionError::Expired { expired_at },
        }
    }
}

/// Web-of-trust bookkeeping errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VouchError {
    #[error("Cannot vouch for yourself")]
    SelfVouch,

    #[error("{voucher} has already vouched for {vouchee}")]
    Duplicate { voucher: AgentId, vouchee: AgentId },

    #[error("Vouch note exceeds {max} bytes")]
    NoteTooLong { max: usize },

    #[error("Anchors already exist; only an existing anchor can designate new ones")]
    AnchorsExist,

    #[error("{0} is not a trusted anchor")]
    NotAnchor(AgentId),

    #[error("{0} is already a trusted anchor")]
    AlreadyAnchor(AgentId),
}
