//! Write-time enforcement of revocations
//!
//! Every entry or link an agent authors passes through here. A revoked author
//! is refused; anything already on their chain stays.

use crate::core_identity::AgentId;
use crate::core_revocation::RevocationCheck;
use crate::metrics::WRITES_REJECTED_TOTAL;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Invalid(String),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }
}

pub struct WriteGuard<'a> {
    revocations: &'a dyn RevocationCheck,
}

impl<'a> WriteGuard<'a> {
    pub fn new(revocations: &'a dyn RevocationCheck) -> Self {
        WriteGuard { revocations }
    }

    pub fn validate_create_entry(&self, author: &AgentId) -> ValidationOutcome {
        self.check(author, "entry")
    }

    pub fn validate_create_link(&self, author: &AgentId) -> ValidationOutcome {
        self.check(author, "link")
    }

    fn check(&self, author: &AgentId, kind: &'static str) -> ValidationOutcome {
        if self.revocations.is_revoked(author) {
            warn!(author = %author.short(), kind, "write rejected: author revoked");
            metrics::counter!(WRITES_REJECTED_TOTAL, "kind" => kind).increment(1);
            return ValidationOutcome::Invalid(format!("Agent {} has been revoked", author));
        }
        ValidationOutcome::Valid
    }
}
