//! Agent revocation
//!
//! A replicated, append-only set of revoked agents, and the write guard that
//! consults it.

pub mod errors;
pub mod guard;
pub mod record;
pub mod registry;

pub use errors::RevocationError;
pub use guard::{ValidationOutcome, WriteGuard};
pub use record::{revocation_anchor, RevocationRecord};
pub use registry::RevocationRegistry;

use crate::core_identity::AgentId;

/// Read access to a revocation replica
pub trait RevocationCheck {
    fn is_revoked(&self, agent: &AgentId) -> bool;
}
