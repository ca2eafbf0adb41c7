//! Blockgate: invite-only admission for a neighbourhood network
//!
//! An administrator issues signed invite codes. A joining agent presents one
//! as its membrane proof, which is validated once before its source chain
//! exists. Administrators can later revoke agents; revoked agents can no
//! longer write, while their history stays intact.

pub mod config;
pub mod core_admission;
pub mod core_identity;
pub mod core_invite;
pub mod core_revocation;
pub mod core_store;
pub mod logging;
pub mod metrics;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod time;

pub use config::{Config, NetworkConfig};
pub use core_admission::{Admission, AdmissionError, AdmissionValidator};
pub use core_identity::{AgentId, SigningKeypair};
pub use core_invite::{InviteIssuer, InvitePayload, WireVersion};
pub use core_revocation::{RevocationRegistry, WriteGuard};
pub use core_store::{CommitLog, SourceChain};
pub use logging::{init_logging, LogLevel};
pub use time::{Clock, SystemClock, Timestamp};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        // Ensure the main exports are accessible
        let _ = LogLevel::Info;
        let _ = WireVersion::V2;
        let _ = Config::default();
    }
}
