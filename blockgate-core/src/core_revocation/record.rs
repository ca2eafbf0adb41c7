//! Signed revocation records

use crate::core_identity::{AgentId, SigningKeypair};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

const ANCHOR_PATH: &[u8] = b"blockgate:revoked_agents";
const RECORD_DOMAIN: &[u8] = b"blockgate:revocation:v1";

/// Well-known address every revocation record is linked from
pub fn revocation_anchor() -> [u8; 32] {
    *blake3::hash(ANCHOR_PATH).as_bytes()
}

/// A signed statement that `revoked_agent` may no longer write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationRecord {
    pub revoked_agent: AgentId,
    pub reason: String,
    pub revoked_at: Timestamp,
    pub revoker: AgentId,
    pub signature: Vec<u8>,
}

impl RevocationRecord {
    /// Build and sign a record with `revoker`'s key
    pub fn new_signed(
        revoker: &SigningKeypair,
        revoked_agent: AgentId,
        reason: impl Into<String>,
        revoked_at: Timestamp,
    ) -> Self {
        let mut record = RevocationRecord {
            revoked_agent,
            reason: reason.into(),
            revoked_at,
            revoker: revoker.agent_id(),
            signature: Vec::new(),
        };
        record.signature = revoker.sign(&record.signing_bytes());
        record
    }

    /// domain ‖ revoked_agent ‖ revoker ‖ revoked_at (LE) ‖ reason length (LE u32) ‖ reason
    pub fn signing_bytes(&self) -> Vec<u8> {
        let reason = self.reason.as_bytes();
        let mut bytes = Vec::with_capacity(RECORD_DOMAIN.len() + 32 + 32 + 8 + 4 + reason.len());
        bytes.extend_from_slice(RECORD_DOMAIN);
        bytes.extend_from_slice(self.revoked_agent.as_bytes());
        bytes.extend_from_slice(self.revoker.as_bytes());
        bytes.extend_from_slice(&self.revoked_at.as_micros().to_le_bytes());
        bytes.extend_from_slice(&(reason.len() as u32).to_le_bytes());
        bytes.extend_from_slice(reason);
        bytes
    }

    pub fn verify_signature(&self) -> bool {
        SigningKeypair::verify(&self.revoker, &self.signing_bytes(), &self.signature)
    }

    /// Content address of the record
    pub fn record_id(&self) -> [u8; 32] {
        *blake3::hash(&self.signing_bytes()).as_bytes()
    }
}
