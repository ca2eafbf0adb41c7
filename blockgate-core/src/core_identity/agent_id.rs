//! Agent ID module
//!
//! An agent is identified by its long-term ed25519 verifying key.

use crate::core_identity::IdentityError;
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Length of an agent key in bytes
pub const AGENT_ID_LEN: usize = 32;

/// AgentId is the raw 32-byte ed25519 public key of a participant
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId([u8; AGENT_ID_LEN]);

impl AgentId {
    /// Create an AgentId from raw key bytes, checking that they form a valid ed25519 point
    pub fn from_bytes(bytes: [u8; AGENT_ID_LEN]) -> Result<Self, IdentityError> {
        VerifyingKey::from_bytes(&bytes).map_err(|e| IdentityError::InvalidKey(e.to_string()))?;
        Ok(AgentId(bytes))
    }

    /// Create an AgentId from a byte slice of any length
    pub fn from_slice(bytes: &[u8]) -> Result<Self, IdentityError> {
        let array: [u8; AGENT_ID_LEN] = bytes.try_into().map_err(|_| {
            IdentityError::InvalidKey(format!(
                "agent key must be {} bytes, got {}",
                AGENT_ID_LEN,
                bytes.len()
            ))
        })?;
        Self::from_bytes(array)
    }

    pub(crate) fn from_verifying_key(key: &VerifyingKey) -> Self {
        AgentId(key.to_bytes())
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; AGENT_ID_LEN] {
        &self.0
    }

    /// Convert to the ed25519 verifying key
    pub fn verifying_key(&self) -> Result<VerifyingKey, IdentityError> {
        VerifyingKey::from_bytes(&self.0).map_err(|e| IdentityError::InvalidKey(e.to_string()))
    }

    /// Hex encoding of the key
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short form for log lines
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AgentId({})", self.short())
    }
}

impl FromStr for AgentId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes =
            hex::decode(s.trim()).map_err(|e| IdentityError::InvalidKey(format!("Invalid hex: {}", e)))?;
        Self::from_slice(&bytes)
    }
}

impl Serialize for AgentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AgentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_identity::SigningKeypair;

    #[test]
    fn test_agent_id_hex_roundtrip() {
        let agent = SigningKeypair::generate().agent_id();
        let parsed: AgentId = agent.to_hex().parse().unwrap();
        assert_eq!(agent, parsed);
    }

    #[test]
    fn test_agent_id_rejects_wrong_length() {
        assert!(AgentId::from_slice(&[1, 2, 3]).is_err());
        assert!("abcd".parse::<AgentId>().is_err());
        assert!("not hex".parse::<AgentId>().is_err());
    }

    #[test]
    fn test_agent_id_serde_as_hex_string() {
        let agent = SigningKeypair::generate().agent_id();
        let json = serde_json::to_string(&agent).unwrap();
        assert_eq!(json, format!("\"{}\"", agent.to_hex()));

        let back: AgentId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, agent);

        // bincode goes through the same string form
        let bytes = bincode::serialize(&agent).unwrap();
        let back: AgentId = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, agent);
    }
}
