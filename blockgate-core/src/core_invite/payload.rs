//! Invite payloads
//!
//! Two wire formats coexist. Each variant owns its canonical signed-byte
//! sequence; nothing outside this module decides what gets signed.

use crate::core_identity::{AgentId, SigningKeypair};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire format version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireVersion {
    V1,
    V2,
}

impl fmt::Display for WireVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireVersion::V1 => write!(f, "v1"),
            WireVersion::V2 => write!(f, "v2"),
        }
    }
}

/// Legacy colon-delimited invite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteV1 {
    pub hub_address: String,
    pub network_seed: String,
    pub timestamp: Timestamp,
    pub signature: Vec<u8>,
}

impl InviteV1 {
    /// hub_address ‖ network_seed ‖ timestamp (u64 LE, microseconds)
    ///
    /// The two strings are not delimited, so moving bytes between the end of
    /// `hub_address` and the start of `network_seed` keeps the signature valid.
    /// The layout is fixed by V1 codes already in circulation, so an issuer key
    /// that signs V1 codes must sign for one network only.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(self.hub_address.as_bytes());
        payload.extend_from_slice(self.network_seed.as_bytes());
        payload.extend_from_slice(&self.timestamp.as_micros().to_le_bytes());
        payload
    }
}

/// Base64 JSON invite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteV2 {
    pub network_seed: String,
    pub hub_identity_key: AgentId,
    pub signal_relay_url: String,
    pub bootstrap_url: String,
    pub timestamp: Timestamp,
    pub signature: Vec<u8>,
    pub voucher: Option<AgentId>,
}

impl InviteV2 {
    /// network_seed ‖ timestamp (u64 LE, microseconds) ‖ signal_relay_url [‖ voucher key]
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(self.network_seed.as_bytes());
        payload.extend_from_slice(&self.timestamp.as_micros().to_le_bytes());
        payload.extend_from_slice(self.signal_relay_url.as_bytes());
        if let Some(voucher) = &self.voucher {
            payload.extend_from_slice(voucher.as_bytes());
        }
        payload
    }
}

/// A decoded invite code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvitePayload {
    V1(InviteV1),
    V2(InviteV2),
}

impl InvitePayload {
    pub fn version(&self) -> WireVersion {
        match self {
            InvitePayload::V1(_) => WireVersion::V1,
            InvitePayload::V2(_) => WireVersion::V2,
        }
    }

    /// The exact bytes the issuer signs for this format
    pub fn signing_bytes(&self) -> Vec<u8> {
        match self {
            InvitePayload::V1(v1) => v1.signing_bytes(),
            InvitePayload::V2(v2) => v2.signing_bytes(),
        }
    }

    pub fn network_seed(&self) -> &str {
        match self {
            InvitePayload::V1(v1) => &v1.network_seed,
            InvitePayload::V2(v2) => &v2.network_seed,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            InvitePayload::V1(v1) => v1.timestamp,
            InvitePayload::V2(v2) => v2.timestamp,
        }
    }

    pub fn signature(&self) -> &[u8] {
        match self {
            InvitePayload::V1(v1) => &v1.signature,
            InvitePayload::V2(v2) => &v2.signature,
        }
    }

    /// V1 codes never carry a voucher
    pub fn voucher(&self) -> Option<&AgentId> {
        match self {
            InvitePayload::V1(_) => None,
            InvitePayload::V2(v2) => v2.voucher.as_ref(),
        }
    }

    /// Replace the signature with one made by `keypair` over [`Self::signing_bytes`]
    pub fn sign(&mut self, keypair: &SigningKeypair) {
        let signature = keypair.sign(&self.signing_bytes());
        match self {
            InvitePayload::V1(v1) => v1.signature = signature,
            InvitePayload::V2(v2) => v2.signature = signature,
        }
    }

    /// Check the signature against the issuer's public key
    pub fn verify(&self, issuer: &AgentId) -> bool {
        SigningKeypair::verify(issuer, &self.signing_bytes(), self.signature())
    }
}
