//! Invite issuance
//!
//! The issuer signs invite codes for its network and keeps a record of every
//! invitation in an append-only log. The in-memory view is folded from that
//! log and only changes after an append succeeds.
//!
//! The issuer is also the [`InvitationStatus`] the validator consults, so a
//! revoked or short-lived code stops admitting wherever this log is available.

use crate::config::NetworkConfig;
use crate::core_admission::{InvitationStatus, RecordedInvitation};
use crate::core_identity::{AgentId, SigningKeypair};
use crate::core_invite::codec;
use crate::core_invite::errors::InviteError;
use crate::core_invite::payload::{InvitePayload, InviteV1, InviteV2, WireVersion};
use crate::core_store::{LogEntry, LogStore, StoreError};
use crate::metrics::{INVITES_ISSUED_TOTAL, INVITES_REVOKED_TOTAL};
use crate::time::{Clock, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Reference to an issued invitation: the hash of its log entry
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvitationRef([u8; 32]);

impl InvitationRef {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        InvitationRef(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for InvitationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for InvitationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InvitationRef({})", &hex::encode(self.0)[..12])
    }
}

impl FromStr for InvitationRef {
    type Err = InviteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| InviteError::InvalidInput(format!("invitation ref is not hex: {}", e)))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| InviteError::InvalidInput("invitation ref must be 32 bytes".to_string()))?;
        Ok(InvitationRef(bytes))
    }
}

/// One issued invitation as the issuer remembers it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub invitation_ref: InvitationRef,
    pub neighbor_name: String,
    pub voucher: Option<AgentId>,
    pub invite_code: String,
    pub version: WireVersion,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub revoked_at: Option<Timestamp>,
}

impl Invitation {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        now > self.expires_at
    }
}

/// What `generate` hands back to the administrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedInvite {
    pub invite_code: String,
    pub invitation_ref: InvitationRef,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

/// Records stored in the invitation log
#[derive(Debug, Serialize, Deserialize)]
enum InvitationEvent {
    Issued {
        neighbor_name: String,
        voucher: Option<AgentId>,
        invite_code: String,
        version: WireVersion,
        created_at: Timestamp,
        expires_at: Timestamp,
    },
    Revoked {
        invitation: InvitationRef,
        revoked_at: Timestamp,
    },
}

pub struct InviteIssuer<S: LogStore, C: Clock> {
    keypair: SigningKeypair,
    network: NetworkConfig,
    log: S,
    clock: C,
    invitations: Vec<Invitation>,
    index: HashMap<InvitationRef, usize>,
    by_signature: HashMap<Vec<u8>, usize>,
}

impl<S: LogStore, C: Clock> InviteIssuer<S, C> {
    /// Load the issuer signing key, reporting a missing file distinctly
    pub fn load_key(path: &Path) -> Result<SigningKeypair, InviteError> {
        if !path.exists() {
            return Err(InviteError::MissingSigningKey(path.to_path_buf()));
        }
        Ok(SigningKeypair::load_from_file(path)?)
    }

    /// Open an issuer over `log`, replaying previously issued invitations.
    ///
    /// When the network names an issuer key, `keypair` must match it.
    pub fn open(keypair: SigningKeypair, network: NetworkConfig, log: S, clock: C) -> Result<Self, InviteError> {
        if let Some(expected) = network.issuer_key()? {
            if expected != keypair.agent_id() {
                return Err(InviteError::KeyMismatch);
            }
        }

        let mut issuer = InviteIssuer {
            keypair,
            network,
            log,
            clock,
            invitations: Vec::new(),
            index: HashMap::new(),
            by_signature: HashMap::new(),
        };

        for entry in issuer.log.entries()? {
            issuer.apply(&entry)?;
        }
        debug!(invitations = issuer.invitations.len(), "invitation log replayed");

        Ok(issuer)
    }

    pub fn issuer_id(&self) -> AgentId {
        self.keypair.agent_id()
    }

    /// Issue a new invite code for `neighbor_name`.
    ///
    /// `validity` may be shorter than the network's invite window but not longer:
    /// codes carry no expiry of their own, so peers without this log enforce the
    /// network window. V1 codes cannot carry a voucher; it is then kept on the
    /// invitation record only.
    pub fn generate(
        &mut self,
        neighbor_name: &str,
        voucher: Option<AgentId>,
        validity: Duration,
    ) -> Result<GeneratedInvite, InviteError> {
        if validity.is_zero() {
            return Err(InviteError::InvalidValidity);
        }
        if validity > self.network.invite_validity {
            return Err(InviteError::ValidityTooLong { requested: validity, window: self.network.invite_validity });
        }
        let neighbor_name = neighbor_name.trim();
        if neighbor_name.is_empty() {
            return Err(InviteError::InvalidInput("neighbor name must not be empty".to_string()));
        }

        let created_at = self.clock.now();
        let expires_at = created_at.saturating_add(validity);
        let version = self.network.wire_format;

        let mut payload = self.payload(version, created_at, voucher);
        payload.sign(&self.keypair);
        let invite_code = codec::serialize(&payload)?;

        if version == WireVersion::V1 && voucher.is_some() {
            warn!("V1 invite codes cannot carry a voucher; recording it on the invitation only");
        }

        let event = InvitationEvent::Issued {
            neighbor_name: neighbor_name.to_string(),
            voucher,
            invite_code: invite_code.clone(),
            version,
            created_at,
            expires_at,
        };
        let entry = self.append(created_at, &event)?;
        let invitation_ref = InvitationRef(entry.hash);
        self.apply(&entry)?;

        info!(
            invitation = ?invitation_ref,
            code = %codec::fingerprint(&invite_code),
            %version,
            "invite issued"
        );
        metrics::counter!(INVITES_ISSUED_TOTAL).increment(1);

        Ok(GeneratedInvite { invite_code, invitation_ref, created_at, expires_at })
    }

    /// Mark an invitation revoked. Revocation is terminal.
    pub fn revoke(&mut self, invitation: &InvitationRef) -> Result<&Invitation, InviteError> {
        let idx = *self
            .index
            .get(invitation)
            .ok_or_else(|| InviteError::NotFound(invitation.to_string()))?;
        if self.invitations[idx].is_revoked() {
            return Err(InviteError::AlreadyRevoked(invitation.to_string()));
        }

        let revoked_at = self.clock.now();
        let entry = self.append(revoked_at, &InvitationEvent::Revoked { invitation: *invitation, revoked_at })?;
        self.apply(&entry)?;

        info!(invitation = ?invitation, "invite revoked");
        metrics::counter!(INVITES_REVOKED_TOTAL).increment(1);
        Ok(&self.invitations[idx])
    }

    /// All invitations in issue order
    pub fn list(&self) -> &[Invitation] {
        &self.invitations
    }

    pub fn get(&self, invitation: &InvitationRef) -> Option<&Invitation> {
        self.index.get(invitation).map(|&idx| &self.invitations[idx])
    }

    fn payload(&self, version: WireVersion, timestamp: Timestamp, voucher: Option<AgentId>) -> InvitePayload {
        let network = &self.network;
        match version {
            WireVersion::V1 => InvitePayload::V1(InviteV1 {
                hub_address: network.hub_address.clone(),
                network_seed: network.network_seed.clone(),
                timestamp,
                signature: Vec::new(),
            }),
            WireVersion::V2 => InvitePayload::V2(InviteV2 {
                network_seed: network.network_seed.clone(),
                hub_identity_key: self.keypair.agent_id(),
                signal_relay_url: network.signal_relay_url.clone(),
                bootstrap_url: network.bootstrap_url.clone(),
                timestamp,
                signature: Vec::new(),
                voucher,
            }),
        }
    }

    fn append(&mut self, timestamp: Timestamp, event: &InvitationEvent) -> Result<LogEntry, InviteError> {
        let data = bincode::serialize(event).map_err(StoreError::from)?;
        Ok(self.log.append(timestamp, &data)?)
    }

    /// Fold one log entry into the in-memory view
    fn apply(&mut self, entry: &LogEntry) -> Result<(), InviteError> {
        let event: InvitationEvent = bincode::deserialize(&entry.data)
            .map_err(|e| StoreError::Deserialization(format!("invitation seq {}: {}", entry.seq, e)))?;

        match event {
            InvitationEvent::Issued { neighbor_name, voucher, invite_code, version, created_at, expires_at } => {
                let payload = codec::parse(&invite_code)
                    .map_err(|e| StoreError::CorruptedData(format!("invitation seq {}: {}", entry.seq, e)))?;
                let invitation_ref = InvitationRef(entry.hash);
                self.index.insert(invitation_ref, self.invitations.len());
                self.by_signature.insert(payload.signature().to_vec(), self.invitations.len());
                self.invitations.push(Invitation {
                    invitation_ref,
                    neighbor_name,
                    voucher,
                    invite_code,
                    version,
                    created_at,
                    expires_at,
                    revoked_at: None,
                });
            }
            InvitationEvent::Revoked { invitation, revoked_at } => {
                let idx = *self.index.get(&invitation).ok_or_else(|| {
                    StoreError::CorruptedData(format!("revocation of unknown invitation {}", invitation))
                })?;
                self.invitations[idx].revoked_at.get_or_insert(revoked_at);
            }
        }
        Ok(())
    }
}

/// Codes are matched by signature, which survives re-encoding of the same payload
impl<S: LogStore, C: Clock> InvitationStatus for InviteIssuer<S, C> {
    fn recorded_invitation(&self, payload: &InvitePayload) -> Option<RecordedInvitation> {
        let invitation = &self.invitations[*self.by_signature.get(payload.signature())?];
        Some(RecordedInvitation { expires_at: invitation.expires_at, revoked_at: invitation.revoked_at })
    }
}
