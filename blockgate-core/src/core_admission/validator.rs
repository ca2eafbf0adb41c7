/*
    validator.rs - Genesis-time admission check

    Runs once, synchronously, before a joining agent's source chain exists.
    It is a pure function of (agent, proof, policy, now, lookups): the only
    work beyond local lookups is one signature verification.

    Check order:
    1. bootstrap agent bypass
    2. empty proof (rejected on private networks)
    3. decode
    4. signature over the version's canonical bytes
    5. network seed
    6. expiry (the issuer's recorded expiry when it is known, else the network window)
    7. invitation revoked by its issuer
    8. voucher
*/

use crate::core_admission::errors::AdmissionError;
use crate::core_identity::AgentId;
use crate::core_invite::{codec, InvitePayload, WireVersion};
use crate::metrics::{Timer, ADMISSIONS_TOTAL, ADMISSION_DURATION_MS};
use crate::time::Timestamp;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Network settings the validator needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionPolicy {
    pub network_seed: String,
    pub issuer: AgentId,
    pub bootstrap_agent: Option<AgentId>,
    pub private_network: bool,
    pub vouching_required: bool,
    pub validity: Duration,
}

/// Why an agent was let in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The configured first administrator, admitted without a proof
    Bootstrap,
    /// Public network, no proof supplied
    Open,
    /// A valid invite code
    Invited { version: WireVersion, voucher: Option<AgentId> },
}

/// Answers whether an identity may vouch for newcomers
pub trait VoucherDirectory {
    fn is_trusted_voucher(&self, agent: &AgentId) -> bool;
}

/// What the issuer recorded about one invite code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedInvitation {
    pub expires_at: Timestamp,
    pub revoked_at: Option<Timestamp>,
}

/// Answers what the issuer recorded for a code it signed
pub trait InvitationStatus {
    /// `None` when the code was not issued from this record
    fn recorded_invitation(&self, payload: &InvitePayload) -> Option<RecordedInvitation>;
}

/// Local state the validator may consult beyond its policy.
///
/// Each lookup is optional; a missing one skips only the checks that need it.
#[derive(Clone, Copy, Default)]
pub struct AdmissionLookups<'a> {
    pub vouchers: Option<&'a dyn VoucherDirectory>,
    pub invitations: Option<&'a dyn InvitationStatus>,
}

impl<'a> AdmissionLookups<'a> {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_vouchers(mut self, vouchers: &'a dyn VoucherDirectory) -> Self {
        self.vouchers = Some(vouchers);
        self
    }

    pub fn with_invitations(mut self, invitations: &'a dyn InvitationStatus) -> Self {
        self.invitations = Some(invitations);
        self
    }
}

pub struct AdmissionValidator {
    policy: AdmissionPolicy,
}

impl AdmissionValidator {
    pub fn new(policy: AdmissionPolicy) -> Self {
        AdmissionValidator { policy }
    }

    pub fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }

    /// Decide whether `agent` may create its source chain with `proof`.
    ///
    /// The voucher itself is only checked when `lookups` has a voucher directory;
    /// without it a present voucher reference is enough. Revoked invitations and
    /// per-code expiry are only known where `lookups` carries the issuer's record.
    pub fn validate(
        &self,
        agent: &AgentId,
        proof: &[u8],
        now: Timestamp,
        lookups: AdmissionLookups<'_>,
    ) -> Result<Admission, AdmissionError> {
        let timer = Timer::new(ADMISSION_DURATION_MS);
        let outcome = self.check(agent, proof, now, lookups);
        timer.stop();

        match &outcome {
            Ok(admission) => {
                info!(agent = %agent.short(), ?admission, "admission accepted");
                metrics::counter!(ADMISSIONS_TOTAL, "result" => "accepted").increment(1);
            }
            Err(err) => {
                warn!(agent = %agent.short(), reason = err.kind(), "admission rejected: {}", err);
                metrics::counter!(ADMISSIONS_TOTAL, "result" => err.kind()).increment(1);
            }
        }

        outcome
    }

    fn check(
        &self,
        agent: &AgentId,
        proof: &[u8],
        now: Timestamp,
        lookups: AdmissionLookups<'_>,
    ) -> Result<Admission, AdmissionError> {
        let policy = &self.policy;

        if policy.bootstrap_agent.as_ref() == Some(agent) {
            return Ok(Admission::Bootstrap);
        }

        if proof.iter().all(u8::is_ascii_whitespace) {
            if policy.private_network {
                return Err(AdmissionError::MalformedInput(
                    "a membrane proof is required to join this network".to_string(),
                ));
            }
            return Ok(Admission::Open);
        }

        let payload = codec::parse_bytes(proof)?;
        debug!(version = %payload.version(), "decoded membrane proof");

        if !payload.verify(&policy.issuer) {
            return Err(AdmissionError::SignatureInvalid);
        }

        if payload.network_seed() != policy.network_seed {
            return Err(AdmissionError::NetworkMismatch {
                expected: policy.network_seed.clone(),
                found: payload.network_seed().to_string(),
            });
        }

        let recorded = lookups.invitations.and_then(|record| record.recorded_invitation(&payload));
        let mut expires_at = codec::expires_at(&payload, policy.validity);
        if let Some(recorded) = &recorded {
            expires_at = expires_at.min(recorded.expires_at);
        }
        if now > expires_at {
            return Err(AdmissionError::Expired { expired_at: expires_at });
        }

        if let Some(revoked_at) = recorded.and_then(|r| r.revoked_at) {
            return Err(AdmissionError::InvitationRevoked { revoked_at });
        }

        let voucher = payload.voucher().copied();
        if policy.vouching_required {
            let voucher = voucher.ok_or(AdmissionError::VoucherRequired)?;
            if let Some(directory) = lookups.vouchers {
                if !directory.is_trusted_voucher(&voucher) {
                    return Err(AdmissionError::VoucherInvalid(voucher));
                }
            }
        }

        Ok(Admission::Invited { version: payload.version(), voucher })
    }
}
