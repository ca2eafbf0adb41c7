//! Web-of-trust membership
//!
//! Trusted anchors bootstrap the neighbourhood. Everyone else becomes verified
//! through vouches: one from an anchor, or two from members who are
//! themselves verified. Revoked agents neither count as vouchers nor keep
//! their own status.

use crate::core_admission::errors::VouchError;
use crate::core_admission::validator::VoucherDirectory;
use crate::core_identity::AgentId;
use crate::core_revocation::RevocationCheck;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Anchor vouches needed for verification
pub const ANCHOR_VOUCHES_REQUIRED: usize = 1;

/// Member vouches needed for verification
pub const MEMBER_VOUCHES_REQUIRED: usize = 2;

/// Longest accepted vouch note, in UTF-8 bytes
pub const MAX_NOTE_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MembershipStatus {
    Pending,
    PartiallyVouched { vouch_count: usize },
    Verified,
    TrustedAnchor,
}

impl MembershipStatus {
    /// Verified members and anchors may post and vouch
    pub fn can_participate(&self) -> bool {
        matches!(self, MembershipStatus::Verified | MembershipStatus::TrustedAnchor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vouch {
    pub voucher: AgentId,
    pub vouchee: AgentId,
    pub note: Option<String>,
    pub created_at: Timestamp,
}

/// Never revokes anyone; for directories used without a registry
struct NoRevocations;

impl RevocationCheck for NoRevocations {
    fn is_revoked(&self, _agent: &AgentId) -> bool {
        false
    }
}

#[derive(Debug, Default, Clone)]
pub struct MembershipDirectory {
    anchors: Vec<AgentId>,
    vouches: Vec<Vouch>,
    /// vouchee -> positions in `vouches`
    received: HashMap<AgentId, Vec<usize>>,
}

impl MembershipDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory seeded with a founding set of anchors
    pub fn with_anchors(anchors: impl IntoIterator<Item = AgentId>) -> Self {
        let mut directory = Self::new();
        for anchor in anchors {
            if !directory.anchors.contains(&anchor) {
                directory.anchors.push(anchor);
            }
        }
        directory
    }

    /// Make `agent` the founding anchor. Only possible while no anchor exists.
    pub fn initialize_anchor(&mut self, agent: AgentId) -> Result<(), VouchError> {
        if self.anchors.contains(&agent) {
            return Err(VouchError::AlreadyAnchor(agent));
        }
        if !self.anchors.is_empty() {
            return Err(VouchError::AnchorsExist);
        }
        self.anchors.push(agent);
        info!(anchor = %agent.short(), "founding anchor initialized");
        Ok(())
    }

    /// An existing anchor promotes another agent
    pub fn designate_anchor(&mut self, designator: &AgentId, agent: AgentId) -> Result<(), VouchError> {
        if !self.is_anchor(designator) {
            return Err(VouchError::NotAnchor(*designator));
        }
        if self.is_anchor(&agent) {
            return Err(VouchError::AlreadyAnchor(agent));
        }
        self.anchors.push(agent);
        info!(anchor = %agent.short(), by = %designator.short(), "anchor designated");
        Ok(())
    }

    pub fn is_anchor(&self, agent: &AgentId) -> bool {
        self.anchors.contains(agent)
    }

    pub fn anchors(&self) -> &[AgentId] {
        &self.anchors
    }

    pub fn vouch(
        &mut self,
        voucher: AgentId,
        vouchee: AgentId,
        note: Option<String>,
        now: Timestamp,
    ) -> Result<&Vouch, VouchError> {
        if voucher == vouchee {
            return Err(VouchError::SelfVouch);
        }
        if let Some(note) = &note {
            if note.len() > MAX_NOTE_LEN {
                return Err(VouchError::NoteTooLong { max: MAX_NOTE_LEN });
            }
        }
        if self.vouches_for(&vouchee).any(|v| v.voucher == voucher) {
            return Err(VouchError::Duplicate { voucher, vouchee });
        }

        let idx = self.vouches.len();
        self.vouches.push(Vouch { voucher, vouchee, note, created_at: now });
        self.received.entry(vouchee).or_default().push(idx);
        debug!(voucher = %voucher.short(), vouchee = %vouchee.short(), "vouch recorded");

        Ok(&self.vouches[idx])
    }

    pub fn vouches_for<'a>(&'a self, agent: &AgentId) -> impl Iterator<Item = &'a Vouch> + 'a {
        self.received
            .get(agent)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.vouches[idx])
    }

    pub fn vouches_given_by<'a>(&'a self, agent: &'a AgentId) -> impl Iterator<Item = &'a Vouch> + 'a {
        self.vouches.iter().filter(move |v| &v.voucher == agent)
    }

    /// Status ignoring revocations
    pub fn membership_status(&self, agent: &AgentId) -> MembershipStatus {
        self.membership_status_with(agent, &NoRevocations)
    }

    pub fn membership_status_with(&self, agent: &AgentId, revocations: &dyn RevocationCheck) -> MembershipStatus {
        if revocations.is_revoked(agent) {
            return MembershipStatus::Pending;
        }
        if self.is_anchor(agent) {
            return MembershipStatus::TrustedAnchor;
        }

        let verified = self.verified_set(revocations);
        if verified.contains(agent) {
            return MembershipStatus::Verified;
        }

        let vouch_count = self
            .vouches_for(agent)
            .filter(|v| !revocations.is_revoked(&v.voucher))
            .count();
        if vouch_count == 0 {
            MembershipStatus::Pending
        } else {
            MembershipStatus::PartiallyVouched { vouch_count }
        }
    }

    /// Agents that are verified or anchors, not counting revoked ones.
    ///
    /// Computed as a fixpoint: a member verified by two verified members may in
    /// turn count toward a third.
    fn verified_set(&self, revocations: &dyn RevocationCheck) -> HashSet<AgentId> {
        let mut trusted: HashSet<AgentId> = self
            .anchors
            .iter()
            .filter(|a| !revocations.is_revoked(a))
            .copied()
            .collect();

        loop {
            let mut grew = false;
            for (vouchee, positions) in &self.received {
                if trusted.contains(vouchee) || revocations.is_revoked(vouchee) {
                    continue;
                }
                let mut from_anchors = 0;
                let mut from_members = 0;
                for &idx in positions {
                    let voucher = &self.vouches[idx].voucher;
                    if revocations.is_revoked(voucher) || !trusted.contains(voucher) {
                        continue;
                    }
                    if self.is_anchor(voucher) {
                        from_anchors += 1;
                    } else {
                        from_members += 1;
                    }
                }
                if from_anchors >= ANCHOR_VOUCHES_REQUIRED || from_members >= MEMBER_VOUCHES_REQUIRED {
                    trusted.insert(*vouchee);
                    grew = true;
                }
            }
            if !grew {
                return trusted;
            }
        }
    }

    /// A voucher lookup that honours a revocation replica
    pub fn trust_view<'a>(&'a self, revocations: &'a dyn RevocationCheck) -> TrustView<'a> {
        TrustView { directory: self, revocations }
    }
}

impl VoucherDirectory for MembershipDirectory {
    fn is_trusted_voucher(&self, agent: &AgentId) -> bool {
        self.membership_status(agent).can_participate()
    }
}

/// Directory plus revocation state, handed to the admission validator
pub struct TrustView<'a> {
    directory: &'a MembershipDirectory,
    revocations: &'a dyn RevocationCheck,
}

impl VoucherDirectory for TrustView<'_> {
    fn is_trusted_voucher(&self, agent: &AgentId) -> bool {
        self.directory
            .membership_status_with(agent, self.revocations)
            .can_participate()
    }
}
