/*
    registry.rs - Replicated set of revoked agents

    Records live in an arena (append order) with a derived agent -> position
    index. The log is the source of truth: an append must succeed before the
    index sees the record, and reopening the registry replays the log.

    Replicas converge by exchanging records through `merge`. The first valid
    record seen for an agent wins locally; which one does not change the
    revoked set, so merges commute.
*/

use crate::core_identity::{AgentId, SigningKeypair};
use crate::core_revocation::RevocationCheck;
use crate::core_revocation::errors::RevocationError;
use crate::core_revocation::record::{revocation_anchor, RevocationRecord};
use crate::core_store::{LogStore, StoreError};
use crate::metrics::REVOCATIONS_TOTAL;
use crate::time::Clock;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

pub struct RevocationRegistry<S: LogStore, C: Clock> {
    admins: HashSet<AgentId>,
    log: S,
    clock: C,
    records: Vec<RevocationRecord>,
    index: HashMap<AgentId, usize>,
}

impl<S: LogStore, C: Clock> RevocationRegistry<S, C> {
    /// Open a registry over `log`, replaying every stored record
    pub fn open(
        admins: impl IntoIterator<Item = AgentId>,
        log: S,
        clock: C,
    ) -> Result<Self, RevocationError> {
        let mut registry = RevocationRegistry {
            admins: admins.into_iter().collect(),
            log,
            clock,
            records: Vec::new(),
            index: HashMap::new(),
        };

        for entry in registry.log.entries()? {
            let record: RevocationRecord = bincode::deserialize(&entry.data)
                .map_err(|e| StoreError::Deserialization(format!("revocation seq {}: {}", entry.seq, e)))?;
            if !record.verify_signature() {
                return Err(StoreError::CorruptedData(format!(
                    "revocation seq {} has an invalid signature",
                    entry.seq
                ))
                .into());
            }
            registry.insert(record);
        }

        debug!(records = registry.records.len(), "revocation registry replayed");
        Ok(registry)
    }

    /// Revoke `agent`. The revoker must be a configured administrator.
    pub fn revoke(
        &mut self,
        revoker: &SigningKeypair,
        agent: AgentId,
        reason: &str,
    ) -> Result<&RevocationRecord, RevocationError> {
        let revoker_id = revoker.agent_id();
        if !self.admins.contains(&revoker_id) {
            return Err(RevocationError::Unauthorized(revoker_id));
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(RevocationError::InvalidInput("reason must not be empty".to_string()));
        }
        if self.index.contains_key(&agent) {
            return Err(RevocationError::AlreadyRevoked(agent));
        }

        let record = RevocationRecord::new_signed(revoker, agent, reason, self.clock.now());
        self.persist(&record)?;
        let idx = self.insert(record);

        info!(agent = %agent.short(), revoker = %revoker_id.short(), "agent revoked");
        metrics::counter!(REVOCATIONS_TOTAL).increment(1);

        Ok(&self.records[idx])
    }

    /// Apply records received from another replica.
    ///
    /// Records with a bad signature or a non-admin revoker are skipped, as are
    /// agents already revoked here. Returns how many records were added.
    pub fn merge(
        &mut self,
        records: impl IntoIterator<Item = RevocationRecord>,
    ) -> Result<usize, RevocationError> {
        let mut applied = 0;
        for record in records {
            if self.index.contains_key(&record.revoked_agent) {
                continue;
            }
            if !record.verify_signature() {
                warn!(agent = %record.revoked_agent.short(), "dropping revocation with invalid signature");
                continue;
            }
            if !self.admins.contains(&record.revoker) {
                warn!(revoker = %record.revoker.short(), "dropping revocation from non-admin");
                continue;
            }

            self.persist(&record)?;
            self.insert(record);
            applied += 1;
        }

        if applied > 0 {
            debug!(applied, total = self.records.len(), "merged revocations");
        }
        Ok(applied)
    }

    pub fn is_revoked(&self, agent: &AgentId) -> bool {
        self.index.contains_key(agent)
    }

    pub fn record_for(&self, agent: &AgentId) -> Option<&RevocationRecord> {
        self.index.get(agent).map(|&idx| &self.records[idx])
    }

    /// All records in the order this replica learned them
    pub fn list(&self) -> &[RevocationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn anchor(&self) -> [u8; 32] {
        revocation_anchor()
    }

    pub fn is_admin(&self, agent: &AgentId) -> bool {
        self.admins.contains(agent)
    }

    fn persist(&mut self, record: &RevocationRecord) -> Result<(), RevocationError> {
        let data = bincode::serialize(record).map_err(StoreError::from)?;
        self.log.append(record.revoked_at, &data)?;
        Ok(())
    }

    fn insert(&mut self, record: RevocationRecord) -> usize {
        if let Some(&idx) = self.index.get(&record.revoked_agent) {
            return idx;
        }
        let idx = self.records.len();
        self.index.insert(record.revoked_agent, idx);
        self.records.push(record);
        idx
    }
}

impl<S: LogStore, C: Clock> RevocationCheck for RevocationRegistry<S, C> {
    fn is_revoked(&self, agent: &AgentId) -> bool {
        RevocationRegistry::is_revoked(self, agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_store::{CommitLog, MemoryLog};
    use crate::time::ManualClock;
    use crate::test_utils::{fixed_clock, FailingLog};

    fn registry(admin: &SigningKeypair) -> RevocationRegistry<MemoryLog, ManualClock> {
        RevocationRegistry::open([admin.agent_id()], MemoryLog::new(), fixed_clock()).unwrap()
    }

    #[test]
    fn test_revoke_and_query() {
        let admin = SigningKeypair::generate();
        let target = SigningKeypair::generate().agent_id();
        let mut reg = registry(&admin);

        assert!(!reg.is_revoked(&target));
        let record = reg.revoke(&admin, target, "harassment").unwrap().clone();

        assert!(reg.is_revoked(&target));
        assert_eq!(reg.record_for(&target), Some(&record));
        assert_eq!(record.revoker, admin.agent_id());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_double_revoke_rejected_without_new_record() {
        let admin = SigningKeypair::generate();
        let target = SigningKeypair::generate().agent_id();
        let mut reg = registry(&admin);

        reg.revoke(&admin, target, "spam").unwrap();
        assert!(matches!(
            reg.revoke(&admin, target, "spam again"),
            Err(RevocationError::AlreadyRevoked(a)) if a == target
        ));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.log.len(), 1);
    }

    #[test]
    fn test_only_admins_revoke() {
        let admin = SigningKeypair::generate();
        let member = SigningKeypair::generate();
        let target = SigningKeypair::generate().agent_id();
        let mut reg = registry(&admin);

        assert!(matches!(
            reg.revoke(&member, target, "spite"),
            Err(RevocationError::Unauthorized(_))
        ));
        assert!(matches!(reg.revoke(&admin, target, "  "), Err(RevocationError::InvalidInput(_))));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_failed_append_leaves_no_trace() {
        let admin = SigningKeypair::generate();
        let target = SigningKeypair::generate().agent_id();
        let mut reg =
            RevocationRegistry::open([admin.agent_id()], FailingLog::default(), fixed_clock()).unwrap();

        assert!(matches!(reg.revoke(&admin, target, "spam"), Err(RevocationError::Storage(_))));
        assert!(!reg.is_revoked(&target));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_merge_validates_and_is_idempotent() {
        let admin = SigningKeypair::generate();
        let outsider = SigningKeypair::generate();
        let (a, b) = (SigningKeypair::generate().agent_id(), SigningKeypair::generate().agent_id());

        let mut source = registry(&admin);
        source.revoke(&admin, a, "spam").unwrap();
        let forged = RevocationRecord::new_signed(&outsider, b, "spite", source.clock.now());

        let mut replica = registry(&admin);
        let mut batch = source.list().to_vec();
        batch.push(forged);

        assert_eq!(replica.merge(batch.clone()).unwrap(), 1);
        assert_eq!(replica.merge(batch).unwrap(), 0);
        assert!(replica.is_revoked(&a));
        assert!(!replica.is_revoked(&b));
    }

    #[test]
    fn test_merge_rejects_tampered_record() {
        let admin = SigningKeypair::generate();
        let target = SigningKeypair::generate().agent_id();
        let mut source = registry(&admin);
        let mut record = source.revoke(&admin, target, "spam").unwrap().clone();
        record.reason = "edited".into();

        let mut replica = registry(&admin);
        assert_eq!(replica.merge([record]).unwrap(), 0);
        assert!(!replica.is_revoked(&target));
    }

    #[test]
    fn test_reopen_replays_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("revocations.log");
        let admin = SigningKeypair::generate();
        let target = SigningKeypair::generate().agent_id();

        {
            let log = CommitLog::open(&path).unwrap();
            let mut reg = RevocationRegistry::open([admin.agent_id()], log, fixed_clock()).unwrap();
            reg.revoke(&admin, target, "spam").unwrap();
        }

        let log = CommitLog::open(&path).unwrap();
        let reg = RevocationRegistry::open([admin.agent_id()], log, fixed_clock()).unwrap();
        assert!(reg.is_revoked(&target));
        assert_eq!(reg.record_for(&target).unwrap().reason, "spam");
        assert_eq!(reg.anchor(), revocation_anchor());
    }
}
