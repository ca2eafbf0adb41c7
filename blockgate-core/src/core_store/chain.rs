/*
    chain.rs - A participant's source chain

    Entry 0 is always the Genesis action holding the membrane proof the agent
    joined with. It is written only after admission succeeds; a rejected
    agent never gets a chain. Later writes pass the revocation guard first,
    and a refused write leaves the chain exactly as it was.
*/

use crate::core_admission::{Admission, AdmissionError, AdmissionLookups, AdmissionValidator};
use crate::core_identity::AgentId;
use crate::core_revocation::{ValidationOutcome, WriteGuard};
use crate::core_store::commit_log::{LogEntry, LogStore};
use crate::core_store::errors::StoreError;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Hash of a chain entry, used as link base or target
pub type ActionHash = [u8; 32];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainAction {
    Genesis { agent: AgentId, membrane_proof: Vec<u8> },
    CreateEntry { author: AgentId, payload: Vec<u8> },
    CreateLink { author: AgentId, base: ActionHash, target: ActionHash },
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Admission rejected: {0}")]
    Rejected(#[from] AdmissionError),

    #[error("Write rejected: {0}")]
    WriteRejected(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct SourceChain<S: LogStore> {
    agent: AgentId,
    admission: Option<Admission>,
    store: S,
}

impl<S: LogStore> SourceChain<S> {
    /// Run admission once and, if accepted, write the Genesis action.
    ///
    /// `store` must be empty; a chain is never created twice.
    pub fn join(
        agent: AgentId,
        membrane_proof: &[u8],
        validator: &AdmissionValidator,
        now: Timestamp,
        lookups: AdmissionLookups<'_>,
        store: S,
    ) -> Result<Self, ChainError> {
        Self::join_with(agent, membrane_proof, validator, now, lookups, || Ok(store))
    }

    /// Like [`Self::join`], but `open_store` is only called once admission has
    /// succeeded. A rejected agent never causes a store to be created.
    pub fn join_with<F>(
        agent: AgentId,
        membrane_proof: &[u8],
        validator: &AdmissionValidator,
        now: Timestamp,
        lookups: AdmissionLookups<'_>,
        open_store: F,
    ) -> Result<Self, ChainError>
    where
        F: FnOnce() -> Result<S, StoreError>,
    {
        let admission = validator.validate(&agent, membrane_proof, now, lookups)?;

        let mut store = open_store()?;
        if !store.is_empty() {
            return Err(StoreError::InvalidWrite("source chain already has a genesis".to_string()).into());
        }

        let genesis = ChainAction::Genesis { agent, membrane_proof: membrane_proof.to_vec() };
        store.append(now, &encode(&genesis)?)?;
        info!(agent = %agent.short(), ?admission, "source chain created");

        Ok(SourceChain { agent, admission: Some(admission), store })
    }

    /// Reopen an existing chain, checking that it starts with a Genesis for `agent`
    pub fn open(agent: AgentId, store: S) -> Result<Self, ChainError> {
        let entries = store.entries()?;
        let first = entries
            .first()
            .ok_or_else(|| StoreError::NotFound("source chain has no genesis".to_string()))?;

        match decode(first)? {
            ChainAction::Genesis { agent: owner, .. } if owner == agent => {}
            _ => {
                return Err(StoreError::CorruptedData(format!(
                    "entry 0 is not the genesis of {}",
                    agent.short()
                ))
                .into())
            }
        }

        Ok(SourceChain { agent, admission: None, store })
    }

    pub fn agent(&self) -> &AgentId {
        &self.agent
    }

    /// How the agent was admitted, when this chain was created in this session
    pub fn admission(&self) -> Option<&Admission> {
        self.admission.as_ref()
    }

    pub fn create_entry(
        &mut self,
        payload: &[u8],
        now: Timestamp,
        guard: &WriteGuard<'_>,
    ) -> Result<ActionHash, ChainError> {
        Self::admit_write(guard.validate_create_entry(&self.agent))?;
        let action = ChainAction::CreateEntry { author: self.agent, payload: payload.to_vec() };
        self.append(action, now)
    }

    pub fn create_link(
        &mut self,
        base: ActionHash,
        target: ActionHash,
        now: Timestamp,
        guard: &WriteGuard<'_>,
    ) -> Result<ActionHash, ChainError> {
        Self::admit_write(guard.validate_create_link(&self.agent))?;
        let action = ChainAction::CreateLink { author: self.agent, base, target };
        self.append(action, now)
    }

    /// Every action on the chain, Genesis first
    pub fn actions(&self) -> Result<Vec<ChainAction>, ChainError> {
        self.store.entries()?.iter().map(decode).collect()
    }

    pub fn len(&self) -> u64 {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn head(&self) -> ActionHash {
        self.store.head_hash()
    }

    fn admit_write(outcome: ValidationOutcome) -> Result<(), ChainError> {
        match outcome {
            ValidationOutcome::Valid => Ok(()),
            ValidationOutcome::Invalid(reason) => Err(ChainError::WriteRejected(reason)),
        }
    }

    fn append(&mut self, action: ChainAction, now: Timestamp) -> Result<ActionHash, ChainError> {
        let entry = self.store.append(now, &encode(&action)?)?;
        debug!(agent = %self.agent.short(), seq = entry.seq, "chain action appended");
        Ok(entry.hash)
    }
}

fn encode(action: &ChainAction) -> Result<Vec<u8>, StoreError> {
    Ok(bincode::serialize(action)?)
}

fn decode(entry: &LogEntry) -> Result<ChainAction, ChainError> {
    bincode::deserialize(&entry.data)
        .map_err(|e| StoreError::Deserialization(format!("chain seq {}: {}", entry.seq, e)).into())
}
