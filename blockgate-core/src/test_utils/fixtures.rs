//! Test fixtures for creating common test objects

use crate::config::NetworkConfig;
use crate::core_identity::SigningKeypair;
use crate::core_store::{LogEntry, LogStore, StoreError, StoreResult, GENESIS_PREV_HASH};
use crate::time::{ManualClock, Timestamp};

/// Where [`fixed_clock`] starts: 2023-11-14T22:13:20Z
pub const FIXED_START: Timestamp = Timestamp(1_700_000_000_000_000);

/// Network seed used by [`network_config`]
pub const TEST_NETWORK_SEED: &str = "maple-2024";

/// A clock frozen at [`FIXED_START`] until advanced
pub fn fixed_clock() -> ManualClock {
    ManualClock::new(FIXED_START)
}

/// Private V2 network whose issuer, bootstrap agent and sole admin is `issuer`
pub fn network_config(issuer: &SigningKeypair) -> NetworkConfig {
    let issuer_hex = issuer.agent_id().to_hex();
    NetworkConfig {
        network_seed: TEST_NETWORK_SEED.to_string(),
        issuer_public_key: Some(issuer_hex.clone()),
        bootstrap_agent: Some(issuer_hex.clone()),
        admins: vec![issuer_hex],
        ..NetworkConfig::default()
    }
}

/// A log whose appends always fail, as a full disk would
#[derive(Debug, Default)]
pub struct FailingLog;

impl LogStore for FailingLog {
    fn append(&mut self, _timestamp: Timestamp, _data: &[u8]) -> StoreResult<LogEntry> {
        Err(StoreError::Storage("injected append failure".to_string()))
    }

    fn entries(&self) -> StoreResult<Vec<LogEntry>> {
        Ok(Vec::new())
    }

    fn len(&self) -> u64 {
        0
    }

    fn head_hash(&self) -> [u8; 32] {
        GENESIS_PREV_HASH
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Clock;

    #[test]
    fn test_network_config_is_valid() {
        let issuer = SigningKeypair::generate();
        let network = network_config(&issuer);
        assert_eq!(network.issuer_key().unwrap(), Some(issuer.agent_id()));
        assert_eq!(network.admin_ids().unwrap(), vec![issuer.agent_id()]);
        assert!(network.admission_policy().is_ok());
    }

    #[test]
    fn test_failing_log_never_grows() {
        let mut log = FailingLog;
        assert!(log.append(fixed_clock().now(), b"x").is_err());
        assert!(log.is_empty());
    }
}
