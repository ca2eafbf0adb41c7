//! Configuration management for Blockgate
//!
//! Configuration is loaded from a TOML file or from `BLOCKGATE_*`
//! environment variables, falls back to defaults, and is validated before use.

use crate::core_admission::AdmissionPolicy;
use crate::core_identity::{AgentId, IdentityError};
use crate::core_invite::WireVersion;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Default V2 signalling relay
pub const DEFAULT_SIGNAL_RELAY_URL: &str = "wss://signal.holochain.org";

/// Default V2 bootstrap service
pub const DEFAULT_BOOTSTRAP_URL: &str = "https://bootstrap.holochain.org";

/// Default invite lifetime
pub const DEFAULT_INVITE_VALIDITY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network membership settings
    pub network: NetworkConfig,

    /// Store configuration
    pub store: StoreConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Network membership configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Identifier that partitions this neighbourhood from all others
    pub network_seed: String,

    /// Hex public key of the invite issuer
    pub issuer_public_key: Option<String>,

    /// Hex key of the first administrator, admitted without a proof
    pub bootstrap_agent: Option<String>,

    /// Hex keys allowed to revoke agents
    pub admins: Vec<String>,

    /// Require a membrane proof to join
    pub private_network: bool,

    /// Require invites to name a voucher
    pub vouching_required: bool,

    /// How long an invite stays valid after issue
    #[serde(with = "humantime_serde")]
    pub invite_validity: Duration,

    /// Hub address embedded in V1 codes
    pub hub_address: String,

    /// Signalling relay embedded in V2 codes
    pub signal_relay_url: String,

    /// Bootstrap service embedded in V2 codes
    pub bootstrap_url: String,

    /// Format newly generated codes use
    pub wire_format: WireVersion,
}

/// Store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Data directory for persistent storage
    pub data_dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include target module
    pub with_target: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            network_seed: "blockgate-local".to_string(),
            issuer_public_key: None,
            bootstrap_agent: None,
            admins: Vec::new(),
            private_network: true,
            vouching_required: false,
            invite_validity: DEFAULT_INVITE_VALIDITY,
            hub_address: String::new(),
            signal_relay_url: DEFAULT_SIGNAL_RELAY_URL.to_string(),
            bootstrap_url: DEFAULT_BOOTSTRAP_URL.to_string(),
            wire_format: WireVersion::V2,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { data_dir: PathBuf::from("./data") }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json_format: false, with_target: true }
    }
}

fn parse_agent(field: &'static str, value: &str) -> Result<AgentId, ConfigError> {
    value
        .parse()
        .map_err(|e: IdentityError| ConfigError::InvalidKey { field, reason: e.to_string() })
}

fn parse_flag(field: &str, value: &str) -> Result<bool, ConfigError> {
    value
        .parse()
        .map_err(|e| ConfigError::InvalidValue(format!("Invalid {} flag: {}", field, e)))
}

impl NetworkConfig {
    /// The configured issuer key, if any
    pub fn issuer_key(&self) -> Result<Option<AgentId>, ConfigError> {
        self.issuer_public_key
            .as_deref()
            .map(|key| parse_agent("issuer_public_key", key))
            .transpose()
    }

    pub fn bootstrap_agent_id(&self) -> Result<Option<AgentId>, ConfigError> {
        self.bootstrap_agent
            .as_deref()
            .map(|key| parse_agent("bootstrap_agent", key))
            .transpose()
    }

    pub fn admin_ids(&self) -> Result<Vec<AgentId>, ConfigError> {
        self.admins.iter().map(|key| parse_agent("admin", key)).collect()
    }

    /// Settings for the admission validator. Requires an issuer key.
    pub fn admission_policy(&self) -> Result<AdmissionPolicy, ConfigError> {
        let issuer = self.issuer_key()?.ok_or(ConfigError::MissingIssuerKey)?;

        Ok(AdmissionPolicy {
            network_seed: self.network_seed.clone(),
            issuer,
            bootstrap_agent: self.bootstrap_agent_id()?,
            private_network: self.private_network,
            vouching_required: self.vouching_required,
            validity: self.invite_validity,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.network_seed.trim().is_empty() {
            return Err(ConfigError::ValidationFailed("network_seed must not be empty".to_string()));
        }
        // V1 codes are colon-delimited
        if self.network_seed.contains(':') {
            return Err(ConfigError::ValidationFailed("network_seed must not contain ':'".to_string()));
        }
        if self.invite_validity.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "invite_validity must be greater than 0".to_string(),
            ));
        }
        if self.wire_format == WireVersion::V1 && self.hub_address.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "hub_address is required when wire_format is v1".to_string(),
            ));
        }

        self.issuer_key()?;
        self.bootstrap_agent_id()?;
        self.admin_ids()?;
        Ok(())
    }
}

impl StoreConfig {
    /// Append-only log of issued and revoked invitations
    pub fn invitations_log(&self) -> PathBuf {
        self.data_dir.join("invitations.log")
    }

    /// Append-only log of agent revocations
    pub fn revocations_log(&self) -> PathBuf {
        self.data_dir.join("revocations.log")
    }

    /// Issuer signing key
    pub fn issuer_key_path(&self) -> PathBuf {
        self.data_dir.join("issuer.key")
    }

    /// Source chain of one agent
    pub fn chain_log(&self, agent: &AgentId) -> PathBuf {
        self.data_dir.join("chains").join(format!("{}.log", agent.to_hex()))
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: BLOCKGATE_<SECTION>_<KEY>
    /// Example: BLOCKGATE_NETWORK_SEED=maple-street
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from defaults plus whatever `lookup` returns
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `BLOCKGATE_*` overrides on top of the current values
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| env::var(key).ok())?;
        self.validate()
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        // Network config
        if let Some(seed) = lookup("BLOCKGATE_NETWORK_SEED") {
            self.network.network_seed = seed;
        }
        if let Some(key) = lookup("BLOCKGATE_NETWORK_ISSUER_PUBLIC_KEY") {
            self.network.issuer_public_key = Some(key);
        }
        if let Some(key) = lookup("BLOCKGATE_NETWORK_BOOTSTRAP_AGENT") {
            self.network.bootstrap_agent = Some(key);
        }
        if let Some(admins) = lookup("BLOCKGATE_NETWORK_ADMINS") {
            self.network.admins = admins
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(private) = lookup("BLOCKGATE_NETWORK_PRIVATE") {
            self.network.private_network = parse_flag("private network", &private)?;
        }
        if let Some(vouching) = lookup("BLOCKGATE_NETWORK_VOUCHING_REQUIRED") {
            self.network.vouching_required = parse_flag("vouching", &vouching)?;
        }
        if let Some(validity) = lookup("BLOCKGATE_NETWORK_INVITE_VALIDITY") {
            self.network.invite_validity = humantime_serde::re::humantime::parse_duration(&validity)
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid invite validity: {}", e)))?;
        }
        if let Some(hub) = lookup("BLOCKGATE_NETWORK_HUB_ADDRESS") {
            self.network.hub_address = hub;
        }
        if let Some(url) = lookup("BLOCKGATE_NETWORK_SIGNAL_RELAY_URL") {
            self.network.signal_relay_url = url;
        }
        if let Some(url) = lookup("BLOCKGATE_NETWORK_BOOTSTRAP_URL") {
            self.network.bootstrap_url = url;
        }
        if let Some(format) = lookup("BLOCKGATE_NETWORK_WIRE_FORMAT") {
            self.network.wire_format = match format.to_lowercase().as_str() {
                "v1" => WireVersion::V1,
                "v2" => WireVersion::V2,
                other => {
                    return Err(ConfigError::InvalidValue(format!("Invalid wire format: {}", other)))
                }
            };
        }

        // Store config
        if let Some(data_dir) = lookup("BLOCKGATE_STORE_DATA_DIR") {
            self.store.data_dir = PathBuf::from(data_dir);
        }

        // Logging config
        if let Some(level) = lookup("BLOCKGATE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = lookup("BLOCKGATE_LOG_JSON") {
            self.logging.json_format = parse_flag("JSON", &json)?;
        }

        Ok(())
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError(e.to_string()))?;

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.network.validate()?;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, contents).map_err(|e| ConfigError::FileWriteError(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_identity::SigningKeypair;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.network.private_network);
        assert!(!config.network.vouching_required);
        assert_eq!(config.network.invite_validity, DEFAULT_INVITE_VALIDITY);
        assert_eq!(config.network.wire_format, WireVersion::V2);
    }

    #[test]
    fn test_network_validation() {
        let mut config = Config::default();
        config.network.network_seed = "  ".to_string();
        assert!(config.validate().is_err());

        config = Config::default();
        config.network.network_seed = "maple:street".to_string();
        assert!(config.validate().is_err());

        config = Config::default();
        config.network.invite_validity = Duration::ZERO;
        assert!(config.validate().is_err());

        config = Config::default();
        config.network.wire_format = WireVersion::V1;
        assert!(config.validate().is_err());
        config.network.hub_address = "hub.local:8888".to_string();
        assert!(config.validate().is_ok());

        config = Config::default();
        config.network.admins = vec!["zz".to_string()];
        assert!(matches!(config.validate(), Err(ConfigError::InvalidKey { field: "admin", .. })));
    }

    #[test]
    fn test_log_level_validation() {
        let mut config = Config::default();

        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "debug".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_admission_policy_requires_issuer() {
        let mut config = Config::default();
        assert!(matches!(config.network.admission_policy(), Err(ConfigError::MissingIssuerKey)));

        let issuer = SigningKeypair::generate().agent_id();
        config.network.issuer_public_key = Some(issuer.to_hex());
        let policy = config.network.admission_policy().unwrap();
        assert_eq!(policy.issuer, issuer);
        assert_eq!(policy.network_seed, "blockgate-local");
    }

    #[test]
    fn test_overrides_from_lookup() {
        let admin = SigningKeypair::generate().agent_id();
        let vars: HashMap<&str, String> = HashMap::from([
            ("BLOCKGATE_NETWORK_SEED", "oak-2025".to_string()),
            ("BLOCKGATE_NETWORK_ADMINS", format!("{}, ", admin)),
            ("BLOCKGATE_NETWORK_INVITE_VALIDITY", "2days".to_string()),
            ("BLOCKGATE_NETWORK_WIRE_FORMAT", "V1".to_string()),
            ("BLOCKGATE_NETWORK_HUB_ADDRESS", "10.0.0.2:8888".to_string()),
            ("BLOCKGATE_STORE_DATA_DIR", "/tmp/blockgate".to_string()),
        ]);

        let config = Config::from_lookup(|key| vars.get(key).cloned()).unwrap();
        assert_eq!(config.network.network_seed, "oak-2025");
        assert_eq!(config.network.admin_ids().unwrap(), vec![admin]);
        assert_eq!(config.network.invite_validity, Duration::from_secs(2 * 24 * 60 * 60));
        assert_eq!(config.network.wire_format, WireVersion::V1);
        assert_eq!(config.store.invitations_log(), PathBuf::from("/tmp/blockgate/invitations.log"));

        let bad = Config::from_lookup(|key| (key == "BLOCKGATE_NETWORK_PRIVATE").then(|| "maybe".to_string()));
        assert!(matches!(bad, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_toml_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blockgate.toml");

        let mut config = Config::default();
        config.network.network_seed = "maple-2024".to_string();
        config.network.vouching_required = true;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.network, config.network);
        assert_eq!(loaded.store, config.store);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[network]\nnetwork_seed = \"elm-street\"\ninvite_validity = \"3days\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.network.network_seed, "elm-street");
        assert_eq!(config.network.invite_validity, Duration::from_secs(3 * 24 * 60 * 60));
        assert_eq!(config.network.signal_relay_url, DEFAULT_SIGNAL_RELAY_URL);
        assert_eq!(config.logging.level, "info");
    }
}
