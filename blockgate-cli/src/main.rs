use anyhow::{bail, Context, Result};
use blockgate_core::config::Config;
use blockgate_core::core_admission::{AdmissionError, AdmissionLookups, AdmissionValidator};
use blockgate_core::core_identity::{AgentId, SigningKeypair};
use blockgate_core::core_invite::{codec, InvitationRef, InviteError, InviteIssuer};
use blockgate_core::core_revocation::RevocationRegistry;
use blockgate_core::core_store::{ChainError, CommitLog, SourceChain};
use blockgate_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use blockgate_core::metrics::init_metrics;
use blockgate_core::time::{SystemClock, Timestamp};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "blockgate")]
#[command(author, version, about = "Invite and membership console for a Blockgate network", long_about = None)]
struct Args {
    /// Configuration file (TOML). Without it, BLOCKGATE_* variables and defaults apply.
    #[arg(short, long)]
    config: Option<String>,

    /// Override the configured log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the issuer signing key and print its public key
    Keygen {
        /// Replace an existing key
        #[arg(long)]
        force: bool,
    },

    /// Issue an invite code for a neighbour
    Generate {
        /// Who the invite is for
        name: String,

        /// Hex key of the member vouching for this neighbour
        #[arg(long, value_parser = parse_agent)]
        voucher: Option<AgentId>,

        /// How long the code stays valid (e.g. "7days", "12h")
        #[arg(long, value_parser = humantime::parse_duration)]
        validity: Option<Duration>,
    },

    /// Revoke an issued invitation
    RevokeInvite {
        /// Invitation reference printed by `generate` or `list`
        invitation: String,
    },

    /// List issued invitations
    List,

    /// Check an invite code's structure and expiry without verifying its signature
    ValidateFormat {
        code: String,
    },

    /// Run admission for an agent and create its source chain
    Admit {
        #[arg(value_parser = parse_agent)]
        agent: AgentId,

        /// Invite code used as membrane proof; omit on public networks
        #[arg(default_value = "")]
        code: String,
    },

    /// Revoke an agent network-wide
    RevokeAgent {
        #[arg(value_parser = parse_agent)]
        agent: AgentId,

        reason: String,

        /// Administrator key file; defaults to the issuer key
        #[arg(long)]
        key: Option<String>,
    },

    /// Check whether an agent is revoked
    IsRevoked {
        #[arg(value_parser = parse_agent)]
        agent: AgentId,
    },

    /// List all revocation records
    Revocations,
}

fn parse_agent(s: &str) -> Result<AgentId, String> {
    s.parse().map_err(|e| format!("{}", e))
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// Last instant humantime can render: 9999-12-31T23:59:59Z
const MAX_RENDERABLE_MICROS: u64 = 253_402_300_799_000_000;

fn rfc3339(ts: Timestamp) -> String {
    if ts.as_micros() > MAX_RENDERABLE_MICROS {
        return format!("{}us", ts);
    }
    humantime::format_rfc3339_seconds(UNIX_EPOCH + Duration::from_micros(ts.as_micros())).to_string()
}

fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => {
            let path = expand(path);
            let mut config = Config::from_file(&path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            config.apply_env()?;
            Ok(config)
        }
        None => Ok(Config::from_env()?),
    }
}

fn open_issuer(config: &Config) -> Result<InviteIssuer<CommitLog, SystemClock>> {
    let keypair = InviteIssuer::<CommitLog, SystemClock>::load_key(&config.store.issuer_key_path())
        .map_err(|e| match e {
            InviteError::MissingSigningKey(path) => {
                anyhow::anyhow!("No signing key at {}. Run `blockgate keygen` first.", path.display())
            }
            other => other.into(),
        })?;
    let log = CommitLog::open(config.store.invitations_log())?;
    Ok(InviteIssuer::open(keypair, config.network.clone(), log, SystemClock)?)
}

fn open_registry(config: &Config) -> Result<RevocationRegistry<CommitLog, SystemClock>> {
    let log = CommitLog::open(config.store.revocations_log())?;
    Ok(RevocationRegistry::open(config.network.admin_ids()?, log, SystemClock)?)
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn keygen(config: &Config, force: bool) -> Result<()> {
    let path = config.store.issuer_key_path();
    if path.exists() && !force {
        bail!("A signing key already exists at {} (use --force to replace it)", path.display());
    }

    let keypair = SigningKeypair::generate();
    keypair.save_to_file(&path)?;
    info!(path = %path.display(), "issuer key written");

    println!("{}", keypair.agent_id());
    if config.network.issuer_public_key.is_none() {
        eprintln!("Set network.issuer_public_key to this key so members can verify your invites.");
    }
    Ok(())
}

fn admit(config: &Config, agent: AgentId, code: &str) -> Result<()> {
    let validator = AdmissionValidator::new(config.network.admission_policy()?);
    let registry = open_registry(config)?;
    if registry.is_revoked(&agent) {
        bail!("Agent {} has been revoked", agent);
    }

    // On the issuing node its invitation log knows revoked and short-lived codes
    let issuer = if config.store.issuer_key_path().exists() {
        Some(open_issuer(config)?)
    } else {
        debug!("no issuer key here; admitting without the invitation log");
        None
    };
    let mut lookups = AdmissionLookups::none();
    if let Some(issuer) = &issuer {
        lookups = lookups.with_invitations(issuer);
    }

    let path = config.store.chain_log(&agent);
    if path.exists() {
        bail!("Agent {} already has a source chain at {}", agent, path.display());
    }

    let joined = SourceChain::join_with(agent, code.as_bytes(), &validator, Timestamp::now(), lookups, || {
        CommitLog::open(&path)
    });
    match joined {
        Ok(chain) => {
            if let Some(admission) = chain.admission() {
                println!("admitted: {:?}", admission);
            }
            Ok(())
        }
        Err(err) => {
            // Nothing existed at `path` before, so whatever is there now is a partial chain
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove partial chain {}", path.display()))?;
            }
            match err {
                ChainError::Rejected(reason) => bail!("{}\n{}", reason, reason.user_hint()),
                other => Err(other.into()),
            }
        }
    }
}

fn revoke_agent(config: &Config, agent: AgentId, reason: &str, key: Option<&str>) -> Result<()> {
    let key_path = key.map(expand).unwrap_or_else(|| config.store.issuer_key_path());
    let admin = SigningKeypair::load_from_file(&key_path)
        .with_context(|| format!("Failed to load administrator key from {}", key_path.display()))?;

    let mut registry = open_registry(config)?;
    let record = registry.revoke(&admin, agent, reason)?;
    println!("revoked {} at {}", record.revoked_agent, rfc3339(record.revoked_at));
    Ok(())
}

fn validate_format(config: &Config, code: &str) -> Result<()> {
    match codec::validate_format(code, Timestamp::now(), config.network.invite_validity) {
        Ok(payload) => {
            println!("ok: {} invite for network '{}'", payload.version(), payload.network_seed());
            println!(
                "expires: {}",
                rfc3339(codec::expires_at(&payload, config.network.invite_validity))
            );
            Ok(())
        }
        Err(err) => {
            let err = AdmissionError::from(err);
            bail!("{}\n{}", err, err.user_hint())
        }
    }
}

fn run(config: &Config, command: Command) -> Result<()> {
    match command {
        Command::Keygen { force } => keygen(config, force),
        Command::Generate { name, voucher, validity } => {
            let mut issuer = open_issuer(config)?;
            let validity = validity.unwrap_or(config.network.invite_validity);
            let invite = issuer.generate(&name, voucher, validity)?;
            println!("{}", invite.invite_code);
            eprintln!("ref: {}", invite.invitation_ref);
            eprintln!("expires: {}", rfc3339(invite.expires_at));
            Ok(())
        }
        Command::RevokeInvite { invitation } => {
            let mut issuer = open_issuer(config)?;
            let invitation: InvitationRef = invitation.parse()?;
            let revoked = issuer.revoke(&invitation)?;
            println!("revoked invitation for {}", revoked.neighbor_name);
            Ok(())
        }
        Command::List => {
            let issuer = open_issuer(config)?;
            print_json(issuer.list())
        }
        Command::ValidateFormat { code } => validate_format(config, &code),
        Command::Admit { agent, code } => admit(config, agent, &code),
        Command::RevokeAgent { agent, reason, key } => revoke_agent(config, agent, &reason, key.as_deref()),
        Command::IsRevoked { agent } => {
            let registry = open_registry(config)?;
            match registry.record_for(&agent) {
                Some(record) => println!("revoked at {}: {}", rfc3339(record.revoked_at), record.reason),
                None => println!("not revoked"),
            }
            Ok(())
        }
        Command::Revocations => {
            let registry = open_registry(config)?;
            print_json(registry.list())
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    let mut log_config = LogConfig::try_from(&config.logging)?;
    if let Some(level) = &args.log_level {
        log_config.level = level.parse::<LogLevel>()?;
    }
    log_config.json_format |= args.json_logs;
    init_logging_with_config(log_config)?;
    init_metrics();

    debug!(data_dir = %config.store.data_dir.display(), network = %config.network.network_seed, "configuration loaded");
    ensure_data_dir(&config.store.data_dir)?;

    run(&config, args.command)
}

fn ensure_data_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create data directory {}", dir.display()))
}
