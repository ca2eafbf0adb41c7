//! End-to-end tests for the `blockgate` binary
//!
//! Each test gets its own data directory and drives the CLI through
//! `BLOCKGATE_*` environment variables only.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn blockgate(data_dir: &Path, envs: &[(&str, &str)], args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_blockgate"));
    for (key, _) in std::env::vars().filter(|(k, _)| k.starts_with("BLOCKGATE_")) {
        cmd.env_remove(key);
    }
    cmd.env("BLOCKGATE_STORE_DATA_DIR", data_dir)
        .env("BLOCKGATE_NETWORK_SEED", "maple-2024")
        .env("BLOCKGATE_LOG_LEVEL", "warn")
        .envs(envs.iter().copied())
        .args(args)
        .output()
        .expect("failed to run blockgate")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// Create a key in a throwaway directory and return its public hex
fn fresh_agent() -> String {
    let dir = TempDir::new().unwrap();
    let output = blockgate(dir.path(), &[], &["keygen"]);
    assert!(output.status.success(), "{}", stderr(&output));
    stdout(&output)
}

/// A neighbourhood whose issuer is also bootstrap agent and admin
struct Hub {
    dir: TempDir,
    issuer: String,
}

impl Hub {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let output = blockgate(dir.path(), &[], &["keygen"]);
        assert!(output.status.success(), "{}", stderr(&output));
        Hub { dir, issuer: stdout(&output) }
    }

    fn run(&self, args: &[&str]) -> Output {
        self.run_on("maple-2024", args)
    }

    fn run_on(&self, seed: &str, args: &[&str]) -> Output {
        blockgate(
            self.dir.path(),
            &[
                ("BLOCKGATE_NETWORK_SEED", seed),
                ("BLOCKGATE_NETWORK_ISSUER_PUBLIC_KEY", &self.issuer),
                ("BLOCKGATE_NETWORK_BOOTSTRAP_AGENT", &self.issuer),
                ("BLOCKGATE_NETWORK_ADMINS", &self.issuer),
            ],
            args,
        )
    }

    fn generate(&self, name: &str) -> String {
        let output = self.run(&["generate", name]);
        assert!(output.status.success(), "{}", stderr(&output));
        stdout(&output)
    }

    /// Issue a code and return it with its invitation ref
    fn generate_with_ref(&self, name: &str) -> (String, String) {
        let output = self.run(&["generate", name]);
        assert!(output.status.success(), "{}", stderr(&output));
        let reference = stderr(&output)
            .lines()
            .find_map(|line| line.strip_prefix("ref: ").map(str::to_string))
            .expect("generate prints the invitation ref");
        (stdout(&output), reference)
    }

    fn chain_path(&self, agent: &str) -> std::path::PathBuf {
        self.dir.path().join("chains").join(format!("{}.log", agent))
    }
}

#[test]
fn test_keygen_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();
    assert!(blockgate(dir.path(), &[], &["keygen"]).status.success());

    let again = blockgate(dir.path(), &[], &["keygen"]);
    assert!(!again.status.success());
    assert!(stderr(&again).contains("--force"));

    assert!(blockgate(dir.path(), &[], &["keygen", "--force"]).status.success());
}

#[test]
fn test_generate_without_key_points_to_keygen() {
    let dir = TempDir::new().unwrap();
    let output = blockgate(dir.path(), &[], &["generate", "Alice"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("blockgate keygen"));
}

#[test]
fn test_generate_then_admit() {
    let hub = Hub::new();
    let code = hub.generate("Alice");

    let check = hub.run(&["validate-format", &code]);
    assert!(check.status.success(), "{}", stderr(&check));
    assert!(stdout(&check).contains("maple-2024"));

    let alice = fresh_agent();
    let admitted = hub.run(&["admit", &alice, &code]);
    assert!(admitted.status.success(), "{}", stderr(&admitted));
    assert!(stdout(&admitted).starts_with("admitted"));
    assert!(hub.dir.path().join("chains").join(format!("{}.log", alice)).exists());

    // A second genesis for the same agent is refused
    assert!(!hub.run(&["admit", &alice, &code]).status.success());

    let list = hub.run(&["list"]);
    let invitations: serde_json::Value = serde_json::from_str(&stdout(&list)).unwrap();
    assert_eq!(invitations.as_array().map(Vec::len), Some(1));
    assert_eq!(invitations[0]["neighbor_name"], "Alice");
}

#[test]
fn test_admit_rejects_other_neighbourhood() {
    let hub = Hub::new();
    let code = hub.generate("Alice");
    let alice = fresh_agent();

    let output = hub.run_on("oak-2025", &["admit", &alice, &code]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("different neighbourhood"));
    assert!(!hub.dir.path().join("chains").join(format!("{}.log", alice)).exists());
}

#[test]
fn test_admit_rejects_garbage_code() {
    let hub = Hub::new();
    let output = hub.run(&["admit", &fresh_agent(), "not-a-code"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("whole code"));
}

#[test]
fn test_bootstrap_agent_joins_without_code() {
    let hub = Hub::new();
    let output = hub.run(&["admit", &hub.issuer]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("Bootstrap"));
}

#[test]
fn test_revoke_agent_lifecycle() {
    let hub = Hub::new();
    let mallory = fresh_agent();

    assert_eq!(stdout(&hub.run(&["is-revoked", &mallory])), "not revoked");

    let revoked = hub.run(&["revoke-agent", &mallory, "spam"]);
    assert!(revoked.status.success(), "{}", stderr(&revoked));
    assert!(stdout(&hub.run(&["is-revoked", &mallory])).contains("spam"));

    // Terminal: a second revocation fails
    assert!(!hub.run(&["revoke-agent", &mallory, "again"]).status.success());

    // Revoked agents cannot be admitted
    let code = hub.generate("Mallory");
    assert!(!hub.run(&["admit", &mallory, &code]).status.success());

    let records: serde_json::Value = serde_json::from_str(&stdout(&hub.run(&["revocations"]))).unwrap();
    assert_eq!(records.as_array().map(Vec::len), Some(1));
}

#[test]
fn test_revoke_agent_requires_admin_key() {
    let hub = Hub::new();
    let outsider_dir = TempDir::new().unwrap();
    assert!(blockgate(outsider_dir.path(), &[], &["keygen"]).status.success());
    let key = outsider_dir.path().join("issuer.key");

    let output = hub.run(&["revoke-agent", &fresh_agent(), "spam", "--key", key.to_str().unwrap()]);
    assert!(!output.status.success());
}

#[test]
fn test_revoke_invite() {
    let hub = Hub::new();
    let (_, reference) = hub.generate_with_ref("Bob");

    assert!(hub.run(&["revoke-invite", &reference]).status.success());
    assert!(!hub.run(&["revoke-invite", &reference]).status.success());

    let list: serde_json::Value = serde_json::from_str(&stdout(&hub.run(&["list"]))).unwrap();
    assert!(!list[0]["revoked_at"].is_null());
}

#[test]
fn test_revoked_invite_no_longer_admits() {
    let hub = Hub::new();
    let (code, reference) = hub.generate_with_ref("Carol");

    let carol = fresh_agent();
    assert!(hub.run(&["admit", &carol, &code]).status.success());

    assert!(hub.run(&["revoke-invite", &reference]).status.success());

    let dave = fresh_agent();
    let output = hub.run(&["admit", &dave, &code]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("withdrawn"), "{}", stderr(&output));
    assert!(!hub.chain_path(&dave).exists());
}

#[test]
fn test_generate_refuses_validity_beyond_network_window() {
    let hub = Hub::new();
    let output = hub.run(&["generate", "Erin", "--validity", "30days"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("exceeds"));

    let short = hub.run(&["generate", "Erin", "--validity", "1day"]);
    assert!(short.status.success(), "{}", stderr(&short));
}

#[test]
fn test_admit_can_be_retried_after_storage_failure() {
    let hub = Hub::new();
    let code = hub.generate("Frank");
    let frank = fresh_agent();

    // A plain file where the chains directory belongs makes the chain unwritable
    let chains = hub.dir.path().join("chains");
    std::fs::write(&chains, b"in the way").unwrap();
    let failed = hub.run(&["admit", &frank, &code]);
    assert!(!failed.status.success());

    std::fs::remove_file(&chains).unwrap();
    let retried = hub.run(&["admit", &frank, &code]);
    assert!(retried.status.success(), "{}", stderr(&retried));
    assert!(hub.chain_path(&frank).exists());
}
