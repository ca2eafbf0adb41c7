/*
    commit_log.rs - Append-only, hash-chained record log

    Every participant's history, the issuer's invitation log and the
    revocation registry are persisted through a LogStore.

    Features:
    - Append-only writes (no in-place updates)
    - Each entry links to the previous entry's blake3 hash
    - CRC32 checksums for corruption detection
    - An append is all-or-nothing: a failed write is rolled back
*/

use crate::core_store::errors::{StoreError, StoreResult};
use crate::time::Timestamp;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Hash of the (non-existent) entry before the first one
pub const GENESIS_PREV_HASH: [u8; 32] = [0u8; 32];

/// Entry in the commit log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Sequence number, starting at 0
    pub seq: u64,

    /// When the entry was appended
    pub timestamp: Timestamp,

    /// Hash of the previous entry
    pub prev_hash: [u8; 32],

    /// Entry data (serialized record)
    pub data: Vec<u8>,

    /// blake3(seq ‖ timestamp ‖ prev_hash ‖ data)
    pub hash: [u8; 32],

    /// CRC32 checksum of `data`
    pub checksum: u32,
}

impl LogEntry {
    pub fn new(seq: u64, timestamp: Timestamp, prev_hash: [u8; 32], data: Vec<u8>) -> Self {
        let hash = Self::calculate_hash(seq, timestamp, &prev_hash, &data);
        let checksum = crc32fast::hash(&data);
        LogEntry { seq, timestamp, prev_hash, data, hash, checksum }
    }

    fn calculate_hash(seq: u64, timestamp: Timestamp, prev_hash: &[u8; 32], data: &[u8]) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&seq.to_le_bytes());
        hasher.update(&timestamp.as_micros().to_le_bytes());
        hasher.update(prev_hash);
        hasher.update(data);
        *hasher.finalize().as_bytes()
    }

    pub fn verify_checksum(&self) -> bool {
        crc32fast::hash(&self.data) == self.checksum
    }

    pub fn verify_hash(&self) -> bool {
        Self::calculate_hash(self.seq, self.timestamp, &self.prev_hash, &self.data) == self.hash
    }

    /// Hex of the entry hash, used as a stable record reference
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    // [seq:8][timestamp:8][prev_hash:32][len:4][data:len][hash:32][checksum:4]
    fn encode(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(FRAME_OVERHEAD + self.data.len());
        frame.extend_from_slice(&self.seq.to_le_bytes());
        frame.extend_from_slice(&self.timestamp.as_micros().to_le_bytes());
        frame.extend_from_slice(&self.prev_hash);
        frame.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        frame.extend_from_slice(&self.data);
        frame.extend_from_slice(&self.hash);
        frame.extend_from_slice(&self.checksum.to_le_bytes());
        frame
    }
}

/// Bytes each entry adds on top of its data
pub const FRAME_OVERHEAD: usize = 8 + 8 + 32 + 4 + 32 + 4;

/// An append-only, single-writer sequence of hash-linked entries
pub trait LogStore: Send {
    /// Append one record. Either the whole entry becomes visible or nothing does.
    fn append(&mut self, timestamp: Timestamp, data: &[u8]) -> StoreResult<LogEntry>;

    /// All entries in append order
    fn entries(&self) -> StoreResult<Vec<LogEntry>>;

    /// Number of entries
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hash of the last entry, or [`GENESIS_PREV_HASH`] when empty
    fn head_hash(&self) -> [u8; 32];
}

impl<S: LogStore + ?Sized> LogStore for Box<S> {
    fn append(&mut self, timestamp: Timestamp, data: &[u8]) -> StoreResult<LogEntry> {
        (**self).append(timestamp, data)
    }

    fn entries(&self) -> StoreResult<Vec<LogEntry>> {
        (**self).entries()
    }

    fn len(&self) -> u64 {
        (**self).len()
    }

    fn head_hash(&self) -> [u8; 32] {
        (**self).head_hash()
    }
}

/// Check sequence numbers and hash links of a replayed log
fn verify_chain(entries: &[LogEntry]) -> StoreResult<()> {
    let mut prev = GENESIS_PREV_HASH;
    for (expected_seq, entry) in entries.iter().enumerate() {
        if entry.seq != expected_seq as u64 {
            return Err(StoreError::CorruptedData(format!(
                "Expected seq {} but found {}",
                expected_seq, entry.seq
            )));
        }
        if !entry.verify_checksum() {
            return Err(StoreError::CorruptedData(format!("Invalid checksum at seq {}", entry.seq)));
        }
        if entry.prev_hash != prev || !entry.verify_hash() {
            return Err(StoreError::CorruptedData(format!("Broken hash chain at seq {}", entry.seq)));
        }
        prev = entry.hash;
    }
    Ok(())
}

/// File-backed append-only commit log
pub struct CommitLog {
    path: PathBuf,
    file: File,
    seq: u64,
    head: [u8; 32],
    size: u64,
}

impl CommitLog {
    /// Create or open a commit log, replaying and verifying existing entries
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).read(true).open(&path)?;
        let size = file.metadata()?.len();

        let entries = Self::read_entries(&path)?;
        verify_chain(&entries)?;

        let seq = entries.len() as u64;
        let head = entries.last().map(|e| e.hash).unwrap_or(GENESIS_PREV_HASH);
        debug!(path = %path.display(), entries = seq, "opened commit log");

        Ok(CommitLog { path, file, seq, head, size })
    }

    fn read_entries(path: &Path) -> StoreResult<Vec<LogEntry>> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut entries = Vec::new();

        loop {
            // Read sequence number; a clean EOF here ends the log
            let mut seq_buf = [0u8; 8];
            match reader.read_exact(&mut seq_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
            let seq = u64::from_le_bytes(seq_buf);

            let truncated = |_| StoreError::CorruptedData(format!("Truncated record at seq {}", seq));

            let mut ts_buf = [0u8; 8];
            reader.read_exact(&mut ts_buf).map_err(truncated)?;

            let mut prev_hash = [0u8; 32];
            reader.read_exact(&mut prev_hash).map_err(truncated)?;

            let mut len_buf = [0u8; 4];
            reader.read_exact(&mut len_buf).map_err(truncated)?;
            let len = u32::from_le_bytes(len_buf) as usize;

            let mut data = vec![0u8; len];
            reader.read_exact(&mut data).map_err(truncated)?;

            let mut hash = [0u8; 32];
            reader.read_exact(&mut hash).map_err(truncated)?;

            let mut checksum_buf = [0u8; 4];
            reader.read_exact(&mut checksum_buf).map_err(truncated)?;

            entries.push(LogEntry {
                seq,
                timestamp: Timestamp::from_micros(u64::from_le_bytes(ts_buf)),
                prev_hash,
                data,
                hash,
                checksum: u32::from_le_bytes(checksum_buf),
            });
        }

        Ok(entries)
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the current size of the log in bytes
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl LogStore for CommitLog {
    fn append(&mut self, timestamp: Timestamp, data: &[u8]) -> StoreResult<LogEntry> {
        let entry = LogEntry::new(self.seq, timestamp, self.head, data.to_vec());
        let frame = entry.encode();

        let written = self.file.write_all(&frame).and_then(|_| self.file.flush());
        if let Err(e) = written {
            // Roll the file back so a partial frame is never replayed
            if let Err(rollback) = self.file.set_len(self.size) {
                warn!(path = %self.path.display(), error = %rollback, "failed to roll back partial append");
            }
            return Err(e.into());
        }

        self.size += frame.len() as u64;
        self.seq += 1;
        self.head = entry.hash;

        Ok(entry)
    }

    fn entries(&self) -> StoreResult<Vec<LogEntry>> {
        Self::read_entries(&self.path)
    }

    fn len(&self) -> u64 {
        self.seq
    }

    fn head_hash(&self) -> [u8; 32] {
        self.head
    }
}

/// In-memory log with the same semantics as [`CommitLog`]
#[derive(Debug, Default, Clone)]
pub struct MemoryLog {
    entries: Vec<LogEntry>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogStore for MemoryLog {
    fn append(&mut self, timestamp: Timestamp, data: &[u8]) -> StoreResult<LogEntry> {
        let entry = LogEntry::new(self.entries.len() as u64, timestamp, self.head_hash(), data.to_vec());
        self.entries.push(entry.clone());
        Ok(entry)
    }

    fn entries(&self) -> StoreResult<Vec<LogEntry>> {
        Ok(self.entries.clone())
    }

    fn len(&self) -> u64 {
        self.entries.len() as u64
    }

    fn head_hash(&self) -> [u8; 32] {
        self.entries.last().map(|e| e.hash).unwrap_or(GENESIS_PREV_HASH)
    }
}
