/*
    core_store - Append-only, hash-chained persistence

    Handles:
    - Commit logs (file-backed and in-memory)
    - Source chains built on top of them
*/

pub mod chain;
pub mod commit_log;
pub mod errors;

pub use chain::{ActionHash, ChainAction, ChainError, SourceChain};
pub use commit_log::{CommitLog, LogEntry, LogStore, MemoryLog, FRAME_OVERHEAD, GENESIS_PREV_HASH};
pub use errors::{StoreError, StoreResult};
