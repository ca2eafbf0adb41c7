//! Test utilities and helpers for Blockgate
//!
//! Fixtures shared by unit tests, the integration tests under `tests/` and
//! the benchmarks: deterministic keys, a ready-made network configuration, a
//! frozen clock and a log that refuses every append.

pub mod deterministic_rng;
pub mod fixtures;

pub use deterministic_rng::*;
pub use fixtures::*;
