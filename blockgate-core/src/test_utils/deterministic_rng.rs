/*!
    Deterministic RNG helpers for reproducible tests

    Same seed, same keys: lets a test name "agent 3" and get the same
    identity on every run.
*/

use crate::core_identity::SigningKeypair;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Default seed for deterministic tests
pub const DEFAULT_TEST_SEED: u64 = 42;

/// Create a deterministic RNG with the default seed
pub fn test_rng() -> StdRng {
    test_rng_with_seed(DEFAULT_TEST_SEED)
}

/// Create a deterministic RNG with a custom seed
pub fn test_rng_with_seed(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Keypair derived from `seed`
pub fn seeded_keypair(seed: u64) -> SigningKeypair {
    let secret: [u8; 32] = test_rng_with_seed(seed).random();
    SigningKeypair::from_secret_bytes(&secret)
}
