use thiserror::Error;

use crate::cache::MAX_WAYS;

/// Errors detected while building caches or a memory system from a configuration.
///
/// These are the only failures the library reports: once a memory system has been
/// constructed, every access completes without error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name}: associativity {associativity} exceeds the maximum of {max} ways", max = MAX_WAYS)]
    TooManyWays { name: String, associativity: u64 },

    #[error("{name}: associativity must be at least one way")]
    ZeroWays { name: String },

    #[error("{name}: line size must be non-zero")]
    ZeroLineSize { name: String },

    #[error("{name}: capacity of {size} bytes is not a multiple of {associativity} ways of {line_size} byte lines")]
    UnevenCapacity {
        name: String,
        size: u64,
        associativity: u64,
        line_size: u64,
    },

    #[error("{name}: {num_sets} sets is not a positive power of two")]
    InvalidSetCount { name: String, num_sets: u64 },

    #[error("{name} uses {found} byte lines, but the memory system uses {expected} byte lines")]
    MismatchedLineSize {
        name: String,
        expected: u64,
        found: u64,
    },

    #[error("couldn't parse {0:?} as a capacity, expected a byte count such as 4096, \"32KB\" or \"1MiB\"")]
    InvalidCapacity(String),
}
