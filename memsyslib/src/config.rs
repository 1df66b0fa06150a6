use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::dram::DEFAULT_DRAM_LATENCY;
use crate::error::ConfigError;

lazy_static! {
    static ref CAPACITY_PATTERN: Regex = Regex::new(r"(?i)^\s*(?P<count>[0-9]+)\s*(?:(?P<unit>[kmg])i?)?b?\s*$").unwrap();
}

/// A complete configuration for a simulation: the mode, the three caches, and the timing of each
/// level. Any field missing from a JSON configuration takes its default
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub mode: SimulationMode,
    /// Seed for the generator shared by randomly replaced caches
    pub seed: u64,
    pub latencies: Latencies,
    pub dram_latency: u64,
    pub dcache: CacheConfig,
    /// Only used in timed mode
    pub icache: CacheConfig,
    /// Only used in timed mode
    pub l2cache: CacheConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            mode: SimulationMode::default(),
            seed: 42,
            latencies: Latencies::default(),
            dram_latency: DEFAULT_DRAM_LATENCY,
            dcache: CacheConfig::new(32 * 1024, 8),
            icache: CacheConfig::new(32 * 1024, 8),
            l2cache: CacheConfig::new(512 * 1024, 16),
        }
    }
}

impl SimulationConfig {
    /// Sets the line size of every cache
    pub fn set_line_size(&mut self, line_size: u64) {
        for cache in self.caches_mut() {
            cache.line_size = line_size;
        }
    }

    /// Sets the replacement policy of every cache
    pub fn set_replacement_policy(&mut self, policy: ReplacementPolicyConfig) {
        for cache in self.caches_mut() {
            cache.replacement_policy = policy;
        }
    }

    fn caches_mut(&mut self) -> [&mut CacheConfig; 3] {
        [&mut self.dcache, &mut self.icache, &mut self.l2cache]
    }
}

/// Whether the memory system is a single untimed data cache, or the full timed hierarchy
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationMode {
    /// Data cache only, every access has zero delay. Used for hit/miss rate studies
    #[default]
    #[serde(alias = "untimed", alias = "A")]
    Untimed,
    /// Instruction and data caches over a unified L2 cache and DRAM, with latencies
    #[serde(alias = "timed", alias = "B", alias = "C")]
    Timed,
}

/// Hit latencies in cycles for each cache level
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Latencies {
    pub icache_hit: u64,
    pub dcache_hit: u64,
    pub l2_hit: u64,
}

impl Default for Latencies {
    fn default() -> Self {
        Self {
            icache_hit: 1,
            dcache_hit: 1,
            l2_hit: 10,
        }
    }
}

/// A configuration for a single cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Capacity in bytes, either a number or a string such as "32KB"
    #[serde(deserialize_with = "deserialize_capacity")]
    pub size: u64,
    pub associativity: u64,
    #[serde(default = "default_line_size")]
    pub line_size: u64,
    #[serde(default)]
    pub replacement_policy: ReplacementPolicyConfig,
}

impl CacheConfig {
    /// A cache with the default line size and replacement policy
    pub fn new(size: u64, associativity: u64) -> Self {
        Self {
            size,
            associativity,
            line_size: default_line_size(),
            replacement_policy: ReplacementPolicyConfig::default(),
        }
    }
}

fn default_line_size() -> u64 {
    64
}

/// The replacement policy - lru or random. Defaults to lru.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplacementPolicyConfig {
    #[default]
    #[serde(alias = "lru")]
    LeastRecentlyUsed,
    #[serde(alias = "random", alias = "rand")]
    Random,
}

/// Parses a capacity in bytes, with an optional binary unit suffix
///
/// Units are powers of 1024 whether or not they are written with an `i`, matching how cache sizes
/// are usually quoted. Matching is case insensitive
///
/// # Arguments
///
/// * `input`: The capacity, such as "4096", "32KB", "512 KiB" or "1M"
///
/// returns: Result<u64, ConfigError>
///
/// # Examples
///
/// ```
/// use memsyslib::config::parse_capacity;
/// assert_eq!(parse_capacity("32KB").unwrap(), 32 * 1024);
/// assert_eq!(parse_capacity("1MiB").unwrap(), 1024 * 1024);
/// assert_eq!(parse_capacity("64").unwrap(), 64);
/// assert!(parse_capacity("lots").is_err());
/// ```
pub fn parse_capacity(input: &str) -> Result<u64, ConfigError> {
    let invalid = || ConfigError::InvalidCapacity(input.to_string());
    let tokens = CAPACITY_PATTERN.captures(input).ok_or_else(invalid)?;
    let count: u64 = tokens["count"].parse().map_err(|_| invalid())?;
    let multiplier: u64 = match tokens.name("unit").map(|unit| unit.as_str().to_ascii_lowercase()) {
        None => 1,
        Some(unit) if unit == "k" => 1 << 10,
        Some(unit) if unit == "m" => 1 << 20,
        Some(_) => 1 << 30,
    };
    count.checked_mul(multiplier).ok_or_else(invalid)
}

fn deserialize_capacity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Capacity {
        Bytes(u64),
        Text(String),
    }

    match Capacity::deserialize(deserializer)? {
        Capacity::Bytes(bytes) => Ok(bytes),
        Capacity::Text(text) => parse_capacity(&text).map_err(serde::de::Error::custom),
    }
}
