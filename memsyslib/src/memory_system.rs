use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::cache::{Cache, CacheGeometry, CacheTrait, GenericCache, LineAddress, Timestamp};
use crate::config::{CacheConfig, Latencies, ReplacementPolicyConfig, SimulationConfig, SimulationMode};
use crate::dram::{Dram, FixedLatencyDram};
use crate::error::ConfigError;
use crate::replacement_policies::{shared_rng, LeastRecentlyUsed, RandomReplacement, SharedRng};
use crate::stats::{CacheStats, DramStats, MemorySystemStats};

/// The kind of a memory access, which decides the first level cache and whether the line is
/// written
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AccessType {
    InstructionFetch,
    Load,
    Store,
}

/// Composes the caches and the DRAM into a layered access path.
///
/// The data cache is always present. In timed mode an instruction cache and a unified L2 cache
/// sit in front of the DRAM, and every access returns its latency: the first level hit latency,
/// plus the L2 latency on a first level miss, plus the DRAM latency on an L2 miss. Writebacks of
/// dirty victims are sent down the hierarchy but never charged to the access which caused them.
#[derive(Debug)]
pub struct MemorySystem<D: Dram = FixedLatencyDram> {
    line_size: u64,
    latencies: Latencies,
    dcache: GenericCache,
    timed: Option<TimedLevels<D>>,
    stats: MemorySystemStats,
}

#[derive(Debug)]
struct TimedLevels<D: Dram> {
    icache: GenericCache,
    l2cache: GenericCache,
    dram: D,
}

/// The result of a memory system simulation. Can be serialised
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct MemorySystemReport {
    pub accesses: MemorySystemStats,
    pub caches: Vec<CacheResult>,
    pub dram: Option<DramStats>,
}

/// The result for an individual cache. Can be serialised
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct CacheResult {
    pub name: String,
    #[serde(flatten)]
    pub stats: CacheStats,
    pub read_miss_percentage: f64,
    pub write_miss_percentage: f64,
}

impl CacheResult {
    fn new(name: &str, cache: &GenericCache) -> Self {
        let stats = *cache.stats();
        Self {
            name: name.to_string(),
            stats,
            read_miss_percentage: stats.read_miss_percentage(),
            write_miss_percentage: stats.write_miss_percentage(),
        }
    }
}

impl MemorySystem<FixedLatencyDram> {
    /// Creates a new memory system for a given configuration, backed by a fixed latency DRAM
    ///
    /// # Arguments
    ///
    /// * `config`: A simulation configuration, usually resulting from parsing JSON
    ///
    /// returns: Result<MemorySystem, ConfigError>
    pub fn new(config: &SimulationConfig) -> Result<Self, ConfigError> {
        Self::with_dram(config, FixedLatencyDram::new(config.dram_latency))
    }
}

impl<D: Dram> MemorySystem<D> {
    /// Creates a new memory system for a given configuration, over the given DRAM model
    ///
    /// The DRAM is dropped in untimed mode, where nothing below the data cache is simulated
    pub fn with_dram(config: &SimulationConfig, dram: D) -> Result<Self, ConfigError> {
        // One generator for every cache, seeded once
        let rng = shared_rng(config.seed);
        let line_size = config.dcache.line_size;
        let dcache = config_to_cache("DCACHE", &config.dcache, &rng)?;
        let timed = match config.mode {
            SimulationMode::Untimed => None,
            SimulationMode::Timed => {
                let icache = config_to_cache("ICACHE", &config.icache, &rng)?;
                let l2cache = config_to_cache("L2CACHE", &config.l2cache, &rng)?;
                for (name, cache) in [("ICACHE", &icache), ("L2CACHE", &l2cache)] {
                    let found = cache.geometry().line_size();
                    if found != line_size {
                        return Err(ConfigError::MismatchedLineSize {
                            name: name.to_string(),
                            expected: line_size,
                            found,
                        });
                    }
                }
                Some(TimedLevels { icache, l2cache, dram })
            }
        };
        Ok(Self {
            line_size,
            latencies: config.latencies,
            dcache,
            timed,
            stats: MemorySystemStats::default(),
        })
    }

    /// Performs an instruction fetch, load or store, returning its delay in cycles
    ///
    /// In untimed mode only loads and stores touch the data cache and the delay is always 0.
    /// Statistics for the access type are updated either way
    ///
    /// # Arguments
    ///
    /// * `address`: The byte address accessed
    /// * `access_type`: The kind of access
    /// * `now`: The current value of the recency counter, which must never decrease
    ///
    /// returns: u64
    pub fn access(&mut self, address: u64, access_type: AccessType, now: Timestamp) -> u64 {
        // All cache transactions happen at line granularity
        let line_address = address / self.line_size;
        let delay = match &mut self.timed {
            None => {
                access_untimed(&mut self.dcache, line_address, access_type, now);
                0
            }
            Some(levels) => levels.access(&mut self.dcache, &self.latencies, line_address, access_type, now),
        };
        self.stats.record(access_type, delay);
        delay
    }

    /// Accesses the L2 cache directly, as a first level miss or writeback would, returning the
    /// delay in cycles, or None in untimed mode where there is no L2 cache
    ///
    /// Doesn't update the per access type statistics
    pub fn l2_access(&mut self, line_address: LineAddress, is_writeback: bool, now: Timestamp) -> Option<u64> {
        let l2_hit = self.latencies.l2_hit;
        self.timed
            .as_mut()
            .map(|levels| levels.l2_access(l2_hit, line_address, is_writeback, now))
    }

    pub fn mode(&self) -> SimulationMode {
        match self.timed {
            None => SimulationMode::Untimed,
            Some(_) => SimulationMode::Timed,
        }
    }

    pub fn line_size(&self) -> u64 {
        self.line_size
    }

    pub fn stats(&self) -> &MemorySystemStats {
        &self.stats
    }

    pub fn dcache(&self) -> &GenericCache {
        &self.dcache
    }

    pub fn icache(&self) -> Option<&GenericCache> {
        self.timed.as_ref().map(|levels| &levels.icache)
    }

    pub fn l2cache(&self) -> Option<&GenericCache> {
        self.timed.as_ref().map(|levels| &levels.l2cache)
    }

    pub fn dram(&self) -> Option<&D> {
        self.timed.as_ref().map(|levels| &levels.dram)
    }

    /// Gets each cache present in the system with its report header, first levels first
    pub fn caches(&self) -> Vec<(&'static str, &GenericCache)> {
        let mut caches = vec![("DCACHE", &self.dcache)];
        if let Some(levels) = &self.timed {
            caches.push(("ICACHE", &levels.icache));
            caches.push(("L2CACHE", &levels.l2cache));
        }
        caches
    }

    /// Collects the statistics of every level into a serialisable report
    pub fn report(&self) -> MemorySystemReport {
        MemorySystemReport {
            accesses: self.stats,
            caches: self
                .caches()
                .into_iter()
                .map(|(name, cache)| CacheResult::new(name, cache))
                .collect(),
            dram: self.dram().map(|dram| *dram.stats()),
        }
    }

    /// Prints the statistics of every level in the report format
    pub fn print_stats(&self) {
        println!();
        print!("{}", self.stats.report("MEMSYS"));
        for (name, cache) in self.caches() {
            println!();
            print!("{}", cache.stats().report(name));
        }
        if let Some(dram) = self.dram() {
            println!();
            dram.print_stats();
        }
    }
}

impl<D: Dram> TimedLevels<D> {
    fn access(
        &mut self,
        dcache: &mut GenericCache,
        latencies: &Latencies,
        line_address: LineAddress,
        access_type: AccessType,
        now: Timestamp,
    ) -> u64 {
        let (cache, mut delay, is_write) = match access_type {
            AccessType::InstructionFetch => (&mut self.icache, latencies.icache_hit, false),
            AccessType::Load => (dcache, latencies.dcache_hit, false),
            AccessType::Store => (dcache, latencies.dcache_hit, true),
        };
        if cache.access(line_address, is_write, now).is_hit() {
            return delay;
        }
        delay += Self::l2_access_split(&mut self.l2cache, &mut self.dram, latencies.l2_hit, line_address, false, now);
        if let Some(evicted) = cache.install(line_address, is_write, now) {
            if evicted.dirty {
                trace!("writeback of line {:#x} to L2", evicted.tag);
                // Absorbed by the store buffer, never charged to this access
                let _ = Self::l2_access_split(&mut self.l2cache, &mut self.dram, latencies.l2_hit, evicted.tag, true, now);
            }
        }
        delay
    }

    fn l2_access(&mut self, l2_hit: u64, line_address: LineAddress, is_writeback: bool, now: Timestamp) -> u64 {
        Self::l2_access_split(&mut self.l2cache, &mut self.dram, l2_hit, line_address, is_writeback, now)
    }

    // Takes the fields separately so the first level cache can stay borrowed from self
    fn l2_access_split(
        l2cache: &mut GenericCache,
        dram: &mut D,
        l2_hit: u64,
        line_address: LineAddress,
        is_writeback: bool,
        now: Timestamp,
    ) -> u64 {
        let mut delay = l2_hit;
        if l2cache.access(line_address, is_writeback, now).is_hit() {
            return delay;
        }
        delay += dram.access(line_address, false);
        if let Some(evicted) = l2cache.install(line_address, is_writeback, now) {
            if evicted.dirty {
                trace!("writeback of line {:#x} to DRAM", evicted.tag);
                let _ = dram.access(evicted.tag, true);
            }
        }
        delay
    }
}

fn access_untimed(dcache: &mut GenericCache, line_address: LineAddress, access_type: AccessType, now: Timestamp) {
    let is_write = match access_type {
        // No instruction cache in this mode
        AccessType::InstructionFetch => return,
        AccessType::Load => false,
        AccessType::Store => true,
    };
    if !dcache.access(line_address, is_write, now).is_hit() {
        // Without a next level a dirty victim has nowhere to go, it only shows up in the stats
        let _ = dcache.install(line_address, is_write, now);
    }
}

/// Creates a new cache from a cache configuration
fn config_to_cache(name: &str, config: &CacheConfig, rng: &SharedRng) -> Result<GenericCache, ConfigError> {
    let geometry = CacheGeometry::new(name, config.size, config.associativity, config.line_size)?;
    debug!(
        "{name}: {} bytes, {} sets of {} ways, {} byte lines, {:?}",
        geometry.size(),
        geometry.num_sets(),
        geometry.associativity(),
        geometry.line_size(),
        config.replacement_policy
    );
    Ok(match config.replacement_policy {
        ReplacementPolicyConfig::LeastRecentlyUsed => GenericCache::from(Cache::new(geometry, LeastRecentlyUsed)),
        ReplacementPolicyConfig::Random => {
            GenericCache::from(Cache::new(geometry, RandomReplacement::new(rng.clone())))
        }
    })
}
