use log::trace;

use crate::error::ConfigError;
use crate::replacement_policies::{LeastRecentlyUsed, RandomReplacement, ReplacementPolicy};
use crate::stats::CacheStats;

/// The largest associativity a cache can be configured with
pub const MAX_WAYS: u64 = 64;

/// A memory address divided by the line size. Caches track residency at this granularity.
pub type LineAddress = u64;

/// A value of the driver's recency counter, used to order lines for LRU replacement
pub type Timestamp = u64;

/// The tag state of a single cache line. No data is stored, the model only tracks residency.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheLine {
    pub valid: bool,
    pub dirty: bool,
    /// The full line address, not just the upper bits above the set index
    pub tag: LineAddress,
    pub last_access_time: Timestamp,
}

/// A line that was pushed out of a cache by `install`.
///
/// If `dirty` is set, the caller owes a writeback of `tag` to the next level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictedLine {
    pub tag: LineAddress,
    pub dirty: bool,
    pub last_access_time: Timestamp,
}

impl From<CacheLine> for EvictedLine {
    fn from(line: CacheLine) -> Self {
        Self {
            tag: line.tag,
            dirty: line.dirty,
            last_access_time: line.last_access_time,
        }
    }
}

/// The result of probing a cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOutcome {
    Hit,
    Miss,
}

impl AccessOutcome {
    pub fn is_hit(self) -> bool {
        self == AccessOutcome::Hit
    }
}

/// A fixed number of lines which may hold line addresses mapping to the same set index.
///
/// Among the valid lines, tags are always distinct.
#[derive(Debug, Clone)]
pub struct CacheSet {
    lines: Vec<CacheLine>,
}

impl CacheSet {
    fn new(ways: usize) -> Self {
        Self {
            lines: vec![CacheLine::default(); ways],
        }
    }

    pub fn lines(&self) -> &[CacheLine] {
        &self.lines
    }

    /// Finds the way holding a valid line with the given tag
    pub fn find(&self, tag: LineAddress) -> Option<usize> {
        self.lines.iter().position(|line| line.valid && line.tag == tag)
    }

    /// Finds the first way which holds no valid line
    fn free_way(&self) -> Option<usize> {
        self.lines.iter().position(|line| !line.valid)
    }
}

/// The shape of a cache, derived from its configured capacity, associativity and line size
///
/// Only `CacheGeometry::new` builds one, so every geometry has a positive power of two set count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheGeometry {
    size: u64,
    associativity: u64,
    line_size: u64,
    num_sets: u64,
}

impl CacheGeometry {
    /// Validates a cache shape, computing `num_sets = size / (line_size * associativity)`
    ///
    /// The set count has to be a positive power of two so the set index can be taken from the
    /// low bits of the line address, and the capacity has to divide exactly so that
    /// `num_sets * associativity * line_size == size`
    ///
    /// # Arguments
    ///
    /// * `name`: The name of the cache, used in error messages
    /// * `size`: The capacity in bytes
    /// * `associativity`: The number of ways per set
    /// * `line_size`: The line size in bytes
    ///
    /// returns: Result<CacheGeometry, ConfigError>
    pub fn new(name: &str, size: u64, associativity: u64, line_size: u64) -> Result<Self, ConfigError> {
        if associativity == 0 {
            return Err(ConfigError::ZeroWays { name: name.to_string() });
        }
        if associativity > MAX_WAYS {
            return Err(ConfigError::TooManyWays {
                name: name.to_string(),
                associativity,
            });
        }
        if line_size == 0 {
            return Err(ConfigError::ZeroLineSize { name: name.to_string() });
        }
        let uneven = || ConfigError::UnevenCapacity {
            name: name.to_string(),
            size,
            associativity,
            line_size,
        };
        let way_bytes = line_size.checked_mul(associativity).ok_or_else(uneven)?;
        if size % way_bytes != 0 {
            return Err(uneven());
        }
        let num_sets = size / way_bytes;
        if !num_sets.is_power_of_two() {
            return Err(ConfigError::InvalidSetCount {
                name: name.to_string(),
                num_sets,
            });
        }
        Ok(Self {
            size,
            associativity,
            line_size,
            num_sets,
        })
    }

    /// Capacity in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn associativity(&self) -> u64 {
        self.associativity
    }

    pub fn line_size(&self) -> u64 {
        self.line_size
    }

    pub fn num_sets(&self) -> u64 {
        self.num_sets
    }
}

/// A generic trait for caches
///
/// Every operation works on line addresses; converting byte addresses is the responsibility of
/// the caller. Probing and filling are separate calls so that the caller can consult the next
/// level and charge latency between a miss and the fill.
pub trait CacheTrait {
    /// Gets the set a line address maps to, taken from its low-order bits
    fn set_index(&self, line_address: LineAddress) -> usize;

    /// Probes the cache for a line, returning whether it hit
    ///
    /// On a hit the line's recency is refreshed to `now` and, for writes, the line is marked
    /// dirty. On a miss no line is changed. Access and miss statistics are updated either way
    ///
    /// # Arguments
    ///
    /// * `line_address`: The line to look up
    /// * `is_write`: Whether the access writes the line
    /// * `now`: The current value of the recency counter
    ///
    /// returns: AccessOutcome
    fn access(&mut self, line_address: LineAddress, is_write: bool, now: Timestamp) -> AccessOutcome;

    /// Installs a line after a miss, returning the line it displaced, if any
    ///
    /// A free way is used when the set has one, otherwise the replacement policy picks the
    /// victim. Must not be called for a line which is already resident
    ///
    /// # Arguments
    ///
    /// * `line_address`: The line to install
    /// * `is_dirty`: Whether the new line starts dirty
    /// * `now`: The current value of the recency counter
    ///
    /// returns: Option<EvictedLine>
    fn install(&mut self, line_address: LineAddress, is_dirty: bool, now: Timestamp) -> Option<EvictedLine>;

    /// Checks whether a line is resident without touching any state or statistics
    fn is_resident(&self, line_address: LineAddress) -> bool;

    /// Gets the shape of this cache
    fn geometry(&self) -> &CacheGeometry;

    /// Gets the statistics collected so far
    fn stats(&self) -> &CacheStats;

    /// Gets the number of valid lines. Useful for analysing cache performance or debugging
    fn valid_line_count(&self) -> usize;
}

/// A set-associative cache, parameterised by a replacement policy
///
/// As in the rest of the library we rely on monomorphisation, so the victim selection is
/// resolved once per cache type rather than branched on for every install
#[derive(Debug, Clone)]
pub struct Cache<R: ReplacementPolicy> {
    sets: Vec<CacheSet>,
    set_selection_bit_mask: u64,
    geometry: CacheGeometry,
    replacement_policy: R,
    stats: CacheStats,
}

impl<R: ReplacementPolicy> Cache<R> {
    pub fn new(geometry: CacheGeometry, policy: R) -> Self {
        Self {
            sets: vec![CacheSet::new(geometry.associativity() as usize); geometry.num_sets() as usize],
            set_selection_bit_mask: geometry.num_sets() - 1,
            geometry,
            replacement_policy: policy,
            stats: CacheStats::default(),
        }
    }

    /// Gets a set of the cache, for inspection
    pub fn set(&self, index: usize) -> &CacheSet {
        &self.sets[index]
    }
}

impl<R: ReplacementPolicy> CacheTrait for Cache<R> {
    fn set_index(&self, line_address: LineAddress) -> usize {
        (line_address & self.set_selection_bit_mask) as usize
    }

    fn access(&mut self, line_address: LineAddress, is_write: bool, now: Timestamp) -> AccessOutcome {
        let set_index = self.set_index(line_address);
        let set = &mut self.sets[set_index];
        let outcome = match set.find(line_address) {
            Some(way) => {
                let line = &mut set.lines[way];
                line.last_access_time = now;
                if is_write {
                    line.dirty = true;
                }
                AccessOutcome::Hit
            }
            None => AccessOutcome::Miss,
        };
        self.stats.record_access(is_write, outcome);
        outcome
    }

    fn install(&mut self, line_address: LineAddress, is_dirty: bool, now: Timestamp) -> Option<EvictedLine> {
        let set_index = self.set_index(line_address);
        let set = &mut self.sets[set_index];
        debug_assert!(
            set.find(line_address).is_none(),
            "line {line_address:#x} installed while already resident"
        );
        let new_line = CacheLine {
            valid: true,
            dirty: is_dirty,
            tag: line_address,
            last_access_time: now,
        };
        if let Some(way) = set.free_way() {
            set.lines[way] = new_line;
            return None;
        }
        let way = self.replacement_policy.select_victim(&set.lines);
        let victim = EvictedLine::from(set.lines[way]);
        set.lines[way] = new_line;
        if victim.dirty {
            self.stats.dirty_evicts += 1;
        }
        trace!(
            "set {set_index} way {way}: evicted line {:#x} (dirty: {}) for {line_address:#x}",
            victim.tag,
            victim.dirty
        );
        Some(victim)
    }

    fn is_resident(&self, line_address: LineAddress) -> bool {
        self.sets[self.set_index(line_address)].find(line_address).is_some()
    }

    fn geometry(&self) -> &CacheGeometry {
        &self.geometry
    }

    fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn valid_line_count(&self) -> usize {
        self.sets
            .iter()
            .map(|set| set.lines.iter().filter(|line| line.valid).count())
            .sum()
    }
}

/// Enum for the cache types provided by the library, one per replacement policy
///
/// Trait objects would be opaque to the compiler on every access of every trace record.
/// Branching explicitly on the concrete types lets the policy be inlined instead
#[derive(Debug, Clone)]
pub enum GenericCache {
    LeastRecentlyUsed(Cache<LeastRecentlyUsed>),
    Random(Cache<RandomReplacement>),
}

impl From<Cache<LeastRecentlyUsed>> for GenericCache {
    fn from(value: Cache<LeastRecentlyUsed>) -> Self {
        Self::LeastRecentlyUsed(value)
    }
}

impl From<Cache<RandomReplacement>> for GenericCache {
    fn from(value: Cache<RandomReplacement>) -> Self {
        Self::Random(value)
    }
}

impl CacheTrait for GenericCache {
    fn set_index(&self, line_address: LineAddress) -> usize {
        match self {
            GenericCache::LeastRecentlyUsed(c) => c.set_index(line_address),
            GenericCache::Random(c) => c.set_index(line_address),
        }
    }

    fn access(&mut self, line_address: LineAddress, is_write: bool, now: Timestamp) -> AccessOutcome {
        match self {
            GenericCache::LeastRecentlyUsed(c) => c.access(line_address, is_write, now),
            GenericCache::Random(c) => c.access(line_address, is_write, now),
        }
    }

    fn install(&mut self, line_address: LineAddress, is_dirty: bool, now: Timestamp) -> Option<EvictedLine> {
        match self {
            GenericCache::LeastRecentlyUsed(c) => c.install(line_address, is_dirty, now),
            GenericCache::Random(c) => c.install(line_address, is_dirty, now),
        }
    }

    fn is_resident(&self, line_address: LineAddress) -> bool {
        match self {
            GenericCache::LeastRecentlyUsed(c) => c.is_resident(line_address),
            GenericCache::Random(c) => c.is_resident(line_address),
        }
    }

    fn geometry(&self) -> &CacheGeometry {
        match self {
            GenericCache::LeastRecentlyUsed(c) => c.geometry(),
            GenericCache::Random(c) => c.geometry(),
        }
    }

    fn stats(&self) -> &CacheStats {
        match self {
            GenericCache::LeastRecentlyUsed(c) => c.stats(),
            GenericCache::Random(c) => c.stats(),
        }
    }

    fn valid_line_count(&self) -> usize {
        match self {
            GenericCache::LeastRecentlyUsed(c) => c.valid_line_count(),
            GenericCache::Random(c) => c.valid_line_count(),
        }
    }
}
