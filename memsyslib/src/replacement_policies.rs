use std::cell::RefCell;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::cache::CacheLine;

/// A handle to the pseudorandom generator shared by every randomly replaced cache of a memory
/// system.
///
/// Sharing one generator (rather than one per cache) means the sequence of victims depends on
/// the global order of evictions across all caches, so a run is reproduced exactly by using the
/// same seed and the same trace.
pub type SharedRng = Rc<RefCell<StdRng>>;

/// Creates a new shared generator from a seed
pub fn shared_rng(seed: u64) -> SharedRng {
    Rc::new(RefCell::new(StdRng::seed_from_u64(seed)))
}

/// A generic trait for implementing new replacement policies. Can be used to parameterise a Cache.
pub trait ReplacementPolicy {
    /// Used by the cache to pick the way to evict when a new line needs to be installed into a
    /// full set.
    ///
    /// The cache only calls this when every line of the set is valid, and overwrites the
    /// returned way immediately afterwards
    ///
    /// # Arguments
    ///
    /// * `lines`: The lines of the set, indexed by way
    ///
    /// returns: usize, the victim way, which must be less than `lines.len()`
    fn select_victim(&mut self, lines: &[CacheLine]) -> usize;
}

/// Least Recently Used replacement policy
///
/// Recency lives in the lines themselves (`last_access_time`, refreshed on every hit and fill),
/// so the policy keeps no state of its own. Ties go to the lowest way.
#[derive(Debug, Default, Clone, Copy)]
pub struct LeastRecentlyUsed;

impl ReplacementPolicy for LeastRecentlyUsed {
    fn select_victim(&mut self, lines: &[CacheLine]) -> usize {
        let mut min_value = u64::MAX;
        let mut min_index = 0;
        let mut index = 0;
        // Strict comparison keeps the first way seen on ties
        while index < lines.len() {
            if lines[index].last_access_time < min_value {
                min_value = lines[index].last_access_time;
                min_index = index;
            }
            index += 1;
        }
        min_index
    }
}

/// Random replacement policy, drawing a uniform way from a generator shared across caches
#[derive(Debug, Clone)]
pub struct RandomReplacement {
    rng: SharedRng,
}

impl RandomReplacement {
    pub fn new(rng: SharedRng) -> Self {
        Self { rng }
    }
}

impl ReplacementPolicy for RandomReplacement {
    fn select_victim(&mut self, lines: &[CacheLine]) -> usize {
        self.rng.borrow_mut().gen_range(0..lines.len())
    }
}
