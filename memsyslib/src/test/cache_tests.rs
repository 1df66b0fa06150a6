use crate::cache::{AccessOutcome, Cache, CacheGeometry, CacheTrait, MAX_WAYS};
use crate::error::ConfigError;
use crate::replacement_policies::{shared_rng, LeastRecentlyUsed, RandomReplacement};

fn lru_cache(size: u64, associativity: u64, line_size: u64) -> Cache<LeastRecentlyUsed> {
    Cache::new(CacheGeometry::new("TEST", size, associativity, line_size).unwrap(), LeastRecentlyUsed)
}

#[test]
fn geometry_covers_capacity() {
    for (size, associativity, line_size) in [(32 * 1024, 8, 64), (512 * 1024, 16, 64), (128, 2, 64), (4096, 1, 32), (64 * 64, 64, 64)] {
        let geometry = CacheGeometry::new("TEST", size, associativity, line_size).unwrap();
        assert_eq!(geometry.num_sets() * geometry.associativity() * geometry.line_size(), size);
        assert_eq!(geometry.size(), size);
        assert!(geometry.num_sets().is_power_of_two());
    }
}

#[test]
fn invalid_geometries_are_rejected() {
    assert_eq!(
        CacheGeometry::new("TEST", 1 << 20, MAX_WAYS + 1, 64),
        Err(ConfigError::TooManyWays { name: "TEST".to_string(), associativity: MAX_WAYS + 1 })
    );
    assert_eq!(CacheGeometry::new("TEST", 1024, 0, 64), Err(ConfigError::ZeroWays { name: "TEST".to_string() }));
    assert_eq!(CacheGeometry::new("TEST", 1024, 2, 0), Err(ConfigError::ZeroLineSize { name: "TEST".to_string() }));
    assert!(matches!(CacheGeometry::new("TEST", 1000, 2, 64), Err(ConfigError::UnevenCapacity { .. })));
    assert_eq!(
        CacheGeometry::new("TEST", 3 * 64, 1, 64),
        Err(ConfigError::InvalidSetCount { name: "TEST".to_string(), num_sets: 3 })
    );
    assert!(matches!(CacheGeometry::new("TEST", 0, 1, 64), Err(ConfigError::InvalidSetCount { num_sets: 0, .. })));
}

#[test]
fn set_index_uses_low_bits_of_line_address() {
    // 4 sets
    let cache = lru_cache(4 * 2 * 64, 2, 64);
    assert_eq!(cache.set_index(0), 0);
    assert_eq!(cache.set_index(5), 1);
    assert_eq!(cache.set_index(7), 3);
    assert_eq!(cache.set_index(0x1000), 0);
}

#[test]
fn install_then_access_hits() {
    let mut cache = lru_cache(32 * 1024, 8, 64);
    assert_eq!(cache.access(0x1234, false, 0), AccessOutcome::Miss);
    assert_eq!(cache.install(0x1234, false, 0), None);
    assert_eq!(cache.access(0x1234, false, 1), AccessOutcome::Hit);
    assert_eq!(cache.access(0x1234, true, 2), AccessOutcome::Hit);
    assert_eq!(cache.valid_line_count(), 1);
}

#[test]
fn miss_changes_no_line() {
    let mut cache = lru_cache(128, 2, 64);
    assert_eq!(cache.access(3, true, 0), AccessOutcome::Miss);
    assert!(!cache.is_resident(3));
    assert_eq!(cache.valid_line_count(), 0);
}

#[test]
fn lru_evicts_least_recently_used() {
    // One set of two ways, lines 0, 1 and 2 are byte addresses 0, 64 and 128
    let mut cache = lru_cache(128, 2, 64);
    assert_eq!(cache.access(0, false, 0), AccessOutcome::Miss);
    assert_eq!(cache.install(0, false, 0), None);
    assert_eq!(cache.access(1, false, 1), AccessOutcome::Miss);
    assert_eq!(cache.install(1, false, 1), None);
    assert_eq!(cache.access(0, false, 2), AccessOutcome::Hit);
    assert_eq!(cache.access(2, false, 3), AccessOutcome::Miss);
    let evicted = cache.install(2, false, 3).unwrap();
    assert_eq!(evicted.tag, 1);
    assert!(!evicted.dirty);
    assert!(cache.is_resident(0));
    assert!(!cache.is_resident(1));
    assert!(cache.is_resident(2));
}

#[test]
fn lru_ties_go_to_lowest_way() {
    let mut cache = lru_cache(4 * 64, 4, 64);
    for line in 0..4 {
        assert_eq!(cache.install(line, false, 7), None);
    }
    assert_eq!(cache.install(4, false, 7).unwrap().tag, 0);
    assert_eq!(cache.set(0).lines()[0].tag, 4);
}

#[test]
fn line_zero_is_an_ordinary_line() {
    let mut cache = lru_cache(128, 2, 64);
    assert_eq!(cache.install(0, false, 0), None);
    // Way 0 holds line 0 and must not look free
    assert_eq!(cache.install(1, false, 1), None);
    assert!(cache.is_resident(0));
    assert!(cache.is_resident(1));
    assert_eq!(cache.access(0, false, 2), AccessOutcome::Hit);
}

#[test]
fn dirty_line_is_evicted_exactly_once() {
    let mut cache = lru_cache(128, 2, 64);
    assert_eq!(cache.access(0, true, 0), AccessOutcome::Miss);
    assert_eq!(cache.install(0, true, 0), None);
    assert_eq!(cache.install(1, false, 1), None);
    let evicted = cache.install(2, false, 2).unwrap();
    assert_eq!(evicted.tag, 0);
    assert!(evicted.dirty);
    assert_eq!(cache.stats().dirty_evicts, 1);
    // Clean victim
    let evicted = cache.install(3, false, 3).unwrap();
    assert_eq!(evicted.tag, 1);
    assert!(!evicted.dirty);
    assert_eq!(cache.stats().dirty_evicts, 1);
}

#[test]
fn write_hit_marks_line_dirty() {
    let mut cache = lru_cache(64, 1, 64);
    assert_eq!(cache.install(9, false, 0), None);
    assert_eq!(cache.access(9, true, 1), AccessOutcome::Hit);
    let evicted = cache.install(10, false, 2).unwrap();
    assert!(evicted.dirty);
    assert_eq!(evicted.last_access_time, 1);
    assert_eq!(cache.stats().dirty_evicts, 1);
}

#[test]
fn counters_track_reads_and_writes() {
    let mut cache = lru_cache(1024, 4, 64);
    let mut time = 0;
    for line in [1, 2, 1, 3, 1, 2, 40, 41, 42, 43, 44] {
        time += 1;
        let is_write = line % 2 == 0;
        if !cache.access(line, is_write, time).is_hit() {
            let _ = cache.install(line, is_write, time);
        }
        let stats = cache.stats();
        assert!(stats.read_miss <= stats.read_access);
        assert!(stats.write_miss <= stats.write_access);
    }
    let stats = cache.stats();
    assert_eq!(stats.read_access + stats.write_access, 11);
    assert_eq!(stats.write_access, 5);
    assert_eq!(stats.read_miss, 4);
    assert_eq!(stats.write_miss, 4);
}

#[test]
fn random_replacement_is_repeatable() {
    let run = |seed| {
        let geometry = CacheGeometry::new("TEST", 4 * 4 * 64, 4, 64).unwrap();
        let mut cache = Cache::new(geometry, RandomReplacement::new(shared_rng(seed)));
        let mut outcomes = Vec::new();
        for (time, line) in (0..2000u64).map(|i| (i * 7919) % 37).enumerate() {
            let outcome = cache.access(line, false, time as u64);
            if !outcome.is_hit() {
                let _ = cache.install(line, false, time as u64);
            }
            outcomes.push(outcome);
        }
        (outcomes, *cache.stats())
    };
    assert_eq!(run(42), run(42));
}

#[test]
fn random_replacement_keeps_sets_full() {
    let geometry = CacheGeometry::new("TEST", 4 * 64, 4, 64).unwrap();
    let mut cache = Cache::new(geometry, RandomReplacement::new(shared_rng(1)));
    for line in 0..100 {
        let evicted = cache.install(line, false, line);
        assert_eq!(evicted.is_some(), line >= 4);
        assert!(cache.is_resident(line));
        assert_eq!(cache.valid_line_count(), (line as usize + 1).min(4));
    }
}
