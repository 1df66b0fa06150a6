use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::cache::AccessOutcome;
use crate::memory_system::AccessType;

/// Hit/miss counters for a single cache.
///
/// Only the cache itself updates these, so `read_miss <= read_access` and
/// `write_miss <= write_access` always hold and every counter only grows.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub struct CacheStats {
    pub read_access: u64,
    pub write_access: u64,
    pub read_miss: u64,
    pub write_miss: u64,
    /// Valid, dirty lines displaced by an install
    pub dirty_evicts: u64,
}

impl CacheStats {
    pub(crate) fn record_access(&mut self, is_write: bool, outcome: AccessOutcome) {
        let missed = u64::from(!outcome.is_hit());
        if is_write {
            self.write_access += 1;
            self.write_miss += missed;
        } else {
            self.read_access += 1;
            self.read_miss += missed;
        }
    }

    /// Percentage of reads which missed, 0 when there were no reads
    pub fn read_miss_percentage(&self) -> f64 {
        percentage(self.read_miss, self.read_access)
    }

    /// Percentage of writes which missed, 0 when there were no writes
    pub fn write_miss_percentage(&self) -> f64 {
        percentage(self.write_miss, self.write_access)
    }

    /// Formats the counters as report lines, each prefixed by `header`
    pub fn report(&self, header: &str) -> String {
        let mut out = String::new();
        // Writing to a String can't fail
        let _ = writeln!(out, "{header}_READ_ACCESS    \t\t : {:>10}", self.read_access);
        let _ = writeln!(out, "{header}_WRITE_ACCESS   \t\t : {:>10}", self.write_access);
        let _ = writeln!(out, "{header}_READ_MISS      \t\t : {:>10}", self.read_miss);
        let _ = writeln!(out, "{header}_WRITE_MISS     \t\t : {:>10}", self.write_miss);
        let _ = writeln!(out, "{header}_READ_MISSPERC  \t\t : {:>10.3}", self.read_miss_percentage());
        let _ = writeln!(out, "{header}_WRITE_MISSPERC \t\t : {:>10.3}", self.write_miss_percentage());
        let _ = writeln!(out, "{header}_DIRTY_EVICTS   \t\t : {:>10}", self.dirty_evicts);
        out
    }
}

/// Count and cumulative delay of one kind of memory system access
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub struct AccessTypeStats {
    pub accesses: u64,
    pub total_delay: u64,
}

impl AccessTypeStats {
    /// Mean delay per access in cycles, 0 when there were no accesses
    pub fn average_delay(&self) -> f64 {
        if self.accesses == 0 {
            0.0
        } else {
            self.total_delay as f64 / self.accesses as f64
        }
    }
}

/// Per access type counters for a memory system
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub struct MemorySystemStats {
    pub ifetch: AccessTypeStats,
    pub load: AccessTypeStats,
    pub store: AccessTypeStats,
}

impl MemorySystemStats {
    pub(crate) fn record(&mut self, access_type: AccessType, delay: u64) {
        let stats = self.get_mut(access_type);
        stats.accesses += 1;
        stats.total_delay += delay;
    }

    pub fn get(&self, access_type: AccessType) -> &AccessTypeStats {
        match access_type {
            AccessType::InstructionFetch => &self.ifetch,
            AccessType::Load => &self.load,
            AccessType::Store => &self.store,
        }
    }

    fn get_mut(&mut self, access_type: AccessType) -> &mut AccessTypeStats {
        match access_type {
            AccessType::InstructionFetch => &mut self.ifetch,
            AccessType::Load => &mut self.load,
            AccessType::Store => &mut self.store,
        }
    }

    pub fn report(&self, header: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{header}_IFETCH_ACCESS  \t\t : {:>10}", self.ifetch.accesses);
        let _ = writeln!(out, "{header}_LOAD_ACCESS    \t\t : {:>10}", self.load.accesses);
        let _ = writeln!(out, "{header}_STORE_ACCESS   \t\t : {:>10}", self.store.accesses);
        let _ = writeln!(out, "{header}_IFETCH_AVGDELAY\t\t : {:>10.3}", self.ifetch.average_delay());
        let _ = writeln!(out, "{header}_LOAD_AVGDELAY  \t\t : {:>10.3}", self.load.average_delay());
        let _ = writeln!(out, "{header}_STORE_AVGDELAY \t\t : {:>10.3}", self.store.average_delay());
        out
    }
}

/// Read and write counters for the DRAM collaborator
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub struct DramStats {
    pub read_access: u64,
    pub write_access: u64,
    pub read_delay: u64,
    pub write_delay: u64,
}

impl DramStats {
    pub fn record(&mut self, is_writeback: bool, delay: u64) {
        if is_writeback {
            self.write_access += 1;
            self.write_delay += delay;
        } else {
            self.read_access += 1;
            self.read_delay += delay;
        }
    }

    pub fn report(&self, header: &str) -> String {
        let read_avg = AccessTypeStats {
            accesses: self.read_access,
            total_delay: self.read_delay,
        }
        .average_delay();
        let write_avg = AccessTypeStats {
            accesses: self.write_access,
            total_delay: self.write_delay,
        }
        .average_delay();
        let mut out = String::new();
        let _ = writeln!(out, "{header}_READ_ACCESS     \t\t : {:>10}", self.read_access);
        let _ = writeln!(out, "{header}_WRITE_ACCESS    \t\t : {:>10}", self.write_access);
        let _ = writeln!(out, "{header}_READ_DELAY_AVG  \t\t : {:>10.3}", read_avg);
        let _ = writeln!(out, "{header}_WRITE_DELAY_AVG \t\t : {:>10.3}", write_avg);
        out
    }
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        100.0 * part as f64 / whole as f64
    }
}
