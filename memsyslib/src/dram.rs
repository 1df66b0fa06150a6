use log::trace;

use crate::cache::LineAddress;
use crate::stats::DramStats;

/// The latency of a DRAM access when no other value is configured
pub const DEFAULT_DRAM_LATENCY: u64 = 100;

/// The backing store below the last cache level.
///
/// Only the call contract matters to the memory system: an access returns its latency in cycles,
/// whether it is a demand read or a writeback. How a model arrives at that latency is its own
/// business.
pub trait Dram {
    /// Accesses a line, returning the delay in cycles
    ///
    /// # Arguments
    ///
    /// * `line_address`: The line being read or written back
    /// * `is_writeback`: Whether this is a writeback of a dirty line rather than a fill
    ///
    /// returns: u64
    fn access(&mut self, line_address: LineAddress, is_writeback: bool) -> u64;

    /// Gets the statistics collected so far
    fn stats(&self) -> &DramStats;

    /// Prints the statistics in the report format
    fn print_stats(&self) {
        print!("{}", self.stats().report("DRAM"));
    }
}

/// A DRAM which serves every access with the same latency
#[derive(Debug, Clone)]
pub struct FixedLatencyDram {
    latency: u64,
    stats: DramStats,
}

impl FixedLatencyDram {
    pub fn new(latency: u64) -> Self {
        Self {
            latency,
            stats: DramStats::default(),
        }
    }

    pub fn latency(&self) -> u64 {
        self.latency
    }
}

impl Default for FixedLatencyDram {
    fn default() -> Self {
        Self::new(DEFAULT_DRAM_LATENCY)
    }
}

impl Dram for FixedLatencyDram {
    fn access(&mut self, line_address: LineAddress, is_writeback: bool) -> u64 {
        trace!("dram {} of line {line_address:#x}", if is_writeback { "write" } else { "read" });
        self.stats.record(is_writeback, self.latency);
        self.latency
    }

    fn stats(&self) -> &DramStats {
        &self.stats
    }
}
