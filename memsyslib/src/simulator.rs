use std::io::Read;
use std::time::{Duration, Instant};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::dram::{Dram, FixedLatencyDram};
use crate::error::ConfigError;
use crate::memory_system::{AccessType, MemorySystem, MemorySystemReport};
use crate::trace::{InstructionType, TraceReader, TraceRecord};

/// How many instructions pass between progress messages
pub const HEARTBEAT_INTERVAL: u64 = 5_000_000;

/// The simulator replays a trace against a memory system, one instruction at a time, and keeps
/// the cycle count which doubles as the recency counter for LRU replacement.
///
/// It assumes a perfect pipeline retiring one instruction per cycle, stalled by instruction
/// fetch and load latency beyond the first cycle. Stores go through a store buffer and never stall.
///
/// It supports calling simulate multiple times, and will update the time taken to simulate and the
/// counters accordingly
pub struct Simulator<D: Dram = FixedLatencyDram> {
    memory_system: MemorySystem<D>,
    inst_count: u64,
    cycle_count: u64,
    simulation_time: Duration,
}

/// The result of a simulation. Can be serialised
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SimulationReport {
    pub inst_count: u64,
    pub cycle_count: u64,
    pub cpi: f64,
    pub memory_system: MemorySystemReport,
}

impl Simulator<FixedLatencyDram> {
    /// Creates a new simulator for a given configuration
    ///
    /// # Arguments
    ///
    /// * `config`: A simulation configuration, usually resulting from parsing JSON
    ///
    /// returns: Result<Simulator, ConfigError>
    pub fn new(config: &SimulationConfig) -> Result<Self, ConfigError> {
        Ok(Self::with_memory_system(MemorySystem::new(config)?))
    }
}

impl<D: Dram> Simulator<D> {
    pub fn with_memory_system(memory_system: MemorySystem<D>) -> Self {
        Self {
            memory_system,
            inst_count: 0,
            cycle_count: 0,
            simulation_time: Duration::new(0, 0),
        }
    }

    /// Runs one instruction through the memory system and advances the cycle count
    pub fn step(&mut self, record: &TraceRecord) {
        let now = self.cycle_count;
        let ifetch_delay = self
            .memory_system
            .access(record.instruction_address as u64, AccessType::InstructionFetch, now);
        let load_delay = match record.instruction_type {
            InstructionType::Load => {
                self.memory_system
                    .access(record.load_store_address as u64, AccessType::Load, now)
            }
            InstructionType::Store => {
                // With store buffers, store misses do not stall the pipeline
                let _ = self
                    .memory_system
                    .access(record.load_store_address as u64, AccessType::Store, now);
                0
            }
            InstructionType::Other => 0,
        };
        self.inst_count += 1;
        self.cycle_count += 1 + ifetch_delay.saturating_sub(1) + load_delay.saturating_sub(1);
        if self.inst_count % HEARTBEAT_INTERVAL == 0 {
            debug!("{} M instructions simulated", self.inst_count / 1_000_000);
        }
    }

    /// Simulates every record of a binary trace stream until it ends
    ///
    /// # Arguments
    ///
    /// * `reader`: The trace, already decompressed
    ///
    /// returns: Result<SimulationReport, std::io::Error>
    pub fn simulate<R: Read>(&mut self, reader: R) -> std::io::Result<SimulationReport> {
        let start = Instant::now();
        for record in TraceReader::new(reader) {
            self.step(&record?);
        }
        self.simulation_time += start.elapsed();
        Ok(self.report())
    }

    /// Simulates already decoded records
    pub fn simulate_records<I: IntoIterator<Item = TraceRecord>>(&mut self, records: I) -> SimulationReport {
        let start = Instant::now();
        for record in records {
            self.step(&record);
        }
        self.simulation_time += start.elapsed();
        self.report()
    }

    pub fn report(&self) -> SimulationReport {
        SimulationReport {
            inst_count: self.inst_count,
            cycle_count: self.cycle_count,
            cpi: self.cpi(),
            memory_system: self.memory_system.report(),
        }
    }

    /// Cycles per instruction, 0 before any instruction has run
    pub fn cpi(&self) -> f64 {
        if self.inst_count == 0 {
            0.0
        } else {
            self.cycle_count as f64 / self.inst_count as f64
        }
    }

    pub fn inst_count(&self) -> u64 {
        self.inst_count
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    pub fn memory_system(&self) -> &MemorySystem<D> {
        &self.memory_system
    }

    /// Gets the wall-clock execution time for processing
    pub fn get_execution_time(&self) -> &Duration {
        &self.simulation_time
    }

    /// Prints the instruction and cycle counts followed by the memory system statistics
    pub fn print_stats(&self) {
        println!();
        println!("INST        \t\t\t : {:>10}", self.inst_count);
        println!("CYCLES      \t\t\t : {:>10}", self.cycle_count);
        println!("CPI         \t\t\t : {:>10.3}", self.cpi());
        self.memory_system.print_stats();
        println!();
    }
}
