//! # MemsysLib
//!
//! Memsyslib is a library for simulating a multi-level memory system
//!
//! It provides a set-associative cache which can be parameterised by a replacement policy, a
//! memory system composing an instruction cache, a data cache, a unified L2 cache and DRAM into a
//! timed access path, and a simulator which replays instruction traces through it
//!
//! Caches only track tags, valid and dirty bits. No data is ever stored

/// Contains the implementation of the cache, and a utility enum for the existing cache types
pub mod cache;

/// Contains definitions for the JSON configuration format
pub mod config;

/// Contains the DRAM access contract and a fixed latency model
pub mod dram;

/// Contains the configuration errors, the only errors the library reports
pub mod error;

/// Contains helpers for opening trace files
pub mod io;

/// Contains the memory system which layers the caches over DRAM
pub mod memory_system;

/// Contains the provided replacement policies, with a trait for implementing custom replacement
/// policies
pub mod replacement_policies;

/// Contains the simulator used to replay a trace through a memory system
pub mod simulator;

/// Contains the counters kept by caches, memory systems and DRAM
pub mod stats;

/// Contains the trace record format
pub mod trace;

#[cfg(test)]
mod test;
