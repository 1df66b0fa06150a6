use std::error::Error;
use std::fs::{self, File};
use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::config::{ReplacementPolicyConfig, SimulationConfig, SimulationMode};
use crate::io::get_reader;
use crate::simulator::{SimulationReport, Simulator};
use crate::test::synthetic_trace;
use crate::trace::{InstructionType, TraceReader, TraceRecord};

fn timed_config() -> SimulationConfig {
    SimulationConfig {
        mode: SimulationMode::Timed,
        ..SimulationConfig::default()
    }
}

fn record(instruction_address: u32, instruction_type: InstructionType, load_store_address: u32) -> TraceRecord {
    TraceRecord {
        instruction_address,
        instruction_type,
        load_store_address,
    }
}

fn encode(records: &[TraceRecord]) -> Vec<u8> {
    records.iter().flat_map(|record| record.to_bytes()).collect()
}

#[test]
fn fetch_and_load_latency_stall_but_stores_do_not() -> Result<(), Box<dyn Error>> {
    let mut simulator = Simulator::new(&timed_config())?;
    // Cold instruction fetch, 110 cycles of stall
    simulator.step(&record(0x0, InstructionType::Other, 0));
    assert_eq!(simulator.cycle_count(), 111);
    simulator.step(&record(0x0, InstructionType::Other, 0));
    assert_eq!(simulator.cycle_count(), 112);
    // Store miss goes through the store buffer
    simulator.step(&record(0x4, InstructionType::Store, 0x1000));
    assert_eq!(simulator.cycle_count(), 113);
    // Load miss stalls
    simulator.step(&record(0x8, InstructionType::Load, 0x2000));
    assert_eq!(simulator.cycle_count(), 224);
    assert_eq!(simulator.inst_count(), 4);
    assert_eq!(simulator.cpi(), 56.0);
    let stats = simulator.memory_system().stats();
    assert_eq!((stats.ifetch.accesses, stats.load.accesses, stats.store.accesses), (4, 1, 1));
    assert_eq!(stats.store.total_delay, 111);
    Ok(())
}

#[test]
fn untimed_mode_runs_at_one_cycle_per_instruction() -> Result<(), Box<dyn Error>> {
    let mut simulator = Simulator::new(&SimulationConfig::default())?;
    let report = simulator.simulate_records(synthetic_trace(10_000));
    assert_eq!(report.inst_count, 10_000);
    assert_eq!(report.cycle_count, 10_000);
    assert_eq!(report.cpi, 1.0);
    assert_eq!(report.memory_system.caches.len(), 1);
    assert!(report.memory_system.dram.is_none());
    Ok(())
}

#[test]
fn simulate_reads_binary_trace() -> Result<(), Box<dyn Error>> {
    let records = synthetic_trace(5_000);
    let mut bytes = encode(&records);
    // A partial trailing record ends the trace
    bytes.extend_from_slice(&[1, 2, 3]);
    let mut from_bytes = Simulator::new(&timed_config())?;
    let report = from_bytes.simulate(&bytes[..])?;
    let mut from_records = Simulator::new(&timed_config())?;
    assert_eq!(report, from_records.simulate_records(records));
    assert_eq!(report.inst_count, 5_000);
    Ok(())
}

#[test]
fn memory_system_counts_are_consistent() -> Result<(), Box<dyn Error>> {
    let records = synthetic_trace(50_000);
    let loads = records.iter().filter(|r| r.instruction_type == InstructionType::Load).count() as u64;
    let stores = records.iter().filter(|r| r.instruction_type == InstructionType::Store).count() as u64;
    let mut simulator = Simulator::new(&timed_config())?;
    let report = simulator.simulate_records(records);
    let accesses = report.memory_system.accesses;
    assert_eq!(accesses.ifetch.accesses, 50_000);
    assert_eq!(accesses.load.accesses, loads);
    assert_eq!(accesses.store.accesses, stores);
    for cache in &report.memory_system.caches {
        assert!(cache.stats.read_miss <= cache.stats.read_access, "{}", cache.name);
        assert!(cache.stats.write_miss <= cache.stats.write_access, "{}", cache.name);
    }
    let dcache = &report.memory_system.caches[0].stats;
    let icache = &report.memory_system.caches[1].stats;
    let l2 = &report.memory_system.caches[2].stats;
    assert_eq!(dcache.read_access, loads);
    assert_eq!(dcache.write_access, stores);
    assert_eq!(icache.read_access, 50_000);
    // Every first level miss and every dirty first level eviction reaches L2
    assert_eq!(
        l2.read_access + l2.write_access,
        dcache.read_miss + dcache.write_miss + icache.read_miss + dcache.dirty_evicts
    );
    assert_eq!(l2.write_access, dcache.dirty_evicts);
    let dram = report.memory_system.dram.unwrap();
    assert_eq!(dram.read_access, l2.read_miss + l2.write_miss);
    assert_eq!(dram.write_access, l2.dirty_evicts);
    Ok(())
}

#[test]
fn random_replacement_runs_are_repeatable() -> Result<(), Box<dyn Error>> {
    let run = |seed: u64| -> Result<SimulationReport, Box<dyn Error>> {
        let mut config = timed_config();
        config.seed = seed;
        config.set_replacement_policy(ReplacementPolicyConfig::Random);
        Ok(Simulator::new(&config)?.simulate_records(synthetic_trace(20_000)))
    };
    assert_eq!(run(42)?, run(42)?);
    Ok(())
}

#[test]
fn report_serialises_to_json() -> Result<(), Box<dyn Error>> {
    let mut simulator = Simulator::new(&timed_config())?;
    let report = simulator.simulate_records(synthetic_trace(100));
    let json = serde_json::to_string_pretty(&report)?;
    let parsed: SimulationReport = serde_json::from_str(&json)?;
    assert_eq!(parsed.inst_count, 100);
    assert!(json.contains("\"L2CACHE\""));
    assert!(json.contains("\"dirty_evicts\""));
    Ok(())
}

#[test]
fn gzipped_and_plain_traces_read_the_same() -> Result<(), Box<dyn Error>> {
    let bytes = encode(&synthetic_trace(2_000));
    let dir = std::env::temp_dir();
    let plain_path = dir.join(format!("memsyslib-plain-{}.trace", std::process::id()));
    let gzip_path = dir.join(format!("memsyslib-gzip-{}.trace.gz", std::process::id()));
    fs::write(&plain_path, &bytes)?;
    let mut encoder = GzEncoder::new(File::create(&gzip_path)?, Compression::default());
    encoder.write_all(&bytes)?;
    encoder.finish()?;

    let plain = Simulator::new(&timed_config())?.simulate(get_reader(File::open(&plain_path)?)?)?;
    let gzipped = Simulator::new(&timed_config())?.simulate(get_reader(File::open(&gzip_path)?)?)?;
    fs::remove_file(&plain_path)?;
    fs::remove_file(&gzip_path)?;
    assert_eq!(plain, gzipped);
    assert_eq!(plain.inst_count, 2_000);
    Ok(())
}

#[test]
fn every_member_of_a_concatenated_gzip_trace_is_read() -> Result<(), Box<dyn Error>> {
    let records = synthetic_trace(20);
    let path = std::env::temp_dir().join(format!("memsyslib-multi-gzip-{}.trace.gz", std::process::id()));
    let mut file = File::create(&path)?;
    for part in records.chunks(10) {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&encode(part))?;
        file.write_all(&encoder.finish()?)?;
    }
    drop(file);

    let read = TraceReader::new(get_reader(File::open(&path)?)?).collect::<Result<Vec<_>, _>>()?;
    fs::remove_file(&path)?;
    assert_eq!(read, records);
    Ok(())
}
