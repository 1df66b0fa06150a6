use std::fs::File;
use std::io::BufReader;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use log::info;
use memsyslib::cache::CacheTrait;
use memsyslib::config::{ReplacementPolicyConfig, SimulationConfig, SimulationMode};
use memsyslib::io::get_reader;
use memsyslib::simulator::Simulator;

#[cfg(debug_assertions)]
const DEBUG_DEFAULT: bool = true;

#[cfg(not(debug_assertions))]
const DEBUG_DEFAULT: bool = false;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Mode {
    /// Data cache only, no timing
    Untimed,
    /// Instruction, data and L2 caches over DRAM, with timing
    Timed,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Replacement {
    Lru,
    Random,
}

#[derive(Parser, Debug)]
#[command(about = String::from("Multi-level cache and memory system simulator"))]
struct Args {
    /// Trace file, gzipped or not
    trace: String,

    /// JSON configuration file. Command line options override it
    #[arg(short, long)]
    config: Option<String>,

    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Line size in bytes for all caches
    #[arg(long)]
    linesize: Option<u64>,

    /// Replacement policy for all caches
    #[arg(long, value_enum)]
    repl: Option<Replacement>,

    /// Capacity of the L1 data cache in KB
    #[arg(long)]
    dsize_kb: Option<u64>,

    /// Associativity of the L1 data cache
    #[arg(long)]
    dassoc: Option<u64>,

    /// Capacity of the unified L2 cache in KB
    #[arg(long)]
    l2size_kb: Option<u64>,

    /// Seed for random replacement
    #[arg(long)]
    seed: Option<u64>,

    /// Print the results as JSON instead of the text report
    #[arg(short, long)]
    json: bool,

    #[arg(short, long)]
    performance: bool,

    #[arg(short, long, default_value_t = DEBUG_DEFAULT)]
    debug: bool,
}

impl Args {
    fn to_config(&self) -> Result<SimulationConfig, String> {
        let mut config = match &self.config {
            Some(path) => {
                let config_file = File::open(path).map_err(|e| format!("Couldn't open the config file at path {path}: {e}"))?;
                serde_json::from_reader(BufReader::new(config_file)).map_err(|e| format!("Couldn't parse the config file: {e}"))?
            }
            None => SimulationConfig::default(),
        };
        if let Some(mode) = self.mode {
            config.mode = match mode {
                Mode::Untimed => SimulationMode::Untimed,
                Mode::Timed => SimulationMode::Timed,
            };
        }
        if let Some(line_size) = self.linesize {
            config.set_line_size(line_size);
        }
        if let Some(repl) = self.repl {
            config.set_replacement_policy(match repl {
                Replacement::Lru => ReplacementPolicyConfig::LeastRecentlyUsed,
                Replacement::Random => ReplacementPolicyConfig::Random,
            });
        }
        if let Some(size) = self.dsize_kb {
            config.dcache.size = kilobytes("--dsize-kb", size)?;
        }
        if let Some(associativity) = self.dassoc {
            config.dcache.associativity = associativity;
        }
        if let Some(size) = self.l2size_kb {
            config.l2cache.size = kilobytes("--l2size-kb", size)?;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        Ok(config)
    }
}

fn kilobytes(option: &str, size: u64) -> Result<u64, String> {
    size.checked_mul(1024).ok_or_else(|| format!("{option} {size} is too large"))
}

fn main() -> Result<(), String> {
    env_logger::init();
    let start = Instant::now();
    let args = Args::parse();
    let config = args.to_config()?;
    let mut simulator = Simulator::new(&config).map_err(|e| format!("Invalid configuration: {e}"))?;
    let trace_file = File::open(&args.trace).map_err(|e| format!("Couldn't open the trace file at path {}: {e}", args.trace))?;
    info!("simulating {} in {:?} mode", args.trace, config.mode);
    let trace_reader = get_reader(trace_file)?;
    let result = simulator.simulate(trace_reader).map_err(|e| format!("Couldn't read the trace file: {e}"))?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result).map_err(|e| format!("Couldn't serialise the output {e}"))?);
    } else {
        simulator.print_stats();
    }
    if args.performance {
        let end = Instant::now();
        let simulation_time = simulator.get_execution_time();
        let total_time = end - start;
        println!("Simulation time: {}s", simulation_time.as_nanos() as f64 / 1e9);
        println!("Total execution time (includes initial parsing, configuration, and output): {}s", total_time.as_nanos() as f64 / 1e9)
    }
    if args.debug {
        #[cfg(debug_assertions)]
        println!("Running the debug binary, debug mode is enabled by default. If benchmarking, do not use this binary, re-compile with the --release argument when using cargo run");
        println!("Parsed input configuration: {config:?}");
        let memory_system = simulator.memory_system();
        let formatted = memory_system
            .caches()
            .iter()
            .map(|(name, cache)| format!("{name}: {}", cache.valid_line_count()))
            .collect::<Vec<_>>()
            .join(", ");
        println!("Valid cache lines by level: ({formatted})");
    }
    Ok(())
}
