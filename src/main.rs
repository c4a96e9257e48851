mod storage;

use clap::{Args, Parser, Subcommand, ValueEnum};
use primer::config::MAX_SEGMENT_BYTES;
use primer::{CapabilitySnapshot, EngineConfig, Strategy, StrategyKind};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::storage::OutputFormat;

const MAX_SEGMENT_KIB: u64 = (MAX_SEGMENT_BYTES / 1024) as u64;

#[derive(Parser)]
#[command(name = "primer")]
#[command(about = "Auto-tuning prime sieve", long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase log verbosity (-v info, -vv debug); RUST_LOG overrides"
    )]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Find all prime numbers up to a given limit")]
    Primes {
        #[arg(help = "The upper limit to search for primes")]
        limit: u64,
        #[arg(
            short,
            long,
            value_enum,
            default_value = "auto",
            help = "Sieve to use; auto picks one from the hardware and the limit"
        )]
        strategy: StrategyArg,
        #[arg(short, long, help = "Write the primes to this file")]
        output: Option<PathBuf>,
        #[arg(
            short,
            long,
            requires = "output",
            help = "Save primes in binary format (8 bytes per prime, little-endian)"
        )]
        binary: bool,
        #[arg(short, long, help = "Only print the number of primes found")]
        count: bool,
        #[command(flatten)]
        tuning: TuningArgs,
    },
    #[command(about = "Show detected hardware capabilities and the strategy each magnitude gets")]
    Probe {
        #[command(flatten)]
        tuning: TuningArgs,
    },
    #[command(about = "Time every available strategy on one limit and check they agree")]
    Compare {
        #[arg(help = "The upper limit to search for primes")]
        limit: u64,
        #[arg(short, long, default_value = "3", help = "Timed runs per strategy")]
        runs: u32,
        #[command(flatten)]
        tuning: TuningArgs,
    },
}

#[derive(Args)]
struct TuningArgs {
    #[arg(
        short,
        long,
        env = "PRIMER_WORKERS",
        help = "Number of worker threads for the segmented sieve (default: CPU count)"
    )]
    workers: Option<usize>,
    #[arg(
        long,
        env = "PRIMER_SEGMENT_KIB",
        default_value = "32",
        value_parser = clap::value_parser!(u64).range(1..=MAX_SEGMENT_KIB),
        help = "Segment buffer size in KiB for the segmented sieve (1-65536)"
    )]
    segment_kib: u64,
    #[arg(long, help = "Prefer the mod-30 wheel sieve on single-core machines")]
    low_memory: bool,
}

impl TuningArgs {
    fn config(&self) -> EngineConfig {
        EngineConfig {
            segment_bytes: usize::try_from(self.segment_kib.saturating_mul(1024))
                .unwrap_or(MAX_SEGMENT_BYTES),
            workers: self.workers,
            low_memory: self.low_memory,
            ..EngineConfig::default()
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Auto,
    Scalar,
    Vector,
    Segmented,
    Wheel,
}

impl StrategyArg {
    fn kind(self) -> Option<StrategyKind> {
        match self {
            StrategyArg::Auto => None,
            StrategyArg::Scalar => Some(StrategyKind::Scalar),
            StrategyArg::Vector => Some(StrategyKind::Vector),
            StrategyArg::Segmented => Some(StrategyKind::Segmented),
            StrategyArg::Wheel => Some(StrategyKind::Wheel),
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn format_duration(d: Duration) -> String {
    let us = d.as_micros();
    format!("{}us ({:.2}ms)", us, us as f64 / 1000.0)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let caps = primer::probe();

    match cli.command {
        Commands::Primes {
            limit,
            strategy,
            output,
            binary,
            count,
            tuning,
        } => run_primes(&caps, limit, strategy, output, binary, count, &tuning),
        Commands::Probe { tuning } => {
            run_probe(&caps, &tuning.config());
            ExitCode::SUCCESS
        }
        Commands::Compare {
            limit,
            runs,
            tuning,
        } => run_compare(&caps, limit, runs.max(1), &tuning.config()),
    }
}

fn run_primes(
    caps: &CapabilitySnapshot,
    limit: u64,
    strategy: StrategyArg,
    output: Option<PathBuf>,
    binary: bool,
    count: bool,
    tuning: &TuningArgs,
) -> ExitCode {
    let config = tuning.config();
    let strategy = match strategy.kind() {
        Some(kind) => Strategy::build(kind, caps, &config),
        None => primer::select(limit, caps, &config),
    };
    info!(%caps, strategy = strategy.name(), "enumerating primes");

    if !count {
        println!("Finding primes up to {} ({})...", limit, strategy.name());
    }

    let start = Instant::now();
    let primes = match strategy.sieve(limit) {
        Ok(primes) => primes,
        Err(e) => {
            error!("sieve failed: {e}");
            return ExitCode::FAILURE;
        }
    };
    let duration = start.elapsed();

    if count {
        println!("{}", primes.len());
    } else {
        if !primes.is_empty() {
            let head = &primes[..primes.len().min(10)];
            let tail = &primes[primes.len().saturating_sub(10)..];
            println!("\nFirst primes: {:?}", head);
            println!("Last primes:  {:?}", tail);
        }
        println!("\nTotal: {} primes found", primes.len());
        println!("Execution time: {}", format_duration(duration));
        if let Some((rss, vm)) = storage::get_process_memory_mb() {
            println!("Memory: {:.1} MB resident, {:.1} MB virtual", rss, vm);
        }
    }

    if let Some(path) = output {
        let format = if binary {
            OutputFormat::Binary
        } else {
            OutputFormat::Text
        };
        match storage::save_primes(&path, &primes, format) {
            Ok(bytes) => info!(path = %path.display(), bytes, "saved primes"),
            Err(e) => {
                error!("Error saving {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        }
        if !count {
            println!("Saved all primes to {}", path.display());
        }
    }

    if let Err(e) = storage::log_execution(
        "primes",
        &limit.to_string(),
        strategy.name(),
        duration.as_micros(),
    ) {
        warn!("Failed to log execution: {}", e);
    }

    ExitCode::SUCCESS
}

fn run_probe(caps: &CapabilitySnapshot, config: &EngineConfig) {
    println!("Capabilities: {}", caps);
    println!(
        "Vector sieve: {}",
        if primer::vector::VectorSieve::supports(caps) {
            "available"
        } else {
            "unavailable"
        }
    );
    println!();
    println!("{:>15} | strategy", "n");
    println!("{}", "-".repeat(40));
    for n in [10_000_u64, 1_000_000, 10_000_000, 100_000_000, 1_000_000_000] {
        println!("{:>15} | {}", n, primer::select(n, caps, config).name());
    }
}

fn run_compare(caps: &CapabilitySnapshot, limit: u64, runs: u32, config: &EngineConfig) -> ExitCode {
    println!("Comparing strategies for n = {} ({} runs each)", limit, runs);
    println!("Capabilities: {}", caps);
    if limit < config.parallel_threshold {
        println!(
            "Note: n is below the parallel threshold ({}), the segmented sieve delegates",
            config.parallel_threshold
        );
    }
    println!();

    let kinds = StrategyKind::ALL
        .into_iter()
        .filter(|&kind| kind != StrategyKind::Vector || primer::vector::VectorSieve::supports(caps));

    let mut reference: Option<Vec<u64>> = None;
    let mut agree = true;

    for kind in kinds {
        let strategy = Strategy::build(kind, caps, config);

        // Warm up
        if let Err(e) = strategy.sieve((limit / 100).min(10_000)) {
            error!("{} failed: {e}", strategy.name());
            return ExitCode::FAILURE;
        }

        let mut total = Duration::ZERO;
        let mut result = Vec::new();
        for _ in 0..runs {
            let start = Instant::now();
            result = match strategy.sieve(limit) {
                Ok(primes) => primes,
                Err(e) => {
                    error!("{} failed: {e}", strategy.name());
                    return ExitCode::FAILURE;
                }
            };
            total += start.elapsed();
        }

        println!(
            "{:<20} | {:>24} avg | {} primes",
            strategy.name(),
            format_duration(total / runs),
            result.len()
        );

        match &reference {
            None => reference = Some(result),
            Some(expected) if *expected != result => {
                error!("{} disagrees with the scalar sieve", strategy.name());
                agree = false;
            }
            Some(_) => {}
        }
    }

    if agree {
        println!("\nAll strategies agree");
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
