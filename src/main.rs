use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{thread, time::{Duration, Instant}};
use tracing::info;
use tracing_subscriber::EnvFilter;
use workpools::{
    workload::{self, SimulatedLatency},
    BarrierPool, PoolConfig, RoundKernel, TaskQueuePool,
};


#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Worker threads (default: available parallelism)
    #[clap(short, long, global = true)]
    workers: Option<usize>,

    /// Turn debugging information on (-v, -vv)
    #[clap(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Round-based data-parallel computation over a shared buffer
    Barrier {
        #[clap(long, default_value_t = 25_497_563)]
        len: usize,

        #[clap(long, default_value_t = 10)]
        rounds: usize,

        /// Use seeded random input instead of the normalized index
        #[clap(long)]
        random_input: bool,

        #[clap(long, default_value_t = 42)]
        seed: u64,
    },
    /// Multiplication tasks pulled from a shared queue
    Tasks {
        #[clap(long, default_value_t = 4)]
        rows: i64,

        #[clap(long, default_value_t = 10)]
        cols: i64,

        #[clap(long, default_value_t = 100)]
        latency_ms: u64,

        #[clap(long, default_value_t = 50)]
        jitter_ms: u64,

        #[clap(long, default_value_t = 42)]
        seed: u64,
    },
}

fn setup_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose);

    let mut config = PoolConfig::default();
    if let Some(workers) = args.workers {
        config = config.with_threads(workers);
    }

    match args.command {
        Command::Barrier { len, rounds, random_input, seed } => {
            run_barrier(config, len, rounds, random_input.then_some(seed))
        }
        Command::Tasks { rows, cols, latency_ms, jitter_ms, seed } => {
            let latency = SimulatedLatency::new(
                Duration::from_millis(latency_ms),
                Duration::from_millis(jitter_ms),
                seed,
            );
            run_tasks(config, rows, cols, latency)
        }
    }
}

fn run_barrier(config: PoolConfig, len: usize, rounds: usize, seed: Option<u64>) -> Result<()> {
    let kernel = match seed {
        Some(seed) => RoundKernel::over_values(workload::random_input(len, seed), f64::sin),
        None => RoundKernel::sine_of_index(),
    };

    let now = Instant::now();
    let reference = kernel.reference(len);
    info!(elapsed = ?now.elapsed(), len, "reference computed");

    let mut pool = BarrierPool::with_config(config.with_thread_name("round-worker"), len, kernel)
        .context("failed to start barrier pool")?;
    info!(
        workers = pool.workers(),
        per_worker = pool.partition().per_worker(),
        "barrier pool ready"
    );

    for _ in 0..rounds {
        let report = pool.run_round().context("round failed")?;
        let error = workload::abs_error(&reference, &pool.snapshot());
        info!(round = report.round, elapsed = ?report.elapsed, error, "round complete");
    }

    pool.shutdown();
    info!(rounds = pool.rounds_completed(), "barrier pool shut down");
    Ok(())
}

fn run_tasks(config: PoolConfig, rows: i64, cols: i64, latency: SimulatedLatency) -> Result<()> {
    let pool = TaskQueuePool::with_config(config.with_thread_name("queue-worker"))
        .context("failed to start task queue pool")?;

    let now = Instant::now();
    let mut handles = Vec::new();
    for a in 0..rows {
        for b in 0..cols {
            let task = (a * cols + b) as u64;
            let handle = pool.submit_with(
                move |(a, b): (i64, i64)| {
                    let product = workload::multiply(a, b, latency, task);
                    let name = thread::current().name().unwrap_or("<unnamed>").to_owned();
                    info!(thread = %name, a, b, product, "multiplied");
                    product
                },
                (a, b),
            )?;
            handles.push(handle);
        }
    }

    let mut total = 0;
    for handle in handles {
        total += handle.get()?;
    }

    let metrics = pool.metrics();
    info!(
        elapsed = ?now.elapsed(),
        completed = metrics.completed,
        failed = metrics.failed,
        total,
        "all tasks finished"
    );
    Ok(())
}
