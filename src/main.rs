//! weft - CLI

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use weft::runtime::StatsSnapshot;
use weft::util::logger::{self, LogLevel};
use weft::{Matrix, Runtime, RuntimeConfig, SplitThresholds, NAME, VERSION};

/// Run the parallel kernels of the weft task runtime from the command line
#[derive(Parser, Debug)]
#[command(name = "weft")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Number of worker threads (overrides WEFT_NUM_THREADS)
    #[arg(short, long, global = true)]
    threads: Option<usize>,

    /// JSON runtime configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute n! with recursive range splitting
    Factorial {
        #[arg(value_name = "N")]
        n: u64,

        /// Use the nested-task chain instead of range splitting
        #[arg(long)]
        chain: bool,
    },

    /// Sum integers in parallel
    Sum {
        #[arg(value_name = "X", allow_negative_numbers = true)]
        values: Vec<i64>,
    },

    /// Sort integers in parallel
    Sort {
        #[arg(value_name = "X", allow_negative_numbers = true)]
        values: Vec<i64>,
    },

    /// Multiply two integer matrices, rows separated by ';' and cells by ','
    Matmul {
        /// Left operand, e.g. "1,2;3,4"
        #[arg(long)]
        a: String,

        /// Right operand, e.g. "5;6"
        #[arg(long)]
        b: String,
    },

    /// Run r[i] = scalar * a[i] + b[i] * c[i] over a = b = c = 0..len
    Axpy {
        #[arg(long, default_value_t = 1_000_000)]
        len: usize,

        #[arg(long, default_value_t = 2.0)]
        scalar: f64,
    },

    /// Print the runtime configuration and scheduler counters
    Info {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct Info<'a> {
    name: &'static str,
    version: &'static str,
    config: &'a RuntimeConfig,
    stats: StatsSnapshot,
}

fn parse_matrix(text: &str) -> Result<Matrix> {
    text.split(';')
        .filter(|row| !row.trim().is_empty())
        .map(|row| {
            row.split(',')
                .map(|cell| {
                    cell.trim()
                        .parse::<i64>()
                        .with_context(|| format!("invalid matrix cell: {:?}", cell))
                })
                .collect()
        })
        .collect()
}

fn load_config(args: &Args) -> Result<RuntimeConfig> {
    let config = match &args.config {
        Some(path) => RuntimeConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => RuntimeConfig::from_env(),
    };
    Ok(match args.threads {
        Some(n) => config.with_workers(n),
        None => config,
    })
}

fn thresholds_line(t: &SplitThresholds) -> String {
    format!(
        "factorial={} matrix_cells={} reduce_grain={} sort_grain={} elementwise_grain={}",
        t.factorial, t.matrix_cells, t.reduce_grain, t.sort_grain, t.elementwise_grain
    )
}

fn run(
    runtime: &Runtime,
    command: Commands,
) -> Result<()> {
    match command {
        Commands::Factorial { n, chain } => {
            let value = if chain {
                weft::parallel::factorial_chain(runtime, n)
            } else {
                weft::parallel::factorial(runtime, n)
            }
            .with_context(|| format!("Failed to compute {}!", n))?;
            println!("{}", value);
        },
        Commands::Sum { values } => {
            let sum = weft::parallel::reduce_sum(runtime, &values).context("Failed to sum")?;
            println!("{}", sum);
        },
        Commands::Sort { values } => {
            let sorted = weft::parallel::sort(runtime, &values).context("Failed to sort")?;
            let line: Vec<String> = sorted.iter().map(i64::to_string).collect();
            println!("{}", line.join(" "));
        },
        Commands::Matmul { a, b } => {
            let a = parse_matrix(&a).context("Failed to parse --a")?;
            let b = parse_matrix(&b).context("Failed to parse --b")?;
            let product = weft::parallel::matrix_multiply(runtime, &a, &b)
                .context("Failed to multiply matrices")?;
            for row in product {
                let cells: Vec<String> = row.iter().map(i64::to_string).collect();
                println!("{}", cells.join(" "));
            }
        },
        Commands::Axpy { len, scalar } => {
            let input: Vec<f64> = (0..len).map(|i| i as f64).collect();
            let mut out = vec![0.0; len];
            weft::parallel::elementwise_f64(runtime, &mut out, &input, &input, &input, scalar)
                .context("Failed to run element-wise kernel")?;
            let checksum: f64 = out.iter().sum();
            println!("len={} checksum={}", len, checksum);
        },
        Commands::Info { json } => {
            let config = runtime.config();
            if json {
                let info = Info {
                    name: NAME,
                    version: VERSION,
                    config,
                    stats: runtime.stats(),
                };
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("{} {}", NAME, VERSION);
                println!("workers: {}", runtime.num_workers());
                println!("steal_batch: {}", config.steal_batch);
                println!("startup_timeout: {:?}", config.startup_timeout);
                println!("thresholds: {}", thresholds_line(&config.thresholds));
            }
        },
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    logger::init_with_level(if args.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Warn
    });

    let config = load_config(&args)?;
    if config.num_workers == 0 {
        bail!("--threads must be at least 1");
    }
    if args.verbose {
        eprintln!("weft version: {}", VERSION);
        eprintln!("Host: {}", std::env::consts::OS);
    }

    let runtime = weft::start_with_config(config).context("Failed to start runtime")?;
    let outcome = run(&runtime, args.command);
    weft::stop();
    outcome
}
