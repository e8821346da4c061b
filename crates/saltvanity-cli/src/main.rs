//! SaltVanity CLI
//!
//! CREATE2 vanity salt finder.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use saltvanity_core::{
    calculate_difficulty, create2_address, eip55_checksum, format_difficulty, init_code_hash,
    parse_address, parse_b256, parse_hex, BatchScanner, PoolOutcome, SaltInput, SearchConfig,
    SearchCoordinator, SearchId, SearchRequest, SearchStatus, SuffixPattern, UsedSalts,
    WorkerPool, B256, U256,
};

/// How often the live status line refreshes.
const STATUS_REFRESH: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "saltvanity")]
#[command(author = "SaltVanity Team")]
#[command(version = "0.1.0")]
#[command(about = "CREATE2 vanity salt finder", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for a salt whose CREATE2 address ends with a hex suffix
    Search {
        /// Hex suffix the address must end with (case-insensitive)
        #[arg(short, long)]
        suffix: String,

        /// Deploying contract (factory) address
        #[arg(short, long)]
        deployer: String,

        /// Keccak-256 hash of the init code
        #[arg(long, conflicts_with = "init_code", required_unless_present = "init_code")]
        bytecode_hash: Option<String>,

        /// Raw init code, hashed before searching
        #[arg(long)]
        init_code: Option<String>,

        /// First salt to try (decimal or 0x hex)
        #[arg(long, default_value = "0")]
        start_salt: String,

        /// Salts per worker batch
        #[arg(long, default_value = "1000000")]
        batch_size: u64,

        /// Maximum batches to dispatch (0 = unlimited)
        #[arg(long)]
        max_batches: Option<u64>,

        /// Number of workers (0 = auto)
        #[arg(long)]
        workers: Option<usize>,

        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Directory holding used salts and results
        #[arg(long)]
        store: Option<PathBuf>,

        /// JSON config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the stored result of a finished search
    Status {
        /// Search id printed by `search`
        #[arg(long)]
        id: String,

        /// Directory holding used salts and results
        #[arg(long)]
        store: Option<PathBuf>,

        /// JSON config file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Compute the CREATE2 address for one salt
    Derive {
        /// Deploying contract (factory) address
        #[arg(short, long)]
        deployer: String,

        /// Keccak-256 hash of the init code
        #[arg(long)]
        bytecode_hash: String,

        /// Salt (decimal or 0x hex)
        #[arg(long)]
        salt: String,
    },

    /// Run benchmark
    Benchmark {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,

        /// Number of workers (0 = auto)
        #[arg(long, default_value = "0")]
        workers: usize,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Search {
            suffix,
            deployer,
            bytecode_hash,
            init_code,
            start_salt,
            batch_size,
            max_batches,
            workers,
            timeout,
            store,
            config,
            json,
        } => {
            let mut config = load_config(config, store)?;
            if let Some(max_batches) = max_batches {
                config.max_batches = max_batches;
            }
            if let Some(workers) = workers {
                config.workers = workers;
            }
            if let Some(secs) = timeout {
                config.timeout_ms = secs.saturating_mul(1000);
            }

            let hash = match (bytecode_hash, init_code) {
                (Some(hash), _) => parse_b256(&hash)?,
                (None, Some(code)) => init_code_hash(&parse_hex("init code", &code)?),
                (None, None) => bail!("one of --bytecode-hash or --init-code is required"),
            };
            let request = SearchRequest::new(SuffixPattern::new(&suffix)?, parse_address(&deployer)?, hash)
                .with_start_salt(parse_salt(&start_salt)?)
                .with_batch_size(batch_size);

            cmd_search(config, request, json)?;
        }
        Commands::Status { id, store, config } => {
            cmd_status(load_config(config, store)?, &id)?;
        }
        Commands::Derive {
            deployer,
            bytecode_hash,
            salt,
        } => {
            cmd_derive(&deployer, &bytecode_hash, &salt)?;
        }
        Commands::Benchmark { duration, workers } => {
            cmd_benchmark(duration, workers)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>, store: Option<PathBuf>) -> Result<SearchConfig> {
    let mut config = match path {
        Some(path) => SearchConfig::load(path)?,
        None => SearchConfig::default(),
    };
    if let Some(store) = store {
        config.store_dir = store;
    }
    Ok(config)
}

fn parse_salt(input: &str) -> Result<U256> {
    Ok(SaltInput::Text(input.to_string()).to_salt()?)
}

fn cmd_search(config: SearchConfig, request: SearchRequest, json_output: bool) -> Result<()> {
    let difficulty = calculate_difficulty(request.target_suffix.len());
    let coordinator = SearchCoordinator::open(config)?;

    if !json_output {
        eprintln!("SaltVanity v0.1.0");
        eprintln!("Deployer:      {}", request.deployer_address);
        eprintln!("Bytecode hash: {}", request.bytecode_hash);
        eprintln!("Suffix:        {}", request.target_suffix);
        eprintln!("Start salt:    {}", request.start_salt);
        eprintln!("Difficulty:    {}", format_difficulty(difficulty));
    }

    let submitted = coordinator.submit(request)?;

    if !json_output {
        eprintln!("Workers:       {}", submitted.num_workers);
        eprintln!("Search id:     {}", submitted.search_id);
        eprintln!();
    }

    let status = loop {
        let status = coordinator.wait(&submitted.search_id, STATUS_REFRESH)?;
        if status.is_terminal() {
            break status;
        }
        if !json_output {
            if let Some(stats) = coordinator.stats(&submitted.search_id) {
                eprint!("\r{}", stats.format(difficulty));
                let _ = std::io::stderr().flush();
            }
        }
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        eprintln!();
        print_status(&status);
    }

    Ok(())
}

fn cmd_status(config: SearchConfig, id: &str) -> Result<()> {
    let coordinator = SearchCoordinator::open(config)?;
    let status = coordinator.poll(&SearchId::from(id))?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

fn cmd_derive(deployer: &str, bytecode_hash: &str, salt: &str) -> Result<()> {
    let deployer = parse_address(deployer)?;
    let hash: B256 = parse_b256(bytecode_hash)?;
    let salt = parse_salt(salt)?;

    let address = create2_address(&deployer, &salt, &hash);
    println!("{}", eip55_checksum(address.as_slice()));
    Ok(())
}

fn cmd_benchmark(duration_secs: u64, workers: usize) -> Result<()> {
    let config = SearchConfig {
        workers,
        max_batches: 0,
        timeout_ms: duration_secs.saturating_mul(1000),
        ..Default::default()
    };

    eprintln!("Benchmarking CREATE2 derivation for {} seconds...", duration_secs);
    eprintln!("Workers: {}", config.worker_count());
    eprintln!();

    // Use an impossible suffix to run until timeout
    let request = SearchRequest::new(
        SuffixPattern::new(&"f".repeat(40))?,
        parse_address("0x0000000000000000000000000000000000000000")?,
        B256::ZERO,
    );
    let used = Arc::new(UsedSalts::new());
    let scanner = BatchScanner::new(&request, used.clone(), config.progress_interval());
    let pool = WorkerPool::new(Arc::new(scanner), used, &config)?;

    let outcome = pool.run(request.start_salt, request.batch_size);
    let stats = pool.stats();
    if let PoolOutcome::Errored { message, .. } = outcome {
        bail!("benchmark failed: {}", message);
    }

    eprintln!("Benchmark complete!");
    println!("Salts checked: {}", stats.total_salts());
    println!("Time:          {:.2}s", stats.elapsed().as_secs_f64());
    println!("Speed:         {:.2} Msalt/s", stats.salts_per_second() / 1_000_000.0);
    Ok(())
}

fn print_status(status: &SearchStatus) {
    println!();
    match status {
        SearchStatus::Completed {
            success: true,
            salt: Some(salt),
            address: Some(address),
            ..
        } => {
            println!("MATCH FOUND!");
            println!("{:-<60}", "");
            println!("Search id: {}", status.search_id());
            println!("Salt:      {}", salt);
            println!("Salt hex:  {}", B256::from(*salt));
            println!("Address:   {}", eip55_checksum(address.as_slice()));
            println!("{:-<60}", "");
        }
        SearchStatus::Completed { message, .. } => {
            println!("No match found: {}", message.as_deref().unwrap_or("search space exhausted"));
        }
        SearchStatus::Timeout { message, .. } | SearchStatus::Error { message, .. } => {
            println!("Search {} ended: {}", status.search_id(), message);
        }
        SearchStatus::Searching { .. } => {
            println!("Search {} is still running", status.search_id());
        }
    }
}
