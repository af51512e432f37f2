//! EmberKV CLI
//!
//! Command-line access to a local WAL file.

use std::path::Path;

use clap::{Parser, Subcommand};
use emberkv::wal::WalRecovery;
use emberkv::{Config, Engine, Lookup};
use tracing_subscriber::{fmt, EnvFilter};

/// EmberKV CLI
#[derive(Parser, Debug)]
#[command(name = "emberkv-cli")]
#[command(about = "CLI for an EmberKV log file")]
#[command(version)]
struct Args {
    /// WAL file
    #[arg(short, long, default_value = "./emberkv.log")]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value
    Get { bucket: String, key: String },

    /// Set a value
    Set {
        bucket: String,
        key: String,
        value: String,
    },

    /// Delete a key
    Del { bucket: String, key: String },

    /// Compact the log
    Merge,

    /// Scan the log and report its health without changing it
    Verify,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_target(false).init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> emberkv::Result<()> {
    if let Commands::Verify = args.command {
        let result = WalRecovery::verify(Path::new(&args.log))?;
        println!("applied:     {}", result.records_applied);
        println!("skipped:     {}", result.records_skipped);
        println!("expired:     {}", result.records_expired);
        println!("committed:   {}", result.transactions_committed);
        println!("discarded:   {}", result.transactions_discarded);
        println!("valid bytes: {}/{}", result.valid_len, result.file_len);
        return Ok(());
    }

    let engine = Engine::start(Config::builder().log_path(&args.log).build())?;

    match args.command {
        Commands::Get { bucket, key } => match engine.get(&bucket, &key)? {
            Lookup::Value(value) => println!("{}", value),
            Lookup::Expired => println!("(expired)"),
        },
        Commands::Set { bucket, key, value } => {
            engine.set(&bucket, &key, &value)?;
            println!("OK");
        }
        Commands::Del { bucket, key } => {
            engine.delete(&bucket, &key)?;
            println!("OK");
        }
        Commands::Merge => {
            let stats = engine.merge()?;
            println!(
                "compacted: {} written, {} expired dropped",
                stats.records_written, stats.expired_skipped
            );
        }
        Commands::Verify => {}
    }

    engine.close()
}
