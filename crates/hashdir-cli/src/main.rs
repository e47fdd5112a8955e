//! hashdir - command-line front end for a content-addressed hash directory
//!
//! Subcommands:
//! - `hashdir put <input>...` - Store files (or `-` for stdin), print digests
//! - `hashdir path <digest>` - Print where an object lives
//! - `hashdir cat <digest>` - Write an object to stdout
//! - `hashdir has <digest>` - Exit 0 if stored, 1 if not
//! - `hashdir verify [digest]...` - Re-hash objects and report mismatches
//! - `hashdir ls` - List stored digests

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use hashdir::{DigestAlgorithm, ErrorKind, StoreConfig, StoreError};

mod commands;

/// Exit code for objects whose content no longer matches their digest.
pub const EXIT_VERIFY_FAILED: u8 = 7;

#[derive(Parser)]
#[command(name = "hashdir")]
#[command(about = "Content-addressed hash directory")]
#[command(version)]
struct Cli {
    /// Store root directory (must already exist)
    #[arg(long, global = true, env = "HASHDIR_ROOT")]
    root: Option<PathBuf>,

    /// TOML config file with a [hashdir] section
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Digest algorithm: sha1 or sha256
    #[arg(long, global = true)]
    algorithm: Option<DigestAlgorithm>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store files or stdin and print their digests
    Put {
        /// Files to store; `-` reads stdin
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Move named files into the store instead of copying them
        #[arg(long = "move")]
        move_source: bool,

        /// Print one JSON object per input
        #[arg(long)]
        json: bool,
    },

    /// Print the path of an object
    Path {
        digest: String,
    },

    /// Write an object's content to stdout
    Cat {
        digest: String,
    },

    /// Exit 0 if the object is stored, 1 otherwise
    Has {
        digest: String,
    },

    /// Re-hash objects (all of them if none are given) and report mismatches
    Verify {
        digests: Vec<String>,
    },

    /// List every stored digest
    Ls,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Config file (or environment), then command-line overrides.
fn resolve_config(cli: &Cli) -> Result<StoreConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = StoreConfig::from_file(path)?;
            config.apply_env()?;
            config
        }
        None => StoreConfig::from_env()?,
    };

    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    if let Some(algorithm) = cli.algorithm {
        config.algorithm = algorithm;
    }
    if let Commands::Put { move_source: true, .. } = cli.command {
        config.move_source = true;
    }
    Ok(config)
}

/// Distinct exit codes per store error kind.
fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    let code = match err.downcast_ref::<StoreError>().map(StoreError::kind) {
        Some(ErrorKind::InvalidRoot) => 3,
        Some(ErrorKind::InvalidDigest) => 4,
        Some(ErrorKind::NotFound) => 5,
        Some(ErrorKind::DigestCollision) => 6,
        Some(ErrorKind::Io) | None => 1,
    };
    ExitCode::from(code)
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = resolve_config(&cli)?;
    tracing::debug!(root = %config.root.display(), algorithm = %config.algorithm, "resolved config");

    match cli.command {
        Commands::Put { inputs, json, .. } => commands::put(config, &inputs, json),
        Commands::Path { digest } => commands::path(config, &digest),
        Commands::Cat { digest } => commands::cat(config, &digest),
        Commands::Has { digest } => commands::has(config, &digest),
        Commands::Verify { digests } => commands::verify(config, &digests),
        Commands::Ls => commands::ls(config),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("hashdir: {:#}", err);
            exit_code_for(&err)
        }
    }
}
