use anyhow::{Context, Result};
use biomatrix_core::ParallelOptions;
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod commands;
mod config;
mod error;

use config::Config;
use error::{print_error_and_exit, CliError};

#[derive(Parser)]
#[command(name = "biomatrix")]
#[command(about = "biomatrix - keyed matrix stores for biological data")]
#[command(version)]
#[command(long_about = "
biomatrix reads, converts, indexes and merges keyed two-dimensional matrices
such as genotype calls (unordered symbol pairs) and numeric measurements.

Examples:
  biomatrix info calls.txt
  biomatrix convert calls.txt --to sparse --out calls.sparse
  biomatrix index calls.txt
  biomatrix merge-shards shards/ --pattern 'part\\d+\\.txt$' --out merged.txt --remap a:A
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of threads to use
    #[arg(short, long, global = true)]
    pub threads: Option<usize>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read a matrix in any recognised format and write it in another
    Convert {
        /// Input matrix file
        input: PathBuf,

        /// Output file
        #[arg(short, long, required = true)]
        out: PathBuf,

        /// Output format (defaults to [io] output_format)
        #[arg(long)]
        to: Option<OutputFormat>,

        /// Cell value codec (defaults to [io] codec)
        #[arg(long)]
        codec: Option<CodecType>,
    },

    /// Merge column shards of a packed matrix into one file
    MergeShards {
        /// Directory holding the shard files
        dir: PathBuf,

        /// Output packed file
        #[arg(short, long, required = true)]
        out: PathBuf,

        /// Regular expression selecting shard file names
        #[arg(long)]
        pattern: Option<String>,

        /// Bytes per encoded cell
        #[arg(long)]
        bytes_per_value: Option<usize>,

        /// Byte substitutions applied to cells, as FROM:TO (repeatable)
        #[arg(long)]
        remap: Vec<String>,

        /// Print the merge summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write the row side index of a packed file
    Index {
        /// Packed matrix file
        input: PathBuf,

        /// Cell value codec (defaults to [io] codec)
        #[arg(long)]
        codec: Option<CodecType>,
    },

    /// Show dimensions and missing-value statistics
    Info {
        /// Input matrix file
        input: PathBuf,

        /// Cell value codec (defaults to [io] codec)
        #[arg(long)]
        codec: Option<CodecType>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecType {
    /// Unordered symbol pairs, `??` missing
    Pair,
    /// Fixed-width floating point text, `NaN` missing
    Float,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Packed,
    Sparse,
    Tab,
}

fn setup_logging(verbose: u8, quiet: bool) -> Result<()> {
    let level = if quiet {
        log::LevelFilter::Error
    } else {
        match verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };

    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp_secs()
        .try_init()
        .context("Failed to initialise logging")?;

    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    setup_logging(cli.verbose, cli.quiet)?;

    // Load configuration
    let config = Config::load(cli.config.as_deref())?;

    let threads = cli.threads.unwrap_or(config.general.threads);
    if threads == 0 {
        return Err(CliError::validation("--threads must be at least 1").into());
    }
    if cli.threads.is_some() {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to set thread count")?;
    }
    let options = ParallelOptions::new(threads);

    match cli.command {
        Commands::Convert { input, out, to, codec } => {
            commands::convert::execute(&config, &options, input, out, to, codec)?;
        }

        Commands::MergeShards {
            dir,
            out,
            pattern,
            bytes_per_value,
            remap,
            json,
        } => {
            commands::merge_shards::execute(&config, dir, out, pattern, bytes_per_value, remap, json)?;
        }

        Commands::Index { input, codec } => {
            commands::index::execute(&config, input, codec)?;
        }

        Commands::Info { input, codec, json } => {
            commands::info::execute(&config, &options, input, codec, json)?;
        }
    }

    Ok(())
}

fn main() {
    if let Err(err) = run(Cli::parse()) {
        match err.downcast_ref::<CliError>() {
            Some(cli_error) => print_error_and_exit(cli_error),
            None => {
                eprintln!("Error: {:#}", err);
                std::process::exit(1);
            }
        }
    }
}
