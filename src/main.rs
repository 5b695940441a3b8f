//! # Bench Curator CLI (`curate`)
//!
//! ## Usage
//!
//! ```bash
//! curate --config ./config/curator.toml <command>
//! curate --dataset ./dataset.csv <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `curate view` | Print the rows passing a filter |
//! | `curate facets` | List the values of each categorical column |
//! | `curate edit <key> <value>` | Rewrite one row's question and save |
//! | `curate improve <key>` | Ask the improvement service for a better question |
//! | `curate serve` | Start the HTTP API for a front end |

use bench_curator::{config, edit_cmd, server, view};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Bench Curator CLI: filter, select, edit and improve rows of a RAG
/// benchmarking dataset.
#[derive(Parser)]
#[command(
    name = "curate",
    about = "Bench Curator: edit a RAG benchmarking dataset stored as CSV",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/curator.toml")]
    config: PathBuf,

    /// Use this CSV file with default settings instead of a config file.
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the rows passing a filter.
    View {
        /// Keep rows whose column equals value. Repeat to allow several
        /// values; pairs for different columns must all match.
        #[arg(long = "filter", value_parser = parse_key_val)]
        filters: Vec<(String, String)>,

        /// Case-insensitive substring of the keyword column.
        #[arg(long)]
        keyword: Option<String>,

        /// Columns to print (comma separated). Defaults to key, keyword and
        /// edit field.
        #[arg(long, value_delimiter = ',')]
        columns: Option<Vec<String>>,

        /// Maximum characters per cell.
        #[arg(long, default_value_t = 40)]
        width: usize,
    },

    /// List the distinct values of each categorical column.
    Facets,

    /// Set a field of one row, addressed by its key column, and save.
    Edit {
        /// Key column value (chunk id by default).
        key: String,

        /// New value.
        value: String,

        /// Field to set. Defaults to the configured edit field.
        #[arg(long)]
        field: Option<String>,
    },

    /// Ask the improvement service to rewrite one row's question.
    Improve {
        /// Key column value (chunk id by default).
        key: String,

        /// Write the suggestion to the dataset.
        #[arg(long)]
        apply: bool,
    },

    /// Start the HTTP API.
    Serve,
}

/// Parse a `key=value` pair for `--filter` arguments.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    let cfg = match &cli.dataset {
        Some(path) => config::Config::for_dataset(path),
        None => config::load_config(&cli.config)?,
    };

    match cli.command {
        Commands::View {
            filters,
            keyword,
            columns,
            width,
        } => {
            view::run_view(&cfg, &filters, keyword.as_deref(), columns, width)?;
        }
        Commands::Facets => {
            view::run_facets(&cfg)?;
        }
        Commands::Edit { key, value, field } => {
            edit_cmd::run_edit(&cfg, &key, field.as_deref(), &value)?;
        }
        Commands::Improve { key, apply } => {
            edit_cmd::run_improve(&cfg, &key, apply).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
