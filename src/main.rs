//! # brain CLI
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `brain init` | Create the SQLite database and run schema migrations |
//! | `brain source add <brain> <type> <url>` | Register a url, sitemap or feed source |
//! | `brain source list <brain>` | List a brain's sources |
//! | `brain ingest <brain> <source>` | Run one ingestion job |
//! | `brain facts <brain>` | Show a brain's facts |
//! | `brain job <id>` | Show a job's status and logs |
//! | `brain crawl <url>` | Discover same-host URLs by following links |
//! | `brain sitemap <url>` | Resolve a sitemap (and nested indexes) |
//! | `brain serve` | Start the HTTP server |
//!
//! Process logs go to stderr and are filtered with `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use brain_ingest::progress::ProgressMode;
use brain_ingest::{config, discover, get, ingest, migrate, server, sitemap, sources};

const DEFAULT_CONFIG: &str = "./config/brain.toml";

/// brain: ingest web sources into a knowledge brain's fact set.
#[derive(Parser)]
#[command(name = "brain", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/brain.toml`. A missing file at the default path
    /// means built-in defaults.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Manage knowledge sources.
    Source {
        #[command(subcommand)]
        action: SourceAction,
    },

    /// Run one ingestion job for a source.
    Ingest {
        brain_id: String,
        source_id: String,
        /// Progress on stderr: `human`, `json` or `off`. Defaults to human on a TTY.
        #[arg(long)]
        progress: Option<String>,
    },

    /// List the facts stored for a brain.
    Facts {
        brain_id: String,
        #[arg(long)]
        json: bool,
    },

    /// Show an ingestion job.
    Job {
        job_id: String,
        #[arg(long)]
        json: bool,
    },

    /// Discover same-host URLs breadth-first from a page.
    Crawl {
        url: String,
        /// Link depth to follow from the base page.
        #[arg(long, default_value_t = 2)]
        depth: usize,
    },

    /// Resolve a sitemap URL to its page entries.
    Sitemap { url: String },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum SourceAction {
    /// Register a source and print its id.
    Add {
        brain_id: String,
        /// `url`, `sitemap` or `feed`.
        #[arg(value_name = "TYPE")]
        source_type: String,
        url: String,
        /// Keep only URLs containing this substring (repeatable).
        #[arg(long)]
        include: Vec<String>,
        /// Drop URLs containing this substring (repeatable).
        #[arg(long)]
        exclude: Vec<String>,
        #[arg(long)]
        max_pages: Option<usize>,
    },
    /// List a brain's sources.
    List { brain_id: String },
}

fn parse_progress(value: Option<&str>) -> anyhow::Result<ProgressMode> {
    match value {
        None => Ok(ProgressMode::default_for_tty()),
        Some("human") => Ok(ProgressMode::Human),
        Some("json") => Ok(ProgressMode::Json),
        Some("off") => Ok(ProgressMode::Off),
        Some(other) => anyhow::bail!("invalid --progress '{}': use human, json or off", other),
    }
}

fn load_config(path: &Path) -> anyhow::Result<config::Config> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG) {
        return Ok(config::Config::default());
    }
    config::load_config(path)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Source { action } => match action {
            SourceAction::Add {
                brain_id,
                source_type,
                url,
                include,
                exclude,
                max_pages,
            } => {
                sources::run_source_add(
                    &cfg,
                    &brain_id,
                    &source_type,
                    &url,
                    include,
                    exclude,
                    max_pages,
                )
                .await?;
            }
            SourceAction::List { brain_id } => {
                sources::run_source_list(&cfg, &brain_id).await?;
            }
        },
        Commands::Ingest {
            brain_id,
            source_id,
            progress,
        } => {
            let mode = parse_progress(progress.as_deref())?;
            ingest::run_ingest(&cfg, &brain_id, &source_id, mode).await?;
        }
        Commands::Facts { brain_id, json } => {
            get::run_list_facts(&cfg, &brain_id, json).await?;
        }
        Commands::Job { job_id, json } => {
            get::run_get_job(&cfg, &job_id, json).await?;
        }
        Commands::Crawl { url, depth } => {
            discover::run_crawl(&cfg, &url, depth).await?;
        }
        Commands::Sitemap { url } => {
            sitemap::run_sitemap(&cfg, &url).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
