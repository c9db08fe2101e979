//! CLI command definitions and dispatch.
//!
//! Each group of subcommands lives in its own submodule:
//! - `resolve`: Stream resolution and provider search
//! - `library`: Catalog listing, playlist import, favorites, recommendations
//! - `downloads`: Background downloads and the task table

mod downloads;
mod library;
mod resolve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::runtime::Runtime;

use crate::config::Config;
use crate::extraction::StreamQuality;
use crate::model::ProviderKind;

pub use downloads::{cmd_download, cmd_downloads};
pub use library::{cmd_favorite, cmd_import, cmd_list, cmd_similar};
pub use resolve::{cmd_resolve, cmd_search};

/// Quezic CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: platform config dir / quezic / config.toml)
    #[arg(long, global = true, env = "QUEZIC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a provider track id to a stream URL
    Resolve {
        /// Provider: youtube (yt) or soundcloud (sc)
        kind: ProviderKind,
        /// Provider-native id or URL
        id: String,
        /// Stream quality: low, medium, high, best
        #[arg(short, long, default_value = "high")]
        quality: StreamQuality,
        /// Resolve for downloading (progressive streams only)
        #[arg(long)]
        download: bool,
    },
    /// Search the providers
    Search {
        query: String,
        /// Results per provider
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
        /// Add the results to the catalog
        #[arg(long)]
        add: bool,
    },
    /// List catalog tracks, newest first
    List {
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
    /// Match a shared playlist or a JSON export against the catalog
    Import {
        /// Spotify or SoundCloud playlist URL, or a JSON file with an
        /// array of {title, artist, album?, duration_ms?}
        source: String,
    },
    /// Download a catalog track and wait for it
    Download {
        /// Catalog track id
        track_id: String,
    },
    /// Show the download task table
    Downloads {
        /// Resume interrupted and retrying tasks, and wait for them
        #[arg(long)]
        resume: bool,
    },
    /// Recommend tracks by artists similar to ARTIST
    Similar { artist: String },
    /// Print the effective configuration
    Config {
        /// Write it to the config file (creating the file if missing)
        #[arg(long)]
        save: bool,
    },
    /// Mark a catalog track as favorite
    Favorite {
        track_id: String,
        /// Remove the mark instead
        #[arg(long)]
        off: bool,
    },
}

/// Print the configuration as TOML, optionally writing it out
fn cmd_config(config: &Config, path: Option<&std::path::Path>, save: bool) -> anyhow::Result<()> {
    println!("{}", toml::to_string_pretty(config)?);
    if save {
        match path {
            Some(path) => crate::config::save_to(config, path)?,
            None => crate::config::save(config)?,
        }
        eprintln!("Saved");
    }
    Ok(())
}

/// Run the specified CLI command.
pub fn run_command(cli: &Cli, config: Config) -> anyhow::Result<()> {
    let rt = Runtime::new()?;

    match &cli.command {
        Commands::Resolve {
            kind,
            id,
            quality,
            download,
        } => cmd_resolve(&rt, config, *kind, id, *quality, *download),
        Commands::Search { query, limit, add } => cmd_search(&rt, config, query, *limit, *add),
        Commands::List { limit } => cmd_list(&rt, config, *limit),
        Commands::Import { source } => cmd_import(&rt, config, source),
        Commands::Download { track_id } => cmd_download(&rt, config, track_id),
        Commands::Downloads { resume } => cmd_downloads(&rt, config, *resume),
        Commands::Similar { artist } => cmd_similar(&rt, config, artist),
        Commands::Favorite { track_id, off } => cmd_favorite(&rt, config, track_id, !*off),
        Commands::Config { save } => cmd_config(&config, cli.config.as_deref(), *save),
    }
}
