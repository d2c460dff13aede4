//! Command-line interface.
//!
//! Argument definitions plus the dispatch that maps each subcommand
//! onto a [`Mind`] operation. Results print as JSON on stdout so the
//! binary composes with `jq` and friends.

use crate::config::Config;
use crate::crawl::CrawlPolicy;
use crate::mind::Mind;
use crate::models::{MemoryId, RememberOptions, Rememberable};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use url::Url;

/// Memoria, a personal memory engine.
#[derive(Parser)]
#[command(name = "memoria")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a configuration file.
    #[arg(short, long, global = true, env = "MEMORIA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Memory space to operate in.
    #[arg(long, global = true, default_value = "home", env = "MEMORIA_SPACE")]
    pub space: String,

    /// Mind within the space.
    #[arg(long, global = true, default_value = "main", env = "MEMORIA_MIND")]
    pub mind: String,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Remember one or more locations.
    Remember {
        /// URLs to fetch and remember (http, https or file).
        #[arg(required = true)]
        urls: Vec<Url>,

        /// Traversal policy for linked resources.
        #[arg(long, default_value = "single")]
        crawl: CrawlPolicy,

        /// Depth limit for the `depth` policy.
        #[arg(long, default_value = "0")]
        depth: u32,
    },

    /// Remember a plain-text note.
    Note {
        /// The note text.
        text: String,

        /// Display name for the note.
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Forget everything remembered from a location.
    Forget {
        /// The location to forget.
        url: Url,
    },

    /// Full-text search over remembered content.
    Search {
        /// The search query.
        query: String,
    },

    /// Recall one memory by its id.
    Recall {
        /// The memory id (a URL or a `cid:` URI).
        id: String,

        /// Include raw attachment payloads.
        #[arg(long)]
        attachments: bool,
    },

    /// List remembered memories, newest first.
    All {
        /// Maximum number of results.
        #[arg(short, long)]
        limit: Option<usize>,

        /// Number of results to skip.
        #[arg(long, default_value = "0")]
        skip: usize,

        /// Field to sort by.
        #[arg(long)]
        sort: Option<String>,
    },

    /// Rebuild the index by replaying the command log.
    Rebuild,
}

/// Initializes the tracing subscriber.
///
/// `RUST_LOG` wins when set; `--verbose` lowers the default level to
/// debug for this crate.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "memoria=debug" } else { "memoria=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Runs the selected command against the configured scope.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::load_default(),
    };
    let mind = Mind::open(&config, &cli.space, &cli.mind)?;

    match cli.command {
        Commands::Remember { urls, crawl, depth } => {
            let options = RememberOptions { crawl, depth };
            let rememberable = if let [url] = urls.as_slice() {
                Rememberable::uri_list(std::slice::from_ref(url)).with_url(url.clone())
            } else {
                Rememberable::uri_list(&urls)
            };
            let committed = mind.remember(rememberable, Some(options)).await?;
            mind.save().await?;
            print_json(&committed)?;
        }
        Commands::Note { text, name } => {
            let mut rememberable = Rememberable::note(&text);
            if let Some(name) = name {
                rememberable = rememberable.with_name(name);
            }
            let committed = mind.remember(rememberable, None).await?;
            mind.save().await?;
            print_json(&committed)?;
        }
        Commands::Forget { url } => {
            mind.forget(&url).await?;
            eprintln!("forgot {url}");
        }
        Commands::Search { query } => {
            let hits = mind.search(&query)?;
            print_json(&hits)?;
        }
        Commands::Recall { id, attachments } => {
            let memory = mind.recall(&MemoryId::from(id.as_str()), attachments)?;
            print_json(&memory)?;
        }
        Commands::All { limit, skip, sort } => {
            let memories = mind.all(limit, skip, sort.as_deref())?;
            print_json(&memories)?;
        }
        Commands::Rebuild => {
            mind.rebuild().await?;
            eprintln!("index rebuilt");
        }
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn remember_parses_policy_and_depth() {
        let cli = Cli::parse_from([
            "memoria",
            "remember",
            "https://example.com/",
            "--crawl",
            "children",
            "--depth",
            "2",
        ]);
        match cli.command {
            Commands::Remember { urls, crawl, depth } => {
                assert_eq!(urls.len(), 1);
                assert_eq!(crawl, CrawlPolicy::Children);
                assert_eq!(depth, 2);
            }
            _ => panic!("expected remember"),
        }
    }

    #[test]
    fn scope_defaults_apply() {
        let cli = Cli::parse_from(["memoria", "search", "anything"]);
        assert_eq!(cli.space, "home");
        assert_eq!(cli.mind, "main");
    }
}
