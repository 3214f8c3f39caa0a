//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Build a validated media dataset from paginated listing pages.
///
/// Crawls listing pages for each keyword, resolves candidate links to direct
/// media URLs, downloads them with retry and size validation, and records
/// every success in a CSV annotation catalog.
#[derive(Parser, Debug)]
#[command(name = "harvester")]
#[command(author, version, about)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Subcommand; `fetch` is implied when omitted.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Acquisition arguments for the implied `fetch` command.
    #[command(flatten)]
    pub fetch: FetchArgs,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Crawl, download and catalog assets (default).
    Fetch(FetchArgs),
    /// Print the paths of an existing catalog or directory.
    Replay(ReplayArgs),
}

/// Arguments of an acquisition run. Unset values fall back to the config
/// file, then to built-in defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct FetchArgs {
    /// Directory that receives the downloaded files
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// CSV catalog path (default: <output-dir>/annotations.csv)
    #[arg(short = 'a', long)]
    pub annotation_file: Option<PathBuf>,

    /// Number of assets to acquire (50-1000)
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u16).range(50..=1000))]
    pub count: Option<u16>,

    /// Search keywords; one listing is crawled per keyword
    #[arg(short = 'k', long, num_args = 1..)]
    pub keywords: Vec<String>,

    /// Listing URL template, `{query}` is replaced by the encoded keyword
    #[arg(long)]
    pub listing_url: Option<String>,

    /// Concurrent downloads (1-8)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=8))]
    pub concurrency: Option<u8>,

    /// Attempts per asset, including the first (1-10)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub max_attempts: Option<u8>,

    /// Minimum delay between requests to one host in milliseconds (0 to disable, max 60000)
    #[arg(short = 'l', long, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub delay_ms: Option<u64>,

    /// Files smaller than this many bytes are rejected
    #[arg(long)]
    pub min_bytes: Option<u64>,

    /// Listing pages crawled per keyword
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_pages: Option<u32>,

    /// Keep rows of an existing catalog instead of replacing it
    #[arg(long)]
    pub merge: bool,

    /// Honour robots.txt for listing pages and assets
    #[arg(long)]
    pub check_robots: bool,

    /// Config file (default: $XDG_CONFIG_HOME/harvester/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments of `replay`.
#[derive(Args, Debug, Clone)]
#[command(group(clap::ArgGroup::new("source").required(true).args(["annotation_file", "dir"])))]
pub struct ReplayArgs {
    /// Catalog to replay
    #[arg(short = 'a', long)]
    pub annotation_file: Option<PathBuf>,

    /// Directory to replay instead of a catalog
    #[arg(short = 'd', long)]
    pub dir: Option<PathBuf>,

    /// Extensions to include when replaying a directory
    #[arg(short = 'e', long = "ext", num_args = 1.., requires = "dir")]
    pub extensions: Vec<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
