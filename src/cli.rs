//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Follow ongoing series and record new episode links as they appear.
#[derive(Parser, Debug)]
#[command(name = "episode-tracker")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (defaults to ~/.config/episode-tracker/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Egress proxy URL (overrides TRACKER_PROXY_URL)
    #[arg(long, global = true)]
    pub proxy: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Sweep now, then keep sweeping on the configured interval until Ctrl-C
    Run,

    /// Run a single sweep and print the report
    Sweep,

    /// Resolve one episode page to its best playable link
    Resolve {
        /// Episode page URL
        url: String,
    },

    /// Register a series page and start tracking a season
    Add {
        /// Series page URL
        url: String,

        /// Season to track
        #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        season: u32,

        /// First episode to look for
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        start: u32,

        /// Episode at which tracking completes (defaults to --start)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        end: Option<u32>,

        /// Release kind stored with the series (e.g. TV, Movie)
        #[arg(long)]
        kind: Option<String>,

        /// Do not sweep after registering
        #[arg(long)]
        no_sweep: bool,
    },

    /// Remove a series and its tracking entries
    Remove {
        /// Library id of the series
        id: String,
    },

    /// List the library and tracking queue
    List,

    /// Show or replace the trending list
    Trending {
        /// Entries as ID=RANK; ranks of 0 or less are dropped
        #[arg(value_parser = parse_rank)]
        ranks: Vec<(String, i64)>,
    },
}

fn parse_rank(raw: &str) -> Result<(String, i64), String> {
    let (id, rank) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ID=RANK, got '{raw}'"))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(format!("missing id in '{raw}'"));
    }
    let rank = rank
        .trim()
        .parse::<i64>()
        .map_err(|_| format!("rank in '{raw}' is not an integer"))?;
    Ok((id.to_string(), rank))
}
