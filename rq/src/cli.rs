//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// rentquery - broadcast availability aggregation for rental providers
#[derive(Debug, Parser)]
#[command(
    name = "rq",
    about = "Broadcast an availability query to rental providers and rank the replies",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the coordinator: one collection round over the TCP bus
    Collect {
        /// Number of provider replies to wait for
        #[arg(short, long)]
        expected: Option<usize>,

        /// Per-reply wait budget in milliseconds
        #[arg(short, long)]
        timeout_ms: Option<u64>,

        /// Grace period before broadcasting, in milliseconds
        #[arg(long)]
        settle_ms: Option<u64>,
    },

    /// Run a provider: serve availability queries until interrupted
    Provide {
        /// Provider identity advertised in replies
        #[arg(short, long)]
        name: Option<String>,

        /// Contact endpoint advertised in replies
        #[arg(long)]
        contact_uri: Option<String>,

        /// Answer a single query cycle, then exit
        #[arg(long)]
        once: bool,
    },

    /// Run coordinator and two sample providers in one process
    Demo,
}
