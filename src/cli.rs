use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "almanac")]
#[command(about = "Natural-language calendar assistant", long_about = None)]
pub struct Cli {
    /// TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// .env file to load before reading the environment
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask one question, e.g. "schedule gym tomorrow at 7am"
    Query {
        text: Vec<String>,

        /// Send the question to the running daemon
        #[arg(long)]
        remote: bool,
    },

    /// Answer several questions in order
    Batch {
        #[arg(required = true)]
        questions: Vec<String>,
    },

    /// Search events by keyword
    Search {
        keyword: String,

        #[arg(long, default_value_t = 30)]
        days: i64,
    },

    /// Event counts and the next event
    Stats,

    /// Today's and upcoming events from the running daemon
    Overview,

    /// Start the background daemon
    Daemon,

    /// Stop the background daemon
    Stop,

    /// Check daemon status
    Status,
}
