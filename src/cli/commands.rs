
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// imhelper - client bridge to the input method helper daemon
#[derive(Parser, Debug)]
#[command(name = "imhelper")]
#[command(about = "Connects input sessions to the input method helper daemon")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct CliArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Override the helper daemon socket path
    #[arg(long, global = true)]
    pub socket: Option<PathBuf>,

    /// Use this configuration file instead of ~/.imhelper/config.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the bridge with in-memory sessions until interrupted
    Watch {
        /// Number of sessions to register; the first one is focused
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
        sessions: u64,

        /// Input method the sessions start with
        #[arg(long)]
        input_method: Option<String>,
    },

    /// Send one raw message to the helper daemon
    Send {
        /// Command keyword, e.g. im_change_whole_desktop
        command: String,

        /// Argument lines
        args: Vec<String>,
    },

    /// Print the input method list as it would be sent to the daemon
    ImList {
        /// Mark this input method as selected
        #[arg(long)]
        selected: Option<String>,
    },

    /// Configuration file management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show {
        /// Print as JSON instead of TOML
        #[arg(long)]
        json: bool,
    },
    /// Print the configuration file path
    Path,
}

/// CLI command execution result
#[derive(Debug, PartialEq, Eq)]
pub enum CliResult {
    Success(String),
    Error(String),
}

impl std::fmt::Display for CliResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliResult::Success(msg) => write!(f, "{msg}"),
            CliResult::Error(msg) => write!(f, "Error: {msg}"),
        }
    }
}
