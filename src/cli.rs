//! Command-line interface for voxgate
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Speech-to-text and text-to-speech gateway
#[derive(Parser, Debug)]
#[command(name = "voxgate", version, about = "Speech-to-text and text-to-speech gateway")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose logging (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Default tracing filter for the chosen verbosity; `RUST_LOG` wins over it.
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            return "voxgate=warn,tower_http=warn";
        }
        match self.verbose {
            0 => "voxgate=info,tower_http=info",
            1 => "voxgate=debug,tower_http=debug",
            _ => "voxgate=trace,tower_http=trace",
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP/WebSocket server
    Serve {
        /// Address to bind (overrides config)
        #[arg(long, value_name = "HOST")]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(long, short = 'p', value_name = "PORT")]
        port: Option<u16>,
    },

    /// Manage model artifacts
    Models {
        /// Action to perform
        #[command(subcommand)]
        action: ModelsAction,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Model management actions
#[derive(Subcommand, Debug)]
pub enum ModelsAction {
    /// List catalog variants and their on-disk state
    List,
    /// Show the state of one variant
    Status {
        /// Variant name (e.g., small, medium-q5_0, fi-specialized)
        variant: String,
    },
    /// Download a variant until it verifies
    Install {
        /// Variant name (e.g., small, en_US-lessac-medium)
        variant: String,
    },
    /// Repair a variant's directory without downloading
    Repair {
        /// Variant name
        variant: String,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
}
