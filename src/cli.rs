use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// jmxctl - declarative JMX configuration for Java services
#[derive(Parser)]
#[command(name = "jmxctl")]
#[command(about = "Converge JMX remote-monitoring configuration for a Java service")]
#[command(version)]
pub struct Cli {
    /// Dry-run mode: print the convergence plan without changing anything.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the operations needed to converge a service
    Plan {
        /// Path to the JSON option file
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Converge a service to its option file and restart it on change
    Apply {
        /// Path to the JSON option file
        #[arg(short, long)]
        config: PathBuf,

        /// Do not restart the service even if something changed
        #[arg(long)]
        no_restart: bool,
    },
    /// Validate an option file and its key material
    Validate {
        /// Path to the JSON option file
        config: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }

    /// Default log filter for the chosen verbosity
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
