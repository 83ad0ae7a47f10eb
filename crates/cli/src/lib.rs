//! Command-line argument definitions for the bookswap binary

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bookswap")]
#[command(about = "BookSwap - a community platform for trading physical books")]
#[command(version = "0.1.0")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the platform with the given configuration
    Start {
        /// Path to the configuration file
        #[arg(short, long, default_value = "etc/bookswap.yaml")]
        config: PathBuf,

        /// Override the configured log format (pretty, json, compact)
        #[arg(long)]
        log_format: Option<String>,

        /// Override the configured Prometheus metrics port
        #[arg(long)]
        metrics_port: Option<u16>,
    },

    /// Validate configuration without starting the platform
    Validate {
        /// Path to the configuration file
        #[arg(short, long, default_value = "etc/bookswap.yaml")]
        config: PathBuf,
    },

    /// Initialize a new configuration file with all defaults
    Init {
        /// Output path for the new configuration file
        #[arg(short, long, default_value = "bookswap.yaml")]
        output: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_defaults() {
        let cli = Cli::parse_from(["bookswap", "start"]);
        match cli.command {
            Commands::Start {
                config,
                log_format,
                metrics_port,
            } => {
                assert_eq!(config, PathBuf::from("etc/bookswap.yaml"));
                assert!(log_format.is_none());
                assert!(metrics_port.is_none());
            }
            other => panic!("expected start, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_with_custom_path() {
        let cli = Cli::parse_from(["bookswap", "validate", "--config", "custom.yaml"]);
        match cli.command {
            Commands::Validate { config } => assert_eq!(config, PathBuf::from("custom.yaml")),
            other => panic!("expected validate, got {:?}", other),
        }
    }
}
