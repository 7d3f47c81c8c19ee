pub mod commands;
pub mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use crate::cli::config::OutputFormat;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest product records for every identifier in a file
    Scrape {
        /// CSV file with an identifier column, or a .txt file with one identifier per line
        #[arg(required = true)]
        input: PathBuf,

        /// Configuration profile to use instead of the default
        #[arg(short, long)]
        profile: Option<String>,

        /// Number of concurrent browser sessions
        #[arg(short, long)]
        workers: Option<usize>,

        /// Directory for the result table
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Result table format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Order rows by identifier instead of completion order
        #[arg(long)]
        sort: bool,
    },

    /// Extract a record from a saved product page
    Extract {
        /// Saved HTML document
        #[arg(required = true)]
        html_file: PathBuf,

        /// Identifier to record; defaults to the file stem
        #[arg(long)]
        id: Option<String>,
    },

    /// Manage configuration profiles
    Config {
        /// Profile name to manage
        #[arg(required = false)]
        profile: Option<String>,

        /// List all available profiles
        #[arg(short, long)]
        list: bool,
    },
}

/// Parse command line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Process the command
pub async fn process_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Scrape { input, profile, workers, output, format, sort } => {
            info!("Starting harvest from {}", input.display());
            let overrides = commands::ScrapeOverrides {
                workers,
                output,
                format,
                sort,
            };
            commands::scrape(input, profile, overrides).await
        },
        Commands::Extract { html_file, id } => {
            info!("Extracting record from {}", html_file.display());
            commands::extract(html_file, id).await
        },
        Commands::Config { profile, list } => {
            if list {
                info!("Listing all configuration profiles");
                commands::list_profiles()
            } else if let Some(profile_name) = profile {
                info!("Managing configuration profile: {}", profile_name);
                commands::manage_profile(profile_name)
            } else {
                info!("Showing current configuration");
                commands::show_config()
            }
        },
    }
}
