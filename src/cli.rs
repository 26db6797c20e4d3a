//! Command-line surface

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::infrastructure::config::HarvestConfig;

#[derive(Parser, Debug)]
#[command(name = "miniface-harvester")]
#[command(about = "Harvests eFootball player minifaces into DDS texture folders", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output root directory
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Delay before every request (ms)
    #[arg(long, global = true)]
    pub delay_ms: Option<u64>,

    /// Per-request timeout (s)
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Attempts per URL for transient failures
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    #[arg(long, global = true)]
    pub teams_workers: Option<usize>,

    #[arg(long, global = true)]
    pub players_workers: Option<usize>,

    #[arg(long, global = true)]
    pub images_workers: Option<usize>,

    /// Log per-entity progress
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print the run summary as JSON
    #[arg(long, global = true)]
    pub json_summary: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Harvest every league of the catalog
    Catalog {
        /// Restrict to leagues matching this key or name (repeatable)
        #[arg(short, long = "league")]
        leagues: Vec<String>,
    },

    /// Harvest only the players in the featured updates feed
    Updates,

    /// Print the league list as `key,name,url`
    Leagues,

    /// Write sider.ini.txt with a livecpk line per output group
    SiderIni,
}

impl GlobalArgs {
    /// Applies command-line overrides on top of the loaded configuration
    pub fn apply(&self, config: &mut HarvestConfig) {
        if let Some(output) = &self.output {
            config.output.root_dir.clone_from(output);
        }
        if let Some(delay) = self.delay_ms {
            config.network.request_delay_ms = delay;
        }
        if let Some(timeout) = self.timeout_secs {
            config.network.request_timeout_secs = timeout;
        }
        if let Some(retries) = self.max_retries {
            config.network.max_retries = retries;
        }
        if let Some(width) = self.teams_workers {
            config.workers.teams = width;
        }
        if let Some(width) = self.players_workers {
            config.workers.players = width;
        }
        if let Some(width) = self.images_workers {
            config.workers.images = width;
        }
        if self.verbose {
            config.logging.level = "debug".to_string();
        } else if self.quiet {
            config.logging.level = "error".to_string();
        }
    }
}
