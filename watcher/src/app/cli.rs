//! Command line arguments

use std::path::PathBuf;

use clap::Parser;

use crate::logs::LogLevel;
use crate::models::deployment::LogType;

/// Follow the build and runtime logs of a WhaleRay deployment
#[derive(Debug, Clone, Parser)]
#[command(name = "wrwatch", disable_version_flag = true)]
pub struct Cli {
    /// Deployment to follow
    pub deployment_id: Option<String>,

    /// Log streams to follow: build, runtime or all
    #[arg(long = "type", value_name = "TYPE")]
    pub log_type: Option<LogType>,

    /// Polling interval in milliseconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval_ms: Option<u64>,

    /// Maximum log lines per request
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub limit: Option<u32>,

    /// Bearer token (overrides the environment and the token file)
    #[arg(long)]
    pub token: Option<String>,

    /// Backend API base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Settings file (defaults to ~/.whaleray/settings.json)
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Log level for diagnostics on stderr
    #[arg(long)]
    pub log_level: Option<LogLevel>,

    /// Also write diagnostics to daily-rolling files in this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Emit diagnostics as JSON
    #[arg(long)]
    pub json_logs: bool,

    /// Print the current window once and exit without polling
    #[arg(long)]
    pub once: bool,

    /// Print version information and exit
    #[arg(long)]
    pub version: bool,
}
