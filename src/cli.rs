//! Command line interface.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "vigil")]
#[command(about = "Probe proxied sites, classify egress health, and fail over routing rules")]
pub struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, env = "VIGIL_CONFIG", default_value = "config.json")]
    pub config: PathBuf,

    /// Override the state file path from the configuration
    #[arg(long, env = "VIGIL_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// Override the per-probe request timeout in milliseconds
    #[arg(long, env = "VIGIL_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Log routing commands instead of executing them
    #[arg(long, default_value = "false")]
    pub dry_run: bool,

    /// Enable debug logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,
}
