//! CLI argument definitions for kernlog-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Kernel log collection daemon.
///
/// Loads `kernlog.toml` and an optional legacy directive file, drives the
/// kernel log input module through its lifecycle, and writes the records it
/// produces as JSON lines on stdout.
#[derive(Parser, Debug)]
#[command(name = "kernlog-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to kernlog.toml configuration file.
    #[arg(short, long, default_value = "/etc/kernlog/kernlog.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration (including the legacy directive file) and exit
    /// without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}
