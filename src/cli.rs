use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Files dropped into an inbox, sorted by whatever you were looking at.
///
/// Captured window titles are read from standard input, one per line.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON), merged over the defaults and
    /// the per-user configuration file.
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Log what would be moved without touching the output directory.
    #[arg(long, global = true)]
    pub dry_run: bool,
    /// More logging; repeat for even more. `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Watch the intake directory until interrupted (default).
    #[default]
    Watch,
    /// Process the files already in the intake directory, then exit.
    Sweep,
    /// Validate the configuration and print the effective settings.
    Check,
}

impl Cli {
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
