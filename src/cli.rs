//! Command-line surface for daemon lifecycle control.
//!
//! [`DaemonCommand`] is a standalone `clap` subcommand so a service binary can
//! embed `install`/`start`/`stop`/... next to its own commands.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand};
use log::LevelFilter;

use crate::config::DaemonSettings;
use crate::daemon::Daemon;
use crate::error::Result;

/// Command-line arguments for `daemonctl`
#[derive(Parser, Debug)]
#[command(name = "daemonctl")]
#[command(version, about = "Run a program as a platform-native OS service")]
pub struct Cli {
    /// Settings file (default: <config dir>/daemonctl/daemon.toml)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(flatten)]
    pub daemon: DaemonArgs,

    #[command(subcommand)]
    pub command: DaemonCommand,
}

/// Service identity overrides; each wins over the settings file
#[derive(Args, Debug, Clone, Default)]
pub struct DaemonArgs {
    /// Service name (default: executable name up to the first '.')
    #[arg(long, global = true)]
    pub name: Option<String>,

    /// Account the service runs as (default: current user)
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Working directory (default: the user's home)
    #[arg(long, global = true)]
    pub dir: Option<PathBuf>,

    /// Program to run as the service (default: this executable)
    #[arg(long = "exec", value_name = "PATH", global = true)]
    pub exec: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum DaemonCommand {
    /// Register the service (does not start it)
    Install {
        /// Remove an existing installation first
        #[arg(long, short = 'f')]
        force: bool,

        /// Arguments passed to the program on every start
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Start the service
    Start,
    /// Stop the service
    Stop,
    /// Stop, then start the service
    Restart,
    /// Stop the service and remove its registration
    Delete,
    /// Print the registered service configuration
    Show,
    /// Print running/stopped (Exit 0 = running, 1 = stopped)
    Query {
        /// No output; only the exit code
        #[arg(long, short = 'q')]
        quiet: bool,
    },
}

impl Cli {
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        }
    }

    /// Settings given on the command line, to overlay on the settings file
    pub fn settings(&self) -> DaemonSettings {
        DaemonSettings {
            name: self.daemon.name.clone(),
            user: self.daemon.user.clone(),
            dir: self.daemon.dir.clone(),
            args: match &self.command {
                DaemonCommand::Install { args, .. } => args.clone(),
                _ => Vec::new(),
            },
        }
    }
}

impl DaemonCommand {
    /// True for `query -q`, which reports through the exit code alone
    pub fn is_quiet(&self) -> bool {
        matches!(self, Self::Query { quiet: true })
    }

    /// Run the verb against `daemon`
    ///
    /// `query` answers through the exit code: success when running, failure
    /// when stopped or when the state cannot be read.
    pub fn execute<D: Daemon>(&self, daemon: &D) -> Result<ExitCode> {
        match self {
            Self::Install { force: true, .. } => daemon.reinstall()?,
            Self::Install { force: false, .. } => daemon.install()?,
            Self::Start => daemon.start()?,
            Self::Stop => daemon.stop()?,
            Self::Restart => daemon.restart()?,
            Self::Delete => daemon.delete()?,
            Self::Show => println!("{}", daemon.config()?),
            Self::Query { quiet } => {
                return match daemon.query() {
                    Ok(running) => {
                        if !quiet {
                            println!("{}", if running { "running" } else { "stopped" });
                        }
                        Ok(if running { ExitCode::SUCCESS } else { ExitCode::FAILURE })
                    }
                    Err(_) if *quiet => Ok(ExitCode::FAILURE),
                    Err(e) => Err(e),
                };
            }
        }
        Ok(ExitCode::SUCCESS)
    }
}
