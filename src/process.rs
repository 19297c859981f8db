//! External utility invocation
//!
//! Backends never touch `std::process` directly; they go through a
//! [`CommandRunner`] so tests can substitute canned utility output.

use std::path::PathBuf;
use std::process::Command;

use log::{debug, info};

use crate::error::{DaemonError, Result};

/// Captured result of one utility run, text already trimmed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Turn a non-zero exit into [`DaemonError::CommandFailed`]
    ///
    /// The stderr text is the message when there is any, otherwise the exit
    /// status is reported.
    pub fn check(self, program: &str) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }
        let message = if !self.stderr.is_empty() {
            self.stderr
        } else {
            match self.code {
                Some(code) => format!("exit status {code}"),
                None => "terminated by signal".to_string(),
            }
        };
        Err(DaemonError::CommandFailed {
            program: program.to_string(),
            message,
        })
    }
}

/// Runs a program to completion and captures its output
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;

    /// Run and require a zero exit
    fn run_checked(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        self.run(program, args)?.check(program)
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        (**self).run(program, args)
    }
}

/// Runs real host utilities, blocking until they exit
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    fn locate(program: &str) -> Result<PathBuf> {
        which::which(program).map_err(|e| DaemonError::Spawn {
            program: program.to_string(),
            message: e.to_string(),
        })
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        let path = Self::locate(program)?;
        info!("{} {}", program, args.join(" "));

        let output = Command::new(&path)
            .args(args)
            .output()
            .map_err(|e| DaemonError::Spawn {
                program: program.to_string(),
                message: e.to_string(),
            })?;

        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        };
        debug!("{program} exited with {:?}", result.code);
        if !result.stdout.is_empty() {
            debug!("{program} stdout: {}", result.stdout);
        }
        if !result.stderr.is_empty() {
            debug!("{program} stderr: {}", result.stderr);
        }
        Ok(result)
    }
}

/// Build an owned argument vector from string slices
pub(crate) fn argv<I, S>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter().map(|s| s.as_ref().to_string()).collect()
}
