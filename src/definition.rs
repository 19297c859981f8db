//! Immutable description of the service being managed

use std::path::{Path, PathBuf};

use crate::error::{DaemonError, Result};
use crate::identity::Identity;

/// What to run, as whom, and where
///
/// Built once per invocation and handed to exactly one backend. Backends
/// append their own log flags to `args` when rendering; the definition itself
/// is never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefinition {
    name: String,
    owner: Identity,
    executable: PathBuf,
    args: Vec<String>,
    working_dir: PathBuf,
}

impl ServiceDefinition {
    /// Validate and assemble a definition
    ///
    /// `working_dir` defaults to the owner's home directory and must be an
    /// existing directory.
    pub fn new(
        name: impl Into<String>,
        owner: Identity,
        executable: impl Into<PathBuf>,
        args: Vec<String>,
        working_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(DaemonError::Config(format!("invalid service name: {name:?}")));
        }

        let working_dir = working_dir.unwrap_or_else(|| owner.home.clone());
        if !working_dir.is_dir() {
            return Err(DaemonError::NotDirectory(working_dir));
        }

        Ok(Self {
            name,
            owner,
            executable: executable.into(),
            args,
            working_dir,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &Identity {
        &self.owner
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Base file name of the executable, used for the installed copy
    pub(crate) fn executable_name(&self) -> Result<&std::ffi::OsStr> {
        self.executable.file_name().ok_or_else(|| {
            DaemonError::Config(format!(
                "executable has no file name: {}",
                self.executable.display()
            ))
        })
    }

    /// Space-joined argument string with `extra` appended
    pub(crate) fn joined_args(&self, extra: &[&str]) -> String {
        self.args
            .iter()
            .map(String::as_str)
            .chain(extra.iter().copied())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
