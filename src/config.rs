use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DaemonError, Result};

const CONFIG_DIR: &str = "daemonctl";
const CONFIG_FILE: &str = "daemon.toml";

/// Who and what to run as a service, as read from `daemon.toml`.
///
/// Every field is optional; unset values fall back to defaults derived from
/// the executable and the run-as account when the daemon is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonSettings {
    /// Service name; defaults to the executable name up to the first `.`
    pub name: Option<String>,
    /// Run-as account; defaults to the invoking user
    pub user: Option<String>,
    /// Working directory; defaults to the run-as user's home
    pub dir: Option<PathBuf>,
    pub args: Vec<String>,
}

impl DaemonSettings {
    /// `<config dir>/daemonctl/daemon.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load settings from `path`, or from [`default_path`](Self::default_path)
    ///
    /// A missing default file yields empty settings; a missing explicit file
    /// is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| DaemonError::Config(format!("{}: {e}", path.display())))?;
        let settings: Self = toml::from_str(&content)
            .map_err(|e| DaemonError::Config(format!("{}: {e}", path.display())))?;
        log::debug!("loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Overlay `other` on top of these settings; set values in `other` win
    pub fn merge(mut self, other: Self) -> Self {
        if other.name.is_some() {
            self.name = other.name;
        }
        if other.user.is_some() {
            self.user = other.user;
        }
        if other.dir.is_some() {
            self.dir = other.dir;
        }
        if !other.args.is_empty() {
            self.args = other.args;
        }
        self
    }

    /// The configured name, or one derived from `executable`
    pub fn service_name(&self, executable: &Path) -> Result<String> {
        match &self.name {
            Some(name) => Ok(name.clone()),
            None => default_name(executable),
        }
    }
}

/// Executable file name up to its first `.` (`netbootd.exe` -> `netbootd`)
pub fn default_name(executable: &Path) -> Result<String> {
    executable
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            DaemonError::Config(format!(
                "cannot derive a service name from {}",
                executable.display()
            ))
        })
}
