//! Service lifecycle contract and platform backend selection.
//!
//! Every backend implements [`Daemon`]. The backend for the running host is
//! chosen once at construction and carried as a [`PlatformDaemon`].

mod file_ops;

pub mod daemontools;
pub mod rc_script;
pub mod windows_task;

use std::fmt;
use std::path::{Path, PathBuf};

use log::info;

use crate::config::DaemonSettings;
use crate::definition::ServiceDefinition;
use crate::error::{DaemonError, Result};
use crate::identity::Identity;
use crate::process::{CommandRunner, SystemRunner};

pub use daemontools::{Daemontools, DaemontoolsLayout};
pub use rc_script::{RcLayout, RcScript};
pub use windows_task::WindowsTask;

/// Uniform lifecycle operations over a host's native service facility
///
/// Every operation either completes or returns the first error encountered;
/// there is no rollback of earlier steps.
pub trait Daemon {
    /// Register the service and lay down its artifacts. Does not start it.
    fn install(&self) -> Result<()>;

    /// Stop the service and remove its registration and artifacts
    fn delete(&self) -> Result<()>;

    fn start(&self) -> Result<()>;

    fn stop(&self) -> Result<()>;

    /// The service's registered configuration as the host reports it
    fn config(&self) -> Result<String>;

    /// Whether the service is currently running
    fn query(&self) -> Result<bool>;

    fn restart(&self) -> Result<()> {
        self.stop()?;
        self.start()
    }

    /// Existence probe: a service whose configuration can be read is installed
    fn is_installed(&self) -> bool {
        self.config().is_ok()
    }

    /// Delete any existing registration, then install afresh
    fn reinstall(&self) -> Result<()> {
        if self.is_installed() {
            info!("removing existing installation");
            self.delete()?;
        }
        self.install()
    }
}

/// Host families with a supported service facility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    OpenBsd,
    Linux,
}

impl Platform {
    /// The platform this process is running on
    pub fn current() -> Result<Self> {
        Self::from_os(std::env::consts::OS)
    }

    /// Map an `std::env::consts::OS` string to a platform
    pub fn from_os(os: &str) -> Result<Self> {
        match os {
            "windows" => Ok(Self::Windows),
            "openbsd" => Ok(Self::OpenBsd),
            "linux" => Ok(Self::Linux),
            other => Err(DaemonError::UnsupportedPlatform(other.to_string())),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Windows => "Windows Task Scheduler",
            Self::OpenBsd => "OpenBSD rc.d",
            Self::Linux => "daemontools",
        })
    }
}

/// The backend selected for a host
#[derive(Debug)]
pub enum PlatformDaemon<R = SystemRunner> {
    WindowsTask(WindowsTask<R>),
    Daemontools(Daemontools<R>),
    RcScript(RcScript<R>),
}

impl<R> PlatformDaemon<R> {
    pub fn platform(&self) -> Platform {
        match self {
            Self::WindowsTask(_) => Platform::Windows,
            Self::Daemontools(_) => Platform::Linux,
            Self::RcScript(_) => Platform::OpenBsd,
        }
    }
}

macro_rules! delegate {
    ($self:ident, $method:ident) => {
        match $self {
            Self::WindowsTask(d) => d.$method(),
            Self::Daemontools(d) => d.$method(),
            Self::RcScript(d) => d.$method(),
        }
    };
}

impl<R: CommandRunner> Daemon for PlatformDaemon<R> {
    fn install(&self) -> Result<()> {
        delegate!(self, install)
    }

    fn delete(&self) -> Result<()> {
        delegate!(self, delete)
    }

    fn start(&self) -> Result<()> {
        delegate!(self, start)
    }

    fn stop(&self) -> Result<()> {
        delegate!(self, stop)
    }

    fn config(&self) -> Result<String> {
        delegate!(self, config)
    }

    fn query(&self) -> Result<bool> {
        delegate!(self, query)
    }
}

/// Assembles a [`PlatformDaemon`] for the host (or an explicit platform)
#[derive(Debug)]
pub struct DaemonBuilder<R = SystemRunner> {
    name: String,
    executable: PathBuf,
    user: Option<String>,
    dir: Option<PathBuf>,
    args: Vec<String>,
    platform: Option<Platform>,
    owner: Option<Identity>,
    daemontools_layout: DaemontoolsLayout,
    rc_layout: RcLayout,
    runner: R,
}

impl DaemonBuilder<SystemRunner> {
    pub fn new(name: impl Into<String>, executable: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            executable: executable.into(),
            user: None,
            dir: None,
            args: Vec::new(),
            platform: None,
            owner: None,
            daemontools_layout: DaemontoolsLayout::default(),
            rc_layout: RcLayout::default(),
            runner: SystemRunner,
        }
    }
}

impl<R: CommandRunner> DaemonBuilder<R> {
    /// Run as this account instead of the invoking user
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Working directory; defaults to the run-as user's home
    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Target a specific backend instead of the host's
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Use an already resolved identity instead of looking up `user`
    pub fn owner(mut self, owner: Identity) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn daemontools_layout(mut self, layout: DaemontoolsLayout) -> Self {
        self.daemontools_layout = layout;
        self
    }

    pub fn rc_layout(mut self, layout: RcLayout) -> Self {
        self.rc_layout = layout;
        self
    }

    /// Replace the utility runner
    pub fn runner<R2: CommandRunner>(self, runner: R2) -> DaemonBuilder<R2> {
        DaemonBuilder {
            name: self.name,
            executable: self.executable,
            user: self.user,
            dir: self.dir,
            args: self.args,
            platform: self.platform,
            owner: self.owner,
            daemontools_layout: self.daemontools_layout,
            rc_layout: self.rc_layout,
            runner,
        }
    }

    pub fn build(self) -> Result<PlatformDaemon<R>> {
        let platform = match self.platform {
            Some(platform) => platform,
            None => Platform::current()?,
        };

        let owner = match self.owner {
            Some(owner) => owner,
            None => Identity::resolve(self.user.as_deref(), &self.runner)?,
        };

        let def = ServiceDefinition::new(self.name, owner, self.executable, self.args, self.dir)?;
        info!(
            "{} service {:?} for {} ({})",
            platform,
            def.name(),
            def.owner().username,
            def.executable().display()
        );

        Ok(match platform {
            Platform::Windows => PlatformDaemon::WindowsTask(WindowsTask::new(&def, self.runner)?),
            Platform::Linux => PlatformDaemon::Daemontools(Daemontools::new(
                &def,
                &self.daemontools_layout,
                self.runner,
            )?),
            Platform::OpenBsd => {
                PlatformDaemon::RcScript(RcScript::new(&def, &self.rc_layout, self.runner)?)
            }
        })
    }
}

/// Build the host's backend from resolved settings
pub fn new_daemon(settings: &DaemonSettings, executable: &Path) -> Result<PlatformDaemon> {
    let mut builder = DaemonBuilder::new(settings.service_name(executable)?, executable)
        .args(settings.args.iter().cloned());
    if let Some(user) = &settings.user {
        builder = builder.user(user.clone());
    }
    if let Some(dir) = &settings.dir {
        builder = builder.dir(dir.clone());
    }
    builder.build()
}
