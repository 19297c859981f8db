//! Install, start, stop, query and remove a program as a platform-native OS
//! service.
//!
//! One [`Daemon`] contract is implemented over three host facilities:
//! Windows Task Scheduler (`schtasks.exe`), a daemontools supervision tree
//! (`svc`/`svstat`) on Linux, and OpenBSD rc scripts (`rcctl`). The backend is
//! chosen once, when the daemon is built:
//!
//! ```no_run
//! use daemonctl::{Daemon, DaemonBuilder};
//!
//! let daemon = DaemonBuilder::new("netboot", "/usr/local/bin/netbootd")
//!     .arg("server")
//!     .build()?;
//! if !daemon.is_installed() {
//!     daemon.install()?;
//! }
//! daemon.start()?;
//! # Ok::<(), daemonctl::DaemonError>(())
//! ```

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod daemon;
pub mod definition;
pub mod error;
pub mod identity;
pub mod process;
pub mod template;

#[cfg(test)]
mod testing;

pub use config::DaemonSettings;
pub use daemon::{Daemon, DaemonBuilder, Platform, PlatformDaemon, new_daemon};
pub use definition::ServiceDefinition;
pub use error::{DaemonError, Result};
pub use identity::Identity;
pub use process::{CommandOutput, CommandRunner, SystemRunner};
