//! Supervised service tree backend (daemontools `svscan`/`supervise`).
//!
//! Layout for a service `NAME`:
//!
//! - `/var/svc.d/NAME/run`, `/var/svc.d/NAME/log/run` - the control directory
//! - `/etc/service/NAME` - symlink watched by `svscan`
//! - `/etc/service/NAME/down` - present means "do not auto-start"
//! - `/var/log/NAME` - written by the `multilog` log supervisor
//!
//! Lifecycle verbs are `svc -u` / `svc -d` and run state comes from `svstat`.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use super::Daemon;
use super::file_ops::{copy_executable, create_dir_with_mode, remove_path, write_file_atomic};
use crate::definition::ServiceDefinition;
use crate::error::{DaemonError, IoContext, Result};
use crate::identity::Identity;
use crate::process::{CommandRunner, SystemRunner, argv};
use crate::template::{self, Unexpanded, keys};

const SVC: &str = "svc";
const SVSTAT: &str = "svstat";
const RUN_TEMPLATE: &str = include_str!("../../templates/daemontools_run.template");
const LOG_TEMPLATE: &str = include_str!("../../templates/daemontools_log.template");
const DOWN_FILE: &str = "down";

/// Filesystem roots of the supervision tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemontoolsLayout {
    /// Parent of per-service control directories
    pub control_root: PathBuf,
    /// Directory scanned by `svscan`
    pub service_root: PathBuf,
    /// Where the service binary is installed
    pub bin_dir: PathBuf,
    /// Parent of per-service log directories
    pub log_root: PathBuf,
}

impl Default for DaemontoolsLayout {
    fn default() -> Self {
        Self {
            control_root: PathBuf::from("/var/svc.d"),
            service_root: PathBuf::from("/etc/service"),
            bin_dir: PathBuf::from("/usr/local/bin"),
            log_root: PathBuf::from("/var/log"),
        }
    }
}

/// A service supervised by daemontools
///
/// Every path is derived from the service name and layout. Nothing records
/// what was installed, so `delete` only finds the tree when it is built with
/// the same name and layout as `install` was.
#[derive(Debug)]
pub struct Daemontools<R = SystemRunner> {
    name: String,
    owner: Identity,
    executable: PathBuf,
    args: String,
    dir: PathBuf,
    control_root: PathBuf,
    control_dir: PathBuf,
    service_dir: PathBuf,
    service_bin: PathBuf,
    log_dir: PathBuf,
    runner: R,
}

impl<R: CommandRunner> Daemontools<R> {
    pub fn new(def: &ServiceDefinition, layout: &DaemontoolsLayout, runner: R) -> Result<Self> {
        let name = def.name().to_string();
        Ok(Self {
            owner: def.owner().clone(),
            executable: def.executable().to_path_buf(),
            // output goes to stdout, where multilog picks it up
            args: def.joined_args(&["-L-"]),
            dir: def.working_dir().to_path_buf(),
            control_root: layout.control_root.clone(),
            control_dir: layout.control_root.join(&name),
            service_dir: layout.service_root.join(&name),
            service_bin: layout.bin_dir.join(def.executable_name()?),
            log_dir: layout.log_root.join(&name),
            name,
            runner,
        })
    }

    /// Supervision directory (`/etc/service/NAME`)
    pub fn service_dir(&self) -> &Path {
        &self.service_dir
    }

    /// Control directory holding the run scripts (`/var/svc.d/NAME`)
    pub fn control_dir(&self) -> &Path {
        &self.control_dir
    }

    /// Allow the supervisor to start the service
    pub fn enable(&self) -> Result<()> {
        let down = self.service_dir.join(DOWN_FILE);
        if down.is_file() {
            fs::remove_file(&down)
                .io_context(|| format!("Failed to remove {}", down.display()))?;
            info!("enabled {}", self.name);
        }
        Ok(())
    }

    /// Keep the supervisor from starting the service on its own
    pub fn disable(&self) -> Result<()> {
        write_down_file(&self.service_dir)
    }

    fn render(&self, template: &str) -> String {
        let bin = self.service_bin.to_string_lossy();
        let dir = self.dir.to_string_lossy();
        template::render(
            template,
            &[
                (keys::NAME, self.name.as_str()),
                (keys::USER, self.owner.username.as_str()),
                (keys::UID, self.owner.uid.as_str()),
                (keys::BIN, &*bin),
                (keys::ARGS, self.args.as_str()),
                (keys::DIR, &*dir),
            ],
            Unexpanded::Braced,
        )
    }

    fn svc(&self, flag: &str, dir: &Path) -> Result<()> {
        self.runner
            .run_checked(SVC, &argv([flag, &*dir.to_string_lossy()]))?;
        Ok(())
    }

    /// Ask `svstat` whether the service supervised in `dir` is up
    fn svstat(&self, dir: &Path) -> Result<bool> {
        let dir = dir.to_string_lossy();
        let out = self.runner.run_checked(SVSTAT, &argv([&*dir]))?;
        parse_svstat(&dir, &out.stdout)
    }
}

impl<R: CommandRunner> Daemon for Daemontools<R> {
    fn install(&self) -> Result<()> {
        let gid = self.owner.numeric_gid()?;

        create_dir_with_mode(&self.control_root, 0o755)?;
        create_dir_with_mode(&self.control_dir, 0o750)?;
        let log_control = self.control_dir.join("log");
        create_dir_with_mode(&log_control, 0o750)?;
        set_group(&self.control_dir, gid)?;
        set_group(&log_control, gid)?;

        write_file_atomic(
            &self.control_dir.join("run"),
            self.render(RUN_TEMPLATE).as_bytes(),
            0o700,
        )?;
        write_file_atomic(
            &log_control.join("run"),
            self.render(LOG_TEMPLATE).as_bytes(),
            0o700,
        )?;

        if self.executable != self.service_bin {
            copy_executable(&self.executable, &self.service_bin)?;
        }

        if !self.log_dir.is_dir() {
            create_dir_with_mode(&self.log_dir, 0o770)?;
            set_group(&self.log_dir, gid)?;
        }

        // installed disabled; the symlink goes last so svscan sees a complete tree
        write_down_file(&self.control_dir)?;
        if let Some(root) = self.service_dir.parent() {
            fs::create_dir_all(root)
                .io_context(|| format!("Failed to create directory {}", root.display()))?;
        }
        symlink_dir(&self.control_dir, &self.service_dir)?;

        info!("installed {} in {}", self.name, self.control_dir.display());
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        if self.svstat(&self.service_dir)? {
            self.stop()?;
        }
        let log_service = self.service_dir.join("log");
        if self.svstat(&log_service)? {
            self.svc("-d", &log_service)?;
        }
        remove_path(&self.service_dir)?;
        remove_path(&self.control_dir)?;
        Ok(())
    }

    fn start(&self) -> Result<()> {
        self.enable()?;
        self.svc("-u", &self.service_dir)
    }

    fn stop(&self) -> Result<()> {
        self.svc("-d", &self.service_dir)
    }

    fn config(&self) -> Result<String> {
        let run = self.service_dir.join("run");
        fs::read_to_string(&run).io_context(|| format!("Failed to read {}", run.display()))
    }

    fn query(&self) -> Result<bool> {
        self.svstat(&self.service_dir)
    }
}

/// Parse `svstat DIR` output such as `DIR: up (pid 123) 5 seconds`
///
/// The first field must be `DIR:`; the service is running only when the
/// second field is exactly `up`.
pub(crate) fn parse_svstat(dir: &str, stdout: &str) -> Result<bool> {
    let fields: Vec<&str> = stdout.split_whitespace().collect();
    if fields.len() < 2 {
        return Err(DaemonError::unexpected(SVSTAT, stdout));
    }
    if fields[0] != format!("{dir}:") {
        return Err(DaemonError::unexpected(
            SVSTAT,
            format!("unexpected svstat dir output: {}", fields[0]),
        ));
    }
    Ok(fields[1] == "up")
}

fn write_down_file(dir: &Path) -> Result<()> {
    let down = dir.join(DOWN_FILE);
    if !down.is_file() {
        write_file_atomic(&down, b"", 0o600)?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_group(path: &Path, gid: u32) -> Result<()> {
    use nix::unistd::{Gid, chown};

    chown(path, None, Some(Gid::from_raw(gid))).map_err(|e| {
        DaemonError::io(
            format!("Failed to set group {gid} on {}", path.display()),
            std::io::Error::from(e),
        )
    })
}

#[cfg(not(unix))]
fn set_group(_path: &Path, _gid: u32) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn symlink_dir(target: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link).io_context(|| {
        format!("Failed to link {} to {}", link.display(), target.display())
    })
}

#[cfg(not(unix))]
fn symlink_dir(_target: &Path, _link: &Path) -> Result<()> {
    Err(DaemonError::UnsupportedPlatform(std::env::consts::OS.to_string()))
}
