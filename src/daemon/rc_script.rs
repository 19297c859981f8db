//! rc-script backend (OpenBSD `rc.d` + `rcctl`).
//!
//! Installs `/etc/rc.d/NAME` and hands every lifecycle verb to `rcctl`.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use super::Daemon;
use super::file_ops::{copy_executable, write_file_atomic};
use crate::definition::ServiceDefinition;
use crate::error::{IoContext, Result};
use crate::process::{CommandRunner, SystemRunner, argv};
use crate::template::{self, Unexpanded, keys};

const RCCTL: &str = "rcctl";
const RC_TEMPLATE: &str = include_str!("../../templates/rc.template");

/// Filesystem locations used by the rc-script backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RcLayout {
    pub rc_dir: PathBuf,
    pub bin_dir: PathBuf,
    pub log_root: PathBuf,
}

impl Default for RcLayout {
    fn default() -> Self {
        Self {
            rc_dir: PathBuf::from("/etc/rc.d"),
            bin_dir: PathBuf::from("/usr/local/bin"),
            log_root: PathBuf::from("/var/log"),
        }
    }
}

/// A service managed through an rc script and `rcctl`
#[derive(Debug)]
pub struct RcScript<R = SystemRunner> {
    name: String,
    username: String,
    uid: String,
    executable: PathBuf,
    service_bin: PathBuf,
    args: String,
    dir: PathBuf,
    log_file: PathBuf,
    rc_file: PathBuf,
    runner: R,
}

impl<R: CommandRunner> RcScript<R> {
    pub fn new(def: &ServiceDefinition, layout: &RcLayout, runner: R) -> Result<Self> {
        let log_file = layout.log_root.join(def.name());
        let args = def.joined_args(&["-L", &*log_file.to_string_lossy()]);

        Ok(Self {
            name: def.name().to_string(),
            username: def.owner().username.clone(),
            uid: def.owner().uid.clone(),
            executable: def.executable().to_path_buf(),
            service_bin: layout.bin_dir.join(def.executable_name()?),
            args,
            dir: def.working_dir().to_path_buf(),
            log_file,
            rc_file: layout.rc_dir.join(def.name()),
            runner,
        })
    }

    /// Installed rc script (`/etc/rc.d/NAME`)
    pub fn rc_file(&self) -> &Path {
        &self.rc_file
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    fn script(&self) -> String {
        let bin = self.service_bin.to_string_lossy();
        let dir = self.dir.to_string_lossy();
        template::render(
            RC_TEMPLATE,
            &[
                (keys::USER, self.username.as_str()),
                (keys::UID, self.uid.as_str()),
                (keys::BIN, &*bin),
                (keys::ARGS, self.args.as_str()),
                (keys::DIR, &*dir),
            ],
            Unexpanded::Braced,
        )
    }

    fn rcctl(&self, verb: &str) -> Result<String> {
        info!("{RCCTL} {verb} {}", self.name);
        let out = self.runner.run_checked(RCCTL, &argv([verb, &self.name]))?;
        if !out.stdout.is_empty() {
            info!("{}", out.stdout);
        }
        Ok(out.stdout)
    }
}

impl<R: CommandRunner> Daemon for RcScript<R> {
    fn install(&self) -> Result<()> {
        if self.executable != self.service_bin {
            copy_executable(&self.executable, &self.service_bin)?;
        }
        write_file_atomic(&self.rc_file, self.script().as_bytes(), 0o755)?;
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        self.rcctl("stop")?;
        self.rcctl("disable")?;
        fs::remove_file(&self.rc_file)
            .io_context(|| format!("Failed to remove {}", self.rc_file.display()))?;
        info!("removed {}", self.rc_file.display());
        Ok(())
    }

    fn start(&self) -> Result<()> {
        self.rcctl("enable")?;
        self.rcctl("start")?;
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.rcctl("stop")?;
        Ok(())
    }

    fn config(&self) -> Result<String> {
        self.rcctl("get")
    }

    /// `rcctl check` exits non-zero for a stopped service; that is an answer,
    /// not an error
    fn query(&self) -> Result<bool> {
        let out = self.runner.run(RCCTL, &argv(["check", &self.name]))?;
        Ok(out.success())
    }
}
