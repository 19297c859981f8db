//! Run-as identity resolution
//!
//! Unix accounts come straight from the passwd database. On Windows the
//! account SID is what the task definition wants as the user id, so it is read
//! back from `whoami` (current user) or PowerShell (any other account).

use std::path::PathBuf;

use crate::error::{DaemonError, Result};
use crate::process::CommandRunner;

/// Resolved OS account a service runs as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    /// Numeric uid on Unix, account SID on Windows
    pub uid: String,
    /// Numeric primary gid on Unix, empty on Windows
    pub gid: String,
    pub home: PathBuf,
}

impl Identity {
    /// Resolve `user`, or the invoking user when `None`
    pub fn resolve<R: CommandRunner>(user: Option<&str>, runner: &R) -> Result<Self> {
        lookup(user, runner)
    }

    /// Numeric gid, required by backends that chown their artifacts
    pub fn numeric_gid(&self) -> Result<u32> {
        self.gid.parse().map_err(|_| {
            DaemonError::UnknownUser(format!(
                "{} has no numeric gid ({:?})",
                self.username, self.gid
            ))
        })
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        fn lookup<R: CommandRunner>(user: Option<&str>, _runner: &R) -> Result<Identity> {
            use nix::unistd::{Uid, User};

            let label = user.unwrap_or("current user");
            let found = match user {
                Some(name) => User::from_name(name),
                None => User::from_uid(Uid::current()),
            }
            .map_err(|e| DaemonError::UnknownUser(format!("{label}: {e}")))?
            .ok_or_else(|| DaemonError::UnknownUser(label.to_string()))?;

            Ok(Identity {
                username: found.name,
                uid: found.uid.to_string(),
                gid: found.gid.to_string(),
                home: found.dir,
            })
        }
    } else if #[cfg(windows)] {
        fn lookup<R: CommandRunner>(user: Option<&str>, runner: &R) -> Result<Identity> {
            use crate::process::argv;

            let current = std::env::var("USERNAME")
                .map_err(|_| DaemonError::UnknownUser("USERNAME is not set".to_string()))?;
            let current_home = dirs::home_dir()
                .ok_or_else(|| DaemonError::UnknownUser("no home directory".to_string()))?;

            match user {
                Some(name) if !name.eq_ignore_ascii_case(&current) => {
                    let script = format!(
                        "(New-Object System.Security.Principal.NTAccount('{}')).Translate([System.Security.Principal.SecurityIdentifier]).Value",
                        name.replace('\'', "''")
                    );
                    let out = runner
                        .run_checked("powershell.exe", &argv(["-NoProfile", "-Command", &script]))
                        .map_err(|e| DaemonError::UnknownUser(format!("{name}: {e}")))?;
                    let home = current_home
                        .parent()
                        .map(|profiles| profiles.join(name))
                        .ok_or_else(|| DaemonError::UnknownUser(format!("{name}: no profile directory")))?;
                    Ok(Identity {
                        username: name.to_string(),
                        uid: out.stdout,
                        gid: String::new(),
                        home,
                    })
                }
                _ => {
                    let out = runner.run_checked("whoami", &argv(["/user", "/fo", "csv", "/nh"]))?;
                    Ok(Identity {
                        username: current,
                        uid: parse_whoami_sid(&out.stdout)?,
                        gid: String::new(),
                        home: current_home,
                    })
                }
            }
        }
    } else {
        fn lookup<R: CommandRunner>(_user: Option<&str>, _runner: &R) -> Result<Identity> {
            Err(DaemonError::UnsupportedPlatform(std::env::consts::OS.to_string()))
        }
    }
}

/// Pull the SID out of `whoami /user /fo csv /nh`, e.g. `"host\bob","S-1-5-21-..."`
#[cfg_attr(not(windows), allow(dead_code))]
fn parse_whoami_sid(stdout: &str) -> Result<String> {
    let fields: Vec<&str> = stdout.trim().split(',').collect();
    match fields.as_slice() {
        [_, sid] => {
            let sid = sid.trim().trim_matches('"');
            if sid.starts_with("S-") {
                Ok(sid.to_string())
            } else {
                Err(DaemonError::unexpected("whoami", format!("not a SID: {sid}")))
            }
        }
        _ => Err(DaemonError::unexpected("whoami", stdout)),
    }
}
