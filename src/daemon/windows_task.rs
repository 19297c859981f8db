//! Windows Task Scheduler backend (`schtasks.exe`).
//!
//! The service is a scheduled task created from one rendered XML definition.
//! Every verb is a single `schtasks.exe /<VERB> /TN <name>` invocation.

use std::path::{Path, PathBuf};

use log::{debug, warn};

use super::Daemon;
use super::file_ops::{create_dir_with_mode, write_file_atomic};
use crate::definition::ServiceDefinition;
use crate::error::{DaemonError, IoContext, Result};
use crate::process::{CommandRunner, SystemRunner};
use crate::template::{self, Unexpanded, keys};

const SCHTASKS: &str = "schtasks.exe";
const TASK_TEMPLATE: &str = include_str!("../../templates/task.xml.template");
const UNEXPANDED: Unexpanded = Unexpanded::Marked("UNEXPANDED_XML_PARAM_");
const RUNNING: &str = "\"Running\"";

/// A scheduled task standing in for a service
#[derive(Debug)]
pub struct WindowsTask<R = SystemRunner> {
    name: String,
    username: String,
    uid: String,
    executable: PathBuf,
    args: String,
    dir: PathBuf,
    log_file: PathBuf,
    runner: R,
}

impl<R: CommandRunner> WindowsTask<R> {
    /// Prepare the task; creates the owner's `logs` directory
    pub fn new(def: &ServiceDefinition, runner: R) -> Result<Self> {
        let log_dir = def.owner().home.join("logs");
        create_dir_with_mode(&log_dir, 0o700)?;
        let log_file = log_dir.join(format!("{}-task.log", def.name()));
        let args = def.joined_args(&["-L", &*log_file.to_string_lossy()]);

        Ok(Self {
            name: def.name().to_string(),
            username: def.owner().username.clone(),
            uid: def.owner().uid.clone(),
            executable: def.executable().to_path_buf(),
            args,
            dir: def.working_dir().to_path_buf(),
            log_file,
            runner,
        })
    }

    /// Log file passed to the executable with `-L`
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    fn task_xml(&self) -> String {
        let bin = xml_escape(&self.executable.to_string_lossy());
        let dir = xml_escape(&self.dir.to_string_lossy());
        let args = xml_escape(&self.args);
        let user = xml_escape(&self.username);
        let uid = xml_escape(&self.uid);
        template::render(
            TASK_TEMPLATE,
            &[
                (keys::USER, user.as_str()),
                (keys::UID, uid.as_str()),
                (keys::BIN, bin.as_str()),
                (keys::ARGS, args.as_str()),
                (keys::DIR, dir.as_str()),
            ],
            UNEXPANDED,
        )
    }

    /// Run `schtasks.exe /<verb> /TN <name> <extra..>` and return its stdout
    fn task_scheduler(&self, verb: &str, extra: &[&str]) -> Result<String> {
        let mut args = vec![format!("/{verb}"), "/TN".to_string(), self.name.clone()];
        args.extend(extra.iter().map(|s| s.to_string()));
        let out = self.runner.run_checked(SCHTASKS, &args)?;
        debug!("{}", out.stdout);
        Ok(out.stdout)
    }
}

impl<R: CommandRunner> Daemon for WindowsTask<R> {
    fn install(&self) -> Result<()> {
        let temp_dir = tempfile::Builder::new()
            .prefix("task-create-")
            .tempdir()
            .io_context(|| "Failed to create temporary directory")?;

        // temp_dir is removed on drop, on every return path
        let xml_file = temp_dir.path().join("task.xml");
        write_file_atomic(&xml_file, self.task_xml().as_bytes(), 0o600)?;

        self.task_scheduler("CREATE", &["/XML", &*xml_file.to_string_lossy()])?;
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        if let Err(e) = self.task_scheduler("END", &[]) {
            warn!("ignoring failed stop of task {}: {e}", self.name);
        }
        self.task_scheduler("DELETE", &["/F"])?;
        Ok(())
    }

    fn start(&self) -> Result<()> {
        self.task_scheduler("RUN", &[])?;
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.task_scheduler("END", &[])?;
        Ok(())
    }

    fn config(&self) -> Result<String> {
        self.task_scheduler("QUERY", &["/XML", "ONE"])
    }

    fn query(&self) -> Result<bool> {
        let stdout = self.task_scheduler("QUERY", &["/FO", "csv", "/NH"])?;
        parse_task_status(&self.name, &stdout)
    }
}

/// Parse `schtasks /QUERY /FO csv /NH` output for one task
///
/// Exactly one line of exactly three fields, the first being the quoted,
/// backslash-prefixed task name. Anything else is an unsupported format.
pub(crate) fn parse_task_status(name: &str, stdout: &str) -> Result<bool> {
    let lines: Vec<&str> = stdout.split('\n').collect();
    let fields: Vec<&str> = match lines.as_slice() {
        [line] => line.trim_end_matches('\r').split(',').collect(),
        _ => Vec::new(),
    };
    if fields.len() != 3 {
        return Err(DaemonError::unexpected(SCHTASKS, stdout));
    }

    let task_name = format!("\"\\{name}\"");
    if fields[0] != task_name {
        return Err(DaemonError::unexpected(
            SCHTASKS,
            format!("unexpected task name: {}", fields[0]),
        ));
    }
    Ok(fields[2] == RUNNING)
}

fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;
    use crate::identity::Identity;
    use crate::testing::{FakeRunner, exit, ok};

    /// Read the XML handed to `/CREATE /XML <file>` while it still exists
    fn read_create_xml(args: &[String]) -> Option<String> {
        let pos = args.iter().position(|a| a == "/XML")?;
        std::fs::read_to_string(args.get(pos + 1)?).ok()
    }

    fn definition(home: &Path, workdir: &Path) -> ServiceDefinition {
        ServiceDefinition::new(
            "netboot",
            Identity {
                username: "svc".into(),
                uid: "S-1-5-21-1000".into(),
                gid: String::new(),
                home: home.to_path_buf(),
            },
            "/usr/local/bin/netbootd",
            vec!["server".into()],
            Some(workdir.to_path_buf()),
        )
        .unwrap()
    }

    #[test]
    fn running_status_line() {
        let out = r#""\svcname","N/A","Running""#;
        assert!(parse_task_status("svcname", out).unwrap());
    }

    #[test]
    fn ready_status_line() {
        let out = r#""\svcname","3/4/2025 10:00:00 AM","Ready""#;
        assert!(!parse_task_status("svcname", out).unwrap());
    }

    #[test]
    fn two_lines_is_a_protocol_error() {
        let out = "\"\\svcname\",\"N/A\",\"Running\"\r\n\"\\svcname\",\"N/A\",\"Ready\"";
        let err = parse_task_status("svcname", out).unwrap_err();
        assert!(matches!(err, DaemonError::UnexpectedOutput { .. }));
    }

    #[test]
    fn wrong_field_count_is_a_protocol_error() {
        assert!(parse_task_status("svcname", r#""\svcname","Running""#).is_err());
        assert!(parse_task_status("svcname", "").is_err());
    }

    #[test]
    fn foreign_task_name_is_a_protocol_error() {
        let err = parse_task_status("svcname", r#""\other","N/A","Running""#).unwrap_err();
        assert!(err.to_string().contains("unexpected task name"));
    }

    #[test]
    fn new_creates_log_dir_and_appends_log_flag() {
        let home = tempfile::tempdir().unwrap();
        let task = WindowsTask::new(&definition(home.path(), home.path()), SystemRunner).unwrap();
        assert!(home.path().join("logs").is_dir());
        assert_eq!(task.log_file(), home.path().join("logs").join("netboot-task.log"));
        assert!(task.args.starts_with("server -L "));
        assert!(task.args.ends_with("netboot-task.log"));
    }

    #[test]
    fn rendered_xml_has_every_placeholder_filled() {
        let home = tempfile::tempdir().unwrap();
        let task = WindowsTask::new(&definition(home.path(), home.path()), SystemRunner).unwrap();
        let xml = task.task_xml();
        assert!(!xml.contains("UNEXPANDED_XML_PARAM_"));
        assert!(!xml.contains("${"));
        assert!(xml.contains("<UserId>S-1-5-21-1000</UserId>"));
        assert!(xml.contains("<Command>/usr/local/bin/netbootd</Command>"));
        assert!(xml.contains(&format!(
            "<WorkingDirectory>{}</WorkingDirectory>",
            home.path().display()
        )));
    }

    #[test]
    fn install_passes_xml_file_and_removes_temp_dir() {
        let home = tempfile::tempdir().unwrap();
        let seen_xml = RefCell::new(None::<String>);
        let seen_path = RefCell::new(None::<PathBuf>);
        let runner = FakeRunner::new(|_: &str, args: &[String]| {
            if args[0] == "/CREATE" {
                *seen_xml.borrow_mut() = read_create_xml(args);
                *seen_path.borrow_mut() = args.last().map(PathBuf::from);
            }
            Ok(ok(""))
        });
        let task = WindowsTask::new(&definition(home.path(), home.path()), &runner).unwrap();
        task.install().unwrap();

        let line = &runner.command_lines()[0];
        assert!(line.starts_with("schtasks.exe /CREATE /TN netboot /XML "));
        assert!(seen_xml.borrow().as_deref().unwrap().contains("netbootd"));
        let xml_path = seen_path.borrow().clone().unwrap();
        assert!(!xml_path.exists());
        assert!(!xml_path.parent().unwrap().exists());
    }

    #[test]
    fn install_failure_reports_stderr_and_still_cleans_up() {
        let home = tempfile::tempdir().unwrap();
        let seen_path = RefCell::new(None::<PathBuf>);
        let runner = FakeRunner::new(|_: &str, args: &[String]| {
            *seen_path.borrow_mut() = args.last().map(PathBuf::from);
            Ok(exit(1, "ERROR: Cannot create a file when that file already exists."))
        });
        let task = WindowsTask::new(&definition(home.path(), home.path()), &runner).unwrap();
        let err = task.install().unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert!(!seen_path.borrow().clone().unwrap().exists());
    }

    #[test]
    fn lifecycle_against_emulated_scheduler() {
        let home = tempfile::tempdir().unwrap();
        let xml = RefCell::new(None::<String>);
        let running = Cell::new(false);
        let runner = FakeRunner::new(|_: &str, args: &[String]| {
            let missing = || Ok(exit(1, "ERROR: The system cannot find the file specified."));
            match args[0].as_str() {
                "/CREATE" => *xml.borrow_mut() = read_create_xml(args),
                "/DELETE" => {
                    if xml.borrow_mut().take().is_none() {
                        return missing();
                    }
                }
                "/RUN" => running.set(true),
                "/END" => running.set(false),
                "/QUERY" if xml.borrow().is_none() => return missing(),
                "/QUERY" if args.contains(&"ONE".to_string()) => {
                    return Ok(ok(xml.borrow().as_deref().unwrap_or_default()));
                }
                "/QUERY" => {
                    let status = if running.get() { "Running" } else { "Ready" };
                    return Ok(ok(&format!("\"\\netboot\",\"N/A\",\"{status}\"")));
                }
                _ => {}
            }
            Ok(ok("SUCCESS"))
        });
        let workdir = tempfile::tempdir().unwrap();
        let task = WindowsTask::new(&definition(home.path(), workdir.path()), &runner).unwrap();

        assert!(!task.is_installed());
        task.install().unwrap();
        let config = task.config().unwrap();
        assert!(config.contains("/usr/local/bin/netbootd"));
        assert!(config.contains(&workdir.path().display().to_string()));
        assert!(!task.query().unwrap());

        task.start().unwrap();
        assert!(task.query().unwrap());
        task.stop().unwrap();
        assert!(!task.query().unwrap());

        task.start().unwrap();
        task.delete().unwrap();
        assert!(!running.get());
        assert!(task.config().is_err());

        let lines = runner.command_lines();
        let end = lines.iter().rposition(|l| l.contains("/END")).unwrap();
        let delete = lines.iter().position(|l| l.contains("/DELETE")).unwrap();
        assert!(end < delete);
        assert_eq!(lines[delete], "schtasks.exe /DELETE /TN netboot /F");
    }

    #[test]
    fn delete_ignores_failed_end() {
        let home = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new(|_: &str, args: &[String]| match args[0].as_str() {
            "/END" => Ok(exit(1, "ERROR: The task is not running.")),
            _ => Ok(ok("SUCCESS")),
        });
        let task = WindowsTask::new(&definition(home.path(), home.path()), &runner).unwrap();
        task.delete().unwrap();
        assert_eq!(runner.calls().len(), 2);
    }

    #[test]
    fn query_of_missing_task_is_fatal() {
        let home = tempfile::tempdir().unwrap();
        let runner = FakeRunner::new(|_: &str, _: &[String]| {
            Ok(exit(1, "ERROR: The system cannot find the file specified."))
        });
        let task = WindowsTask::new(&definition(home.path(), home.path()), &runner).unwrap();
        assert!(matches!(
            task.query().unwrap_err(),
            DaemonError::CommandFailed { .. }
        ));
    }

    #[test]
    fn xml_special_characters_are_escaped() {
        assert_eq!(xml_escape(r#"a&b <c> "d""#), "a&amp;b &lt;c&gt; &quot;d&quot;");
    }
}
