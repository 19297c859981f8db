//! Test doubles shared by backend tests

use std::cell::RefCell;

use crate::error::Result;
use crate::process::{CommandOutput, CommandRunner};

/// Recorded invocation: program plus arguments
pub(crate) type Call = (String, Vec<String>);

/// Answers each invocation through a closure and remembers what was run
pub(crate) struct FakeRunner<F> {
    respond: F,
    calls: RefCell<Vec<Call>>,
}

impl<F> FakeRunner<F>
where
    F: Fn(&str, &[String]) -> Result<CommandOutput>,
{
    pub(crate) fn new(respond: F) -> Self {
        Self {
            respond,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Invocations rendered as single command lines, for readable assertions
    pub(crate) fn command_lines(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|(program, args)| {
                std::iter::once(program.as_str())
                    .chain(args.iter().map(String::as_str))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect()
    }
}

impl<F> CommandRunner for FakeRunner<F>
where
    F: Fn(&str, &[String]) -> Result<CommandOutput>,
{
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        self.calls
            .borrow_mut()
            .push((program.to_string(), args.to_vec()));
        (self.respond)(program, args)
    }
}

/// Successful exit with the given stdout
pub(crate) fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        code: Some(0),
        stdout: stdout.trim().to_string(),
        stderr: String::new(),
    }
}

/// Failed exit with the given code and stderr
pub(crate) fn exit(code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        code: Some(code),
        stdout: String::new(),
        stderr: stderr.trim().to_string(),
    }
}
