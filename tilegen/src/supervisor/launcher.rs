//! Launcher command lines for worker programs.

use std::fmt;
use std::process::Stdio;

use tokio::process::Command;

use super::SupervisorError;
use crate::worker::WorkerTemplate;

/// Command line that executes a worker program piped to its stdin.
///
/// Examples: `python3 -u -`, `sh -s`,
/// `docker exec -i tools python3 -u -`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerLauncher {
    program: String,
    args: Vec<String>,
}

impl WorkerLauncher {
    pub fn new<I, S>(argv: I) -> Result<Self, SupervisorError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut argv = argv.into_iter().map(Into::into);
        match argv.next() {
            Some(program) if !program.trim().is_empty() => Ok(Self {
                program,
                args: argv.collect(),
            }),
            _ => Err(SupervisorError::EmptyLauncher),
        }
    }

    /// Splits a command line on whitespace. No shell quoting is applied.
    pub fn parse(command_line: &str) -> Result<Self, SupervisorError> {
        Self::new(command_line.split_whitespace())
    }

    /// The template's own launcher.
    pub fn for_template(template: &dyn WorkerTemplate) -> Result<Self, SupervisorError> {
        Self::new(template.default_launcher())
    }

    /// Wraps `inner` in `docker exec -i <container>`.
    pub fn in_container(container: &str, inner: &WorkerLauncher) -> Self {
        let mut args = vec!["exec".to_string(), "-i".to_string(), container.to_string()];
        args.push(inner.program.clone());
        args.extend(inner.args.iter().cloned());
        Self {
            program: "docker".to_string(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Command with all three standard streams piped.
    pub(crate) fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

impl fmt::Display for WorkerLauncher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}
