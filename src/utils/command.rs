//! External command lines.
//!
//! Every external program this tool drives (certificate tool, container
//! runtime, network daemon) is described as a [`CommandLine`] first and only
//! then executed. Keeping the argument vector as plain data lets the callers
//! log it and lets tests compare it without spawning anything.

use log::debug;
use std::fmt;
use std::io;
use std::process::{Command, ExitStatus};

/// Errors raised while running an external command
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Failed to launch `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` exited with {status}")]
    Failed { command: String, status: ExitStatus },
}

/// A program together with its argument vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
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

    /// Run the command to completion with inherited stdio.
    ///
    /// There is no timeout: the external tool decides when it is done.
    pub fn run(&self) -> Result<(), CommandError> {
        debug!("Running: {}", self);

        let status = Command::new(&self.program)
            .args(&self.args)
            .status()
            .map_err(|source| CommandError::Spawn {
                command: self.to_string(),
                source,
            })?;

        if !status.success() {
            return Err(CommandError::Failed {
                command: self.to_string(),
                status,
            });
        }

        Ok(())
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_display() {
        let cmd = CommandLine::new("docker")
            .arg("exec")
            .args(["node-a", "mkdir", "-p", "/dev/net"]);

        assert_eq!(cmd.program, "docker");
        assert_eq!(cmd.args, vec!["exec", "node-a", "mkdir", "-p", "/dev/net"]);
        assert_eq!(cmd.to_string(), "docker exec node-a mkdir -p /dev/net");
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let cmd = CommandLine::new("/nonexistent/meshstarter-test-binary");
        let err = cmd.run().unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_status_is_checked() {
        assert!(CommandLine::new("true").run().is_ok());

        let err = CommandLine::new("false").run().unwrap_err();
        match err {
            CommandError::Failed { command, status } => {
                assert_eq!(command, "false");
                assert!(!status.success());
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
