//! Command execution shared by the builders.
//!
//! Every external tool call is described by an [`Invocation`] and executed by
//! a [`CommandRunner`]. Failures carry the tool's stdout and stderr verbatim;
//! nothing is retried or reinterpreted.

use std::fmt;
use std::process::Command;

use crate::types::RecipeError;

/// One external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Human-readable description used in logs and error messages.
    pub description: String,
}

impl Invocation {
    pub fn new(program: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            description: description.into(),
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

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.contains(' ') {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Executes invocations.
pub trait CommandRunner {
    fn run(&self, invocation: &Invocation) -> Result<(), RecipeError>;
}

/// Runs invocations as child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    verbose: bool,
}

impl ProcessRunner {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> Result<(), RecipeError> {
        log::debug!("Running: {}", invocation);
        let output = invocation.to_command().output().map_err(|e| {
            RecipeError::Build(format!(
                "Failed to start {}.\n\n\
                 Error: {}\n\n\
                 Ensure {} is installed and available on PATH.",
                invocation.description, e, invocation.program
            ))
        })?;

        if self.verbose {
            let stdout = String::from_utf8_lossy(&output.stdout);
            for line in stdout.lines() {
                log::debug!("  {}", line);
            }
        }

        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RecipeError::Build(format!(
                "{} failed.\n\n\
                 Command: {}\n\
                 Exit status: {}\n\n\
                 Stdout:\n{}\n\n\
                 Stderr:\n{}",
                invocation.description, invocation, output.status, stdout, stderr
            )));
        }
        Ok(())
    }
}
