//! External process execution
//!
//! Every external tool (schema compiler, JSON renderer, stylesheet processor)
//! is run out of process with an explicit argument vector. The
//! [`ProcessRunner`] trait is the seam used to substitute the tools in tests.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

/// A fully described command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Executable to run
    pub program: PathBuf,
    /// Arguments, without the program itself
    pub args: Vec<OsString>,
    /// Extra environment variables
    pub envs: Vec<(OsString, OsString)>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    /// Value following `flag` in the argument list
    pub fn flag_value(&self, flag: &str) -> Option<&Path> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(Path::new)
    }

    /// File name of the program, used in diagnostics
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// What a finished process left behind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Process exited with status zero
    pub success: bool,
    /// Exit code, if the process was not killed by a signal
    pub code: Option<i32>,
    /// Captured stdout followed by stderr
    pub text: String,
}

impl ProcessOutput {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            text: text.into(),
        }
    }

    pub fn failed(code: i32, text: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            text: text.into(),
        }
    }

    /// Diagnostic text when the run should count as failed.
    ///
    /// The exit status decides first. A zero exit still fails when the
    /// captured text contains "error" in any case: the wrapped tools print
    /// some errors without a failing status. This also trips on legitimate
    /// output that merely mentions the word.
    pub fn failure(&self) -> Option<String> {
        if !self.success {
            let status = match self.code {
                Some(code) => format!("exited with status {code}"),
                None => "terminated by signal".to_string(),
            };
            let text = self.text.trim();
            return Some(if text.is_empty() {
                status
            } else {
                format!("{status}: {text}")
            });
        }
        if self.text.to_lowercase().contains("error") {
            return Some(self.text.trim().to_string());
        }
        None
    }
}

/// Runs external processes to completion
pub trait ProcessRunner: fmt::Debug + Send + Sync {
    fn run(&self, invocation: &Invocation) -> std::io::Result<ProcessOutput>;
}

/// Runner backed by `std::process::Command`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> std::io::Result<ProcessOutput> {
        debug!(command = %invocation, "running external tool");

        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .envs(invocation.envs.iter().map(|(k, v)| (k, v)))
            .output()?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(ProcessOutput {
            success: output.status.success(),
            code: output.status.code(),
            text,
        })
    }
}
