//! External command execution.
//!
//! The sampler never spawns processes directly. It goes through the
//! [`CommandExecutor`] trait so the production path ([`SystemCommand`]) and
//! the test path ([`FixtureExecutor`]) share one contract:
//! `execute(path, args) -> output or error`.
//!
//! # Example
//!
//! ```ignore
//! use tc_reader_common::command::{CommandExecutor, SystemCommand, TC_CMD};
//!
//! let args = vec!["-s".to_string(), "qdisc".to_string(), "show".to_string()];
//! let output = SystemCommand.execute(TC_CMD, &args).await?;
//! ```

use std::collections::VecDeque;
use std::process::Stdio;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::process::Command;

use crate::error::{TcReaderError, TcReaderResult};

/// Default path to the `tc` binary.
pub const TC_CMD: &str = "/sbin/tc";

/// Renders a command and its arguments as one line for logs and errors.
pub fn command_line(path: &str, args: &[String]) -> String {
    if args.is_empty() {
        path.to_string()
    } else {
        format!("{} {}", path, args.join(" "))
    }
}

/// Runs an external command and returns its standard output.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Executes `path` with `args`.
    ///
    /// Returns the standard output on a zero exit status. Spawn failures and
    /// non-zero exits are errors.
    async fn execute(&self, path: &str, args: &[String]) -> TcReaderResult<String>;
}

/// Result of running a command to completion.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// The exit code of the command (0 = success, -1 = killed by signal).
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl ExecResult {
    /// Returns true if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Converts into the stdout text, or a `CommandFailed` error.
    pub fn into_output(self, command: String) -> TcReaderResult<String> {
        if self.success() {
            Ok(self.stdout)
        } else {
            Err(TcReaderError::CommandFailed {
                command,
                exit_code: self.exit_code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Executes real processes with `tokio::process`.
///
/// Arguments are passed straight to the program, no shell is involved.
/// No timeout is applied: a hung `tc` stalls the cycle.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommand;

impl SystemCommand {
    /// Runs the command to completion and captures both output streams.
    pub async fn run(&self, path: &str, args: &[String]) -> TcReaderResult<ExecResult> {
        let command = command_line(path, args);
        tracing::debug!(command = %command, "Executing command");

        let output = Command::new(path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| TcReaderError::CommandSpawn {
                command: command.clone(),
                source: e,
            })?;

        let result = ExecResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if result.success() {
            tracing::trace!(command = %command, bytes = result.stdout.len(), "Command succeeded");
        } else {
            tracing::warn!(
                command = %command,
                exit_code = result.exit_code,
                stderr = %result.stderr.trim(),
                "Command failed"
            );
        }

        Ok(result)
    }
}

#[async_trait]
impl CommandExecutor for SystemCommand {
    async fn execute(&self, path: &str, args: &[String]) -> TcReaderResult<String> {
        self.run(path, args)
            .await?
            .into_output(command_line(path, args))
    }
}

/// One recorded call to a [`FixtureExecutor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// The program path.
    pub path: String,
    /// The arguments, in order.
    pub args: Vec<String>,
}

/// A scripted reply handed out by a [`FixtureExecutor`].
#[derive(Debug, Clone)]
pub enum FixtureResponse {
    /// The command succeeds with this standard output.
    Output(String),
    /// The command exits non-zero.
    Failure {
        /// Exit code to report.
        exit_code: i32,
        /// Standard error to report.
        stderr: String,
    },
}

/// Test double that replays fixed outputs in call order.
///
/// Every call consumes the next scripted response and is recorded, so tests
/// can assert both what was run and what the sampler did with the output.
/// Running past the end of the script fails the call.
#[derive(Debug, Default)]
pub struct FixtureExecutor {
    responses: Mutex<VecDeque<FixtureResponse>>,
    invocations: Mutex<Vec<Invocation>>,
}

impl FixtureExecutor {
    /// Creates an executor with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a successful response (builder form).
    pub fn with_output(self, output: impl Into<String>) -> Self {
        self.push_output(output);
        self
    }

    /// Appends a failing response (builder form).
    pub fn with_failure(self, exit_code: i32, stderr: impl Into<String>) -> Self {
        self.push_failure(exit_code, stderr);
        self
    }

    /// Appends a successful response.
    pub fn push_output(&self, output: impl Into<String>) {
        self.responses
            .lock()
            .push_back(FixtureResponse::Output(output.into()));
    }

    /// Appends a failing response.
    pub fn push_failure(&self, exit_code: i32, stderr: impl Into<String>) {
        self.responses.lock().push_back(FixtureResponse::Failure {
            exit_code,
            stderr: stderr.into(),
        });
    }

    /// Returns every call made so far.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().clone()
    }

    /// Number of scripted responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.responses.lock().len()
    }
}

#[async_trait]
impl CommandExecutor for FixtureExecutor {
    async fn execute(&self, path: &str, args: &[String]) -> TcReaderResult<String> {
        self.invocations.lock().push(Invocation {
            path: path.to_string(),
            args: args.to_vec(),
        });

        let command = command_line(path, args);
        match self.responses.lock().pop_front() {
            Some(FixtureResponse::Output(output)) => Ok(output),
            Some(FixtureResponse::Failure { exit_code, stderr }) => {
                Err(TcReaderError::CommandFailed {
                    command,
                    exit_code,
                    stderr,
                })
            }
            None => Err(TcReaderError::CommandFailed {
                command,
                exit_code: -1,
                stderr: "no scripted response left".to_string(),
            }),
        }
    }
}
