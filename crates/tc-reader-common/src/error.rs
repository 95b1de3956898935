//! Error types for tc_reader operations.
//!
//! All errors implement `std::error::Error` via `thiserror`. None of them is
//! fatal in steady state: the sampler logs and retries on the next tick, and
//! the protocol handler answers with a blank line.

use std::io;
use std::num::ParseIntError;
use thiserror::Error;

/// Result type alias for tc_reader operations.
pub type TcReaderResult<T> = Result<T, TcReaderError>;

/// Errors that can occur while sampling, configuring or serving data.
#[derive(Debug, Error)]
pub enum TcReaderError {
    /// The external command could not be started at all.
    #[error("Failed to execute command '{command}': {source}")]
    CommandSpawn {
        /// The command line that failed to start.
        command: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The external command ran but exited with a non-zero status.
    #[error("Command failed: '{command}' (exit code {exit_code}): {stderr}")]
    CommandFailed {
        /// The command line that failed.
        command: String,
        /// The exit code, -1 when the process was killed by a signal.
        exit_code: i32,
        /// Captured standard error.
        stderr: String,
    },

    /// A numeric field in command output did not fit its type.
    #[error("Invalid {field} value '{value}': {source}")]
    InvalidNumber {
        /// Name of the field being parsed (e.g. "sent bytes").
        field: &'static str,
        /// The offending text.
        value: String,
        /// The parse error.
        #[source]
        source: ParseIntError,
    },

    /// Configuration could not be loaded or failed validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The protocol transport went away.
    #[error("Transport error: {0}")]
    Transport(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl TcReaderError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Creates an invalid number error for the given field.
    pub fn invalid_number(field: &'static str, value: &str, source: ParseIntError) -> Self {
        Self::InvalidNumber {
            field,
            value: value.to_string(),
            source,
        }
    }

    /// Returns true if this error may go away on its own by the next cycle.
    ///
    /// A command that ran and failed (device briefly missing, tc busy) is
    /// transient. A command that cannot even be spawned or output we cannot
    /// parse will keep failing until someone fixes the deployment.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TcReaderError::CommandFailed { .. })
    }
}
