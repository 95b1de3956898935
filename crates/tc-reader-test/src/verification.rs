//! Verification helpers for pass_persist transcripts
//!
//! [`TranscriptVerifier`] walks the lines a protocol session wrote back,
//! one expected response at a time.

use thiserror::Error;

/// Verification error types
#[derive(Error, Debug, PartialEq, Eq)]
pub enum VerificationError {
    #[error("Expected {expected} at line {line}, but the transcript ended")]
    UnexpectedEnd { line: usize, expected: String },

    #[error("Line {line}: expected '{expected}', got '{actual}'")]
    LineMismatch {
        line: usize,
        expected: String,
        actual: String,
    },

    #[error("Expected end of transcript at line {line}, {remaining} lines left")]
    TrailingLines { line: usize, remaining: usize },

    #[error("Line {line}: '{actual}' is not a number")]
    NotANumber { line: usize, actual: String },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Sequential checker over the output of one session
pub struct TranscriptVerifier<'a> {
    lines: &'a [String],
    position: usize,
}

impl<'a> TranscriptVerifier<'a> {
    pub fn new(lines: &'a [String]) -> Self {
        Self { lines, position: 0 }
    }

    /// Index of the next unchecked line
    pub fn position(&self) -> usize {
        self.position
    }

    fn next_line(&mut self, expected: &str) -> VerifyResult<&'a str> {
        let lines = self.lines;
        match lines.get(self.position) {
            Some(line) => {
                self.position += 1;
                Ok(line.as_str())
            }
            None => Err(VerificationError::UnexpectedEnd {
                line: self.position,
                expected: expected.to_string(),
            }),
        }
    }

    fn expect_line(&mut self, expected: &str) -> VerifyResult<()> {
        let line = self.position;
        let actual = self.next_line(expected)?;
        if actual == expected {
            Ok(())
        } else {
            Err(VerificationError::LineMismatch {
                line,
                expected: expected.to_string(),
                actual: actual.to_string(),
            })
        }
    }

    /// Next line is the answer to a PING
    pub fn expect_pong(&mut self) -> VerifyResult<()> {
        self.expect_line("PONG")
    }

    /// Next line is the blank "not found" answer
    pub fn expect_blank(&mut self) -> VerifyResult<()> {
        self.expect_line("")
    }

    /// Next three lines are exactly `oid`, `kind`, `value`
    pub fn expect_entry(&mut self, oid: &str, kind: &str, value: &str) -> VerifyResult<()> {
        self.expect_line(oid)?;
        self.expect_line(kind)?;
        self.expect_line(value)
    }

    /// Next three lines are a counter at `oid` and returns its value
    pub fn expect_counter(&mut self, oid: &str) -> VerifyResult<u64> {
        self.expect_line(oid)?;
        self.expect_line("counter")?;
        let line = self.position;
        let value = self.next_line("a counter value")?;
        value.parse().map_err(|_| VerificationError::NotANumber {
            line,
            actual: value.to_string(),
        })
    }

    /// Every line has been checked
    pub fn expect_end(&self) -> VerifyResult<()> {
        let remaining = self.lines.len().saturating_sub(self.position);
        if remaining == 0 {
            Ok(())
        } else {
            Err(VerificationError::TrailingLines {
                line: self.position,
                remaining,
            })
        }
    }
}

/// Splits a transcript of successful lookups into `(oid, kind, value)`.
///
/// Returns `None` when the line count is not a multiple of three.
pub fn entries(lines: &[String]) -> Option<Vec<(&str, &str, &str)>> {
    if lines.len() % 3 != 0 {
        return None;
    }
    Some(
        lines
            .chunks(3)
            .map(|chunk| (chunk[0].as_str(), chunk[1].as_str(), chunk[2].as_str()))
            .collect(),
    )
}
