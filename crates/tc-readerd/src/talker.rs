//! Line transport between snmpd and the protocol handler.
//!
//! snmpd talks to pass_persist scripts over the script's stdin and stdout,
//! one token per line. [`Talker`] hides the transport so the protocol loop
//! can be driven by a script in tests.

use std::collections::VecDeque;
use std::io::{BufRead, ErrorKind};
use std::thread;

use async_trait::async_trait;
use tc_reader_common::{TcReaderError, TcReaderResult};
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Lines read ahead of the protocol loop.
const LINE_BUFFER: usize = 16;

/// A line-oriented, bidirectional channel.
#[async_trait]
pub trait Talker: Send {
    /// Reads the next line without its terminator.
    ///
    /// `None` on end of input or when the transport cannot be read; the
    /// caller treats both like an empty line. Bytes that are not UTF-8 are
    /// replaced, never an error.
    async fn read_line(&mut self) -> Option<String>;

    /// Writes one line, adding the terminator.
    async fn write_line(&mut self, line: &str) -> TcReaderResult<()>;
}

/// [`Talker`] reading from a blocking reader on its own thread.
///
/// The reader thread forwards raw lines over a channel. Dropping the talker
/// never waits for that thread: a read blocked on an idle peer stays blocked
/// until the peer writes or the process exits.
#[derive(Debug)]
pub struct LineTalker<W> {
    lines: mpsc::Receiver<Vec<u8>>,
    writer: W,
}

/// The production transport: the process's stdin and stdout.
pub type StdioTalker = LineTalker<Stdout>;

impl StdioTalker {
    /// Talks over stdin and stdout.
    pub fn stdio() -> Self {
        LineTalker::spawn(
            std::io::BufReader::new(std::io::stdin()),
            tokio::io::stdout(),
        )
    }
}

impl<W> LineTalker<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Starts the reader thread for `reader` and writes to `writer`.
    pub fn spawn<R>(reader: R, writer: W) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(LINE_BUFFER);
        thread::spawn(move || forward_lines(reader, tx));
        Self { lines: rx, writer }
    }

    /// Gives back the writer.
    pub fn into_writer(self) -> W {
        self.writer
    }
}

/// Reader thread body: raw lines, terminator included, until end of input,
/// a read error, or the talker is dropped.
fn forward_lines<R: BufRead>(mut reader: R, tx: mpsc::Sender<Vec<u8>>) {
    loop {
        let mut line = Vec::new();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(error = %e, "Failed to read from transport");
                break;
            }
        }
    }
    debug!("Line reader exiting");
}

#[async_trait]
impl<W> Talker for LineTalker<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn read_line(&mut self) -> Option<String> {
        let raw = self.lines.recv().await?;
        let text = String::from_utf8_lossy(&raw);
        Some(text.trim_end_matches(['\n', '\r']).to_string())
    }

    async fn write_line(&mut self, line: &str) -> TcReaderResult<()> {
        let mut out = String::with_capacity(line.len() + 1);
        out.push_str(line);
        out.push('\n');
        self.writer
            .write_all(out.as_bytes())
            .await
            .map_err(|e| TcReaderError::transport(format!("write failed: {}", e)))?;
        // snmpd waits for each answer, nothing may sit in a buffer.
        self.writer
            .flush()
            .await
            .map_err(|e| TcReaderError::transport(format!("flush failed: {}", e)))
    }
}

/// Test double replaying a fixed list of input lines and recording output.
///
/// Once the script runs out, reads return `None` like a closed stdin.
#[derive(Debug, Default)]
pub struct ScriptedTalker {
    input: VecDeque<String>,
    output: Vec<String>,
    fail_writes: bool,
}

impl ScriptedTalker {
    /// Creates a talker that will hand out `lines` in order.
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            input: lines.into_iter().map(Into::into).collect(),
            output: Vec::new(),
            fail_writes: false,
        }
    }

    /// Makes every write fail as if the peer had gone away.
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Lines written so far.
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Input lines not consumed yet.
    pub fn remaining_input(&self) -> usize {
        self.input.len()
    }
}

#[async_trait]
impl Talker for ScriptedTalker {
    async fn read_line(&mut self) -> Option<String> {
        self.input.pop_front()
    }

    async fn write_line(&mut self, line: &str) -> TcReaderResult<()> {
        if self.fail_writes {
            return Err(TcReaderError::transport("scripted write failure"));
        }
        self.output.push(line.to_string());
        Ok(())
    }
}
