//! Net-SNMP pass_persist request loop.
//!
//! snmpd drives the exchange, one token per line:
//!
//! | Request            | Response                             |
//! |--------------------|--------------------------------------|
//! | `PING`             | `PONG`                               |
//! | `get`, `<oid>`     | `<oid>`, `<type>`, `<value>` or `""` |
//! | `getnext`, `<oid>` | same, for the successor of `<oid>`   |
//! | `""`               | nothing, the loop ends               |
//! | anything else      | `""`                                 |

use tc_reader_common::TcReaderResult;
use tracing::{debug, info, warn};

use crate::namespace::SharedNamespace;
use crate::talker::Talker;

/// Keep-alive request.
pub const PING: &str = "PING";
/// Keep-alive answer.
pub const PONG: &str = "PONG";
pub const GET: &str = "get";
pub const GET_NEXT: &str = "getnext";

/// One request line, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Blank line: snmpd asks us to exit.
    End,
    Ping,
    /// Followed by a key line.
    Get,
    /// Followed by a key line.
    GetNext,
    /// Anything we do not serve, `set` included.
    Unknown(String),
}

impl Request {
    /// Classifies a request line. Matching is exact and case-sensitive.
    pub fn parse(line: &str) -> Self {
        match line {
            "" => Request::End,
            PING => Request::Ping,
            GET => Request::Get,
            GET_NEXT => Request::GetNext,
            other => Request::Unknown(other.to_string()),
        }
    }
}

/// Counts of what one session served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub pings: u64,
    pub gets: u64,
    pub get_nexts: u64,
    /// Lookups answered with a blank line.
    pub misses: u64,
    pub unknown: u64,
}

/// Answers snmpd requests from the shared namespace.
pub struct ProtocolHandler<T> {
    talker: T,
    namespace: SharedNamespace,
    stats: SessionStats,
}

impl<T: Talker> ProtocolHandler<T> {
    pub fn new(talker: T, namespace: SharedNamespace) -> Self {
        Self {
            talker,
            namespace,
            stats: SessionStats::default(),
        }
    }

    /// Serves requests until a blank line or end of input.
    ///
    /// Unknown commands and unknown keys never end the loop. A failed write
    /// does: nobody is listening anymore.
    pub async fn run(&mut self) -> TcReaderResult<()> {
        info!("Serving pass_persist requests");

        loop {
            let Some(line) = self.talker.read_line().await else {
                info!("Transport closed, exiting");
                break;
            };

            match Request::parse(&line) {
                Request::End => {
                    debug!("Received an empty line, exiting");
                    break;
                }
                request => self.handle(request).await?,
            }
        }

        info!(
            pings = self.stats.pings,
            gets = self.stats.gets,
            get_nexts = self.stats.get_nexts,
            misses = self.stats.misses,
            unknown = self.stats.unknown,
            "Session finished"
        );
        Ok(())
    }

    /// Answers one request. [`Request::End`] is a no-op here.
    pub async fn handle(&mut self, request: Request) -> TcReaderResult<()> {
        match request {
            Request::End => Ok(()),
            Request::Ping => {
                self.stats.pings += 1;
                debug!("Received a PING");
                self.talker.write_line(PONG).await
            }
            Request::Get => {
                self.stats.gets += 1;
                let key = self.read_key().await;
                debug!(oid = %key, "Processing GET");
                let lines = self.lookup(&key, false).await;
                self.respond(lines).await
            }
            Request::GetNext => {
                self.stats.get_nexts += 1;
                let key = self.read_key().await;
                debug!(oid = %key, "Processing GETNEXT");
                let lines = self.lookup(&key, true).await;
                self.respond(lines).await
            }
            Request::Unknown(command) => {
                self.stats.unknown += 1;
                info!(command = %command, "Got an unexpected command");
                self.talker.write_line("").await
            }
        }
    }

    /// A missing key line reads as an empty key, which is never stored.
    async fn read_key(&mut self) -> String {
        self.talker.read_line().await.unwrap_or_default()
    }

    /// Looks up `key` (or its successor) and formats the answer under one
    /// lock acquisition.
    async fn lookup(&self, key: &str, successor: bool) -> Option<[String; 3]> {
        let namespace = self.namespace.lock().await;
        let entry = if successor {
            namespace.next(key)
        } else {
            namespace.get(key)
        }?;

        let lines = entry.response_lines();
        if lines.is_none() {
            warn!(
                oid = %entry.key,
                kind = entry.kind.as_str(),
                "Entry value does not match its type"
            );
        }
        lines
    }

    async fn respond(&mut self, lines: Option<[String; 3]>) -> TcReaderResult<()> {
        match lines {
            Some(lines) => {
                for line in &lines {
                    self.talker.write_line(line).await?;
                }
                Ok(())
            }
            None => {
                self.stats.misses += 1;
                self.talker.write_line("").await
            }
        }
    }

    /// What this session has served so far.
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn talker(&self) -> &T {
        &self.talker
    }

    pub fn into_talker(self) -> T {
        self.talker
    }
}
