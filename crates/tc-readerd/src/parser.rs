//! Parser for `tc -s qdisc show` and `tc -s class show` output.
//!
//! Example qdisc output:
//!
//! ```text
//! qdisc htb 2: parent 1: r2q 10 default 0 direct_packets_stat 42920
//!  Sent 8165477220 bytes 5927088 pkt (dropped 49112, overlimits 9389236 requeues 0)
//!  rate 0bit 0pps backlog 0b 0p requeues 0
//! ```
//!
//! Example class output:
//!
//! ```text
//! class htb 2:1 root rate 3072Kbit ceil 3072Kbit burst 3141b cburst 3141b
//!  Sent 8092853284 bytes 5693309 pkt (dropped 0, overlimits 0 requeues 0)
//!  rate 22528bit 34pps backlog 0b 0p requeues 0
//!  lended: 4348128 borrowed: 0 giants: 0
//! ```
//!
//! Each object is a header line followed at some point by a stats line. The
//! parser remembers the last header and the last stats it saw and emits one
//! [`Sample`] as soon as it holds both.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tc_reader_common::{TcReaderError, TcReaderResult};
use tracing::trace;

use crate::types::{Sample, SampleSink, UserClass};

static QDISC_HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"qdisc ([a-zA-Z_]+) ([0-9a-f]+):").expect("Invalid qdisc header pattern")
});

static CLASS_HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"class ([a-zA-Z_]+) ([0-9a-f]+):([0-9a-f]+)")
        .expect("Invalid class header pattern")
});

static STATS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Sent ([0-9]+) bytes ([0-9]+) pkt \(dropped ([0-9]+), overlimits ([0-9]+)")
        .expect("Invalid stats pattern")
});

/// Which `tc` listing is being parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsKind {
    /// `tc -s qdisc show`: headers carry only the major handle.
    Qdisc,
    /// `tc -s class show`: headers carry major and minor handles.
    Class,
}

impl StatsKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatsKind::Qdisc => "qdisc",
            StatsKind::Class => "class",
        }
    }

    fn header_re(&self) -> &'static Regex {
        match self {
            StatsKind::Qdisc => &QDISC_HEADER_RE,
            StatsKind::Class => &CLASS_HEADER_RE,
        }
    }
}

impl fmt::Display for StatsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
struct Handle {
    major: u32,
    minor: u32,
}

#[derive(Debug, Clone, Copy)]
struct Counters {
    sent_bytes: u64,
    sent_packets: u64,
    dropped_packets: u64,
    over_limit_packets: u64,
}

fn parse_hex(field: &'static str, text: &str) -> TcReaderResult<u32> {
    u32::from_str_radix(text, 16).map_err(|e| TcReaderError::invalid_number(field, text, e))
}

fn parse_counter(field: &'static str, text: &str) -> TcReaderResult<u64> {
    text.parse::<u64>()
        .map_err(|e| TcReaderError::invalid_number(field, text, e))
}

fn capture<'t>(caps: &Captures<'t>, group: usize) -> &'t str {
    caps.get(group).map_or("", |m| m.as_str())
}

fn parse_header(caps: &Captures<'_>, kind: StatsKind) -> TcReaderResult<Handle> {
    let major = parse_hex("major handle", capture(caps, 2))?;
    let minor = match kind {
        StatsKind::Qdisc => 0,
        StatsKind::Class => parse_hex("minor handle", capture(caps, 3))?,
    };
    Ok(Handle { major, minor })
}

fn parse_stats(caps: &Captures<'_>) -> TcReaderResult<Counters> {
    Ok(Counters {
        sent_bytes: parse_counter("sent bytes", capture(caps, 1))?,
        sent_packets: parse_counter("sent packets", capture(caps, 2))?,
        dropped_packets: parse_counter("dropped packets", capture(caps, 3))?,
        over_limit_packets: parse_counter("overlimit packets", capture(caps, 4))?,
    })
}

/// Builds the composite name of a qdisc or class, e.g. `eth0:2:3`.
///
/// Handles are printed in decimal: handle `a:6e` on eth0 is `eth0:10:110`.
pub fn composite_name(iface: &str, major: u32, minor: u32) -> String {
    format!("{}:{}:{}", iface, major, minor)
}

/// Parses one `tc` listing for `iface` and hands every sample to `sink`.
///
/// A sample whose composite name is a key of `users` is emitted twice:
/// once for the generic tree and once carrying its [`UserClass`].
///
/// Samples are handed over as they are found, so on a parse error the sink
/// keeps what was emitted before the failing line. Returns the number of
/// samples emitted.
pub fn parse_output<S>(
    output: &str,
    iface: &str,
    kind: StatsKind,
    users: &HashMap<String, UserClass>,
    sink: &mut S,
) -> TcReaderResult<usize>
where
    S: SampleSink + ?Sized,
{
    let mut pending_header: Option<Handle> = None;
    let mut pending_stats: Option<Counters> = None;
    let mut emitted = 0;

    for line in output.lines() {
        if let Some(caps) = kind.header_re().captures(line) {
            pending_header = Some(parse_header(&caps, kind)?);
        }

        if let Some(caps) = STATS_RE.captures(line) {
            pending_stats = Some(parse_stats(&caps)?);
        }

        let (Some(handle), Some(counters)) = (pending_header, pending_stats) else {
            continue;
        };
        pending_header = None;
        pending_stats = None;

        let sample = Sample::new(
            composite_name(iface, handle.major, handle.minor),
            counters.sent_bytes,
            counters.sent_packets,
            counters.dropped_packets,
            counters.over_limit_packets,
        );
        trace!(kind = %kind, name = %sample.name, bytes = sample.sent_bytes, "Parsed sample");

        let user_sample = users
            .get(&sample.name)
            .map(|user_class| sample.for_user(user_class.clone()));

        sink.put(sample);
        emitted += 1;

        if let Some(user_sample) = user_sample {
            sink.put(user_sample);
            emitted += 1;
        }
    }

    Ok(emitted)
}
