//! Captured tc outputs and request scripts
//!
//! Every [`TcScenario`] pairs one qdisc listing and one class listing of
//! `eth0` with the samples a parser must produce from them, in order.

/// Counters expected for one composite name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedSample {
    /// Composite name, handles in decimal (e.g. "eth0:4:10" for class 4:a)
    pub name: &'static str,
    pub sent_bytes: u64,
    pub sent_packets: u64,
    pub dropped_packets: u64,
    pub over_limit_packets: u64,
}

impl ExpectedSample {
    const fn new(
        name: &'static str,
        sent_bytes: u64,
        sent_packets: u64,
        dropped_packets: u64,
        over_limit_packets: u64,
    ) -> Self {
        Self {
            name,
            sent_bytes,
            sent_packets,
            dropped_packets,
            over_limit_packets,
        }
    }

    /// The four counters in leaf order: bytes, packets, dropped, over limit.
    pub fn counters(&self) -> [u64; 4] {
        [
            self.sent_bytes,
            self.sent_packets,
            self.dropped_packets,
            self.over_limit_packets,
        ]
    }
}

/// A pair of tc listings for one interface
#[derive(Debug, Clone, Copy)]
pub struct TcScenario {
    /// Short description used in assertion messages
    pub description: &'static str,
    /// Interface the listings belong to
    pub iface: &'static str,
    /// Output of `tc -s qdisc show dev <iface>`
    pub qdisc_output: &'static str,
    /// Output of `tc -s class show dev <iface>`
    pub class_output: &'static str,
    /// Generic samples from the qdisc listing followed by the class listing
    pub expected: &'static [ExpectedSample],
}

impl TcScenario {
    /// Finds the expected sample for a composite name.
    pub fn expected(&self, name: &str) -> Option<&'static ExpectedSample> {
        self.expected.iter().find(|sample| sample.name == name)
    }
}

/// Output of a tc command that printed nothing
pub const NO_OUTPUT: &str = "";

/// Qdisc listing with custom qdiscs, including hex handles a: and 6e:
pub const QDISC_CUSTOM: &str = "\
qdisc dsmark 1: root refcnt 2 indices 0x0010 default_index 0x0000
 Sent 12548819 bytes 124105 pkt (dropped 13, overlimits 25 requeues 0)
 rate 0bit 0pps backlog 0b 0p requeues 0
qdisc htb 2: parent 1: r2q 10 default 0 direct_packets_stat 42920
 Sent 12548819 bytes 24106 pkt (dropped 128, overlimits 29 requeues 0)
 rate 0bit 0pps backlog 0b 0p requeues 0
qdisc sfq a: parent 2:1 limit 127p quantum 1514b perturb 10sec
 Sent 123432 bytes 1027 pkt (dropped 11, overlimits 2048 requeues 0)
 rate 0bit 0pps backlog 0b 0p requeues 0
qdisc sfq 6e: parent 2:2 limit 127p quantum 1514b perturb 10sec
 Sent 9397865 bytes 102745 pkt (dropped 0, overlimits 0 requeues 0)
 rate 0bit 0pps backlog 0b 0p requeues 0
";

/// Class listing matching [`QDISC_CUSTOM`]
pub const CLASS_CUSTOM: &str = "\
class htb 2:1 root rate 3072Kbit ceil 3072Kbit burst 3141b cburst 3141b
 Sent 931528 bytes 9571 pkt (dropped 127, overlimits 25 requeues 0)
 rate 22528bit 34pps backlog 0b 0p requeues 0
 lended: 4348128 borrowed: 0 giants: 0
 tokens: 124922 ctokens: 124922

class htb 2:2 parent 2:1 leaf 6e: prio 0 rate 614400bit ceil 614400bit burst 1907b cburst 1907b
 Sent 11630676 bytes 114607 pkt (dropped 13, overlimits 5211 requeues 0)
 rate 0bit 0pps backlog 0b 0p requeues 0
 lended: 0 borrowed: 0 giants: 0
 tokens: 388171 ctokens: 388171

class htb 4:1 root rate 1024Kbit ceil 1024Kbit burst 1599b cburst 1599b
 Sent 11601665 bytes 114364 pkt (dropped 0, overlimits 0 requeues 0)
 rate 0bit 0pps backlog 0b 0p requeues 0
 lended: 114364 borrowed: 0 giants: 0
 tokens: 195312 ctokens: 195312

class htb 4:a parent 4:1 prio 0 rate 512Kbit ceil 1024Kbit burst 1599b cburst 1599b
 Sent 1096857 bytes 7059 pkt (dropped 0, overlimits 0 requeues 0)
 rate 0bit 0pps backlog 0b 0p requeues 0
 lended: 7059 borrowed: 0 giants: 0
 tokens: 390625 ctokens: 195312

class htb 4:6e parent 4:1 prio 0 rate 512Kbit ceil 1024Kbit burst 1599b cburst 1599b
 Sent 256 bytes 13 pkt (dropped 7, overlimits 0 requeues 0)
 rate 0bit 0pps backlog 0b 0p requeues 0
 lended: 13 borrowed: 0 giants: 0
 tokens: 390625 ctokens: 195312
";

/// Qdisc listing with counters that do not fit in 32 bits
pub const QDISC_LARGE_VALUES: &str = "\
qdisc htb 1: root refcnt 2 r2q 10 default 0 direct_packets_stat 0
 Sent 4791659924490 bytes 4791659924491 pkt (dropped 4791659924492, overlimits 4791659924493 requeues 0)
 rate 0bit 0pps backlog 0b 0p requeues 0
";

/// Class listing with counters that do not fit in 32 bits
pub const CLASS_LARGE_VALUES: &str = "\
class htb 2:1 root rate 100Mbit ceil 100Mbit burst 1600b cburst 1600b
 Sent 4791659924495 bytes 4791659924496 pkt (dropped 4791659924497, overlimits 4791659924498 requeues 0)
 rate 0bit 0pps backlog 0b 0p requeues 0
 lended: 0 borrowed: 0 giants: 0
";

/// The qdisc the kernel installs when nothing is configured
pub const QDISC_DEFAULT: &str = "\
qdisc pfifo_fast 0: root refcnt 2 bands 3 priomap  1 2 2 2 1 2 0 0 1 1 1 1 1 1 1 1
 Sent 8214 bytes 48 pkt (dropped 0, overlimits 10 requeues 0)
 rate 0bit 0pps backlog 0b 0p requeues 0
";

/// Custom qdiscs and classes
pub const CUSTOM: TcScenario = TcScenario {
    description: "custom qdiscs and classes",
    iface: "eth0",
    qdisc_output: QDISC_CUSTOM,
    class_output: CLASS_CUSTOM,
    expected: &[
        ExpectedSample::new("eth0:1:0", 12548819, 124105, 13, 25),
        ExpectedSample::new("eth0:2:0", 12548819, 24106, 128, 29),
        ExpectedSample::new("eth0:10:0", 123432, 1027, 11, 2048),
        ExpectedSample::new("eth0:110:0", 9397865, 102745, 0, 0),
        ExpectedSample::new("eth0:2:1", 931528, 9571, 127, 25),
        ExpectedSample::new("eth0:2:2", 11630676, 114607, 13, 5211),
        ExpectedSample::new("eth0:4:1", 11601665, 114364, 0, 0),
        ExpectedSample::new("eth0:4:10", 1096857, 7059, 0, 0),
        ExpectedSample::new("eth0:4:110", 256, 13, 7, 0),
    ],
};

/// 64-bit counters
pub const LARGE_VALUES: TcScenario = TcScenario {
    description: "large values",
    iface: "eth0",
    qdisc_output: QDISC_LARGE_VALUES,
    class_output: CLASS_LARGE_VALUES,
    expected: &[
        ExpectedSample::new(
            "eth0:1:0",
            4791659924490,
            4791659924491,
            4791659924492,
            4791659924493,
        ),
        ExpectedSample::new(
            "eth0:2:1",
            4791659924495,
            4791659924496,
            4791659924497,
            4791659924498,
        ),
    ],
};

/// Default qdisc, no classes
pub const DEFAULT_QDISC: TcScenario = TcScenario {
    description: "default qdisc and no classes",
    iface: "eth0",
    qdisc_output: QDISC_DEFAULT,
    class_output: NO_OUTPUT,
    expected: &[ExpectedSample::new("eth0:0:0", 8214, 48, 0, 10)],
};

/// tc printed nothing at all
pub const EMPTY: TcScenario = TcScenario {
    description: "no output",
    iface: "eth0",
    qdisc_output: NO_OUTPUT,
    class_output: NO_OUTPUT,
    expected: &[],
};

/// Every scenario, for table-driven tests
pub const ALL_SCENARIOS: [TcScenario; 4] = [CUSTOM, LARGE_VALUES, DEFAULT_QDISC, EMPTY];

/// Builds the line sequence snmpd would send.
#[derive(Debug, Clone, Default)]
pub struct RequestScript {
    lines: Vec<String>,
}

impl RequestScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep-alive request
    pub fn ping(mut self) -> Self {
        self.lines.push("PING".to_string());
        self
    }

    /// GET for `oid`
    pub fn get(mut self, oid: impl Into<String>) -> Self {
        self.lines.push("get".to_string());
        self.lines.push(oid.into());
        self
    }

    /// GETNEXT for `oid`
    pub fn get_next(mut self, oid: impl Into<String>) -> Self {
        self.lines.push("getnext".to_string());
        self.lines.push(oid.into());
        self
    }

    /// Any other line, sent verbatim
    pub fn raw(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    /// The blank line that tells us to exit
    pub fn end(mut self) -> Self {
        self.lines.push(String::new());
        self
    }

    pub fn build(self) -> Vec<String> {
        self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenarios_have_unique_names() {
        for scenario in ALL_SCENARIOS {
            let mut names: Vec<&str> = scenario.expected.iter().map(|s| s.name).collect();
            names.sort_unstable();
            names.dedup();
            assert_eq!(
                names.len(),
                scenario.expected.len(),
                "{}",
                scenario.description
            );
        }
    }

    #[test]
    fn test_expected_lookup() {
        let sample = CUSTOM.expected("eth0:4:10").unwrap();
        assert_eq!(sample.counters(), [1096857, 7059, 0, 0]);
        assert!(CUSTOM.expected("eth0:4:a").is_none());
    }

    #[test]
    fn test_request_script() {
        let lines = RequestScript::new()
            .ping()
            .get(".1.3.6")
            .get_next(".1.3.6")
            .raw("set")
            .end()
            .build();
        assert_eq!(
            lines,
            vec!["PING", "get", ".1.3.6", "getnext", ".1.3.6", "set", ""]
        );
    }
}
