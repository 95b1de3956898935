//! tc Counter Reader for Net-SNMP
//!
//! tc_readerd runs as a `pass_persist` script under snmpd. A background
//! sampler runs `tc -s qdisc show` and `tc -s class show` for every
//! configured interface and rebuilds an OID tree from the output; the
//! foreground protocol loop answers snmpd's GET and GETNEXT requests from
//! that tree.
//!
//! # Architecture
//!
//! ```text
//! +-----------+  tc -s ... show  +----------+  rebuild   +-----------+
//! |  kernel   |----------------->| Sampler  |----------->| Namespace |
//! |  (tc)     |                  | + parser |  (locked)  | (OID tree)|
//! +-----------+                  +----------+            +-----------+
//!                                                              ^
//! +-----------+  stdin / stdout  +-----------------+   lookup  |
//! |   snmpd   |<---------------->| ProtocolHandler |-----------+
//! +-----------+                  +-----------------+
//! ```
//!
//! # Tree layout
//!
//! Under `.1.3.6.1.4.1.2021.255`:
//!
//! | Leaf | Content |
//! |------|---------|
//! | 1 | index of each qdisc / class |
//! | 2 | number of qdisc / class indexes |
//! | 3 | composite name, e.g. `eth0:2:3` |
//! | 4-7 | sent bytes, sent packets, dropped, over limit |
//! | 8 | index of each configured user |
//! | 9 | number of user indexes |
//! | 10 | user name |
//! | 11-14 | user download counters |
//! | 15-18 | user upload counters |

pub mod config;
pub mod namespace;
pub mod oid;
pub mod parser;
pub mod protocol;
pub mod sampler;
pub mod talker;
pub mod types;

pub use config::{TcReaderConfig, UserConfig, DEFAULT_CONFIG_PATHS};
pub use namespace::{
    Entry, EntryKind, EntryValue, Namespace, RebuildGuard, SharedNamespace, COUNTER_MODULUS,
};
pub use oid::{compare_oids, sort_oids, CounterLeaves, Leaf, ROOT_OID, SELF_ID};
pub use parser::{composite_name, parse_output, StatsKind};
pub use protocol::{ProtocolHandler, Request, SessionStats};
pub use sampler::{Sampler, SamplerHandle, SamplerStats};
pub use talker::{LineTalker, ScriptedTalker, StdioTalker, Talker};
pub use types::{Direction, Sample, SampleSink, UserClass};
