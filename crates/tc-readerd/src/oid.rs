//! OID layout and ordering.
//!
//! The SNMP daemon walks our tree with GETNEXT and expects OIDs in numeric
//! order, component by component, with a parent sorting before its
//! children. OIDs are stored as strings, so they have to be compared
//! numerically: a plain string compare puts `.255.10` before `.255.9`.

use std::cmp::Ordering;

use crate::types::Direction;

/// Root of the tree exported by tc_readerd.
pub const ROOT_OID: &str = ".1.3.6.1.4.1.2021.255";

/// Value stored at [`ROOT_OID`] to identify this process.
pub const SELF_ID: &str = "tc_reader by mumak@";

/// Fixed leaf groups directly under [`ROOT_OID`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Leaf {
    /// Indexes assigned to qdiscs and classes.
    TcIndex = 1,
    /// Count of assigned qdisc / class indexes.
    TcNumIndex = 2,
    /// Composite names of qdiscs and classes.
    TcName = 3,
    SentBytes = 4,
    SentPkt = 5,
    DroppedPkt = 6,
    OverLimitPkt = 7,
    /// Indexes assigned to configured users.
    TcUserIndex = 8,
    /// Count of assigned user indexes.
    TcUserNumIndex = 9,
    /// Configured user names.
    TcUserName = 10,
    TcUserDownBytes = 11,
    TcUserDownPkt = 12,
    TcUserDownDroppedPkt = 13,
    TcUserDownOverLimitPkt = 14,
    TcUserUpBytes = 15,
    TcUserUpPkt = 16,
    TcUserUpDroppedPkt = 17,
    TcUserUpOverLimitPkt = 18,
}

impl Leaf {
    /// All leaves in numeric order.
    pub const ALL: [Leaf; 18] = [
        Leaf::TcIndex,
        Leaf::TcNumIndex,
        Leaf::TcName,
        Leaf::SentBytes,
        Leaf::SentPkt,
        Leaf::DroppedPkt,
        Leaf::OverLimitPkt,
        Leaf::TcUserIndex,
        Leaf::TcUserNumIndex,
        Leaf::TcUserName,
        Leaf::TcUserDownBytes,
        Leaf::TcUserDownPkt,
        Leaf::TcUserDownDroppedPkt,
        Leaf::TcUserDownOverLimitPkt,
        Leaf::TcUserUpBytes,
        Leaf::TcUserUpPkt,
        Leaf::TcUserUpDroppedPkt,
        Leaf::TcUserUpOverLimitPkt,
    ];

    /// The leaf's component under the root.
    pub fn number(self) -> u32 {
        self as u32
    }

    /// Descriptive name stored at the leaf itself.
    pub fn name(self) -> &'static str {
        match self {
            Leaf::TcIndex => "tcIndexLeaf",
            Leaf::TcNumIndex => "tcNumIndexLeaf",
            Leaf::TcName => "tcNameLeaf",
            Leaf::SentBytes => "sentBytesLeaf",
            Leaf::SentPkt => "sentPktLeaf",
            Leaf::DroppedPkt => "droppedPktLeaf",
            Leaf::OverLimitPkt => "overLimitPktLeaf",
            Leaf::TcUserIndex => "tcUserIndexLeaf",
            Leaf::TcUserNumIndex => "tcUserNumIndexLeaf",
            Leaf::TcUserName => "tcUserNameLeaf",
            Leaf::TcUserDownBytes => "tcUserDownBytesLeaf",
            Leaf::TcUserDownPkt => "tcUserDownPktLeaf",
            Leaf::TcUserDownDroppedPkt => "tcUserDownDroppedPktLeaf",
            Leaf::TcUserDownOverLimitPkt => "tcUserDownOverLimitPktLeaf",
            Leaf::TcUserUpBytes => "tcUserUpBytesLeaf",
            Leaf::TcUserUpPkt => "tcUserUpPktLeaf",
            Leaf::TcUserUpDroppedPkt => "tcUserUpDroppedPktLeaf",
            Leaf::TcUserUpOverLimitPkt => "tcUserUpOverLimitPktLeaf",
        }
    }

    /// Count leaves hold a single integer instead of a name and children.
    pub fn is_count(self) -> bool {
        matches!(self, Leaf::TcNumIndex | Leaf::TcUserNumIndex)
    }

    /// OID of the leaf itself, e.g. `.1.3.6.1.4.1.2021.255.4`.
    pub fn oid(self) -> String {
        format!("{}.{}", ROOT_OID, self.number())
    }

    /// OID of one indexed child, e.g. `.1.3.6.1.4.1.2021.255.4.1`.
    pub fn child_oid(self, index: u32) -> String {
        format!("{}.{}.{}", ROOT_OID, self.number(), index)
    }
}

/// The four counter leaves written for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterLeaves {
    pub bytes: Leaf,
    pub packets: Leaf,
    pub dropped: Leaf,
    pub over_limit: Leaf,
}

impl CounterLeaves {
    /// Counters of generic qdiscs and classes.
    pub const GENERIC: CounterLeaves = CounterLeaves {
        bytes: Leaf::SentBytes,
        packets: Leaf::SentPkt,
        dropped: Leaf::DroppedPkt,
        over_limit: Leaf::OverLimitPkt,
    };

    /// Counters of a user's upload classes.
    pub const USER_UPLOAD: CounterLeaves = CounterLeaves {
        bytes: Leaf::TcUserUpBytes,
        packets: Leaf::TcUserUpPkt,
        dropped: Leaf::TcUserUpDroppedPkt,
        over_limit: Leaf::TcUserUpOverLimitPkt,
    };

    /// Counters of a user's download classes.
    pub const USER_DOWNLOAD: CounterLeaves = CounterLeaves {
        bytes: Leaf::TcUserDownBytes,
        packets: Leaf::TcUserDownPkt,
        dropped: Leaf::TcUserDownDroppedPkt,
        over_limit: Leaf::TcUserDownOverLimitPkt,
    };

    /// Counter leaves for the given user direction.
    pub fn for_direction(direction: Direction) -> Self {
        match direction {
            Direction::Upload => Self::USER_UPLOAD,
            Direction::Download => Self::USER_DOWNLOAD,
        }
    }
}

/// Splits an OID into numeric components. Anything non-numeric, including
/// the empty component before a leading dot, counts as 0.
fn components(oid: &str) -> Vec<u64> {
    oid.split('.')
        .map(|part| part.parse::<u64>().unwrap_or(0))
        .collect()
}

/// Compares two OIDs in SNMP walk order.
///
/// The longer OID is walked against the shorter one, with missing
/// components of the shorter one read as 0. The first differing component
/// decides. When every compared component matches, the shorter OID sorts
/// first, so `.1.3.6` comes before `.1.3.6.1`.
pub fn compare_oids(first: &str, second: &str) -> Ordering {
    let first_parts = components(first);
    let second_parts = components(second);

    // Always walk the longer against the shorter; remember if we swapped.
    let (longer, shorter, inverted) = if first_parts.len() < second_parts.len() {
        (&second_parts, &first_parts, true)
    } else {
        (&first_parts, &second_parts, false)
    };

    for (i, &long_value) in longer.iter().enumerate() {
        let short_value = shorter.get(i).copied().unwrap_or(0);
        if long_value == short_value {
            continue;
        }
        let first_is_less = if inverted {
            long_value > short_value
        } else {
            long_value < short_value
        };
        return if first_is_less {
            Ordering::Less
        } else {
            Ordering::Greater
        };
    }

    first_parts.len().cmp(&second_parts.len())
}

/// Sorts OIDs in place in SNMP walk order.
pub fn sort_oids(oids: &mut [String]) {
    oids.sort_by(|a, b| compare_oids(a, b));
}
