//! Shared types for tc_readerd.
//!
//! A [`Sample`] is what the parser produces for one qdisc or class; a
//! [`UserClass`] marks a sample as belonging to a configured user.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Traffic direction of a user class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Traffic sent by the user.
    Upload,
    /// Traffic received by the user.
    Download,
}

impl Direction {
    /// Returns the direction name used in logs and config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Upload => "upload",
            Direction::Download => "download",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Associates a composite qdisc/class name with a user and a direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserClass {
    /// Which of the user's two counter groups this class feeds.
    pub direction: Direction,
    /// The configured user name.
    pub name: String,
}

impl UserClass {
    /// Creates a new user class.
    pub fn new(direction: Direction, name: impl Into<String>) -> Self {
        Self {
            direction,
            name: name.into(),
        }
    }
}

/// Counters parsed for one qdisc or class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Composite name, e.g. "eth0:2:3" is interface eth0, qdisc 2, class 3.
    pub name: String,
    /// Bytes sent through this qdisc / class.
    pub sent_bytes: u64,
    /// Packets sent through this qdisc / class.
    pub sent_packets: u64,
    /// Packets dropped by this qdisc / class.
    pub dropped_packets: u64,
    /// Packets that exceeded the configured limit.
    pub over_limit_packets: u64,
    /// Set when this sample feeds a configured user instead of the generic tree.
    pub user_class: Option<UserClass>,
}

impl Sample {
    /// Creates a generic sample with no user class.
    pub fn new(
        name: impl Into<String>,
        sent_bytes: u64,
        sent_packets: u64,
        dropped_packets: u64,
        over_limit_packets: u64,
    ) -> Self {
        Self {
            name: name.into(),
            sent_bytes,
            sent_packets,
            dropped_packets,
            over_limit_packets,
            user_class: None,
        }
    }

    /// Returns a copy of this sample routed to the given user.
    pub fn for_user(&self, user_class: UserClass) -> Self {
        Self {
            user_class: Some(user_class),
            ..self.clone()
        }
    }
}

/// Receives samples as the parser emits them.
///
/// The namespace implements this to store samples as they arrive, which is
/// what leaves a partially rebuilt tree behind when a cycle aborts halfway.
pub trait SampleSink {
    /// Stores one sample.
    fn put(&mut self, sample: Sample);
}

impl SampleSink for Vec<Sample> {
    fn put(&mut self, sample: Sample) {
        self.push(sample);
    }
}
