//! The exported OID tree.
//!
//! [`Namespace`] maps OIDs to typed entries and keeps an ordered key list for
//! GETNEXT. It is rebuilt from scratch on every sampling cycle. Access from
//! the sampler and the protocol handler goes through [`SharedNamespace`],
//! one lock for both readers and the writer, so a query never sees a
//! half-built tree.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::oid::{sort_oids, CounterLeaves, Leaf, ROOT_OID, SELF_ID};
use crate::types::{Sample, SampleSink, UserClass};

/// Counters are exported modulo this bound. Net-SNMP's pass_persist has no
/// Counter64, so values wrap at 31 bits on the way out.
pub const COUNTER_MODULUS: u64 = 1 << 31;

/// SNMP object type of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    String,
    Integer,
    Counter,
}

impl EntryKind {
    /// Type name understood by snmpd on the pass_persist channel.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::String => "string",
            EntryKind::Integer => "integer",
            EntryKind::Counter => "counter",
        }
    }
}

/// Value held by an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryValue {
    Text(String),
    Integer(i64),
    /// Stored at full precision; reduced only when formatted.
    Counter(u64),
}

/// One OID with its declared type and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub kind: EntryKind,
    pub value: EntryValue,
}

impl Entry {
    /// Creates a string entry.
    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: EntryKind::String,
            value: EntryValue::Text(value.into()),
        }
    }

    /// Creates an integer entry.
    pub fn integer(key: impl Into<String>, value: i64) -> Self {
        Self {
            key: key.into(),
            kind: EntryKind::Integer,
            value: EntryValue::Integer(value),
        }
    }

    /// Creates a counter entry.
    pub fn counter(key: impl Into<String>, value: u64) -> Self {
        Self {
            key: key.into(),
            kind: EntryKind::Counter,
            value: EntryValue::Counter(value),
        }
    }

    /// Formats the value for the wire.
    ///
    /// Returns `None` when the value does not match the declared kind.
    pub fn formatted_value(&self) -> Option<String> {
        match (self.kind, &self.value) {
            (EntryKind::String, EntryValue::Text(text)) => Some(text.clone()),
            (EntryKind::Integer, EntryValue::Integer(value)) => Some(value.to_string()),
            (EntryKind::Counter, EntryValue::Counter(value)) => {
                Some((value % COUNTER_MODULUS).to_string())
            }
            _ => None,
        }
    }

    /// The three response lines: OID, type, value.
    pub fn response_lines(&self) -> Option<[String; 3]> {
        let value = self.formatted_value()?;
        Some([self.key.clone(), self.kind.as_str().to_string(), value])
    }
}

/// OID tree with stable index allocation for names and users.
#[derive(Debug)]
pub struct Namespace {
    /// OID -> entry.
    entries: HashMap<String, Entry>,
    /// Every key of `entries`, sorted in walk order after each rebuild.
    ordered_keys: Vec<String>,
    /// Composite qdisc/class name -> assigned index.
    name_index: HashMap<String, u32>,
    last_name_index: u32,
    /// User name -> assigned index.
    user_index: HashMap<String, u32>,
    last_user_index: u32,
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new()
    }
}

impl Namespace {
    /// Creates a namespace holding only the header entries.
    pub fn new() -> Self {
        let mut namespace = Self {
            entries: HashMap::new(),
            ordered_keys: Vec::new(),
            name_index: HashMap::new(),
            last_name_index: 0,
            user_index: HashMap::new(),
            last_user_index: 0,
        };
        namespace.reset();
        namespace.sort_keys();
        namespace
    }

    /// Erases everything and writes the header entries again.
    ///
    /// The header is the self-identification at the root plus the name of
    /// every leaf group. Count leaves get no header; they are written when
    /// the first index of their group is allocated.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.ordered_keys.clear();
        self.name_index.clear();
        self.last_name_index = 0;
        self.user_index.clear();
        self.last_user_index = 0;

        self.insert(Entry::string(ROOT_OID, SELF_ID));
        for leaf in Leaf::ALL.iter().filter(|leaf| !leaf.is_count()) {
            self.insert(Entry::string(leaf.oid(), leaf.name()));
        }
    }

    /// Writes or replaces one entry. A key is only listed once.
    fn insert(&mut self, entry: Entry) {
        if !self.entries.contains_key(&entry.key) {
            self.ordered_keys.push(entry.key.clone());
        }
        self.entries.insert(entry.key.clone(), entry);
    }

    fn put_counters(&mut self, leaves: CounterLeaves, index: u32, sample: &Sample) {
        self.insert(Entry::counter(
            leaves.bytes.child_oid(index),
            sample.sent_bytes,
        ));
        self.insert(Entry::counter(
            leaves.packets.child_oid(index),
            sample.sent_packets,
        ));
        self.insert(Entry::counter(
            leaves.dropped.child_oid(index),
            sample.dropped_packets,
        ));
        self.insert(Entry::counter(
            leaves.over_limit.child_oid(index),
            sample.over_limit_packets,
        ));
    }

    /// Stores a sample under the generic qdisc / class leaves.
    pub fn put_generic(&mut self, sample: &Sample) {
        let index = match self.name_index.get(&sample.name) {
            Some(&index) => index,
            None => {
                self.last_name_index += 1;
                let index = self.last_name_index;
                self.name_index.insert(sample.name.clone(), index);

                self.insert(Entry::integer(Leaf::TcIndex.child_oid(index), index.into()));
                self.insert(Entry::string(Leaf::TcName.child_oid(index), &sample.name));
                self.insert(Entry::integer(
                    Leaf::TcNumIndex.oid(),
                    self.last_name_index.into(),
                ));
                debug!(name = %sample.name, index, "Assigned tc index");
                index
            }
        };

        self.put_counters(CounterLeaves::GENERIC, index, sample);
    }

    /// Stores a sample under the user leaves of `user_class`'s direction.
    pub fn put_user(&mut self, sample: &Sample, user_class: &UserClass) {
        let index = match self.user_index.get(&user_class.name) {
            Some(&index) => index,
            None => {
                self.last_user_index += 1;
                let index = self.last_user_index;
                self.user_index.insert(user_class.name.clone(), index);

                self.insert(Entry::integer(
                    Leaf::TcUserIndex.child_oid(index),
                    index.into(),
                ));
                self.insert(Entry::string(
                    Leaf::TcUserName.child_oid(index),
                    &user_class.name,
                ));
                self.insert(Entry::integer(
                    Leaf::TcUserNumIndex.oid(),
                    self.last_user_index.into(),
                ));
                debug!(user = %user_class.name, index, "Assigned user index");
                index
            }
        };

        self.put_counters(
            CounterLeaves::for_direction(user_class.direction),
            index,
            sample,
        );
    }

    /// Returns the entry stored at `key`.
    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    /// Returns the entry that follows `key` in walk order.
    ///
    /// `None` when `key` is not stored or is the last one.
    pub fn next(&self, key: &str) -> Option<&Entry> {
        if !self.entries.contains_key(key) {
            return None;
        }
        let position = self.ordered_keys.iter().position(|k| k == key)?;
        let next_key = self.ordered_keys.get(position + 1)?;
        self.entries.get(next_key)
    }

    /// Puts the key list into walk order.
    pub fn sort_keys(&mut self) {
        sort_oids(&mut self.ordered_keys);
    }

    /// Keys in their current order.
    pub fn keys(&self) -> &[String] {
        &self.ordered_keys
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is stored, which only happens mid-reset.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index assigned to a composite name in this cycle.
    pub fn name_index(&self, name: &str) -> Option<u32> {
        self.name_index.get(name).copied()
    }

    /// Index assigned to a user in this cycle.
    pub fn user_index(&self, user: &str) -> Option<u32> {
        self.user_index.get(user).copied()
    }
}

impl SampleSink for Namespace {
    fn put(&mut self, sample: Sample) {
        match &sample.user_class {
            Some(user_class) => self.put_user(&sample, user_class),
            None => self.put_generic(&sample),
        }
    }
}

/// The namespace behind its single lock.
///
/// Cloning is cheap and every clone refers to the same tree.
#[derive(Debug, Clone, Default)]
pub struct SharedNamespace {
    inner: Arc<Mutex<Namespace>>,
}

impl SharedNamespace {
    /// Creates a shared namespace holding only the header entries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the lock for a query.
    pub async fn lock(&self) -> MutexGuard<'_, Namespace> {
        self.inner.lock().await
    }

    /// Takes the lock for a full rebuild and erases the tree.
    ///
    /// The returned guard keeps the lock until it is dropped; dropping it
    /// sorts the keys, so no query can observe the unsorted list.
    pub async fn rebuild(&self) -> RebuildGuard<'_> {
        let mut guard = self.inner.lock().await;
        guard.reset();
        RebuildGuard { guard }
    }

    /// Looks up one entry, cloned out of the lock.
    pub async fn get(&self, key: &str) -> Option<Entry> {
        self.lock().await.get(key).cloned()
    }

    /// Looks up the successor of `key`, cloned out of the lock.
    pub async fn next(&self, key: &str) -> Option<Entry> {
        self.lock().await.next(key).cloned()
    }
}

/// Exclusive access to the namespace for one rebuild.
#[derive(Debug)]
pub struct RebuildGuard<'a> {
    guard: MutexGuard<'a, Namespace>,
}

impl Deref for RebuildGuard<'_> {
    type Target = Namespace;

    fn deref(&self) -> &Namespace {
        &self.guard
    }
}

impl DerefMut for RebuildGuard<'_> {
    fn deref_mut(&mut self) -> &mut Namespace {
        &mut self.guard
    }
}

impl Drop for RebuildGuard<'_> {
    fn drop(&mut self) {
        self.guard.sort_keys();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;
    use pretty_assertions::assert_eq;

    fn oid(suffix: &str) -> String {
        format!("{}{}", ROOT_OID, suffix)
    }

    fn header_keys() -> Vec<String> {
        [
            "", ".1", ".3", ".4", ".5", ".6", ".7", ".8", ".10", ".11", ".12", ".13", ".14",
            ".15", ".16", ".17", ".18",
        ]
        .iter()
        .map(|suffix| oid(suffix))
        .collect()
    }

    #[test]
    fn test_new_holds_header_only() {
        let ns = Namespace::new();
        assert_eq!(ns.keys(), header_keys().as_slice());
        assert_eq!(ns.len(), 17);
        assert_eq!(ns.get(ROOT_OID), Some(&Entry::string(ROOT_OID, SELF_ID)));
        assert_eq!(
            ns.get(&oid(".4")),
            Some(&Entry::string(oid(".4"), "sentBytesLeaf"))
        );
    }

    #[test]
    fn test_get_unknown_after_reset() {
        let mut ns = Namespace::new();
        ns.put_generic(&Sample::new("eth0:2:3", 1, 2, 3, 4));
        ns.reset();
        ns.sort_keys();

        assert!(ns.get(&oid(".2")).is_none());
        assert!(ns.get(&oid(".4.1")).is_none());
        assert!(ns.get(&oid(".9")).is_none());
        assert!(ns.get(".1.3.6").is_none());
        assert!(ns.name_index("eth0:2:3").is_none());
    }

    #[test]
    fn test_put_generic() {
        let mut ns = Namespace::new();
        ns.put_generic(&Sample::new("eth0:2:3", 1, 2, 3, 4));
        ns.sort_keys();

        assert_eq!(ns.get(&oid(".1.1")), Some(&Entry::integer(oid(".1.1"), 1)));
        assert_eq!(ns.get(&oid(".2")), Some(&Entry::integer(oid(".2"), 1)));
        assert_eq!(
            ns.get(&oid(".3.1")),
            Some(&Entry::string(oid(".3.1"), "eth0:2:3"))
        );
        assert_eq!(ns.get(&oid(".4.1")), Some(&Entry::counter(oid(".4.1"), 1)));
        assert_eq!(ns.get(&oid(".5.1")), Some(&Entry::counter(oid(".5.1"), 2)));
        assert_eq!(ns.get(&oid(".6.1")), Some(&Entry::counter(oid(".6.1"), 3)));
        assert_eq!(ns.get(&oid(".7.1")), Some(&Entry::counter(oid(".7.1"), 4)));
        assert_eq!(ns.len(), 17 + 7);
        assert_eq!(ns.keys().len(), ns.len());
    }

    #[test]
    fn test_put_generic_reuses_index() {
        let mut ns = Namespace::new();
        ns.put_generic(&Sample::new("eth0:1:0", 1, 1, 1, 1));
        ns.put_generic(&Sample::new("eth0:2:0", 2, 2, 2, 2));
        ns.put_generic(&Sample::new("eth0:1:0", 9, 9, 9, 9));
        ns.sort_keys();

        assert_eq!(ns.name_index("eth0:1:0"), Some(1));
        assert_eq!(ns.name_index("eth0:2:0"), Some(2));
        assert_eq!(ns.get(&oid(".2")), Some(&Entry::integer(oid(".2"), 2)));
        assert_eq!(ns.get(&oid(".4.1")), Some(&Entry::counter(oid(".4.1"), 9)));
        assert!(ns.get(&oid(".1.3")).is_none());

        // No duplicate keys after re-writing counters.
        let mut keys = ns.keys().to_vec();
        keys.dedup();
        assert_eq!(keys.len(), ns.keys().len());
        assert_eq!(ns.keys().len(), ns.len());
    }

    #[test]
    fn test_put_user_both_directions() {
        let mut ns = Namespace::new();
        ns.put(
            Sample::new("eth0:2:3", 1, 2, 3, 4)
                .for_user(UserClass::new(Direction::Upload, "username")),
        );
        ns.put(
            Sample::new("eth1:2:3", 5, 6, 7, 8)
                .for_user(UserClass::new(Direction::Download, "username")),
        );
        ns.sort_keys();

        assert_eq!(ns.user_index("username"), Some(1));
        assert_eq!(ns.get(&oid(".8.1")), Some(&Entry::integer(oid(".8.1"), 1)));
        assert_eq!(ns.get(&oid(".9")), Some(&Entry::integer(oid(".9"), 1)));
        assert_eq!(
            ns.get(&oid(".10.1")),
            Some(&Entry::string(oid(".10.1"), "username"))
        );
        // Download
        assert_eq!(ns.get(&oid(".11.1")), Some(&Entry::counter(oid(".11.1"), 5)));
        assert_eq!(ns.get(&oid(".14.1")), Some(&Entry::counter(oid(".14.1"), 8)));
        // Upload
        assert_eq!(ns.get(&oid(".15.1")), Some(&Entry::counter(oid(".15.1"), 1)));
        assert_eq!(ns.get(&oid(".18.1")), Some(&Entry::counter(oid(".18.1"), 4)));

        // User samples never touch the generic tree.
        assert!(ns.name_index("eth0:2:3").is_none());
        assert!(ns.get(&oid(".2")).is_none());
    }

    #[test]
    fn test_user_and_name_counters_are_independent() {
        let mut ns = Namespace::new();
        ns.put(Sample::new("eth0:4:1", 1, 1, 1, 1));
        ns.put(Sample::new("eth0:4:2", 1, 1, 1, 1));
        ns.put(
            Sample::new("eth0:4:2", 1, 1, 1, 1).for_user(UserClass::new(Direction::Upload, "bob")),
        );

        assert_eq!(ns.name_index("eth0:4:2"), Some(2));
        assert_eq!(ns.user_index("bob"), Some(1));
    }

    #[test]
    fn test_next_walks_in_order() {
        let mut ns = Namespace::new();
        ns.put_generic(&Sample::new("eth0:2:0", 12548819, 124105, 13, 25));
        ns.sort_keys();

        let next = ns.next(ROOT_OID).unwrap();
        assert_eq!(next.key, oid(".1"));
        let next = ns.next(&oid(".1")).unwrap();
        assert_eq!(next.key, oid(".1.1"));
        let next = ns.next(&oid(".1.1")).unwrap();
        assert_eq!(next.key, oid(".2"));
        let next = ns.next(&oid(".4")).unwrap();
        assert_eq!(next, &Entry::counter(oid(".4.1"), 12548819));
    }

    #[test]
    fn test_next_unknown_or_last() {
        let ns = Namespace::new();
        assert!(ns.next(&oid(".2")).is_none());
        assert!(ns.next(".1.3.6").is_none());
        assert!(ns.next(&oid(".18")).is_none());
    }

    #[test]
    fn test_counter_formatting_wraps_at_31_bits() {
        assert_eq!(
            Entry::counter("k", 1 << 31).formatted_value().as_deref(),
            Some("0")
        );
        assert_eq!(
            Entry::counter("k", (1 << 31) + 1).formatted_value().as_deref(),
            Some("1")
        );
        assert_eq!(Entry::counter("k", 9).formatted_value().as_deref(), Some("9"));
        assert_eq!(
            Entry::counter("k", 4791659924490).formatted_value().as_deref(),
            Some((4791659924490u64 % COUNTER_MODULUS).to_string().as_str())
        );
    }

    #[test]
    fn test_formatting_by_kind() {
        assert_eq!(
            Entry::string("k", "eth0:2:0").response_lines(),
            Some(["k".to_string(), "string".to_string(), "eth0:2:0".to_string()])
        );
        assert_eq!(
            Entry::integer("k", 42).response_lines(),
            Some(["k".to_string(), "integer".to_string(), "42".to_string()])
        );
    }

    #[test]
    fn test_kind_value_mismatch_formats_as_none() {
        let entry = Entry {
            key: "k".to_string(),
            kind: EntryKind::Counter,
            value: EntryValue::Text("oops".to_string()),
        };
        assert!(entry.formatted_value().is_none());
        assert!(entry.response_lines().is_none());
    }

    #[tokio::test]
    async fn test_rebuild_guard_sorts_on_drop() {
        let shared = SharedNamespace::new();
        {
            let mut ns = shared.rebuild().await;
            // Index 10 sorts after index 9 only when compared numerically.
            for i in 0..10 {
                ns.put(Sample::new(format!("eth0:{}:0", i), i, i, 0, 0));
            }
        }

        let ns = shared.lock().await;
        let children: Vec<&String> = ns
            .keys()
            .iter()
            .filter(|k| k.starts_with(&format!("{}.1.", ROOT_OID)))
            .collect();
        assert_eq!(children.len(), 10);
        assert_eq!(children[8], &oid(".1.9"));
        assert_eq!(children[9], &oid(".1.10"));
    }

    #[tokio::test]
    async fn test_rebuild_resets_indexes() {
        let shared = SharedNamespace::new();
        {
            let mut ns = shared.rebuild().await;
            ns.put(Sample::new("eth0:1:0", 1, 1, 1, 1));
            ns.put(Sample::new("eth0:2:0", 2, 2, 2, 2));
        }
        {
            let mut ns = shared.rebuild().await;
            ns.put(Sample::new("eth0:2:0", 3, 3, 3, 3));
        }

        assert_eq!(shared.lock().await.name_index("eth0:2:0"), Some(1));
        assert_eq!(
            shared.get(&oid(".3.1")).await,
            Some(Entry::string(oid(".3.1"), "eth0:2:0"))
        );
        assert!(shared.get(&oid(".3.2")).await.is_none());
        assert_eq!(
            shared.next(&oid(".1.1")).await.map(|e| e.key),
            Some(oid(".2"))
        );
    }
}
