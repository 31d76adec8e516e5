use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Placeholder stored in `key` / `label` when the feed item did not
/// expose a readable value for that field.
pub const UNRESOLVED: &str = "N/A";

// ------------------------------------------------------------
// Record
// ------------------------------------------------------------
//
// One collected feed item.
//
// `key` is the identity used for deduplication. It may be the
// `UNRESOLVED` placeholder when the item's locator could not be read;
// such records collapse into a single entry (see `UnresolvedKeys`).
//
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Record {
    /// Stable identity (usually a resource locator)
    pub key: String,

    /// Secondary descriptive text
    pub label: String,

    /// Boolean marker (e.g. a verified badge)
    pub flag: bool,
}

impl Record {
    pub fn new(key: impl Into<String>, label: impl Into<String>, flag: bool) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            flag,
        }
    }

    pub fn has_unresolved_key(&self) -> bool {
        self.key == UNRESOLVED
    }
}

// ------------------------------------------------------------
// Dataset
// ------------------------------------------------------------
//
// Ordered, key-unique collection of records.
//
// INVARIANTS:
// - No two records share a `key`
// - Insertion order is preserved, the first occurrence wins
// - Existing entries are never replaced or removed
//
// Serialized as a plain JSON array of records.
//
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    records: Vec<Record>,
    seen: HashSet<String>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `record` unless a record with the same key is already present.
    ///
    /// Returns `true` when the record was added.
    pub fn insert(&mut self, record: Record) -> bool {
        if self.seen.contains(&record.key) {
            return false;
        }
        self.seen.insert(record.key.clone());
        self.records.push(record);
        true
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    pub fn get(&self, key: &str) -> Option<&Record> {
        if !self.contains_key(key) {
            return None;
        }
        self.records.iter().find(|r| r.key == key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.key.as_str())
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.label.as_str())
    }

    pub fn flags(&self) -> impl Iterator<Item = bool> + '_ {
        self.records.iter().map(|r| r.flag)
    }

    /// Three parallel column views over the records, in insertion order.
    pub fn columns(&self) -> Columns {
        Columns {
            keys: self.keys().map(str::to_owned).collect(),
            labels: self.labels().map(str::to_owned).collect(),
            flags: self.flags().collect(),
        }
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

impl FromIterator<Record> for Dataset {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        let mut dataset = Dataset::new();
        dataset.extend(iter);
        dataset
    }
}

impl Extend<Record> for Dataset {
    fn extend<I: IntoIterator<Item = Record>>(&mut self, iter: I) {
        for record in iter {
            self.insert(record);
        }
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl Serialize for Dataset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.records.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Dataset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let records = Vec::<Record>::deserialize(deserializer)?;
        Ok(records.into_iter().collect())
    }
}

// ------------------------------------------------------------
// Column views
// ------------------------------------------------------------
//
// Parallel arrays: index `i` of each column belongs to the same record.
//
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct Columns {
    pub keys: Vec<String>,
    pub labels: Vec<String>,
    pub flags: Vec<bool>,
}
