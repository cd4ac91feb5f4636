use serde::ser::{Serialize, SerializeMap, Serializer};

use super::ReceiptRecord;
use crate::error::ReceiptError;

/// Per-image failure recorded in place of a receipt record.
///
/// Serializes as `{"error": "<kind>", "message": "<reason>"}`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ErrorMarker {
    error: String,
    message: String,
}

impl ErrorMarker {
    /// Creates a marker with an explicit kind such as `"parse_error"`.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: kind.into(),
            message: message.into(),
        }
    }

    /// Returns the error kind.
    pub fn kind(&self) -> &str {
        &self.error
    }

    /// Returns the human readable reason.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&ReceiptError> for ErrorMarker {
    fn from(error: &ReceiptError) -> Self {
        Self::new(error.kind(), error.to_string())
    }
}

/// Outcome for a single image in a batch.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum BatchEntry {
    Record(ReceiptRecord),
    Error(ErrorMarker),
}

impl BatchEntry {
    /// Returns the record if extraction succeeded.
    pub fn record(&self) -> Option<&ReceiptRecord> {
        match self {
            Self::Record(record) => Some(record),
            Self::Error(_) => None,
        }
    }

    /// Returns the error marker if extraction failed.
    pub fn error(&self) -> Option<&ErrorMarker> {
        match self {
            Self::Record(_) => None,
            Self::Error(marker) => Some(marker),
        }
    }
}

/// Ordered mapping from image file name to its extraction outcome.
///
/// Entries keep insertion order, which the aggregator makes equal to the
/// image source's enumeration order. Keys are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiptBatch {
    entries: Vec<(String, BatchEntry)>,
}

/// Counts of successes and failures in a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub records: usize,
    pub errors: usize,
}

impl ReceiptBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry under a new file name.
    ///
    /// Returns `false` and leaves the batch unchanged if the name is already taken.
    pub fn insert(&mut self, file_name: impl Into<String>, entry: BatchEntry) -> bool {
        let file_name = file_name.into();
        if self.contains_key(&file_name) {
            return false;
        }
        self.entries.push((file_name, entry));
        true
    }

    /// Records a successfully extracted receipt.
    pub fn insert_record(&mut self, file_name: impl Into<String>, record: ReceiptRecord) -> bool {
        self.insert(file_name, BatchEntry::Record(record))
    }

    /// Records a per-image failure.
    pub fn insert_error(&mut self, file_name: impl Into<String>, error: &ReceiptError) -> bool {
        self.insert(file_name, BatchEntry::Error(ErrorMarker::from(error)))
    }

    /// Returns `true` if the batch already has an entry for `file_name`.
    pub fn contains_key(&self, file_name: &str) -> bool {
        self.entries.iter().any(|(name, _)| name == file_name)
    }

    /// Looks up the entry for a file name.
    pub fn get(&self, file_name: &str) -> Option<&BatchEntry> {
        self.entries
            .iter()
            .find(|(name, _)| name == file_name)
            .map(|(_, entry)| entry)
    }

    /// Iterates over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BatchEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Iterates over successfully extracted records in insertion order.
    pub fn records(&self) -> impl Iterator<Item = (&str, &ReceiptRecord)> {
        self.iter()
            .filter_map(|(name, entry)| entry.record().map(|record| (name, record)))
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the batch has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Counts records and error markers.
    pub fn summary(&self) -> BatchSummary {
        self.entries
            .iter()
            .fold(BatchSummary::default(), |mut acc, (_, entry)| {
                match entry {
                    BatchEntry::Record(_) => acc.records += 1,
                    BatchEntry::Error(_) => acc.errors += 1,
                }
                acc
            })
    }
}

impl Serialize for ReceiptBatch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, entry) in &self.entries {
            map.serialize_entry(name, entry)?;
        }
        map.end()
    }
}
