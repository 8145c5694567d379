//! Change records and the pending batch they accumulate into

use crate::error::RecordError;
use crate::field::TrackedField;
use serde::{Deserialize, Serialize};

/// Minimal description of one entity mutation
///
/// Always carries the entity identity; carries a field only when that field
/// changed. Serialized as `{"email": .., "name"?: .., "time_zone"?: ..}`;
/// deserializing applies the same identity check as [`ChangeRecord::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "StoredChangeRecord")]
pub struct ChangeRecord {
    #[serde(rename = "email")]
    identity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time_zone: Option<String>,
}

impl ChangeRecord {
    /// Create a record carrying only an identity
    ///
    /// # Errors
    /// `RecordError::MissingIdentity` if the identity is blank
    pub fn new(identity: impl Into<String>) -> Result<Self, RecordError> {
        let identity = identity.into();
        if identity.trim().is_empty() {
            return Err(RecordError::MissingIdentity);
        }
        Ok(Self {
            identity,
            name: None,
            time_zone: None,
        })
    }

    /// Attach a changed field value
    #[inline]
    #[must_use]
    pub fn with_field(mut self, field: TrackedField, value: impl Into<String>) -> Self {
        let value = Some(value.into());
        match field {
            TrackedField::Name => self.name = value,
            TrackedField::TimeZone => self.time_zone = value,
        }
        self
    }

    /// Stable identity of the changed entity
    #[inline]
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// New value of a field, if it changed
    #[inline]
    #[must_use]
    pub fn get(&self, field: TrackedField) -> Option<&str> {
        match field {
            TrackedField::Name => self.name.as_deref(),
            TrackedField::TimeZone => self.time_zone.as_deref(),
        }
    }

    /// Changed fields with their new values, in record order
    pub fn changed_fields(&self) -> impl Iterator<Item = (TrackedField, &str)> + '_ {
        TrackedField::ALL
            .into_iter()
            .filter_map(move |field| self.get(field).map(|value| (field, value)))
    }

    /// Whether any tracked field changed
    #[inline]
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.name.is_some() || self.time_zone.is_some()
    }
}

#[derive(Deserialize)]
struct StoredChangeRecord {
    email: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    time_zone: Option<String>,
}

impl TryFrom<StoredChangeRecord> for ChangeRecord {
    type Error = RecordError;

    fn try_from(stored: StoredChangeRecord) -> Result<Self, Self::Error> {
        let mut record = Self::new(stored.email)?;
        record.name = stored.name;
        record.time_zone = stored.time_zone;
        Ok(record)
    }
}

/// Ordered, append-only accumulation of change records since the last flush
///
/// No deduplication: two changes to the same entity are two records, so
/// records are told apart by position. Every record ever appended to a store
/// gets the next sequence number; `first_seq` is the sequence number of the
/// first record held here. Only the records are serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingBatch {
    records: Vec<ChangeRecord>,
    #[serde(skip)]
    first_seq: u64,
}

impl PendingBatch {
    /// Create empty batch
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap existing records, keeping their order
    #[inline]
    #[must_use]
    pub fn from_records(records: Vec<ChangeRecord>) -> Self {
        Self {
            records,
            first_seq: 0,
        }
    }

    /// Same records, the first one numbered `first_seq`
    #[inline]
    #[must_use]
    pub fn starting_at(mut self, first_seq: u64) -> Self {
        self.first_seq = first_seq;
        self
    }

    /// Sequence number of the first record
    #[inline]
    #[must_use]
    pub fn first_seq(&self) -> u64 {
        self.first_seq
    }

    /// Sequence number the next appended record will get
    #[inline]
    #[must_use]
    pub fn end_seq(&self) -> u64 {
        self.first_seq + self.records.len() as u64
    }

    /// Number of records
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the batch is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in arrival order
    #[inline]
    #[must_use]
    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    /// Iterate records in arrival order
    pub fn iter(&self) -> std::slice::Iter<'_, ChangeRecord> {
        self.records.iter()
    }

    /// Append records after the existing ones
    pub fn append<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = ChangeRecord>,
    {
        self.records.extend(records);
    }

    /// The records numbered at or after `seq`, keeping their numbering
    #[must_use]
    pub fn since(&self, seq: u64) -> PendingBatch {
        let skip = usize::try_from(seq.saturating_sub(self.first_seq)).unwrap_or(usize::MAX);
        let start = skip.min(self.records.len());
        Self::from_records(self.records[start..].to_vec())
            .starting_at(self.first_seq + start as u64)
    }

    /// Consume into the underlying records
    #[inline]
    #[must_use]
    pub fn into_records(self) -> Vec<ChangeRecord> {
        self.records
    }
}

impl FromIterator<ChangeRecord> for PendingBatch {
    fn from_iter<I: IntoIterator<Item = ChangeRecord>>(iter: I) -> Self {
        Self::from_records(iter.into_iter().collect())
    }
}

impl IntoIterator for PendingBatch {
    type Item = ChangeRecord;
    type IntoIter = std::vec::IntoIter<ChangeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a PendingBatch {
    type Item = &'a ChangeRecord;
    type IntoIter = std::slice::Iter<'a, ChangeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
