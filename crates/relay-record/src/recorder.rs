//! Mutation-to-record conversion

use crate::error::RecordError;
use crate::field::TrackedField;
use crate::record::ChangeRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// An entity whose mutations are batched
///
/// Dirtiness is judged by the entity layer; the recorder only asks.
pub trait MonitoredEntity {
    /// Stable identity (e.g. email address)
    fn identity(&self) -> &str;

    /// Whether the field was modified by the triggering mutation
    fn is_dirty(&self, field: TrackedField) -> bool;

    /// Current value of the field
    fn value(&self, field: TrackedField) -> Option<&str>;
}

/// A completed mutation as reported by the entity layer
///
/// Carries `(identity, dirty field names, field values)`; attribute names are
/// entity-side names such as `name` or `timezone`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationEvent {
    /// Stable identity of the mutated entity
    pub identity: String,
    /// Attribute names modified by the mutation
    pub dirty_fields: BTreeSet<String>,
    /// Attribute values after the mutation
    pub values: BTreeMap<String, String>,
}

impl MutationEvent {
    /// Create event for an entity with nothing dirty yet
    #[inline]
    #[must_use]
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            ..Self::default()
        }
    }

    /// Record a modified attribute and its new value
    #[inline]
    #[must_use]
    pub fn with_change(mut self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        let attribute = attribute.into();
        self.dirty_fields.insert(attribute.clone());
        self.values.insert(attribute, value.into());
        self
    }

    /// Record an unmodified attribute value
    #[inline]
    #[must_use]
    pub fn with_value(mut self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(attribute.into(), value.into());
        self
    }

    /// Flag an attribute dirty without supplying a value
    #[inline]
    #[must_use]
    pub fn mark_dirty(mut self, attribute: impl Into<String>) -> Self {
        self.dirty_fields.insert(attribute.into());
        self
    }
}

impl MonitoredEntity for MutationEvent {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn is_dirty(&self, field: TrackedField) -> bool {
        self.dirty_fields.contains(field.attribute())
    }

    fn value(&self, field: TrackedField) -> Option<&str> {
        self.values.get(field.attribute()).map(String::as_str)
    }
}

/// Builds minimal change records
///
/// Stateless; never touches the batch store.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeRecorder;

impl ChangeRecorder {
    /// Create new recorder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Record the identity plus every dirty tracked field
    ///
    /// # Errors
    /// - `RecordError::MissingIdentity` if the entity has a blank identity
    /// - `RecordError::MissingValue` if a dirty tracked field has no value
    pub fn record<E>(&self, entity: &E) -> Result<ChangeRecord, RecordError>
    where
        E: MonitoredEntity + ?Sized,
    {
        let mut record = ChangeRecord::new(entity.identity())?;

        for field in TrackedField::ALL {
            if !entity.is_dirty(field) {
                continue;
            }
            let value = entity.value(field).ok_or_else(|| RecordError::MissingValue {
                identity: entity.identity().to_string(),
                field,
            })?;
            record = record.with_field(field, value);
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_includes_only_dirty_fields() {
        let event = MutationEvent::new("a@example.com")
            .with_change("name", "New Name")
            .with_value("timezone", "UTC");

        let record = ChangeRecorder::new().record(&event).unwrap();
        assert_eq!(record.get(TrackedField::Name), Some("New Name"));
        assert_eq!(record.get(TrackedField::TimeZone), None);
    }

    #[test]
    fn recorder_keeps_identity_when_nothing_tracked_changed() {
        let event = MutationEvent::new("a@example.com").with_change("password", "hunter2");

        let record = ChangeRecorder::new().record(&event).unwrap();
        assert_eq!(record.identity(), "a@example.com");
        assert!(!record.has_changes());
    }

    #[test]
    fn recorder_rejects_missing_identity() {
        let event = MutationEvent::new("").with_change("name", "Nobody");
        assert_eq!(
            ChangeRecorder::new().record(&event),
            Err(RecordError::MissingIdentity)
        );
    }

    #[test]
    fn recorder_rejects_dirty_field_without_value() {
        let event = MutationEvent::new("a@example.com").mark_dirty("timezone");
        let err = ChangeRecorder::new().record(&event).unwrap_err();
        assert!(matches!(
            err,
            RecordError::MissingValue {
                field: TrackedField::TimeZone,
                ..
            }
        ));
    }

    struct Predicate {
        dirty_name: bool,
    }

    impl MonitoredEntity for Predicate {
        fn identity(&self) -> &str {
            "p@example.com"
        }

        fn is_dirty(&self, field: TrackedField) -> bool {
            field == TrackedField::Name && self.dirty_name
        }

        fn value(&self, field: TrackedField) -> Option<&str> {
            match field {
                TrackedField::Name => Some("Grace"),
                TrackedField::TimeZone => Some("America/New_York"),
            }
        }
    }

    #[test]
    fn recorder_consults_dirty_predicate() {
        let recorder = ChangeRecorder::new();

        let clean = recorder.record(&Predicate { dirty_name: false }).unwrap();
        assert!(!clean.has_changes());

        let dirty = recorder.record(&Predicate { dirty_name: true }).unwrap();
        assert_eq!(dirty.changed_fields().collect::<Vec<_>>(), [(TrackedField::Name, "Grace")]);
    }
}
