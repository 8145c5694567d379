//! Trackable entity fields

use serde::{Deserialize, Serialize};
use std::fmt;

/// Entity field whose changes are carried in a [`ChangeRecord`](crate::ChangeRecord)
///
/// The set is fixed: any other dirty attribute of the entity is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedField {
    /// Display name
    Name,
    /// IANA time zone
    TimeZone,
}

impl TrackedField {
    /// Every tracked field, in record order
    pub const ALL: [TrackedField; 2] = [TrackedField::Name, TrackedField::TimeZone];

    /// Attribute name on the monitored entity
    #[inline]
    #[must_use]
    pub fn attribute(self) -> &'static str {
        match self {
            TrackedField::Name => "name",
            TrackedField::TimeZone => "timezone",
        }
    }

    /// Key under which the field is persisted in a change record
    #[inline]
    #[must_use]
    pub fn record_key(self) -> &'static str {
        match self {
            TrackedField::Name => "name",
            TrackedField::TimeZone => "time_zone",
        }
    }

    /// Resolve an entity attribute name
    #[must_use]
    pub fn from_attribute(attribute: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.attribute() == attribute)
    }
}

impl fmt::Display for TrackedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attribute())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_round_trip() {
        for field in TrackedField::ALL {
            assert_eq!(TrackedField::from_attribute(field.attribute()), Some(field));
        }
        assert_eq!(TrackedField::from_attribute("password"), None);
    }

    #[test]
    fn time_zone_keys_differ() {
        assert_eq!(TrackedField::TimeZone.attribute(), "timezone");
        assert_eq!(TrackedField::TimeZone.record_key(), "time_zone");
    }
}
