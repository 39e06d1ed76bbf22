//! Cache entries and the durable freeze marker.

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::expiry::is_expired;
use crate::tag_index::TagSet;
use crate::Timestamp;

/// A stored `(identifier, payload, tags, expiry)` record.
///
/// The payload is opaque: the engine never looks inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub identifier: String,
    pub payload: Vec<u8>,
    pub tags: TagSet,
    /// `None` never expires.
    pub expires_at: Option<Timestamp>,
}

impl CacheEntry {
    pub fn new(
        identifier: impl Into<String>,
        payload: impl Into<Vec<u8>>,
        tags: TagSet,
        expires_at: Option<Timestamp>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            payload: payload.into(),
            tags,
            expires_at,
        }
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        is_expired(now, self.expires_at)
    }
}

/// Durable record that a namespace has been frozen.
///
/// Written by the freeze controller through the adapter so that any other
/// process attaching to the same namespace starts out frozen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreezeMarker {
    pub frozen_at: Timestamp,
    pub entry_count: u64,
}

impl FreezeMarker {
    pub fn new(frozen_at: Timestamp, entry_count: u64) -> Self {
        Self {
            frozen_at,
            entry_count,
        }
    }

    pub fn to_json(&self) -> Result<String, StorageError> {
        serde_json::to_string(self).map_err(|e| StorageError::Serialization {
            reason: format!("freeze marker: {}", e),
        })
    }

    pub fn to_json_value(&self) -> Result<serde_json::Value, StorageError> {
        serde_json::to_value(self).map_err(|e| StorageError::Serialization {
            reason: format!("freeze marker: {}", e),
        })
    }

    /// Decode a stored marker. A marker that exists but cannot be read is
    /// corruption, not absence.
    pub fn from_json(raw: &str) -> Result<Self, StorageError> {
        serde_json::from_str(raw).map_err(|e| StorageError::corrupted("<freeze marker>", e))
    }

    pub fn from_json_value(value: serde_json::Value) -> Result<Self, StorageError> {
        serde_json::from_value(value).map_err(|e| StorageError::corrupted("<freeze marker>", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag_index::tag_set;
    use chrono::{TimeDelta, Utc};

    #[test]
    fn test_entry_expiry() {
        let now = Utc::now();
        let entry = CacheEntry::new("id", b"payload".to_vec(), tag_set(["a"]), Some(now));
        assert!(entry.is_expired(now));
        assert!(!entry.is_expired(now - TimeDelta::seconds(1)));

        let forever = CacheEntry::new("id", b"payload".to_vec(), TagSet::new(), None);
        assert!(!forever.is_expired(now + TimeDelta::days(365)));
    }

    #[test]
    fn test_marker_json_roundtrip() {
        let marker = FreezeMarker::new(Utc::now(), 42);
        let json = marker.to_json().expect("marker should encode");
        assert_eq!(FreezeMarker::from_json(&json).expect("marker should decode"), marker);

        let value = marker.to_json_value().expect("marker should encode");
        assert_eq!(
            FreezeMarker::from_json_value(value).expect("marker should decode"),
            marker
        );
    }

    #[test]
    fn test_garbled_marker_is_corruption() {
        let err = FreezeMarker::from_json("{not json").expect_err("garbage must not decode");
        assert!(matches!(err, StorageError::Corrupted { .. }));
    }
}
