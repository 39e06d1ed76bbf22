//! Binary record format for adapters that store an entry as one blob.
//!
//! Layout:
//! - Byte 0: format version (currently 1)
//! - Bytes 1-8: expiry as little-endian unix milliseconds, `i64::MIN` for never
//! - Bytes 9..: payload, untouched
//!
//! The fixed header lets an adapter read only the first [`HEADER_LEN`]
//! bytes to answer `has` without transferring the payload.

use chrono::DateTime;

use crate::error::StorageError;
use crate::Timestamp;

/// Current record version.
pub const RECORD_VERSION: u8 = 1;

/// Size of the fixed header preceding the payload.
pub const HEADER_LEN: usize = 9;

const NEVER_EXPIRES: i64 = i64::MIN;

/// A decoded record borrowing its payload from the raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedRecord<'a> {
    pub expires_at: Option<Timestamp>,
    pub payload: &'a [u8],
}

/// Pass-through codec: payload bytes are stored verbatim behind the header.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryCodec;

impl EntryCodec {
    /// Encode a record.
    pub fn encode(expires_at: Option<Timestamp>, payload: &[u8]) -> Vec<u8> {
        let millis = expires_at
            .map(|at| at.timestamp_millis())
            .unwrap_or(NEVER_EXPIRES);

        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.push(RECORD_VERSION);
        bytes.extend_from_slice(&millis.to_le_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    /// Decode a full record.
    ///
    /// `identifier` only labels the error.
    pub fn decode<'a>(identifier: &str, bytes: &'a [u8]) -> Result<DecodedRecord<'a>, StorageError> {
        let expires_at = Self::decode_header(identifier, bytes)?;
        Ok(DecodedRecord {
            expires_at,
            payload: &bytes[HEADER_LEN..],
        })
    }

    /// Decode only the header. Extra trailing bytes are ignored.
    pub fn decode_header(identifier: &str, bytes: &[u8]) -> Result<Option<Timestamp>, StorageError> {
        if bytes.len() < HEADER_LEN {
            return Err(StorageError::corrupted(
                identifier,
                format!("record is {} bytes, header needs {}", bytes.len(), HEADER_LEN),
            ));
        }
        if bytes[0] != RECORD_VERSION {
            return Err(StorageError::corrupted(
                identifier,
                format!("unknown record version {}", bytes[0]),
            ));
        }

        let millis_bytes: [u8; 8] = bytes[1..HEADER_LEN]
            .try_into()
            .map_err(|_| StorageError::corrupted(identifier, "truncated expiry"))?;
        let millis = i64::from_le_bytes(millis_bytes);
        if millis == NEVER_EXPIRES {
            return Ok(None);
        }

        DateTime::from_timestamp_millis(millis)
            .map(Some)
            .ok_or_else(|| {
                StorageError::corrupted(identifier, format!("expiry {} out of range", millis))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_encode_layout() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let bytes = EntryCodec::encode(Some(at), b"abc");
        assert_eq!(bytes.len(), HEADER_LEN + 3);
        assert_eq!(bytes[0], RECORD_VERSION);
        assert_eq!(&bytes[1..9], &1_700_000_000_123i64.to_le_bytes());
        assert_eq!(&bytes[9..], b"abc");
    }

    #[test]
    fn test_decode_never_expiring() {
        let bytes = EntryCodec::encode(None, b"payload");
        let record = EntryCodec::decode("id", &bytes).expect("record should decode");
        assert_eq!(record.expires_at, None);
        assert_eq!(record.payload, b"payload");
    }

    #[test]
    fn test_decode_empty_payload() {
        let bytes = EntryCodec::encode(None, b"");
        let record = EntryCodec::decode("id", &bytes).expect("record should decode");
        assert!(record.payload.is_empty());
    }

    #[test]
    fn test_short_record_is_corrupted() {
        let err = EntryCodec::decode("short", &[RECORD_VERSION, 0, 0]).expect_err("must fail");
        assert!(matches!(err, StorageError::Corrupted { ref identifier, .. } if identifier == "short"));
    }

    #[test]
    fn test_unknown_version_is_corrupted() {
        let mut bytes = EntryCodec::encode(None, b"x");
        bytes[0] = 9;
        assert!(EntryCodec::decode("id", &bytes).is_err());
    }

    #[test]
    fn test_header_only_read() {
        let at = Utc.timestamp_millis_opt(1_000).unwrap();
        let bytes = EntryCodec::encode(Some(at), b"a long payload that is not needed");
        let header = EntryCodec::decode_header("id", &bytes[..HEADER_LEN]).expect("header decodes");
        assert_eq!(header, Some(at));
    }
}
