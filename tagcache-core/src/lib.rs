//! TagCache Core - Shared Types
//!
//! Everything adapters and the facade agree on: errors, identifier and tag
//! validation, expiry resolution, the tag index, the entry record codec and
//! configuration. No I/O happens in this crate.

use chrono::{DateTime, Utc};

pub mod codec;
pub mod config;
pub mod entry;
pub mod error;
pub mod expiry;
pub mod tag_index;
pub mod validation;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

pub use codec::{DecodedRecord, EntryCodec, HEADER_LEN, RECORD_VERSION};
pub use config::{CacheOptions, KvConfig, RelationalConfig, TagCacheConfig};
pub use entry::{CacheEntry, FreezeMarker};
pub use error::{
    CacheError, CacheResult, ConfigError, ErrorKind, StorageError, ValidationError,
};
pub use expiry::{is_expired, Clock, ExpirationPolicy, ManualClock, SystemClock};
pub use tag_index::{tag_set, TagDiff, TagIndex, TagSet};
pub use validation::{Validator, DEFAULT_MAX_IDENTIFIER_LENGTH};
