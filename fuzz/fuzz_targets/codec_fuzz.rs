//! Fuzz test for the entry record decoder.
//!
//! Feeds arbitrary bytes to `EntryCodec::decode` looking for panics and
//! checks that anything it accepts encodes back to the same bytes.
//!
//! Run with: cargo +nightly fuzz run codec_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use tagcache_core::{EntryCodec, HEADER_LEN};

fuzz_target!(|data: &[u8]| {
    match EntryCodec::decode("fuzz", data) {
        Ok(record) => {
            assert_eq!(record.payload.len(), data.len() - HEADER_LEN);
            let reencoded = EntryCodec::encode(record.expires_at, record.payload);
            assert_eq!(reencoded, data, "accepted record must round-trip");

            let header = EntryCodec::decode_header("fuzz", &data[..HEADER_LEN]);
            assert_eq!(header.ok(), Some(record.expires_at));
        }
        Err(e) => {
            // Every rejection is reported as corruption, never a panic.
            assert!(matches!(e, tagcache_core::StorageError::Corrupted { .. }));
        }
    }
});
