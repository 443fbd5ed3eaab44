// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Property tests for the secure store: round trips for arbitrary values and
// TTLs, and purge-on-mutation for arbitrary single-byte edits.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use safehold_bridge::{KeyValueSurface, MemorySurface, SqliteSurface, StorageSurfaces};
use safehold_core::clock::ManualClock;
use safehold_core::config::SecurityConfig;
use safehold_core::types::{StorageMode, StorageScope};
use safehold_security::{EnvironmentFingerprint, GetOptions, PutOptions, SecureStore};

const T0: i64 = 1_700_000_000_000;

fn store_over(persistent: Arc<dyn KeyValueSurface>) -> (SecureStore, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::at_millis(T0));
    let store = SecureStore::new(
        StorageSurfaces::new(persistent, Arc::new(MemorySurface::new())),
        EnvironmentFingerprint::new("proptest-salt").with_language("en-US"),
        &SecurityConfig::default(),
    )
    .with_clock(clock.clone());
    (store, clock)
}

fn mode_strategy() -> impl Strategy<Value = StorageMode> {
    prop_oneof![
        Just(StorageMode::PlainIntegrityChecked),
        Just(StorageMode::EncryptedIntegrityChecked),
    ]
}

proptest! {
    #[test]
    fn round_trip_before_expiry(
        value in prop::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..8),
        note in ".*",
        ttl_ms in 1u64..1_000_000,
        elapsed_fraction in 0.0f64..1.0,
        mode in mode_strategy(),
    ) {
        let (store, clock) = store_over(Arc::new(MemorySurface::new()));
        let payload = (value, note);

        let opts = PutOptions::default().mode(mode).ttl(Duration::from_millis(ttl_ms));
        store.set_item("item", &payload, opts).unwrap();

        let elapsed = ((ttl_ms as f64) * elapsed_fraction) as u64;
        prop_assume!(elapsed < ttl_ms);
        clock.advance(Duration::from_millis(elapsed));

        let back: Option<(BTreeMap<String, i64>, String)> =
            store.get_item("item", GetOptions::default().mode(mode)).unwrap();
        prop_assert_eq!(back, Some(payload));
    }

    #[test]
    fn absent_at_or_after_expiry(ttl_ms in 1u64..1_000_000, extra in 0u64..1_000) {
        let (store, clock) = store_over(Arc::new(MemorySurface::new()));
        store
            .set_item("item", &"v", PutOptions::default().ttl(Duration::from_millis(ttl_ms)))
            .unwrap();

        clock.advance(Duration::from_millis(ttl_ms + extra));
        let back: Option<String> = store.get_item("item", GetOptions::default()).unwrap();
        prop_assert_eq!(back, None);
    }

    #[test]
    fn single_byte_mutation_purges(
        position in any::<prop::sample::Index>(),
        replacement in prop::char::range('!', '~'),
        mode in mode_strategy(),
    ) {
        let surface = Arc::new(MemorySurface::new());
        let (store, _clock) = store_over(surface.clone());
        store
            .set_item("item", &vec![1u32, 2, 3], PutOptions::default().mode(mode))
            .unwrap();

        let original = surface.get("sh:item").unwrap().unwrap();
        let mut bytes = original.clone().into_bytes();
        let i = position.index(bytes.len());
        prop_assume!(bytes[i] != replacement as u8);
        bytes[i] = replacement as u8;
        let mutated = String::from_utf8(bytes).unwrap();
        surface.set("sh:item", &mutated).unwrap();

        let back: Option<Vec<u32>> = store
            .get_item("item", GetOptions::default().mode(mode))
            .unwrap_or(None);
        prop_assert_eq!(back, None);
        prop_assert_eq!(surface.get("sh:item").unwrap(), None);
    }
}

#[test]
fn round_trip_through_sqlite_surface() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");

    {
        let (store, _) = store_over(Arc::new(SqliteSurface::open(&path).unwrap()));
        store
            .set_item("team", &vec!["ops", "sales"], PutOptions::default())
            .unwrap();
    }

    let (store, _) = store_over(Arc::new(SqliteSurface::open(&path).unwrap()));
    let back: Option<Vec<String>> = store.get_item("team", GetOptions::default()).unwrap();
    assert_eq!(back, Some(vec!["ops".to_owned(), "sales".to_owned()]));
    assert_eq!(store.keys(StorageScope::Persistent, None).unwrap(), vec!["team"]);
}
