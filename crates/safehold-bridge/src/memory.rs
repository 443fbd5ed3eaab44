// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory surface, used for the session scope and in tests.
//
// An optional byte quota (keys + values) mimics the capacity limit that real
// client storage enforces; writes beyond it fail with `QuotaExceeded`.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use safehold_core::error::{Result, SafeholdError};
use tracing::debug;

use crate::traits::KeyValueSurface;

/// Mutex-guarded ordered map of keys to payloads.
#[derive(Debug, Default)]
pub struct MemorySurface {
    entries: Mutex<BTreeMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// A surface that refuses writes once keys + values exceed `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: Mutex::default(),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| SafeholdError::StorageUnavailable("memory surface lock poisoned".into()))
    }
}

impl KeyValueSurface for MemorySurface {
    fn surface_name(&self) -> &str {
        "memory"
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.lock()?;

        if let Some(limit) = self.quota_bytes {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = used + key.len() + value.len();
            if needed > limit {
                return Err(SafeholdError::QuotaExceeded {
                    key: key.to_owned(),
                    needed,
                    limit,
                });
            }
        }

        entries.insert(key.to_owned(), value.to_owned());
        debug!(key, bytes = value.len(), "memory surface write");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}
