// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for key/value storage surfaces.
//
// The security layer never owns storage.  The runtime hands it one surface per
// scope (persistent and session) and every read/write goes through the trait
// below.  Payloads are opaque strings.

use std::sync::Arc;

use safehold_core::error::Result;
use safehold_core::types::StorageScope;

/// A string-keyed store of opaque string payloads.
///
/// Implementations must be shareable across threads; interior locking is the
/// implementation's business.  No ordering is promised between concurrent
/// calls on the same key.
pub trait KeyValueSurface: Send + Sync {
    /// Human-readable surface name used in logs (e.g. "sqlite", "memory").
    fn surface_name(&self) -> &str;

    /// Fetch the payload stored under `key`, or `None` if absent.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous payload.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete `key`.  Deleting an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// Delete every key in the surface.
    fn clear(&self) -> Result<()>;

    /// Enumerate every key currently stored.
    fn keys(&self) -> Result<Vec<String>>;
}

/// The pair of surfaces a store operates on, one per `StorageScope`.
#[derive(Clone)]
pub struct StorageSurfaces {
    persistent: Arc<dyn KeyValueSurface>,
    session: Arc<dyn KeyValueSurface>,
}

impl StorageSurfaces {
    pub fn new(persistent: Arc<dyn KeyValueSurface>, session: Arc<dyn KeyValueSurface>) -> Self {
        Self {
            persistent,
            session,
        }
    }

    /// Pick the surface backing `scope`.
    pub fn for_scope(&self, scope: StorageScope) -> &dyn KeyValueSurface {
        match scope {
            StorageScope::Persistent => self.persistent.as_ref(),
            StorageScope::Session => self.session.as_ref(),
        }
    }
}

impl std::fmt::Debug for StorageSurfaces {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageSurfaces")
            .field("persistent", &self.persistent.surface_name())
            .field("session", &self.session.surface_name())
            .finish()
    }
}
