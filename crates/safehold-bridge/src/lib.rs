// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Safehold: storage surface abstractions.
//
// Defines the key/value surface trait the security layer writes through, and
// the concrete surfaces the runtime can hand it: SQLite for the persistent
// scope, an in-memory map for the session scope, and a stub for environments
// where storage is disabled.

pub mod memory;
pub mod sqlite;
pub mod stub;
pub mod traits;

use std::path::Path;
use std::sync::Arc;

pub use memory::MemorySurface;
pub use sqlite::SqliteSurface;
pub use stub::UnavailableSurface;
pub use traits::{KeyValueSurface, StorageSurfaces};

/// Build the standard surface pair: a SQLite database at `db_path` for the
/// persistent scope and a fresh in-memory map for the session scope.
///
/// If the database cannot be opened the persistent scope degrades to the
/// stub surface, so writes report `PlatformUnavailable` instead of the whole
/// layer failing to start.
pub fn platform_surfaces(db_path: &Path, session_quota_bytes: Option<usize>) -> StorageSurfaces {
    let persistent: Arc<dyn KeyValueSurface> = match SqliteSurface::open(db_path) {
        Ok(surface) => Arc::new(surface),
        Err(e) => {
            tracing::error!(error = %e, path = %db_path.display(), "persistent storage unavailable");
            Arc::new(UnavailableSurface)
        }
    };

    let session: Arc<dyn KeyValueSurface> = match session_quota_bytes {
        Some(quota) => Arc::new(MemorySurface::with_quota(quota)),
        None => Arc::new(MemorySurface::new()),
    };

    StorageSurfaces::new(persistent, session)
}

/// Both scopes backed by independent in-memory maps.
pub fn in_memory_surfaces() -> StorageSurfaces {
    StorageSurfaces::new(Arc::new(MemorySurface::new()), Arc::new(MemorySurface::new()))
}
