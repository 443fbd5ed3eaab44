// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub surface for environments where storage is disabled (private browsing,
// locked-down kiosks, CI without a data directory).
//
// Every method returns `PlatformUnavailable`.

use safehold_core::error::{Result, SafeholdError};

use crate::traits::KeyValueSurface;

/// Surface that refuses every operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableSurface;

impl KeyValueSurface for UnavailableSurface {
    fn surface_name(&self) -> &str {
        "unavailable (stub)"
    }

    fn get(&self, _key: &str) -> Result<Option<String>> {
        tracing::warn!("KeyValueSurface::get called on unavailable surface");
        Err(SafeholdError::PlatformUnavailable)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<()> {
        tracing::warn!("KeyValueSurface::set called on unavailable surface");
        Err(SafeholdError::PlatformUnavailable)
    }

    fn remove(&self, _key: &str) -> Result<()> {
        Err(SafeholdError::PlatformUnavailable)
    }

    fn clear(&self) -> Result<()> {
        Err(SafeholdError::PlatformUnavailable)
    }

    fn keys(&self) -> Result<Vec<String>> {
        Err(SafeholdError::PlatformUnavailable)
    }
}
