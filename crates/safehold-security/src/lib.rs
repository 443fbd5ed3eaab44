// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// safehold-security: tamper-evident client-side storage.
//
// Provides the fingerprint key deriver, the integrity-checked encrypted store
// built on it, the fixed-window rate limiter built on the store, and an
// append-only audit trail of security events.

pub mod audit;
pub mod cipher;
pub mod fingerprint;
pub mod integrity;
pub mod rate_limit;
pub mod store;

// PUBLIC API: Re-export the security primitives
pub use audit::{AuditEntry, AuditLog, SecurityEvent};
pub use cipher::EnvelopeCipher;
pub use fingerprint::{DerivedKey, DisplayCharacteristics, EnvironmentFingerprint, derive_key};
pub use integrity::hash_reader;
pub use rate_limit::{
    RateLimitDecision, RateLimitStatus, RateLimitWindow, RateLimiter, check_client_rate_limit,
};
pub use store::{GetOptions, PutOptions, SecureRecord, SecureStore};
