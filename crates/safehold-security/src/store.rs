// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Integrity-checked, optionally encrypted key/value store.
//
// Write path:
//   record   = {value, created_at, ttl}            (JSON)
//   envelope = {payload: record, tag: HMAC(key || 0 || record)}
//   stored   = envelope                            (plain mode)
//            | hex(nonce || AES-GCM(envelope))     (encrypted mode)
//
// Read path runs the same steps backwards and stops at the first failure:
// decrypt, parse envelope, verify tag, then check TTL.  A decryption or tag
// failure purges the entry; nothing from an unverified envelope is ever
// interpreted.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, error, instrument, warn};

use safehold_bridge::StorageSurfaces;
use safehold_core::clock::{Clock, SystemClock};
use safehold_core::config::SecurityConfig;
use safehold_core::error::{Result, SafeholdError};
use safehold_core::types::{StorageMode, StorageScope};

use crate::audit::{AuditLog, SecurityEvent};
use crate::cipher::EnvelopeCipher;
use crate::fingerprint::{EnvironmentFingerprint, derive_key};
use crate::integrity;

/// A value with its write time and lifetime.  This is the exact structure the
/// integrity tag covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecureRecord<T> {
    pub value: T,
    #[serde(with = "chrono::serde::ts_microseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "ttl_micros", skip_serializing_if = "Option::is_none")]
    pub ttl: Option<Duration>,
}

impl<T> SecureRecord<T> {
    /// Whether the record has reached the end of its lifetime at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        expiry(self.created_at, self.ttl).is_some_and(|deadline| now >= deadline)
    }
}

/// Just the metadata of a record; the value is skipped until the lifetime
/// check passes.
type RecordMeta = SecureRecord<IgnoredAny>;

/// What actually gets written: the serialized record and its tag.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    payload: String,
    tag: String,
}

/// Deadline of a record.  A lifetime too large to represent never expires.
fn expiry(created_at: DateTime<Utc>, ttl: Option<Duration>) -> Option<DateTime<Utc>> {
    let ttl = TimeDelta::from_std(ttl?).ok()?;
    created_at.checked_add_signed(ttl)
}

/// `now` rounded up to the next whole microsecond, the resolution records are
/// stored at.
pub(crate) fn ceil_to_micros(now: DateTime<Utc>) -> DateTime<Utc> {
    let sub_micro = now.timestamp_subsec_nanos() % 1_000;
    if sub_micro == 0 {
        return now;
    }
    now.checked_add_signed(TimeDelta::nanoseconds(i64::from(1_000 - sub_micro)))
        .unwrap_or(now)
}

/// Lifetimes are stored in whole microseconds, the same resolution as
/// `created_at`, rounded up so a record never expires before its deadline.
mod ttl_micros {
    use super::*;

    pub fn serialize<S: Serializer>(ttl: &Option<Duration>, s: S) -> std::result::Result<S::Ok, S::Error> {
        match ttl {
            Some(d) => s.serialize_some(&ceil_micros(*d)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_micros))
    }

    pub(super) fn ceil_micros(d: Duration) -> u64 {
        let micros = d.as_nanos().div_ceil(1_000);
        u64::try_from(micros).unwrap_or(u64::MAX)
    }
}

/// Options for [`SecureStore::set_item`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// Lifetime from the write; `None` never expires.
    pub ttl: Option<Duration>,
    /// `None` uses the store's configured default.
    pub mode: Option<StorageMode>,
    pub scope: StorageScope,
}

impl PutOptions {
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn mode(mut self, mode: StorageMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn scope(mut self, scope: StorageScope) -> Self {
        self.scope = scope;
        self
    }
}

/// Options for [`SecureStore::get_item`].  Mode must match the one used on
/// write; a mismatch reads as tampering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetOptions {
    pub mode: Option<StorageMode>,
    pub scope: StorageScope,
}

impl GetOptions {
    pub fn mode(mut self, mode: StorageMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn scope(mut self, scope: StorageScope) -> Self {
        self.scope = scope;
        self
    }
}

/// Why an entry was dropped on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PurgeReason {
    Decryption,
    MalformedEnvelope,
    TagMismatch,
    MalformedRecord,
    Expired,
}

impl PurgeReason {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Decryption => "decryption failed",
            Self::MalformedEnvelope => "malformed envelope",
            Self::TagMismatch => "integrity tag mismatch",
            Self::MalformedRecord => "malformed record metadata",
            Self::Expired => "expired",
        }
    }
}

/// Tamper-evident key/value store over a pair of storage surfaces.
///
/// The store holds no key material.  Every operation re-derives the key from
/// the environment fingerprint and drops it before returning.
pub struct SecureStore {
    surfaces: StorageSurfaces,
    fingerprint: EnvironmentFingerprint,
    clock: Arc<dyn Clock>,
    key_prefix: String,
    default_mode: StorageMode,
    audit: Option<Arc<AuditLog>>,
}

impl SecureStore {
    /// Create a store using `config`'s prefix and default mode and the system clock.
    pub fn new(
        surfaces: StorageSurfaces,
        fingerprint: EnvironmentFingerprint,
        config: &SecurityConfig,
    ) -> Self {
        Self {
            surfaces,
            fingerprint,
            clock: Arc::new(SystemClock),
            key_prefix: config.key_prefix.clone(),
            default_mode: config.default_mode,
            audit: None,
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Record tamper purges in `audit`.
    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn audit(&self) -> Option<&Arc<AuditLog>> {
        self.audit.as_ref()
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    /// Serialize, tag, optionally encrypt, and write `value` under `key`.
    #[instrument(skip_all, fields(%key, scope = %options.scope))]
    pub fn set_item<T: Serialize>(&self, key: &str, value: &T, options: PutOptions) -> Result<()> {
        let mode = options.mode.unwrap_or(self.default_mode);
        let storage_key = self.storage_key(key);

        let record = SecureRecord {
            value,
            created_at: ceil_to_micros(self.clock.now()),
            ttl: options.ttl,
        };
        let payload = serde_json::to_string(&record)?;

        let derived = derive_key(&self.fingerprint);
        let tag = integrity::sign(&derived, &storage_key, payload.as_bytes());
        let envelope = serde_json::to_string(&Envelope { payload, tag })?;

        let stored = if mode.is_encrypted() {
            let cipher = EnvelopeCipher::new(&derived)?;
            hex::encode(cipher.seal(envelope.as_bytes(), storage_key.as_bytes())?)
        } else {
            envelope
        };

        self.surfaces
            .for_scope(options.scope)
            .set(&storage_key, &stored)
            .inspect_err(|e| error!(error = %e, op = "set", "storage write failed"))?;

        debug!(?mode, bytes = stored.len(), "secure item stored");
        Ok(())
    }

    /// Read `key`, returning `None` if it is absent, tampered with, or expired.
    ///
    /// Errors are reserved for surface failures and for a verified record
    /// whose value does not deserialize as `T`.
    #[instrument(skip_all, fields(%key, scope = %options.scope))]
    pub fn get_item<T: DeserializeOwned>(&self, key: &str, options: GetOptions) -> Result<Option<T>> {
        let mode = options.mode.unwrap_or(self.default_mode);
        let storage_key = self.storage_key(key);

        let Some(stored) = self
            .surfaces
            .for_scope(options.scope)
            .get(&storage_key)
            .inspect_err(|e| error!(error = %e, op = "get", "storage read failed"))?
        else {
            return Ok(None);
        };

        let derived = derive_key(&self.fingerprint);

        let envelope_bytes = match mode {
            StorageMode::PlainIntegrityChecked => stored.into_bytes(),
            StorageMode::EncryptedIntegrityChecked => {
                let opened = integrity::decode_lower_hex(&stored)
                    .ok_or_else(|| SafeholdError::Decryption("not hex".into()))
                    .and_then(|sealed| {
                        EnvelopeCipher::new(&derived)?.open(&sealed, storage_key.as_bytes())
                    });
                match opened {
                    Ok(bytes) => bytes,
                    Err(_) => return self.purge(&storage_key, options.scope, PurgeReason::Decryption),
                }
            }
        };

        let Ok(envelope) = serde_json::from_slice::<Envelope>(&envelope_bytes) else {
            return self.purge(&storage_key, options.scope, PurgeReason::MalformedEnvelope);
        };

        if !integrity::verify(&derived, &storage_key, envelope.payload.as_bytes(), &envelope.tag) {
            return self.purge(&storage_key, options.scope, PurgeReason::TagMismatch);
        }

        let Ok(meta) = serde_json::from_str::<RecordMeta>(&envelope.payload) else {
            return self.purge(&storage_key, options.scope, PurgeReason::MalformedRecord);
        };

        if meta.is_expired(self.clock.now()) {
            return self.purge(&storage_key, options.scope, PurgeReason::Expired);
        }

        let record: SecureRecord<T> = serde_json::from_str(&envelope.payload)?;
        Ok(Some(record.value))
    }

    /// Delete an entry that failed a read check and report it as absent.
    fn purge<T>(&self, storage_key: &str, scope: StorageScope, reason: PurgeReason) -> Result<Option<T>> {
        if let Err(e) = self.surfaces.for_scope(scope).remove(storage_key) {
            error!(error = %e, op = "purge", "failed to remove rejected entry");
        }

        if reason == PurgeReason::Expired {
            debug!("secure item expired and was removed");
            return Ok(None);
        }

        warn!(reason = reason.as_str(), "tamper detected; secure item removed");
        if let Some(audit) = &self.audit {
            if let Err(e) = audit.record(SecurityEvent::TamperPurge, storage_key, Some(reason.as_str())) {
                error!(error = %e, "failed to record tamper event");
            }
        }
        Ok(None)
    }

    /// Delete `key` from `scope`.
    #[instrument(skip_all, fields(%key, %scope))]
    pub fn remove_item(&self, key: &str, scope: StorageScope) -> Result<()> {
        self.surfaces.for_scope(scope).remove(&self.storage_key(key))
    }

    /// Whether an entry exists under `key`.  This does not verify the entry;
    /// a tampered entry reports `true` until the next `get_item` purges it.
    pub fn has_item(&self, key: &str, scope: StorageScope) -> Result<bool> {
        Ok(self
            .surfaces
            .for_scope(scope)
            .get(&self.storage_key(key))?
            .is_some())
    }

    /// Keys owned by this store in `scope`, without the namespace prefix,
    /// optionally restricted to those starting with `prefix`.
    pub fn keys(&self, scope: StorageScope, prefix: Option<&str>) -> Result<Vec<String>> {
        let wanted = prefix.unwrap_or("");
        Ok(self
            .surfaces
            .for_scope(scope)
            .keys()?
            .into_iter()
            .filter_map(|k| k.strip_prefix(self.key_prefix.as_str()).map(str::to_owned))
            .filter(|k| k.starts_with(wanted))
            .collect())
    }

    /// Remove this store's keys from `scope` (only those starting with
    /// `prefix`, when given).  Keys outside the store's namespace are never
    /// touched.  Returns the number of entries removed.
    #[instrument(skip_all, fields(%scope, prefix = prefix.unwrap_or("")))]
    pub fn clear(&self, scope: StorageScope, prefix: Option<&str>) -> Result<usize> {
        let keys = self.keys(scope, prefix)?;
        let surface = self.surfaces.for_scope(scope);
        for key in &keys {
            surface.remove(&self.storage_key(key))?;
        }
        debug!(removed = keys.len(), "secure storage cleared");
        Ok(keys.len())
    }
}
