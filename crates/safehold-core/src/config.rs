// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Security layer configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SafeholdError};
use crate::types::{ContentCategory, RateLimitFailurePolicy, StorageMode};

const MIB: u64 = 1024 * 1024;

/// Versioned domain-separation constant mixed into the fingerprint key.
/// Bumping the version invalidates every stored entry.
pub const DEFAULT_FINGERPRINT_SALT: &str = "safehold-secure-storage-v1";

/// Persistent security settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Namespace prepended to every store key in the underlying surface.
    pub key_prefix: String,
    /// Salt constant fed into key derivation.
    pub fingerprint_salt: String,
    /// Mode used when a caller does not choose one.
    pub default_mode: StorageMode,
    /// Behaviour of the rate limiter when the store fails.
    pub rate_limit_failure_policy: RateLimitFailurePolicy,
    /// Upload ceilings and defaults.
    pub upload: UploadLimits,
    /// Optional byte capacity for the in-memory session surface.
    pub session_quota_bytes: Option<usize>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            key_prefix: "sh:".into(),
            fingerprint_salt: DEFAULT_FINGERPRINT_SALT.into(),
            default_mode: StorageMode::EncryptedIntegrityChecked,
            rate_limit_failure_policy: RateLimitFailurePolicy::FailOpen,
            upload: UploadLimits::default(),
            session_quota_bytes: None,
        }
    }
}

/// Per-category upload size ceilings, in bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadLimits {
    pub max_image_bytes: u64,
    pub max_document_bytes: u64,
    pub max_audio_bytes: u64,
    pub max_video_bytes: u64,
    /// Whether presets verify magic bytes.
    pub verify_signatures: bool,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_image_bytes: 5 * MIB,
            max_document_bytes: 10 * MIB,
            max_audio_bytes: 25 * MIB,
            max_video_bytes: 100 * MIB,
            verify_signatures: true,
        }
    }
}

impl UploadLimits {
    pub fn max_bytes(&self, category: ContentCategory) -> u64 {
        match category {
            ContentCategory::Image => self.max_image_bytes,
            ContentCategory::Document => self.max_document_bytes,
            ContentCategory::Audio => self.max_audio_bytes,
            ContentCategory::Video => self.max_video_bytes,
        }
    }
}

impl SecurityConfig {
    /// Load settings from a JSON file.  A missing file yields the defaults;
    /// a malformed one is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Write settings as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.key_prefix.is_empty() {
            return Err(SafeholdError::InvalidConfig("key_prefix must not be empty".into()));
        }
        if self.fingerprint_salt.is_empty() {
            return Err(SafeholdError::InvalidConfig(
                "fingerprint_salt must not be empty".into(),
            ));
        }
        for category in [
            ContentCategory::Image,
            ContentCategory::Document,
            ContentCategory::Audio,
            ContentCategory::Video,
        ] {
            if self.upload.max_bytes(category) == 0 {
                return Err(SafeholdError::InvalidConfig(format!(
                    "{category} size ceiling must be greater than zero"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SecurityConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.upload.max_bytes(ContentCategory::Image), 5 * MIB);
        assert_eq!(config.rate_limit_failure_policy, RateLimitFailurePolicy::FailOpen);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SecurityConfig::load(dir.path().join("absent.json")).unwrap();
        assert_eq!(config, SecurityConfig::default());
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("security.json");

        let mut config = SecurityConfig::default();
        config.key_prefix = "tenant42:".into();
        config.upload.max_audio_bytes = 1234;
        config.save(&path).unwrap();

        let loaded = SecurityConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("security.json");
        std::fs::write(&path, r#"{"key_prefix":"app:"}"#).unwrap();

        let loaded = SecurityConfig::load(&path).unwrap();
        assert_eq!(loaded.key_prefix, "app:");
        assert_eq!(loaded.fingerprint_salt, DEFAULT_FINGERPRINT_SALT);
    }

    #[test]
    fn empty_prefix_rejected() {
        let config = SecurityConfig {
            key_prefix: String::new(),
            ..SecurityConfig::default()
        };
        assert!(matches!(config.validate(), Err(SafeholdError::InvalidConfig(_))));
    }

    #[test]
    fn zero_ceiling_rejected() {
        let mut config = SecurityConfig::default();
        config.upload.max_video_bytes = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("video"));
    }
}
