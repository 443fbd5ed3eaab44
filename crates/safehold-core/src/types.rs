// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Safehold security layer.

use serde::{Deserialize, Serialize};

/// Which underlying key/value surface an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageScope {
    /// Survives restarts until explicitly cleared or evicted.
    #[default]
    Persistent,
    /// Lives until the logical session ends.
    Session,
}

impl StorageScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Persistent => "persistent",
            Self::Session => "session",
        }
    }
}

impl std::fmt::Display for StorageScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a record is protected at rest.  Both modes carry an integrity tag;
/// there is no untagged mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// HMAC-tagged envelope stored as readable JSON.
    PlainIntegrityChecked,
    /// HMAC-tagged envelope sealed with AES-256-GCM.
    #[default]
    EncryptedIntegrityChecked,
}

impl StorageMode {
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Self::EncryptedIntegrityChecked)
    }
}

/// What the rate limiter does when the store underneath it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitFailurePolicy {
    /// Allow the attempt and log the error.
    #[default]
    FailOpen,
    /// Deny the attempt and log the error.
    FailClosed,
}

/// Broad upload categories, each with its own size ceiling and whitelist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentCategory {
    Image,
    Document,
    Audio,
    Video,
}

impl ContentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Document => "document",
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }

    /// Parse a category name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "image" | "images" => Some(Self::Image),
            "document" | "documents" | "doc" => Some(Self::Document),
            "audio" => Some(Self::Audio),
            "video" | "videos" => Some(Self::Video),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The pipeline step at which an upload was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationFailure {
    /// Zero-byte upload.
    Empty,
    /// Larger than the allowed ceiling.
    TooLarge,
    /// Extension missing or not whitelisted.
    ExtensionNotAllowed,
    /// Declared MIME type not whitelisted for this call.
    TypeNotAllowed,
    /// Extension and declared type disagree.
    ExtensionTypeMismatch,
    /// Leading bytes do not match the declared type.
    SignatureMismatch,
    /// The file head could not be read.
    Unreadable,
}
