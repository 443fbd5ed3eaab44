// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fingerprint key derivation: a deterministic symmetric key computed from
// stable environment attributes.
//
// Nothing secret is stored anywhere: the key is recomputed from the
// attributes every time it is needed.  This gives tamper evidence against
// edits to the underlying storage, not confidentiality against someone who
// can run this code on the same device.
//
// Derivation:
//   ikm        = SHA-256(salt | language | standard tz_offset | display)
//   aead_key   = HKDF-SHA256(ikm, info = "safehold/aead")
//   mac_key    = HKDF-SHA256(ikm, info = "safehold/hmac")

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use ring::hkdf;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use safehold_core::config::DEFAULT_FINGERPRINT_SALT;

/// Length of each derived sub-key in bytes.
pub const KEY_LEN: usize = 32;

/// Substituted for any attribute the environment cannot provide.
pub const PLACEHOLDER: &str = "unknown";

const DELIMITER: &str = "|";
const HKDF_SALT: &[u8] = b"safehold/fingerprint-kdf";
const AEAD_INFO: &[u8] = b"safehold/aead";
const MAC_INFO: &[u8] = b"safehold/hmac";

/// Screen properties that rarely change on a given device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplayCharacteristics {
    pub width: u32,
    pub height: u32,
    pub color_depth: u8,
}

/// The environment attributes a key is derived from.
///
/// Callers build this explicitly (or via [`EnvironmentFingerprint::from_process_env`])
/// and pass it in; key derivation never reads global state itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnvironmentFingerprint {
    pub language: Option<String>,
    pub timezone_offset_minutes: Option<i32>,
    pub display: Option<DisplayCharacteristics>,
    /// Versioned domain-separation constant.
    pub salt: String,
}

impl Default for EnvironmentFingerprint {
    fn default() -> Self {
        Self::new(DEFAULT_FINGERPRINT_SALT)
    }
}

impl EnvironmentFingerprint {
    /// A fingerprint with only the salt set; every other attribute will use
    /// the placeholder.
    pub fn new(salt: impl Into<String>) -> Self {
        Self {
            language: None,
            timezone_offset_minutes: None,
            display: None,
            salt: salt.into(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_timezone_offset(mut self, minutes: i32) -> Self {
        self.timezone_offset_minutes = Some(minutes);
        self
    }

    pub fn with_display(mut self, display: DisplayCharacteristics) -> Self {
        self.display = Some(display);
        self
    }

    /// Collect what the current process can see: locale from `LC_ALL`,
    /// `LC_MESSAGES` or `LANG`, and the local zone's standard UTC offset.
    /// Display characteristics are not observable from a plain process and
    /// stay unset.
    pub fn from_process_env(salt: impl Into<String>) -> Self {
        let language = ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|value| !value.is_empty());

        let timezone = standard_offset_minutes(Utc::now().naive_utc(), |utc| {
            Local.offset_from_utc_datetime(&utc).fix().local_minus_utc()
        });

        Self {
            language,
            timezone_offset_minutes: timezone,
            display: None,
            salt: salt.into(),
        }
    }

    /// The delimiter-joined attribute string that gets hashed.
    pub fn canonical_string(&self) -> String {
        let language = self.language.as_deref().unwrap_or(PLACEHOLDER);
        let timezone = self
            .timezone_offset_minutes
            .map(|m| m.to_string())
            .unwrap_or_else(|| PLACEHOLDER.to_owned());
        let display = self
            .display
            .map(|d| format!("{}x{}x{}", d.width, d.height, d.color_depth))
            .unwrap_or_else(|| PLACEHOLDER.to_owned());

        [self.salt.as_str(), language, &timezone, &display].join(DELIMITER)
    }
}

/// Standard (non-daylight) UTC offset in minutes of the zone described by
/// `offset_at`, which maps a UTC instant to seconds east of UTC.
///
/// The zone is sampled at midday on 1 January and 1 July of the year holding
/// `now` and the smaller offset wins, so the result is the same on either
/// side of a daylight-saving transition in both hemispheres.
pub fn standard_offset_minutes(now: NaiveDateTime, offset_at: impl Fn(NaiveDateTime) -> i32) -> Option<i32> {
    let year = now.year();
    let january = NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(12, 0, 0)?;
    let july = NaiveDate::from_ymd_opt(year, 7, 1)?.and_hms_opt(12, 0, 0)?;
    Some(offset_at(january).min(offset_at(july)) / 60)
}

/// The pair of sub-keys derived from a fingerprint.  Zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    aead: [u8; KEY_LEN],
    mac: [u8; KEY_LEN],
}

impl DerivedKey {
    /// Key material for AES-256-GCM.
    pub fn aead_bytes(&self) -> &[u8; KEY_LEN] {
        &self.aead
    }

    /// Key material for HMAC-SHA256.
    pub fn mac_bytes(&self) -> &[u8; KEY_LEN] {
        &self.mac
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("aead", &"[REDACTED]")
            .field("mac", &"[REDACTED]")
            .finish()
    }
}

/// Derive the store key from `fingerprint`.  Pure and infallible.
pub fn derive_key(fingerprint: &EnvironmentFingerprint) -> DerivedKey {
    let mut ikm: [u8; 32] = Sha256::digest(fingerprint.canonical_string().as_bytes()).into();

    let prk = hkdf::Salt::new(hkdf::HKDF_SHA256, HKDF_SALT).extract(&ikm);
    ikm.zeroize();

    let mut key = DerivedKey {
        aead: [0u8; KEY_LEN],
        mac: [0u8; KEY_LEN],
    };
    expand_into(&prk, AEAD_INFO, &mut key.aead);
    expand_into(&prk, MAC_INFO, &mut key.mac);
    key
}

// HKDF-SHA256 can emit up to 8160 bytes, so a 32-byte expansion cannot fail.
fn expand_into(prk: &hkdf::Prk, info: &[u8], out: &mut [u8; KEY_LEN]) {
    let info = [info];
    if let Ok(okm) = prk.expand(&info, hkdf::HKDF_SHA256) {
        let _ = okm.fill(out);
    }
}
