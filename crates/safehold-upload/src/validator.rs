// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Upload validation pipeline.
//
// Checks run in a fixed order and stop at the first failure:
//
//   1. size (non-empty, within the ceiling)
//   2. name sanitization (always succeeds)
//   3. extension whitelist
//   4. declared-type whitelist
//   5. extension / declared-type consistency
//   6. magic-byte signature, when enabled and a signature is registered
//
// The file's contents beyond the first `HEAD_LEN` bytes are never read, and
// nothing about the contents is logged.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use safehold_core::config::UploadLimits;
use safehold_core::types::{ContentCategory, ValidationFailure};

use crate::rules::{self, CategoryRules};
use crate::sanitize::sanitize_filename_at;
use crate::signatures::{self, HEAD_LEN, SignatureCheck};
use crate::source::UploadSource;

/// Caller-supplied limits for one validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOptions {
    pub max_size: u64,
    /// Whitelisted MIME types; `type/*` wildcards allowed.
    pub allowed_types: Vec<String>,
    /// Whitelisted extensions, lowercase, without the dot.
    pub allowed_extensions: Vec<String>,
    pub verify_signature: bool,
}

impl ValidationOptions {
    pub fn new(max_size: u64) -> Self {
        Self {
            max_size,
            allowed_types: Vec::new(),
            allowed_extensions: Vec::new(),
            verify_signature: true,
        }
    }

    /// The preset whitelists for `category`, with the ceiling from `limits`.
    pub fn for_category(category: ContentCategory, limits: &UploadLimits) -> Self {
        let preset = CategoryRules::for_category(category);
        Self {
            max_size: limits.max_bytes(category),
            allowed_types: preset.types.iter().map(|t| (*t).to_owned()).collect(),
            allowed_extensions: preset.extensions.iter().map(|e| (*e).to_owned()).collect(),
            verify_signature: limits.verify_signatures,
        }
    }

    pub fn allow_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_types.extend(types.into_iter().map(Into::into));
        self
    }

    pub fn allow_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_extensions.extend(
            extensions
                .into_iter()
                .map(|e| e.into().trim_start_matches('.').to_ascii_lowercase()),
        );
        self
    }

    pub fn verify_signature(mut self, verify: bool) -> Self {
        self.verify_signature = verify;
        self
    }
}

/// Outcome of a validation.  `error` and `failure` are set exactly when
/// `valid` is false; `sanitized_filename` is always set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub error: Option<String>,
    pub failure: Option<ValidationFailure>,
    pub sanitized_filename: String,
    /// The declared type, normalized, once it has passed every check.
    pub detected_type: Option<String>,
    /// Whether magic bytes were actually compared.
    pub signature_checked: bool,
}

impl ValidationResult {
    fn reject(
        sanitized_filename: String,
        failure: ValidationFailure,
        message: String,
        signature_checked: bool,
    ) -> Self {
        Self {
            valid: false,
            error: Some(message),
            failure: Some(failure),
            sanitized_filename,
            detected_type: None,
            signature_checked,
        }
    }
}

/// Run the full pipeline against `file`.
pub fn validate_uploaded_file<S>(file: &S, options: &ValidationOptions) -> ValidationResult
where
    S: UploadSource + ?Sized,
{
    validate_uploaded_file_at(file, options, Utc::now())
}

/// [`validate_uploaded_file`] with an explicit timestamp, used only if the
/// name sanitizes to nothing.
#[instrument(skip_all, fields(size = file.size(), declared = file.declared_type()))]
pub fn validate_uploaded_file_at<S>(
    file: &S,
    options: &ValidationOptions,
    now: DateTime<Utc>,
) -> ValidationResult
where
    S: UploadSource + ?Sized,
{
    let sanitized = sanitize_filename_at(file.file_name(), now);
    let result = run_pipeline(file, options, sanitized);
    match result.failure {
        Some(failure) => warn!(?failure, file = %result.sanitized_filename, "upload rejected"),
        None => debug!(
            file = %result.sanitized_filename,
            signature_checked = result.signature_checked,
            "upload accepted"
        ),
    }
    result
}

fn run_pipeline<S>(file: &S, options: &ValidationOptions, sanitized: String) -> ValidationResult
where
    S: UploadSource + ?Sized,
{
    let size = file.size();
    if size == 0 {
        return ValidationResult::reject(
            sanitized,
            ValidationFailure::Empty,
            "File is empty".into(),
            false,
        );
    }
    if size > options.max_size {
        let message = format!(
            "File size {} exceeds the {} limit",
            format_file_size(size),
            format_file_size(options.max_size)
        );
        return ValidationResult::reject(sanitized, ValidationFailure::TooLarge, message, false);
    }

    let extension = rules::extension_of(&sanitized);
    let extension_allowed = extension
        .as_deref()
        .is_some_and(|ext| options.allowed_extensions.iter().any(|a| a.eq_ignore_ascii_case(ext)));
    if !extension_allowed {
        let message = match &extension {
            Some(ext) => format!("File extension .{ext} is not allowed"),
            None => "File has no extension".to_owned(),
        };
        return ValidationResult::reject(
            sanitized,
            ValidationFailure::ExtensionNotAllowed,
            message,
            false,
        );
    }
    // Guarded by `extension_allowed`.
    let extension = extension.unwrap_or_default();

    let declared = rules::normalize_mime(file.declared_type());
    if !rules::type_allowed(&options.allowed_types, &declared) {
        let shown = if declared.is_empty() { "(none)" } else { declared.as_str() };
        return ValidationResult::reject(
            sanitized,
            ValidationFailure::TypeNotAllowed,
            format!("File type {shown} is not allowed"),
            false,
        );
    }

    if !rules::extension_matches_type(&extension, &declared) {
        return ValidationResult::reject(
            sanitized,
            ValidationFailure::ExtensionTypeMismatch,
            format!("File extension .{extension} does not match declared type {declared}"),
            false,
        );
    }

    let mut signature_checked = false;
    if options.verify_signature {
        if signatures::has_signature(&declared) {
            let head = match file.read_head(HEAD_LEN) {
                Ok(head) => head,
                Err(e) => {
                    warn!(error = %e, "could not read upload head");
                    return ValidationResult::reject(
                        sanitized,
                        ValidationFailure::Unreadable,
                        "File contents could not be read".into(),
                        false,
                    );
                }
            };
            signature_checked = true;
            if signatures::check_signature(&declared, &head) == SignatureCheck::Mismatch {
                return ValidationResult::reject(
                    sanitized,
                    ValidationFailure::SignatureMismatch,
                    "File content does not match declared type".into(),
                    true,
                );
            }
        } else {
            debug!(declared = %declared, "no signature registered; content not verified");
        }
    }

    ValidationResult {
        valid: true,
        error: None,
        failure: None,
        sanitized_filename: sanitized,
        detected_type: Some(declared),
        signature_checked,
    }
}

/// Validate against a category preset with the given limits.
pub fn validate_category<S>(
    file: &S,
    category: ContentCategory,
    limits: &UploadLimits,
) -> ValidationResult
where
    S: UploadSource + ?Sized,
{
    validate_uploaded_file(file, &ValidationOptions::for_category(category, limits))
}

/// Images: jpg, jpeg, png, gif, webp up to 5 MB.
pub fn validate_image_file<S: UploadSource + ?Sized>(file: &S) -> ValidationResult {
    validate_category(file, ContentCategory::Image, &UploadLimits::default())
}

/// Office documents, PDF, text and CSV up to 10 MB.
pub fn validate_document_file<S: UploadSource + ?Sized>(file: &S) -> ValidationResult {
    validate_category(file, ContentCategory::Document, &UploadLimits::default())
}

/// Any `audio/*` type with a known audio extension, up to 25 MB.
pub fn validate_audio_file<S: UploadSource + ?Sized>(file: &S) -> ValidationResult {
    validate_category(file, ContentCategory::Audio, &UploadLimits::default())
}

/// mp4, webm, mov up to 100 MB.
pub fn validate_video_file<S: UploadSource + ?Sized>(file: &S) -> ValidationResult {
    validate_category(file, ContentCategory::Video, &UploadLimits::default())
}

/// Human-readable byte count, e.g. `2.5 MB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let shown = format!("{value:.1}");
    let shown = shown.strip_suffix(".0").unwrap_or(&shown);
    format!("{shown} {}", UNITS[unit])
}
