// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for end users.
//
// Internal diagnostics (key names, surface errors) stay in the logs; what the
// user sees is a short message plus one actionable suggestion.

use crate::error::SafeholdError;
use crate::types::ValidationFailure;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Temporary condition; retrying may succeed.
    Transient,
    /// User must do something (free space, choose another file).
    ActionRequired,
    /// Retrying will not help.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether the caller may retry automatically.
    pub retriable: bool,
    /// Severity level (drives presentation).
    pub severity: Severity,
}

/// Convert a `SafeholdError` into a `HumanError`.
pub fn humanize_error(err: &SafeholdError) -> HumanError {
    match err {
        // -- Storage surface --
        SafeholdError::StorageUnavailable(_) | SafeholdError::Database(_) => HumanError {
            message: "Local storage isn't working right now.".into(),
            suggestion: "Try again in a moment. If this keeps happening, reload the app.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        SafeholdError::QuotaExceeded { .. } => HumanError {
            message: "Local storage is full.".into(),
            suggestion: "Clear saved data for this site or app, then try again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        // -- Security --
        SafeholdError::Encryption(_) | SafeholdError::Decryption(_) => HumanError {
            message: "There was a security problem with saved data.".into(),
            suggestion: "Your saved data may need to be reset. Sign out and back in to refresh it.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        // -- Configuration --
        SafeholdError::InvalidConfig(detail) => HumanError {
            message: "The security settings are invalid.".into(),
            suggestion: format!("Fix the settings file and restart. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        SafeholdError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "The file couldn't be found.".into(),
                    suggestion: "It may have been moved or deleted. Try choosing the file again.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                HumanError {
                    message: "The app doesn't have permission to read that file.".into(),
                    suggestion: "Check the file permissions, or copy the file somewhere else first.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem reading or writing a file.".into(),
                    suggestion: "Try again. If this keeps happening, your device's storage may be full.".into(),
                    retriable: true,
                    severity: Severity::Transient,
                }
            }
        }

        SafeholdError::Serialization(_) => HumanError {
            message: "The app had an internal data problem.".into(),
            suggestion: "Try again. If this keeps happening, please report it.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        SafeholdError::PlatformUnavailable => HumanError {
            message: "Saving data isn't available here.".into(),
            suggestion: "Private browsing or strict privacy settings can block storage. Try a normal window.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },
    }
}

/// Convert an upload rejection into a `HumanError`.
pub fn humanize_validation(failure: ValidationFailure) -> HumanError {
    let (message, suggestion) = match failure {
        ValidationFailure::Empty => (
            "The file is empty.",
            "Choose a file that has content in it.",
        ),
        ValidationFailure::TooLarge => (
            "The file is too large.",
            "Choose a smaller file or compress it first.",
        ),
        ValidationFailure::ExtensionNotAllowed => (
            "This type of file isn't allowed.",
            "Choose a file with one of the listed extensions.",
        ),
        ValidationFailure::TypeNotAllowed => (
            "This type of file isn't allowed here.",
            "Check which file types this upload accepts.",
        ),
        ValidationFailure::ExtensionTypeMismatch => (
            "The file name doesn't match its type.",
            "Rename the file with its correct extension, or export it again.",
        ),
        ValidationFailure::SignatureMismatch => (
            "File content does not match declared type.",
            "Open the file in its original program and save it again.",
        ),
        ValidationFailure::Unreadable => (
            "The file couldn't be read.",
            "Try choosing the file again.",
        ),
    };
    HumanError {
        message: message.into(),
        suggestion: suggestion.into(),
        retriable: matches!(failure, ValidationFailure::Unreadable),
        severity: if matches!(failure, ValidationFailure::Unreadable) {
            Severity::Transient
        } else {
            Severity::ActionRequired
        },
    }
}
