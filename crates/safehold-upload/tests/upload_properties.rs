// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Property tests for name sanitization and the validation pipeline, plus
// end-to-end checks against files on disk.

use chrono::DateTime;
use proptest::prelude::*;

use safehold_core::types::ValidationFailure;
use safehold_upload::sanitize::MAX_FILENAME_BYTES;
use safehold_upload::{
    DiskUpload, InMemoryUpload, ValidationOptions, sanitize_filename_at, validate_document_file,
    validate_image_file, validate_uploaded_file,
};

fn fixed_now() -> chrono::DateTime<chrono::Utc> {
    DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
}

proptest! {
    #[test]
    fn sanitize_is_idempotent(name in any::<String>()) {
        let once = sanitize_filename_at(&name, fixed_now());
        let twice = sanitize_filename_at(&once, fixed_now());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn sanitized_names_are_safe(name in any::<String>()) {
        let out = sanitize_filename_at(&name, fixed_now());
        prop_assert!(!out.is_empty());
        prop_assert!(out.len() <= MAX_FILENAME_BYTES);
        prop_assert!(!out.starts_with('.'));
        prop_assert!(!out.contains(['/', '\\', '\0', '<', '>', '"', '|', '?', '*']));
        prop_assert!(!out.chars().any(char::is_control));
    }

    #[test]
    fn long_names_keep_short_extensions(stem in "[a-z]{300,600}", ext in "[a-z]{1,5}") {
        let out = sanitize_filename_at(&format!("{stem}.{ext}"), fixed_now());
        let suffix = format!(".{ext}");
        prop_assert!(out.ends_with(&suffix));
        prop_assert_eq!(out.len(), MAX_FILENAME_BYTES);
    }

    #[test]
    fn oversized_always_fails_on_size(extra in 1u64..4096, name in ".*", declared in ".*") {
        let options = ValidationOptions::new(1024)
            .allow_types(["*/*"])
            .allow_extensions(["png"]);
        let file = InMemoryUpload::new(name, declared, vec![0u8; (1024 + extra) as usize]);
        let result = validate_uploaded_file(&file, &options);
        prop_assert!(!result.valid);
        prop_assert_eq!(result.failure, Some(ValidationFailure::TooLarge));
    }

    #[test]
    fn valid_implies_no_error(bytes in prop::collection::vec(any::<u8>(), 1..64)) {
        let file = InMemoryUpload::new("photo.png", "image/png", bytes);
        let result = validate_image_file(&file);
        prop_assert_eq!(result.valid, result.error.is_none());
        prop_assert_eq!(result.valid, result.failure.is_none());
    }
}

#[test]
fn disk_pdf_passes_document_preset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("invoice.pdf");
    std::fs::write(&path, b"%PDF-1.7\n1 0 obj\n<<>>\nendobj\n").unwrap();

    let upload = DiskUpload::open(&path, "application/pdf").unwrap();
    let result = validate_document_file(&upload);
    assert!(result.valid, "{result:?}");
    assert!(result.signature_checked);
}

#[test]
fn disk_upload_with_renamed_executable_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("upload.bin");
    std::fs::write(&path, b"MZ\x90\x00\x03\x00\x00\x00\x04\x00\x00\x00").unwrap();

    let upload = DiskUpload::open(&path, "image/png")
        .unwrap()
        .with_name("cute-cat.png");
    let result = validate_image_file(&upload);
    assert_eq!(result.failure, Some(ValidationFailure::SignatureMismatch));
    assert_eq!(result.sanitized_filename, "cute-cat.png");
}
