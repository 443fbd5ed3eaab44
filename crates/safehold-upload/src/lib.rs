// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// safehold-upload: content validation for untrusted uploads.
//
// Validates a candidate file's size, name, extension, declared MIME type and
// leading magic bytes before it is accepted.  Only the first `HEAD_LEN` bytes
// of a file are ever read.

pub mod rules;
pub mod sanitize;
pub mod signatures;
pub mod source;
pub mod validator;

// Re-export the pipeline entry points so callers can use `safehold_upload::validate_image_file` etc.
pub use sanitize::{sanitize_filename, sanitize_filename_at};
pub use signatures::{HEAD_LEN, SignatureCheck, detect_type, has_signature, types_without_signatures};
pub use source::{DiskUpload, InMemoryUpload, UploadSource};
pub use validator::{
    ValidationOptions, ValidationResult, format_file_size, validate_audio_file, validate_category,
    validate_document_file, validate_image_file, validate_uploaded_file, validate_uploaded_file_at,
    validate_video_file,
};
