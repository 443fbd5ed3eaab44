// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Magic-byte signatures.
//
// Each signature is a positional list of `Option<u8>`; `None` is a wildcard
// (used for the RIFF chunk size and the ISO-BMFF box size).  A file matches a
// MIME type when its leading bytes match any one of that type's patterns.
// Every pattern fits in `HEAD_LEN` bytes.

use crate::rules::normalize_mime;

/// Bytes read from the start of a file for signature checks.
pub const HEAD_LEN: usize = 12;

/// One positional byte pattern; `None` matches any byte.
pub type BytePattern = &'static [Option<u8>];

/// The patterns registered for one MIME type.
#[derive(Debug, Clone, Copy)]
pub struct FileSignature {
    pub mime_type: &'static str,
    pub patterns: &'static [BytePattern],
}

impl FileSignature {
    /// Whether `head` starts with any of this signature's patterns.
    pub fn matches(&self, head: &[u8]) -> bool {
        self.patterns.iter().any(|pattern| pattern_matches(pattern, head))
    }
}

/// Outcome of checking a file head against a declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    Matched,
    Mismatch,
    /// No patterns are registered for the type; nothing was checked.
    NoSignature,
}

macro_rules! pattern {
    (@byte _) => {
        None
    };
    (@byte $b:literal) => {
        Some($b)
    };
    ($($b:tt),+ $(,)?) => {
        &[$(pattern!(@byte $b)),+]
    };
}

const JPEG: &[BytePattern] = &[pattern![0xFF, 0xD8, 0xFF]];
const PNG: &[BytePattern] = &[pattern![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]];
const GIF: &[BytePattern] = &[
    pattern![0x47, 0x49, 0x46, 0x38, 0x37, 0x61],
    pattern![0x47, 0x49, 0x46, 0x38, 0x39, 0x61],
];
const WEBP: &[BytePattern] = &[pattern![0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50]];
const BMP: &[BytePattern] = &[pattern![0x42, 0x4D]];
const TIFF: &[BytePattern] = &[
    pattern![0x49, 0x49, 0x2A, 0x00],
    pattern![0x4D, 0x4D, 0x00, 0x2A],
];
const PDF: &[BytePattern] = &[pattern![0x25, 0x50, 0x44, 0x46, 0x2D]];
const ZIP: &[BytePattern] = &[
    pattern![0x50, 0x4B, 0x03, 0x04],
    pattern![0x50, 0x4B, 0x05, 0x06],
    pattern![0x50, 0x4B, 0x07, 0x08],
];
const OOXML: &[BytePattern] = &[pattern![0x50, 0x4B, 0x03, 0x04]];
const OLE2: &[BytePattern] = &[pattern![0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]];
const RTF: &[BytePattern] = &[pattern![0x7B, 0x5C, 0x72, 0x74, 0x66]];
const MP3: &[BytePattern] = &[
    pattern![0x49, 0x44, 0x33],
    pattern![0xFF, 0xFB],
    pattern![0xFF, 0xF3],
    pattern![0xFF, 0xF2],
];
const AAC: &[BytePattern] = &[pattern![0xFF, 0xF1], pattern![0xFF, 0xF9]];
const WAV: &[BytePattern] = &[pattern![0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x41, 0x56, 0x45]];
const OGG: &[BytePattern] = &[pattern![0x4F, 0x67, 0x67, 0x53]];
const FLAC: &[BytePattern] = &[pattern![0x66, 0x4C, 0x61, 0x43]];
const EBML: &[BytePattern] = &[pattern![0x1A, 0x45, 0xDF, 0xA3]];
const QUICKTIME: &[BytePattern] = &[
    pattern![_, _, _, _, 0x66, 0x74, 0x79, 0x70, 0x71, 0x74],
    pattern![_, _, _, _, 0x6D, 0x6F, 0x6F, 0x76],
];
const ISO_BMFF: &[BytePattern] = &[pattern![_, _, _, _, 0x66, 0x74, 0x79, 0x70]];

/// Registered signatures.  Order matters for [`detect_type`]: where formats
/// share a container, the more specific entry comes first.
pub const SIGNATURES: &[FileSignature] = &[
    FileSignature { mime_type: "image/jpeg", patterns: JPEG },
    FileSignature { mime_type: "image/png", patterns: PNG },
    FileSignature { mime_type: "image/gif", patterns: GIF },
    FileSignature { mime_type: "image/webp", patterns: WEBP },
    FileSignature { mime_type: "image/bmp", patterns: BMP },
    FileSignature { mime_type: "image/tiff", patterns: TIFF },
    FileSignature { mime_type: "application/pdf", patterns: PDF },
    FileSignature { mime_type: "application/zip", patterns: ZIP },
    FileSignature { mime_type: "application/x-zip-compressed", patterns: ZIP },
    FileSignature {
        mime_type: "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        patterns: OOXML,
    },
    FileSignature {
        mime_type: "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        patterns: OOXML,
    },
    FileSignature {
        mime_type: "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        patterns: OOXML,
    },
    FileSignature { mime_type: "application/msword", patterns: OLE2 },
    FileSignature { mime_type: "application/vnd.ms-excel", patterns: OLE2 },
    FileSignature { mime_type: "application/vnd.ms-powerpoint", patterns: OLE2 },
    FileSignature { mime_type: "application/rtf", patterns: RTF },
    FileSignature { mime_type: "text/rtf", patterns: RTF },
    FileSignature { mime_type: "audio/mpeg", patterns: MP3 },
    FileSignature { mime_type: "audio/mp3", patterns: MP3 },
    FileSignature { mime_type: "audio/aac", patterns: AAC },
    FileSignature { mime_type: "audio/wav", patterns: WAV },
    FileSignature { mime_type: "audio/x-wav", patterns: WAV },
    FileSignature { mime_type: "audio/wave", patterns: WAV },
    FileSignature { mime_type: "audio/ogg", patterns: OGG },
    FileSignature { mime_type: "audio/flac", patterns: FLAC },
    FileSignature { mime_type: "video/webm", patterns: EBML },
    FileSignature { mime_type: "audio/webm", patterns: EBML },
    FileSignature { mime_type: "video/quicktime", patterns: QUICKTIME },
    FileSignature { mime_type: "video/mp4", patterns: ISO_BMFF },
    FileSignature { mime_type: "audio/mp4", patterns: ISO_BMFF },
    FileSignature { mime_type: "audio/x-m4a", patterns: ISO_BMFF },
];

fn pattern_matches(pattern: &[Option<u8>], head: &[u8]) -> bool {
    head.len() >= pattern.len()
        && pattern
            .iter()
            .zip(head)
            .all(|(expected, actual)| expected.is_none_or(|b| b == *actual))
}

/// The signature registered for `mime_type`, if any.
pub fn signature_for(mime_type: &str) -> Option<&'static FileSignature> {
    let mime = normalize_mime(mime_type);
    SIGNATURES.iter().find(|sig| sig.mime_type == mime)
}

/// Whether magic-byte verification is possible for `mime_type`.
pub fn has_signature(mime_type: &str) -> bool {
    signature_for(mime_type).is_some()
}

/// Check `head` against the patterns registered for `mime_type`.
pub fn check_signature(mime_type: &str, head: &[u8]) -> SignatureCheck {
    match signature_for(mime_type) {
        None => SignatureCheck::NoSignature,
        Some(sig) if sig.matches(head) => SignatureCheck::Matched,
        Some(_) => SignatureCheck::Mismatch,
    }
}

/// Sniff a MIME type from leading bytes alone.
pub fn detect_type(head: &[u8]) -> Option<&'static str> {
    SIGNATURES
        .iter()
        .find(|sig| sig.matches(head))
        .map(|sig| sig.mime_type)
}

/// Whitelisted types that cannot be verified by content.
pub fn types_without_signatures<'a>(types: &'a [&'a str]) -> Vec<&'a str> {
    types.iter().copied().filter(|t| !has_signature(t)).collect()
}
