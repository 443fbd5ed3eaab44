// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Extension and MIME type rules.
//
// `EXTENSION_TYPES` is the consistency table: the MIME types a browser or OS
// may legitimately report for each extension.  The category whitelists are
// the defaults used by the image/document/audio/video presets.

use safehold_core::types::ContentCategory;

/// Extension (lowercase, no dot) to the MIME types it may be declared as.
pub const EXTENSION_TYPES: &[(&str, &[&str])] = &[
    ("jpg", &["image/jpeg"]),
    ("jpeg", &["image/jpeg"]),
    ("png", &["image/png"]),
    ("gif", &["image/gif"]),
    ("webp", &["image/webp"]),
    ("bmp", &["image/bmp"]),
    ("tif", &["image/tiff"]),
    ("tiff", &["image/tiff"]),
    ("pdf", &["application/pdf"]),
    ("doc", &["application/msword"]),
    (
        "docx",
        &["application/vnd.openxmlformats-officedocument.wordprocessingml.document"],
    ),
    ("xls", &["application/vnd.ms-excel"]),
    (
        "xlsx",
        &["application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"],
    ),
    ("ppt", &["application/vnd.ms-powerpoint"]),
    (
        "pptx",
        &["application/vnd.openxmlformats-officedocument.presentationml.presentation"],
    ),
    ("rtf", &["application/rtf", "text/rtf"]),
    ("txt", &["text/plain"]),
    // Windows browsers report CSV as an Excel type.
    ("csv", &["text/csv", "text/plain", "application/vnd.ms-excel"]),
    ("zip", &["application/zip", "application/x-zip-compressed"]),
    ("mp3", &["audio/mpeg", "audio/mp3"]),
    ("wav", &["audio/wav", "audio/x-wav", "audio/wave"]),
    ("ogg", &["audio/ogg"]),
    ("flac", &["audio/flac"]),
    ("aac", &["audio/aac"]),
    ("m4a", &["audio/mp4", "audio/x-m4a"]),
    ("weba", &["audio/webm"]),
    ("webm", &["video/webm", "audio/webm"]),
    ("mp4", &["video/mp4", "audio/mp4"]),
    ("mov", &["video/quicktime"]),
];

/// Default whitelists for one content category.
#[derive(Debug, Clone, Copy)]
pub struct CategoryRules {
    pub extensions: &'static [&'static str],
    pub types: &'static [&'static str],
}

const IMAGE_RULES: CategoryRules = CategoryRules {
    extensions: &["jpg", "jpeg", "png", "gif", "webp"],
    types: &["image/jpeg", "image/png", "image/gif", "image/webp"],
};

const DOCUMENT_RULES: CategoryRules = CategoryRules {
    extensions: &["pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt", "csv", "rtf"],
    types: &[
        "application/pdf",
        "application/msword",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "application/vnd.ms-excel",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "application/vnd.ms-powerpoint",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "text/plain",
        "text/csv",
        "application/rtf",
        "text/rtf",
    ],
};

const AUDIO_RULES: CategoryRules = CategoryRules {
    extensions: &["mp3", "wav", "ogg", "flac", "aac", "m4a", "weba"],
    types: &["audio/*"],
};

const VIDEO_RULES: CategoryRules = CategoryRules {
    extensions: &["mp4", "webm", "mov"],
    types: &["video/mp4", "video/webm", "video/quicktime"],
};

impl CategoryRules {
    pub fn for_category(category: ContentCategory) -> Self {
        match category {
            ContentCategory::Image => IMAGE_RULES,
            ContentCategory::Document => DOCUMENT_RULES,
            ContentCategory::Audio => AUDIO_RULES,
            ContentCategory::Video => VIDEO_RULES,
        }
    }
}

/// Lowercase a MIME type and drop any parameters (`; charset=...`).
pub fn normalize_mime(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Whether `mime` is covered by `pattern`.  Patterns may be exact types,
/// `type/*` wildcards, or `*/*`.
pub fn mime_matches(pattern: &str, mime: &str) -> bool {
    let pattern = normalize_mime(pattern);
    let mime = normalize_mime(mime);
    if mime.is_empty() {
        return false;
    }
    if pattern == "*/*" || pattern == mime {
        return true;
    }
    match pattern.strip_suffix("/*") {
        Some(major) => mime
            .split_once('/')
            .is_some_and(|(m, sub)| m == major && !sub.is_empty()),
        None => false,
    }
}

/// Whether any whitelist entry covers `mime`.
pub fn type_allowed<S: AsRef<str>>(allowed: &[S], mime: &str) -> bool {
    allowed.iter().any(|pattern| mime_matches(pattern.as_ref(), mime))
}

/// The MIME types `extension` may be declared as.  Empty when unknown.
pub fn types_for_extension(extension: &str) -> &'static [&'static str] {
    types_for_extension_in(EXTENSION_TYPES, extension)
}

/// [`types_for_extension`] over a caller-supplied table.
pub fn types_for_extension_in<'t>(table: &[(&str, &'t [&'t str])], extension: &str) -> &'t [&'t str] {
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();
    table
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, types)| *types)
        .unwrap_or(&[])
}

/// Whether `extension` and `declared_type` agree.  Table entries may be
/// wildcards, as in [`mime_matches`].
pub fn extension_matches_type(extension: &str, declared_type: &str) -> bool {
    extension_matches_type_in(EXTENSION_TYPES, extension, declared_type)
}

/// [`extension_matches_type`] over a caller-supplied table.
pub fn extension_matches_type_in(table: &[(&str, &[&str])], extension: &str, declared_type: &str) -> bool {
    type_allowed(types_for_extension_in(table, extension), declared_type)
}

/// Lowercase extension of a file name, without the dot.  `None` when the
/// name has no dot, or ends with one.
pub fn extension_of(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_params_and_case() {
        assert_eq!(normalize_mime(" Text/Plain; charset=UTF-8 "), "text/plain");
    }

    #[test]
    fn wildcard_matching() {
        assert!(mime_matches("image/*", "image/png"));
        assert!(mime_matches("IMAGE/*", "image/jpeg"));
        assert!(!mime_matches("image/*", "application/pdf"));
        assert!(!mime_matches("image/*", "image/"));
        assert!(!mime_matches("image/*", "imagex/png"));
        assert!(mime_matches("*/*", "anything/at-all"));
        assert!(!mime_matches("*/*", ""));
        assert!(mime_matches("image/png", "image/png"));
        assert!(!mime_matches("image/png", "image/jpeg"));
    }

    #[test]
    fn extension_consistency() {
        assert!(extension_matches_type("png", "image/png"));
        assert!(extension_matches_type("PNG", "image/png"));
        assert!(!extension_matches_type("png", "application/pdf"));
        assert!(extension_matches_type("csv", "application/vnd.ms-excel"));
        assert!(!extension_matches_type("exe", "application/octet-stream"));
    }

    #[test]
    fn extension_table_entries_may_be_wildcards() {
        let table: &[(&str, &[&str])] = &[("raw", &["image/*"]), ("bin", &["*/*"])];
        assert!(extension_matches_type_in(table, "raw", "image/x-canon-cr2"));
        assert!(extension_matches_type_in(table, "RAW", "Image/DNG; q=1"));
        assert!(!extension_matches_type_in(table, "raw", "video/mp4"));
        assert!(!extension_matches_type_in(table, "raw", "image"));
        assert!(extension_matches_type_in(table, "bin", "application/octet-stream"));
        assert!(!extension_matches_type_in(table, "png", "image/png"));
    }

    #[test]
    fn extension_extraction() {
        assert_eq!(extension_of("photo.PNG"), Some("png".into()));
        assert_eq!(extension_of("archive.tar.gz"), Some("gz".into()));
        assert_eq!(extension_of("README"), None);
        assert_eq!(extension_of("trailing."), None);
    }

    #[test]
    fn every_whitelisted_extension_has_types() {
        for category in [
            ContentCategory::Image,
            ContentCategory::Document,
            ContentCategory::Audio,
            ContentCategory::Video,
        ] {
            let rules = CategoryRules::for_category(category);
            for ext in rules.extensions {
                let types = types_for_extension(ext);
                assert!(!types.is_empty(), "{ext} has no type mapping");
                assert!(
                    types.iter().any(|t| type_allowed(rules.types, t)),
                    "{ext} maps to no whitelisted {category} type"
                );
            }
        }
    }
}
