// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// File name sanitization.
//
// The output never contains a path separator, a NUL, a control character,
// or any of `< > " | ? *`; never starts with a dot; is at most
// `MAX_FILENAME_BYTES` bytes; and is never empty.  Sanitizing a sanitized
// name returns it unchanged.

use chrono::{DateTime, Utc};

/// Longest file name most filesystems accept.
pub const MAX_FILENAME_BYTES: usize = 255;

const RESERVED: &[char] = &['<', '>', '"', '|', '?', '*'];

/// Sanitize `name`, synthesizing a timestamped name if nothing survives.
pub fn sanitize_filename(name: &str) -> String {
    sanitize_filename_at(name, Utc::now())
}

/// [`sanitize_filename`] with an explicit timestamp for the synthesized
/// fallback name.
pub fn sanitize_filename_at(name: &str, now: DateTime<Utc>) -> String {
    let stripped: String = name
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '\0'))
        .collect();

    let replaced: String = stripped
        .trim_start_matches('.')
        .chars()
        .map(|c| if c.is_control() || RESERVED.contains(&c) { '_' } else { c })
        .collect();

    // Truncation can drop a short stem and expose the extension's dot.
    let truncated = truncate_preserving_extension(&replaced, MAX_FILENAME_BYTES);
    let cleaned = truncated.trim_start_matches('.');

    if cleaned.is_empty() {
        format!("upload_{}", now.timestamp_millis())
    } else {
        cleaned.to_owned()
    }
}

fn truncate_preserving_extension(name: &str, max: usize) -> String {
    if name.len() <= max {
        return name.to_owned();
    }
    match name.rfind('.') {
        Some(dot) if dot > 0 && name.len() - dot < max => {
            let ext = &name[dot..];
            let stem = truncate_at_char_boundary(&name[..dot], max - ext.len());
            format!("{stem}{ext}")
        }
        _ => truncate_at_char_boundary(name, max).to_owned(),
    }
}

fn truncate_at_char_boundary(s: &str, max: usize) -> &str {
    let mut end = max.min(s.len());
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_epoch(name: &str) -> String {
        sanitize_filename_at(name, DateTime::from_timestamp_millis(1_700_000_000_000).unwrap())
    }

    #[test]
    fn plain_names_pass_through() {
        assert_eq!(at_epoch("photo.png"), "photo.png");
        assert_eq!(at_epoch("Résumé 2026.pdf"), "Résumé 2026.pdf");
    }

    #[test]
    fn path_separators_are_removed() {
        assert_eq!(at_epoch("../../etc/passwd"), "etcpasswd");
        assert_eq!(at_epoch("C:\\Windows\\system.ini"), "C:Windowssystem.ini");
    }

    #[test]
    fn leading_dots_are_removed() {
        assert_eq!(at_epoch(".htaccess"), "htaccess");
        assert_eq!(at_epoch("...hidden.txt"), "hidden.txt");
    }

    #[test]
    fn reserved_and_control_chars_become_underscores() {
        assert_eq!(at_epoch("a<b>c\"d|e?f*g.txt"), "a_b_c_d_e_f_g.txt");
        assert_eq!(at_epoch("tab\there\n.txt"), "tab_here_.txt");
        assert_eq!(at_epoch("nul\0byte.txt"), "nulbyte.txt");
    }

    #[test]
    fn empty_result_is_synthesized() {
        assert_eq!(at_epoch(""), "upload_1700000000000");
        assert_eq!(at_epoch("/../.."), "upload_1700000000000");
    }

    #[test]
    fn long_names_keep_extension() {
        let long = format!("{}.pdf", "a".repeat(400));
        let out = at_epoch(&long);
        assert_eq!(out.len(), MAX_FILENAME_BYTES);
        assert!(out.ends_with(".pdf"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let long = format!("{}.txt", "é".repeat(200));
        let out = at_epoch(&long);
        assert!(out.len() <= MAX_FILENAME_BYTES);
        assert!(out.ends_with(".txt"));
        assert!(out.starts_with('é'));
    }

    #[test]
    fn huge_extension_is_cut_not_kept() {
        let long = format!("a.{}", "x".repeat(300));
        let out = at_epoch(&long);
        assert_eq!(out.len(), MAX_FILENAME_BYTES);
        assert!(out.starts_with("a.x"));
    }

    #[test]
    fn idempotent_on_examples() {
        for name in ["../x.png", ".env", "a*b.txt", "", "ok.pdf"] {
            let once = at_epoch(name);
            assert_eq!(at_epoch(&once), once, "not idempotent for {name:?}");
        }
    }
}
