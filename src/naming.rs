//! Output file naming
//!
//! Turns user-supplied workbook and sheet names into filesystem-safe file
//! names, and keeps names unique within a single extraction run.

use std::collections::HashSet;

/// Default stem length cap applied by [`sanitize`].
pub const DEFAULT_MAX_LENGTH: usize = 200;

const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

const HANGUL_SYLLABLES: std::ops::RangeInclusive<u32> = 0xAC00..=0xD7A3;

/// Sanitize `name` with the default stem length cap.
pub fn sanitize(name: &str) -> String {
    sanitize_with_max(name, DEFAULT_MAX_LENGTH)
}

/// Normalize arbitrary text into a name that is safe on Windows, macOS and Linux.
///
/// The text after the last `.` is treated as an extension and reattached
/// untouched; only the stem is scrubbed. Forbidden characters and spaces
/// become `_`, then everything outside ASCII alphanumerics, `_`, `-` and
/// Hangul syllables becomes `_`. The stem is cut to `max_length` characters
/// before the extension goes back on.
pub fn sanitize_with_max(name: &str, max_length: usize) -> String {
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) => (stem, ext),
        None => (name, ""),
    };

    let replaced: String = stem
        .chars()
        .map(|c| if FORBIDDEN.contains(&c) || c == ' ' { '_' } else { c })
        .collect();

    let safe: String = replaced
        .chars()
        .map(|c| if is_kept(c) { c } else { '_' })
        .take(max_length)
        .collect();

    if ext.is_empty() {
        safe
    } else {
        format!("{}.{}", safe, ext)
    }
}

fn is_kept(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || HANGUL_SYLLABLES.contains(&(c as u32))
}

/// Return `candidate` or the first free `base(n).ext` variant of it.
///
/// The caller owns `existing` and must insert the returned name before the
/// next call. Candidates are expected to carry an extension; one without a
/// `.` gets the counter appended to the whole name.
pub fn resolve_duplicate(candidate: &str, existing: &HashSet<String>) -> String {
    if !existing.contains(candidate) {
        return candidate.to_string();
    }

    let numbered = |counter: usize| match candidate.rsplit_once('.') {
        Some((base, ext)) => format!("{}({}).{}", base, counter, ext),
        None => format!("{}({})", candidate, counter),
    };

    (1..)
        .map(numbered)
        .find(|name| !existing.contains(name))
        .unwrap_or_else(|| candidate.to_string())
}

/// Stem of an uploaded filename, i.e. everything before the last `.`.
pub fn file_stem(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    }
}

/// Lowercased extension of `filename`, if any.
pub fn extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}
