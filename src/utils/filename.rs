//! Safe filename generation utilities

use crate::error::ServiceError;
use regex::Regex;
use std::path::{Component, Path};
use std::sync::OnceLock;

/// Longest title prefix kept in a generated filename, in bytes
const MAX_TITLE_LEN: usize = 200;

/// Suffixes left behind by interrupted or in-progress engine runs
const PARTIAL_SUFFIXES: &[&str] = &[".part", ".ytdl", ".tmp", ".temp"];

fn invalid_chars() -> &'static Regex {
    static INVALID: OnceLock<Regex> = OnceLock::new();
    INVALID.get_or_init(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("valid regex"))
}

/// Convert a title to a safe filename by removing/replacing invalid characters
pub fn to_safe_filename(title: &str, extension: &str) -> String {
    let mut safe_title = invalid_chars().replace_all(title, "_").to_string();

    // Remove leading/trailing dots and spaces
    safe_title = safe_title
        .trim_matches(|c: char| c == '.' || c == ' ')
        .to_string();

    if safe_title.len() > MAX_TITLE_LEN {
        let mut cut = MAX_TITLE_LEN;
        while !safe_title.is_char_boundary(cut) {
            cut -= 1;
        }
        safe_title.truncate(cut);
        safe_title = safe_title.trim_end().to_string();
    }

    if safe_title.is_empty() {
        safe_title = "video".to_string();
    }

    if !extension.is_empty() {
        let ext = if extension.starts_with('.') {
            extension.to_string()
        } else {
            format!(".{}", extension)
        };
        format!("{}{}", safe_title, ext)
    } else {
        safe_title
    }
}

/// Build the stem handed to the engine's output template.
///
/// The engine expands `%(...)s` sequences, so literal percent signs are
/// replaced. The job token is appended so the file can still be found when
/// the engine rewrites the rest of the name.
pub fn output_stem(title: &str, token: &str) -> String {
    let mut stem = to_safe_filename(title, "").replace('%', "_");
    if stem.len() > 80 {
        let mut cut = 80;
        while !stem.is_char_boundary(cut) {
            cut -= 1;
        }
        stem.truncate(cut);
    }
    format!("{}.{}", stem.trim_end(), token)
}

/// Name used for the n-th collision: `name.ext`, `name (1).ext`, `name (2).ext`, ...
pub fn numbered_filename(filename: &str, counter: usize) -> String {
    if counter == 0 {
        return filename.to_string();
    }

    let path = Path::new(filename);
    let stem = path.file_stem().unwrap_or_default();
    let extension = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    format!("{} ({}){}", stem.to_string_lossy(), counter, extension)
}

/// Reject names that could escape the downloads directory.
///
/// Runs before any filesystem access, so a hostile name never reaches
/// `Path::join`.
pub fn validate_served_name(filename: &str) -> Result<(), ServiceError> {
    if filename.is_empty() || filename.len() > 255 {
        return Err(ServiceError::InvalidInput("Invalid file name".to_string()));
    }

    if filename.contains('/') || filename.contains('\\') || filename.contains('\0') {
        return Err(ServiceError::InvalidInput("Invalid file name".to_string()));
    }

    // Exactly one plain component: rejects `.` and `..` but not `a...b`
    let mut components = Path::new(filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(ServiceError::InvalidInput("Invalid file name".to_string())),
    }
}

/// Whether a directory entry is an unfinished artifact rather than a result
pub fn is_partial_artifact(filename: &str) -> bool {
    filename.starts_with('.') || PARTIAL_SUFFIXES.iter().any(|suffix| filename.ends_with(suffix))
}
