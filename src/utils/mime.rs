//! MIME type utilities for served files

use std::path::Path;

/// Get MIME type from file extension
pub fn mime_from_ext(extension: &str) -> &'static str {
    let ext = extension.trim_start_matches('.').to_lowercase();
    match ext.as_str() {
        // Video formats
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "3gp" => "video/3gpp",
        "flv" => "video/x-flv",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "ts" => "video/mp2t",
        "mpeg" | "mpg" => "video/mpeg",
        "mkv" => "video/x-matroska",

        // Audio formats
        "m4a" => "audio/mp4",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "aac" => "audio/aac",
        "opus" => "audio/opus",

        // Default fallback
        _ => "application/octet-stream",
    }
}

/// Get MIME type for a file path
pub fn mime_for_path(path: &Path) -> &'static str {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(mime_from_ext)
        .unwrap_or("application/octet-stream")
}
