//! Utility functions for remote path manipulation and file classification
//!
//! Remote paths are POSIX-style strings owned by the file host, so they are handled as
//! strings rather than `std::path::Path` (which would apply local platform rules).

use regex::Regex;
use std::sync::LazyLock;

/// Extensions treated as video files
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "mov", "wmv", "flv", "webm", "m4v", "ts", "m2ts", "rmvb", "mpg",
    "mpeg",
];

/// Name of the shared working directory created under a download path
pub const TEMP_DIR_NAME: &str = ".collection-temp";

/// Normalize a remote path before it is sent to the host
///
/// Strips a leading Windows drive prefix (`C:`) and converts backslashes to forward
/// slashes. The host addresses its own namespace, so a drive letter inherited from a
/// local configuration would point nowhere.
///
/// # Examples
///
/// ```
/// use collection_dl::utils::normalize_remote_path;
///
/// assert_eq!(normalize_remote_path("D:/media/anime"), "/media/anime");
/// assert_eq!(normalize_remote_path("/media/anime"), "/media/anime");
/// ```
pub fn normalize_remote_path(path: &str) -> String {
    let bytes = path.as_bytes();
    let stripped = if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        &path[2..]
    } else {
        path
    };
    stripped.replace('\\', "/")
}

/// Runs of two or more separators; `None` only if the literal pattern failed to compile
static SLASH_RUNS: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new("/{2,}").ok());

/// Collapse runs of `/` into a single separator
pub fn collapse_slashes(path: &str) -> String {
    match SLASH_RUNS.as_ref() {
        Some(re) => re.replace_all(path, "/").into_owned(),
        None => path.to_string(),
    }
}

/// Remove trailing separators, keeping a bare root as `/`
pub fn trim_trailing_slash(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() && path.starts_with('/') {
        "/"
    } else {
        trimmed
    }
}

/// Join a directory and a child name with exactly one separator
pub fn join_path(dir: &str, name: &str) -> String {
    let name = name.trim_start_matches('/');
    if dir.is_empty() {
        return name.to_string();
    }
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Split a path into its parent directory and final component
///
/// Returns `None` for the root and for empty paths.
pub fn split_parent(path: &str) -> Option<(&str, &str)> {
    let path = trim_trailing_slash(path);
    if path.is_empty() || path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some(("/", &path[1..])),
        Some(idx) => Some((&path[..idx], &path[idx + 1..])),
        None => None,
    }
}

/// Final component of a path
pub fn file_name_of(path: &str) -> &str {
    let path = trim_trailing_slash(path);
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Extension of a file name without the dot, lowercase preserved as written
///
/// Dotfiles such as `.nfo` have no extension.
pub fn extension_of(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => &name[idx + 1..],
        _ => "",
    }
}

/// File name without its extension
pub fn stem_of(name: &str) -> &str {
    let ext = extension_of(name);
    if ext.is_empty() {
        name
    } else {
        &name[..name.len() - ext.len() - 1]
    }
}

/// Check whether a file name has a video extension
///
/// # Examples
///
/// ```
/// use collection_dl::utils::is_video_file;
///
/// assert!(is_video_file("[Group] Show - 01 [1080p].MKV"));
/// assert!(!is_video_file("[Group] Show - 01 [1080p].ass"));
/// ```
pub fn is_video_file(name: &str) -> bool {
    let ext = extension_of(name);
    VIDEO_EXTENSIONS
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(ext))
}
