//! Output filename derivation.
//!
//! A task without an explicit output path is saved under the download
//! directory using the last segment of the URL path. When the URL has no
//! usable name, a `Content-Disposition` filename is tried, and failing that
//! `download_<unix seconds>`.

mod path;

pub use path::{filename_from_disposition, filename_from_url_path};

use std::time::{SystemTime, UNIX_EPOCH};

/// Derive the local filename for `url`.
pub fn derive_filename(url: &str, content_disposition: Option<&str>) -> String {
    filename_from_url_path(url)
        .or_else(|| content_disposition.and_then(filename_from_disposition))
        .map(|raw| sanitize(&raw))
        .filter(|s| !s.is_empty() && s != "." && s != "..")
        .unwrap_or_else(fallback_filename)
}

/// `download_<unix seconds>`
pub fn fallback_filename() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("download_{secs}")
}

/// Replace path separators and control characters so the name stays one path component.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c == '/' || c == '\\' || c.is_control() { '_' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}
