//! HTTP HEAD probing.
//!
//! Confirms the resource is reachable and reports `Content-Length`,
//! `Accept-Ranges: bytes` and any `Content-Disposition` filename hint.

mod parse;

use std::collections::BTreeMap;
use std::str;

use curl::easy::{Easy2, Handler, WriteError};

use crate::control::CancelToken;
use crate::error::DownloadError;
use crate::transport::{parse_status_line, Transport};

pub use parse::parse_headers;

/// Metadata needed to plan a download.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadResult {
    /// Total size in bytes, if `Content-Length` is present.
    pub content_length: Option<u64>,
    /// True only if the server sent exactly `Accept-Ranges: bytes`.
    pub accept_ranges: bool,
    /// `Content-Disposition` value if present.
    pub content_disposition: Option<String>,
}

/// Collects header lines of the final response (earlier redirect hops are dropped).
struct HeaderCollector {
    lines: Vec<String>,
    cancel: CancelToken,
}

impl Handler for HeaderCollector {
    fn header(&mut self, data: &[u8]) -> bool {
        if let Ok(s) = str::from_utf8(data) {
            let line = s.trim_end();
            if line.starts_with("HTTP/") {
                self.lines.clear();
            }
            if !line.is_empty() {
                self.lines.push(line.to_string());
            }
        }
        true
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        Ok(data.len())
    }

    fn progress(&mut self, _dltotal: f64, _dlnow: f64, _ultotal: f64, _ulnow: f64) -> bool {
        !self.cancel.is_cancelled()
    }
}

/// Performs a HEAD request. Status must be 200 or 206.
///
/// Blocking; call from `spawn_blocking` when used from async code.
pub fn probe(
    url: &str,
    transport: &Transport,
    headers: &BTreeMap<String, String>,
    cookies: &[String],
    cancel: &CancelToken,
) -> Result<HeadResult, DownloadError> {
    let fail = |reason: String| DownloadError::Probe {
        url: url.to_string(),
        reason,
    };

    let mut easy = Easy2::new(HeaderCollector {
        lines: Vec::new(),
        cancel: cancel.clone(),
    });
    transport
        .configure(&mut easy, url, headers, cookies)
        .map_err(|e| fail(e.to_string()))?;
    easy.nobody(true).map_err(|e| fail(e.to_string()))?;

    if let Err(e) = easy.perform() {
        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        return Err(fail(e.to_string()));
    }

    let lines = &easy.get_ref().lines;
    let code = match lines.first().and_then(|l| parse_status_line(l)) {
        Some(c) => c,
        None => easy.response_code().map_err(|e| fail(e.to_string()))?,
    };
    if code != 200 && code != 206 {
        return Err(fail(format!("HTTP {code}")));
    }

    let head = parse_headers(lines);
    tracing::debug!(
        url,
        content_length = ?head.content_length,
        accept_ranges = head.accept_ranges,
        "probe ok"
    );
    Ok(head)
}
