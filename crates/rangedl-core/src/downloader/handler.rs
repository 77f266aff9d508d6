//! curl `Handler` that streams a response body into a local file.
//!
//! Shared by chunk and single-stream transfers. Each buffer passes through the
//! process-wide rate limiter before it is written; the first error is stored
//! and the transfer aborted by returning 0 from `write`.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::str;
use std::sync::Arc;

use curl::easy::{Easy2, Handler, WriteError};

use crate::control::CancelToken;
use crate::error::TransferError;
use crate::progress::ProgressState;
use crate::rate_limit::RateLimiter;
use crate::transport::parse_status_line;

use super::TransferContext;

pub(crate) struct BodyHandler {
    file: File,
    path: PathBuf,
    /// Byte offset of the first byte requested (0 for single-stream).
    offset: u64,
    /// Exact body length expected, when known.
    expected: Option<u64>,
    written: u64,
    /// Status of the most recent response (redirect hops overwrite it).
    status: Option<u32>,
    limiter: Arc<RateLimiter>,
    progress: Arc<ProgressState>,
    cancel: CancelToken,
    failure: Option<TransferError>,
}

impl BodyHandler {
    pub(crate) fn new(
        file: File,
        path: PathBuf,
        offset: u64,
        expected: Option<u64>,
        ctx: &TransferContext,
    ) -> Self {
        Self {
            file,
            path,
            offset,
            expected,
            written: 0,
            status: None,
            limiter: Arc::clone(&ctx.limiter),
            progress: Arc::clone(&ctx.progress),
            cancel: ctx.cancel.clone(),
            failure: None,
        }
    }

    pub(crate) fn written(&self) -> u64 {
        self.written
    }

    fn abort(&mut self, err: TransferError) -> Result<usize, WriteError> {
        if self.failure.is_none() {
            self.failure = Some(err);
        }
        Ok(0)
    }
}

impl Handler for BodyHandler {
    fn header(&mut self, data: &[u8]) -> bool {
        if let Ok(line) = str::from_utf8(data) {
            if let Some(code) = parse_status_line(line.trim_end()) {
                self.status = Some(code);
            }
        }
        true
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        match self.status {
            Some(200) if self.offset > 0 => return self.abort(TransferError::RangeIgnored(self.offset)),
            Some(200) | Some(206) | None => {}
            Some(code) => return self.abort(TransferError::Http(code)),
        }
        let n = data.len();
        if let Some(expected) = self.expected {
            if self.written + n as u64 > expected {
                return self.abort(TransferError::Overflow { expected });
            }
        }
        if self.limiter.wait(n, &self.cancel).is_err() {
            return self.abort(TransferError::Cancelled);
        }
        if let Err(source) = self.file.write_all(data) {
            let path = self.path.clone();
            return self.abort(TransferError::Io { path, source });
        }
        self.written += n as u64;
        self.progress.add_downloaded(n as u64);
        Ok(n)
    }

    fn progress(&mut self, _dltotal: f64, _dlnow: f64, _ultotal: f64, _ulnow: f64) -> bool {
        !self.cancel.is_cancelled()
    }
}

/// Run the transfer and classify the outcome. Returns bytes written.
pub(crate) fn perform(easy: &mut Easy2<BodyHandler>) -> Result<u64, TransferError> {
    let result = easy.perform();
    let h = easy.get_mut();
    if let Some(err) = h.failure.take() {
        return Err(err);
    }
    if let Err(e) = result {
        if h.cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        return Err(TransferError::Curl(e));
    }
    if let Some(code) = h.status {
        if code != 200 && code != 206 {
            return Err(TransferError::Http(code));
        }
    }
    if let Err(source) = h.file.flush() {
        let path = h.path.clone();
        return Err(TransferError::Io { path, source });
    }
    if let Some(expected) = h.expected {
        if h.written != expected {
            return Err(TransferError::PartialTransfer {
                expected,
                received: h.written,
            });
        }
    }
    Ok(h.written)
}
