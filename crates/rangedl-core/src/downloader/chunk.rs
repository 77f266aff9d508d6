//! One chunk: HTTP Range GET into `<output>.part<i>`.

use std::fs::{self, File};

use curl::easy::Easy2;

use crate::error::TransferError;
use crate::segmenter::ChunkInfo;

use super::handler::{self, BodyHandler};
use super::TransferContext;

/// How a chunk was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Partial file already had the full length; no request was made.
    Reused,
    /// Downloaded this many bytes.
    Fetched(u64),
}

/// Fetch one chunk. With `resume`, an existing partial file of exactly the
/// chunk's length is trusted as-is (length only, no content check).
pub fn download_chunk(
    ctx: &TransferContext,
    chunk: &ChunkInfo,
    resume: bool,
) -> Result<ChunkOutcome, TransferError> {
    let len = chunk.len();
    if resume {
        if let Ok(meta) = fs::metadata(&chunk.path) {
            if meta.len() == len {
                ctx.progress.add_downloaded(len);
                tracing::debug!(index = chunk.index, bytes = len, "chunk already complete, reusing");
                return Ok(ChunkOutcome::Reused);
            }
        }
    }

    let file = File::create(&chunk.path).map_err(|source| TransferError::Io {
        path: chunk.path.clone(),
        source,
    })?;
    let mut easy = Easy2::new(BodyHandler::new(
        file,
        chunk.path.clone(),
        chunk.start,
        Some(len),
        ctx,
    ));
    ctx.transport
        .configure(&mut easy, &ctx.url, &ctx.headers, &ctx.cookies)?;
    easy.range(&chunk.curl_range())?;

    match handler::perform(&mut easy) {
        Ok(n) => {
            tracing::debug!(index = chunk.index, range = %chunk.range_header_value(), bytes = n, "chunk done");
            Ok(ChunkOutcome::Fetched(n))
        }
        Err(e) => {
            ctx.progress.rewind(easy.get_ref().written());
            Err(e)
        }
    }
}
