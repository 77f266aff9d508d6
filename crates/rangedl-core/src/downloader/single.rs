//! Single-stream GET (no Range) written straight to the output path.
//!
//! Used when the server does not advertise byte ranges, the size is unknown,
//! or only one connection was chosen.

use std::fs::File;
use std::path::Path;

use curl::easy::Easy2;

use crate::error::TransferError;

use super::handler::{self, BodyHandler};
use super::TransferContext;

/// Download the whole body into `output` (truncating it). Returns bytes written.
/// When `expected_len` is known, a short or long body is an error.
pub fn download_single(
    ctx: &TransferContext,
    output: &Path,
    expected_len: Option<u64>,
) -> Result<u64, TransferError> {
    let file = File::create(output).map_err(|source| TransferError::Io {
        path: output.to_path_buf(),
        source,
    })?;
    let mut easy = Easy2::new(BodyHandler::new(
        file,
        output.to_path_buf(),
        0,
        expected_len,
        ctx,
    ));
    ctx.transport
        .configure(&mut easy, &ctx.url, &ctx.headers, &ctx.cookies)?;

    match handler::perform(&mut easy) {
        Ok(n) => {
            tracing::debug!(path = %output.display(), bytes = n, "single-stream download done");
            Ok(n)
        }
        Err(e) => {
            ctx.progress.rewind(easy.get_ref().written());
            Err(e)
        }
    }
}
