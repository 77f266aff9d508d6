//! Output assembly: concatenate chunk files into the final path.
//!
//! Chunks are copied strictly in index order into `<output>.tmp`, which is
//! synced and then atomically renamed over the output. Chunk files are removed
//! only after the rename succeeds, so an interrupted merge can simply be redone.
//! Any other `.part<N>` sibling, left by an earlier attempt that split the
//! file into more chunks, goes with them.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use crate::error::DownloadError;
use crate::segmenter::ChunkInfo;

/// Suffix of the merge target before rename.
pub const TEMP_SUFFIX: &str = ".tmp";

/// `file.iso` → `file.iso.tmp`
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = OsString::from(final_path.as_os_str());
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Merge all chunk files into `output`, in index order whatever order `chunks`
/// is given in. Returns the number of bytes written.
///
/// A missing or unreadable chunk fails with `DownloadError::Merge`; the
/// temporary file is removed and the chunk files are left for a retry.
pub fn merge_chunks(output: &Path, chunks: &[ChunkInfo]) -> Result<u64, DownloadError> {
    let mut ordered: Vec<&ChunkInfo> = chunks.iter().collect();
    ordered.sort_by_key(|c| c.index);

    let tmp = temp_path(output);
    let result = write_merged(&tmp, &ordered).and_then(|n| {
        fs::rename(&tmp, output).map_err(|source| DownloadError::Merge {
            path: output.to_path_buf(),
            source,
        })?;
        Ok(n)
    });
    let total = match result {
        Ok(n) => n,
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
    };

    remove_chunk_files(chunks);
    remove_stale_parts(output);
    tracing::debug!(path = %output.display(), bytes = total, chunks = chunks.len(), "merged chunks");
    Ok(total)
}

fn write_merged(tmp: &Path, ordered: &[&ChunkInfo]) -> Result<u64, DownloadError> {
    let merge_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: io::Error| DownloadError::Merge { path, source }
    };

    let file = File::create(tmp).map_err(merge_err(tmp))?;
    let mut out = BufWriter::new(file);
    let mut total = 0u64;
    for chunk in ordered {
        let mut input = File::open(&chunk.path).map_err(merge_err(&chunk.path))?;
        total += io::copy(&mut input, &mut out).map_err(merge_err(&chunk.path))?;
    }
    let file = out
        .into_inner()
        .map_err(|e| DownloadError::Merge {
            path: tmp.to_path_buf(),
            source: e.into_error(),
        })?;
    file.sync_all().map_err(merge_err(tmp))?;
    Ok(total)
}

/// Best-effort removal of chunk files; failures are logged.
pub fn remove_chunk_files(chunks: &[ChunkInfo]) {
    for chunk in chunks {
        match fs::remove_file(&chunk.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %chunk.path.display(), error = %e, "could not remove chunk file"),
        }
    }
}

/// Remove `<output>.part<digits>` siblings no current plan accounts for.
pub fn remove_stale_parts(output: &Path) {
    let (Some(dir), Some(name)) = (output.parent(), output.file_name()) else {
        return;
    };
    let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };
    let mut prefix = name.to_os_string();
    prefix.push(".part");
    let prefix = prefix.to_string_lossy().into_owned();

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "cannot scan for stale chunk files");
            return;
        }
    };
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(index) = file_name.to_str().and_then(|n| n.strip_prefix(prefix.as_str())) else {
            continue;
        };
        if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        if let Err(e) = fs::remove_file(entry.path()) {
            tracing::warn!(path = %entry.path().display(), error = %e, "could not remove stale chunk file");
        }
    }
}

/// fsync a file written in place (single-stream path).
pub fn sync_path(path: &Path) -> Result<(), DownloadError> {
    File::options()
        .write(true)
        .open(path)
        .and_then(|f| f.sync_all())
        .map_err(|e| DownloadError::io(format!("sync {}", path.display()), e))
}
