//! Chunk type and range planning.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// One contiguous byte range of the remote resource and its partial file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkInfo {
    pub index: usize,
    /// First byte offset (inclusive).
    pub start: u64,
    /// Last byte offset (inclusive).
    pub end: u64,
    /// Partial file holding this chunk's bytes.
    pub path: PathBuf,
}

impl ChunkInfo {
    /// Length in bytes (`end - start + 1`).
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// HTTP Range header value: `bytes=start-end`.
    pub fn range_header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }

    /// Range in the form curl's `range()` option expects: `start-end`.
    pub fn curl_range(&self) -> String {
        format!("{}-{}", self.start, self.end)
    }
}

/// `<output>.part<index>`
pub fn chunk_path(output: &Path, index: usize) -> PathBuf {
    let mut name = OsString::from(output.as_os_str());
    name.push(format!(".part{index}"));
    PathBuf::from(name)
}

/// Split `total_size` bytes into `connections` chunks.
///
/// Every chunk is `total_size / n` bytes except the last, which absorbs the
/// remainder. `n` is clamped to `total_size` so no chunk is empty. Returns an
/// empty vec when `total_size` or `connections` is 0.
pub fn plan_chunks(output: &Path, total_size: u64, connections: usize) -> Vec<ChunkInfo> {
    if total_size == 0 || connections == 0 {
        return Vec::new();
    }
    let n = (connections as u64).min(total_size);
    let base = total_size / n;

    (0..n)
        .map(|i| {
            let start = i * base;
            let end = if i == n - 1 {
                total_size - 1
            } else {
                start + base - 1
            };
            let index = i as usize;
            ChunkInfo {
                index,
                start,
                end,
                path: chunk_path(output, index),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_partition(chunks: &[ChunkInfo], total: u64) {
        assert_eq!(chunks.first().map(|c| c.start), Some(0));
        assert_eq!(chunks.last().map(|c| c.end), Some(total - 1));
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end + 1, pair[1].start);
        }
        assert_eq!(chunks.iter().map(ChunkInfo::len).sum::<u64>(), total);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
        }
    }

    #[test]
    fn last_chunk_absorbs_remainder() {
        let out = Path::new("/tmp/file.bin");
        let chunks = plan_chunks(out, 10_485_762, 4);
        assert_eq!(chunks.len(), 4);
        let lens: Vec<u64> = chunks.iter().map(ChunkInfo::len).collect();
        assert_eq!(lens, vec![2_621_440, 2_621_440, 2_621_440, 2_621_442]);
        assert_partition(&chunks, 10_485_762);
    }

    #[test]
    fn partition_holds_for_assorted_sizes() {
        let out = Path::new("out");
        for (size, n) in [(1u64, 1usize), (7, 3), (1000, 32), (4096, 4), (12_345_678, 17)] {
            let chunks = plan_chunks(out, size, n);
            assert_eq!(chunks.len(), n);
            assert_partition(&chunks, size);
        }
    }

    #[test]
    fn more_connections_than_bytes_clamps() {
        let chunks = plan_chunks(Path::new("out"), 3, 8);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() == 1));
    }

    #[test]
    fn empty_plan() {
        assert!(plan_chunks(Path::new("out"), 0, 4).is_empty());
        assert!(plan_chunks(Path::new("out"), 100, 0).is_empty());
    }

    #[test]
    fn chunk_paths_and_ranges() {
        let chunks = plan_chunks(Path::new("/data/iso.img"), 100, 2);
        assert_eq!(chunks[0].path, PathBuf::from("/data/iso.img.part0"));
        assert_eq!(chunks[1].path, PathBuf::from("/data/iso.img.part1"));
        assert_eq!(chunks[0].range_header_value(), "bytes=0-49");
        assert_eq!(chunks[1].range_header_value(), "bytes=50-99");
        assert_eq!(chunks[1].curl_range(), "50-99");
    }
}
