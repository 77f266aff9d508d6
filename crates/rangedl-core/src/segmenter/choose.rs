//! Connection (chunk) count selection.

use crate::config::EngineConfig;

/// Number of chunks to split a `total_size`-byte download into.
///
/// An explicit per-task count wins; otherwise one chunk per `chunk_size` bytes.
/// Either way the count is clamped to `1..=max_connections` and never exceeds
/// the number of bytes.
pub fn choose_connections(total_size: u64, requested: Option<usize>, cfg: &EngineConfig) -> usize {
    let max = cfg.max_connections.max(1);
    let n = match requested {
        Some(n) => n,
        None => {
            let chunk = cfg.chunk_size.max(1);
            usize::try_from(total_size / chunk).unwrap_or(max)
        }
    };
    let n = n.clamp(1, max);
    if total_size == 0 {
        return 1;
    }
    n.min(usize::try_from(total_size).unwrap_or(usize::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_count_is_capped() {
        let cfg = EngineConfig::default();
        assert_eq!(choose_connections(1 << 30, Some(4), &cfg), 4);
        assert_eq!(choose_connections(1 << 30, Some(100), &cfg), 32);
        assert_eq!(choose_connections(1 << 30, Some(0), &cfg), 1);
    }

    #[test]
    fn derived_from_chunk_size() {
        let cfg = EngineConfig::default();
        // 10 MiB / 4 MiB => 2 chunks
        assert_eq!(choose_connections(10 * 1024 * 1024, None, &cfg), 2);
        // Below one chunk => single connection
        assert_eq!(choose_connections(1000, None, &cfg), 1);
        // 1 GiB / 4 MiB = 256 => capped at 32
        assert_eq!(choose_connections(1 << 30, None, &cfg), 32);
    }

    #[test]
    fn never_more_chunks_than_bytes() {
        let cfg = EngineConfig::default();
        assert_eq!(choose_connections(3, Some(8), &cfg), 3);
        assert_eq!(choose_connections(0, Some(8), &cfg), 1);
    }
}
