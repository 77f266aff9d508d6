//! One-line progress and size formatting for terminal output.

use rangedl_core::progress::ProgressSnapshot;

const MIB: f64 = 1_048_576.0;

pub fn mib(bytes: u64) -> f64 {
    bytes as f64 / MIB
}

pub fn progress_line(s: &ProgressSnapshot) -> String {
    let rate = s.bytes_per_sec / MIB;
    let eta = s
        .eta
        .map(|d| format!("{:.0}s", d.as_secs_f64()))
        .unwrap_or_else(|| "?".to_string());
    if s.total > 0 {
        format!(
            "  {:.1} / {:.1} MiB ({:.1}%)  {:.2} MiB/s  {} conn  ETA {}  ",
            mib(s.downloaded),
            mib(s.total),
            s.fraction() * 100.0,
            rate,
            s.active_workers,
            eta
        )
    } else {
        format!("  {:.1} MiB  {:.2} MiB/s  ", mib(s.downloaded), rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn known_size_line() {
        let s = ProgressSnapshot {
            downloaded: 1_048_576,
            total: 4_194_304,
            active_workers: 4,
            bytes_per_sec: 1_048_576.0,
            eta: Some(Duration::from_secs(3)),
            elapsed: Duration::from_secs(1),
        };
        let line = progress_line(&s);
        assert!(line.contains("1.0 / 4.0 MiB (25.0%)"), "{line}");
        assert!(line.contains("4 conn"), "{line}");
        assert!(line.contains("ETA 3s"), "{line}");
    }

    #[test]
    fn unknown_size_line() {
        let s = ProgressSnapshot {
            downloaded: 524_288,
            total: 0,
            active_workers: 1,
            bytes_per_sec: 0.0,
            eta: None,
            elapsed: Duration::ZERO,
        };
        assert_eq!(progress_line(&s).trim(), "0.5 MiB  0.00 MiB/s");
    }
}
