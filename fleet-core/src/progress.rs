//! Transfer progress reporting.

use std::time::Duration;

const KB: u64 = 1024;
const MB: u64 = 1024 * 1024;

/// Human-readable size in B, KB or MB.
fn format_size(bytes: u64) -> String {
    if bytes < KB {
        format!("{}B", bytes)
    } else if bytes < MB {
        format!("{:.2}KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.2}MB", bytes as f64 / MB as f64)
    }
}

/// `transferred/total (pct%)`, or just the transferred size when the total is unknown.
pub fn format_progress(transferred: u64, total: Option<u64>) -> String {
    match total {
        Some(total) if total > 0 => {
            let pct = (transferred as f64 / total as f64 * 100.0).min(100.0);
            format!(
                "{}/{} ({:.1}%)",
                format_size(transferred),
                format_size(total),
                pct
            )
        }
        _ => format_size(transferred),
    }
}

/// Decides when a running transfer should log its progress.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: Option<u64>,
    transferred: u64,
    interval: Duration,
    last_report: Duration,
}

impl ProgressTracker {
    /// Default reporting interval.
    pub const INTERVAL: Duration = Duration::from_secs(5);

    /// Track a transfer of `total` bytes, reporting every `interval`.
    pub fn new(total: Option<u64>, interval: Duration) -> Self {
        Self {
            total,
            transferred: 0,
            interval,
            last_report: Duration::ZERO,
        }
    }

    /// Record `bytes` more at `elapsed` since start; returns a line when one is due.
    pub fn advance(&mut self, bytes: u64, elapsed: Duration) -> Option<String> {
        self.transferred = self.transferred.saturating_add(bytes);
        if elapsed.saturating_sub(self.last_report) >= self.interval {
            self.last_report = elapsed;
            Some(format_progress(self.transferred, self.total))
        } else {
            None
        }
    }

    /// Bytes so far.
    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    /// Final summary line.
    pub fn finish(&self) -> String {
        format_progress(self.transferred, self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(2048), "2.00KB");
        assert_eq!(format_size(3 * MB), "3.00MB");
    }

    #[test]
    fn progress_with_total() {
        assert_eq!(format_progress(512, Some(1024)), "512B/1.00KB (50.0%)");
        assert_eq!(format_progress(10, None), "10B");
        assert_eq!(format_progress(10, Some(0)), "10B");
    }

    #[test]
    fn tracker_reports_on_interval() {
        let mut t = ProgressTracker::new(Some(100), Duration::from_secs(5));
        assert!(t.advance(10, Duration::from_secs(1)).is_none());
        let line = t.advance(40, Duration::from_secs(5)).unwrap();
        assert_eq!(line, "50B/100B (50.0%)");
        assert!(t.advance(10, Duration::from_secs(7)).is_none());
        assert!(t.advance(40, Duration::from_secs(10)).is_some());
        assert_eq!(t.transferred(), 100);
        assert_eq!(t.finish(), "100B/100B (100.0%)");
    }
}
