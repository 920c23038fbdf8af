//! Progress math and user-facing rendering helpers.
//!
//! `ProgressTracker` is a pure function of the samples fed into it (elapsed
//! seconds + cumulative bytes); throughput is smoothed over a small window so
//! bursty chunk arrival does not make the rate jitter. No I/O happens here.

use std::collections::VecDeque;

/// Number of samples used for throughput smoothing.
const DEFAULT_WINDOW: usize = 5;

const BAR_CELLS: usize = 20;
const BAR_FILLED: char = '⬢';
const BAR_EMPTY: char = '⬡';

/// One computed progress point, ready for rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    /// Cumulative bytes moved so far.
    pub transferred: u64,
    /// Total bytes, 0 when unknown.
    pub total: u64,
    /// Percent complete in [0.0, 100.0]; 0 when the total is unknown.
    pub percent: f64,
    /// Smoothed throughput in bytes per second.
    pub bytes_per_sec: f64,
    /// Estimated seconds remaining; `None` when the rate is 0 or the total is
    /// unknown. Callers must render `None` distinctly (not as "0s").
    pub eta_secs: Option<f64>,
}

/// Computes percent / throughput / ETA from byte counters.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: u64,
    window: usize,
    samples: VecDeque<(f64, u64)>,
}

impl ProgressTracker {
    /// Tracker for a transfer of `total` bytes (0 = unknown).
    pub fn new(total: u64) -> Self {
        Self::with_window(total, DEFAULT_WINDOW)
    }

    pub fn with_window(total: u64, window: usize) -> Self {
        Self {
            total,
            window: window.max(2),
            samples: VecDeque::new(),
        }
    }

    /// Feed a sample (`elapsed_secs` since the transfer started, cumulative
    /// `transferred` bytes) and get the derived snapshot back.
    pub fn record(&mut self, elapsed_secs: f64, transferred: u64) -> ProgressSnapshot {
        self.samples.push_back((elapsed_secs, transferred));
        while self.samples.len() > self.window {
            self.samples.pop_front();
        }

        let percent = if self.total > 0 {
            (transferred as f64 / self.total as f64 * 100.0).min(100.0)
        } else {
            0.0
        };

        let bytes_per_sec = self.smoothed_rate(elapsed_secs, transferred);

        let eta_secs = if self.total == 0 {
            None
        } else {
            let remaining = self.total.saturating_sub(transferred);
            if remaining == 0 {
                Some(0.0)
            } else if bytes_per_sec > 0.0 {
                Some(remaining as f64 / bytes_per_sec)
            } else {
                None
            }
        };

        ProgressSnapshot {
            transferred,
            total: self.total,
            percent,
            bytes_per_sec,
            eta_secs,
        }
    }

    /// Average rate across the sampling window; falls back to the overall
    /// average when only one sample exists.
    fn smoothed_rate(&self, elapsed_secs: f64, transferred: u64) -> f64 {
        if self.samples.len() >= 2 {
            let (t0, b0) = self.samples[0];
            let (t1, b1) = self.samples[self.samples.len() - 1];
            let dt = t1 - t0;
            if dt > 0.0 {
                return (b1.saturating_sub(b0)) as f64 / dt;
            }
        }
        if elapsed_secs > 0.0 {
            transferred as f64 / elapsed_secs
        } else {
            0.0
        }
    }
}

/// "512.0 KB" below 1 MiB, "12.3 MB" above (matches the chat message format).
pub fn format_size(bytes: u64) -> String {
    const MIB: f64 = 1024.0 * 1024.0;
    if (bytes as f64) < MIB {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / MIB)
    }
}

/// "42s", "3m 10s", "1h 2m"; `None` renders as "?".
pub fn format_eta(eta_secs: Option<f64>) -> String {
    let Some(secs) = eta_secs else {
        return "?".to_string();
    };
    let secs = secs.max(0.0) as u64;
    if secs < 60 {
        return format!("{}s", secs);
    }
    let (mins, secs) = (secs / 60, secs % 60);
    if mins < 60 {
        return format!("{}m {}s", mins, secs);
    }
    format!("{}h {}m", mins / 60, mins % 60)
}

/// 20-cell visual bar, filled proportionally to `percent`.
pub fn progress_bar(percent: f64) -> String {
    let filled = ((percent / 100.0) * BAR_CELLS as f64) as usize;
    let filled = filled.min(BAR_CELLS);
    let mut bar = String::with_capacity(BAR_CELLS * 3);
    for _ in 0..filled {
        bar.push(BAR_FILLED);
    }
    for _ in filled..BAR_CELLS {
        bar.push(BAR_EMPTY);
    }
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_in_range_and_monotone() {
        let mut t = ProgressTracker::new(1000);
        let mut last = -1.0;
        for (secs, bytes) in [(1.0, 100u64), (2.0, 400), (3.0, 400), (4.0, 1000)] {
            let s = t.record(secs, bytes);
            assert!(s.percent >= 0.0 && s.percent <= 100.0);
            assert!(s.percent >= last, "percent must not decrease");
            last = s.percent;
        }
        assert_eq!(last, 100.0);
    }

    #[test]
    fn percent_clamps_when_transferred_exceeds_total() {
        let mut t = ProgressTracker::new(100);
        let s = t.record(1.0, 150);
        assert_eq!(s.percent, 100.0);
    }

    #[test]
    fn unknown_total_means_zero_percent_and_no_eta() {
        let mut t = ProgressTracker::new(0);
        let s = t.record(2.0, 5000);
        assert_eq!(s.percent, 0.0);
        assert_eq!(s.eta_secs, None);
    }

    #[test]
    fn eta_none_when_rate_is_zero() {
        let mut t = ProgressTracker::new(1000);
        t.record(1.0, 100);
        // No new bytes across the window: rate drops to 0.
        let s = t.record(2.0, 100);
        assert_eq!(s.bytes_per_sec, 0.0);
        assert_eq!(s.eta_secs, None);
    }

    #[test]
    fn eta_zero_when_done() {
        let mut t = ProgressTracker::new(100);
        let s = t.record(1.0, 100);
        assert_eq!(s.eta_secs, Some(0.0));
    }

    #[test]
    fn throughput_smooths_over_window() {
        let mut t = ProgressTracker::with_window(10_000, 3);
        t.record(1.0, 1000);
        t.record(2.0, 2000);
        let s = t.record(3.0, 3000);
        // 2000 bytes over the 2s spanned by the 3-sample window.
        assert!((s.bytes_per_sec - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn single_sample_uses_overall_average() {
        let mut t = ProgressTracker::new(10_000);
        let s = t.record(2.0, 4000);
        assert!((s.bytes_per_sec - 2000.0).abs() < 1e-6);
    }

    #[test]
    fn format_size_switches_units() {
        assert_eq!(format_size(512), "0.5 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_size(10 * 1024 * 1024 + 512 * 1024), "10.5 MB");
    }

    #[test]
    fn format_eta_renders_unknown_distinctly() {
        assert_eq!(format_eta(None), "?");
        assert_eq!(format_eta(Some(42.0)), "42s");
        assert_eq!(format_eta(Some(190.0)), "3m 10s");
        assert_eq!(format_eta(Some(3720.0)), "1h 2m");
    }

    #[test]
    fn progress_bar_fills_proportionally() {
        assert_eq!(progress_bar(0.0).chars().filter(|&c| c == '⬢').count(), 0);
        assert_eq!(progress_bar(50.0).chars().filter(|&c| c == '⬢').count(), 10);
        assert_eq!(progress_bar(100.0).chars().filter(|&c| c == '⬢').count(), 20);
        assert_eq!(progress_bar(50.0).chars().count(), 20);
    }
}
