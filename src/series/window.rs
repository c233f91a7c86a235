use crate::models::Sample;
use std::collections::VecDeque;

/// Bounded, time-ordered samples of one kind. Trimmed relative to the newest timestamp seen.
#[derive(Debug)]
pub struct RetentionWindow {
    samples: VecDeque<Sample>,
    window_ms: u64,
    max_len: usize,
    newest_ts: u64,
}

impl RetentionWindow {
    pub fn new(window_secs: u64, max_len: usize) -> Self {
        Self {
            samples: VecDeque::new(),
            window_ms: window_secs.saturating_mul(1000),
            max_len: max_len.max(1),
            newest_ts: 0,
        }
    }

    /// Returns how many samples still inside the time window were evicted by the length cap.
    pub fn push(&mut self, sample: Sample) -> usize {
        self.newest_ts = self.newest_ts.max(sample.timestamp());
        self.samples.push_back(sample);
        self.trim()
    }

    /// Applies on the next push; does not trim immediately.
    pub fn set_window_secs(&mut self, window_secs: u64) {
        self.window_ms = window_secs.saturating_mul(1000);
    }

    pub fn window_secs(&self) -> u64 {
        self.window_ms / 1000
    }

    pub fn newest_ts(&self) -> u64 {
        self.newest_ts
    }

    fn trim(&mut self) -> usize {
        let cutoff = self.newest_ts.saturating_sub(self.window_ms);
        while self
            .samples
            .front()
            .is_some_and(|s| s.timestamp() < cutoff)
        {
            self.samples.pop_front();
        }
        let capped = self.samples.len().saturating_sub(self.max_len);
        self.samples.drain(..capped);
        capped
    }

    /// Samples with `timestamp >= cutoff_ms`, insertion order.
    pub fn since(&self, cutoff_ms: u64) -> Vec<Sample> {
        self.samples
            .iter()
            .filter(|s| s.timestamp() >= cutoff_ms)
            .cloned()
            .collect()
    }

    /// Last `limit` samples, insertion order.
    pub fn recent(&self, limit: usize) -> Vec<Sample> {
        let skip = self.samples.len().saturating_sub(limit);
        self.samples.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SystemSample;

    fn sys(ts: u64) -> Sample {
        Sample::System(SystemSample {
            timestamp: ts,
            ..Default::default()
        })
    }

    fn timestamps(samples: &[Sample]) -> Vec<u64> {
        samples.iter().map(Sample::timestamp).collect()
    }

    #[test]
    fn drops_samples_older_than_window_relative_to_newest() {
        let mut w = RetentionWindow::new(30, 1000);
        for ts in [0, 10_000, 20_000, 30_000, 40_000] {
            w.push(sys(ts));
        }
        assert_eq!(timestamps(&w.recent(10)), vec![10_000, 20_000, 30_000, 40_000]);
    }

    #[test]
    fn caps_length() {
        let mut w = RetentionWindow::new(86_400, 3);
        let capped: Vec<usize> = (1..=5).map(|ts| w.push(sys(ts))).collect();
        assert_eq!(capped, vec![0, 0, 0, 1, 1]);
        assert_eq!(w.len(), 3);
        assert_eq!(timestamps(&w.recent(10)), vec![3, 4, 5]);
    }

    #[test]
    fn time_trim_is_not_counted_as_capped() {
        let mut w = RetentionWindow::new(1, 2);
        assert_eq!(w.push(sys(0)), 0);
        assert_eq!(w.push(sys(500)), 0);
        assert_eq!(w.push(sys(5_000)), 0);
        assert_eq!(timestamps(&w.since(0)), vec![5_000]);
    }

    #[test]
    fn keeps_insertion_order_for_out_of_order_timestamps() {
        let mut w = RetentionWindow::new(30, 100);
        w.push(sys(5_000));
        w.push(sys(3_000));
        w.push(sys(4_000));
        assert_eq!(timestamps(&w.since(0)), vec![5_000, 3_000, 4_000]);
        assert_eq!(timestamps(&w.since(4_000)), vec![5_000, 4_000]);
    }

    #[test]
    fn window_change_applies_on_next_push() {
        let mut w = RetentionWindow::new(300, 100);
        for ts in [0, 100_000, 200_000] {
            w.push(sys(ts));
        }
        w.set_window_secs(30);
        assert_eq!(w.len(), 3);
        w.push(sys(210_000));
        assert_eq!(timestamps(&w.since(0)), vec![200_000, 210_000]);
    }

    #[test]
    fn recent_limit_larger_than_len() {
        let mut w = RetentionWindow::new(30, 10);
        assert!(w.recent(5).is_empty());
        w.push(sys(1));
        assert_eq!(w.recent(5).len(), 1);
        assert!(w.recent(0).is_empty());
    }
}
