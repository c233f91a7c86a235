// Per-interface throughput from successive raw counter readings.

use std::collections::HashMap;
use tracing::debug;

/// Last reading the next rate is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Baseline {
    pub timestamp_ms: u64,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
}

/// Bytes per second, never negative.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rate {
    pub upload_bps: f64,
    pub download_bps: f64,
}

/// Owns the baseline map keyed by interface name.
///
/// A reading whose timestamp does not advance, or whose counters went
/// backwards (reset, wrap, re-created interface), reports a zero rate and
/// becomes the new baseline, so the next tick measures from it.
#[derive(Debug, Default)]
pub struct RateSampler {
    baselines: HashMap<String, Baseline>,
}

impl RateSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample(&mut self, name: &str, bytes_sent: u64, bytes_recv: u64, now_ms: u64) -> Rate {
        let current = Baseline {
            timestamp_ms: now_ms,
            bytes_sent,
            bytes_recv,
        };
        let Some(slot) = self.baselines.get_mut(name) else {
            self.baselines.insert(name.to_string(), current);
            return Rate::default();
        };
        let prev = std::mem::replace(slot, current);

        if now_ms <= prev.timestamp_ms {
            debug!(
                interface = name,
                prev_ts = prev.timestamp_ms,
                now_ts = now_ms,
                "non-increasing timestamp; rebased"
            );
            return Rate::default();
        }
        if bytes_sent < prev.bytes_sent || bytes_recv < prev.bytes_recv {
            debug!(interface = name, "counter decreased; rebased");
            return Rate::default();
        }

        let dt_secs = (now_ms - prev.timestamp_ms) as f64 / 1000.0;
        Rate {
            upload_bps: (bytes_sent - prev.bytes_sent) as f64 / dt_secs,
            download_bps: (bytes_recv - prev.bytes_recv) as f64 / dt_secs,
        }
    }

    pub fn baseline(&self, name: &str) -> Option<Baseline> {
        self.baselines.get(name).copied()
    }

    /// Drop the baseline so the interface starts over if it comes back.
    pub fn forget(&mut self, name: &str) {
        self.baselines.remove(name);
    }

    pub fn tracked(&self) -> usize {
        self.baselines.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_observation_is_zero_and_sets_baseline() {
        let mut s = RateSampler::new();
        let r = s.sample("eth0", 1000, 2000, 0);
        assert_eq!(r, Rate::default());
        assert_eq!(
            s.baseline("eth0"),
            Some(Baseline {
                timestamp_ms: 0,
                bytes_sent: 1000,
                bytes_recv: 2000
            })
        );
    }

    #[test]
    fn steady_counters_yield_bytes_per_second() {
        let mut s = RateSampler::new();
        s.sample("eth0", 1000, 2000, 0);
        let r = s.sample("eth0", 2000, 2500, 1000);
        assert_eq!(r.upload_bps, 1000.0);
        assert_eq!(r.download_bps, 500.0);
    }

    #[test]
    fn counter_reset_reports_zero_and_rebases() {
        let mut s = RateSampler::new();
        s.sample("eth0", 1000, 2000, 0);
        s.sample("eth0", 2000, 2500, 1000);
        let r = s.sample("eth0", 500, 2600, 2000);
        assert_eq!(r.upload_bps, 0.0);
        assert_eq!(r.download_bps, 0.0);
        assert_eq!(
            s.baseline("eth0"),
            Some(Baseline {
                timestamp_ms: 2000,
                bytes_sent: 500,
                bytes_recv: 2600
            })
        );

        // Healed within one tick: measured from the reset reading.
        let r = s.sample("eth0", 1500, 2700, 3000);
        assert_eq!(r.upload_bps, 1000.0);
        assert_eq!(r.download_bps, 100.0);
    }

    #[test]
    fn stalled_or_backwards_clock_reports_zero() {
        let mut s = RateSampler::new();
        s.sample("wlan0", 0, 0, 5000);
        assert_eq!(s.sample("wlan0", 100, 100, 5000), Rate::default());
        assert_eq!(s.sample("wlan0", 200, 200, 4000), Rate::default());
        assert_eq!(s.baseline("wlan0").map(|b| b.timestamp_ms), Some(4000));
        let r = s.sample("wlan0", 1200, 200, 5000);
        assert_eq!(r.upload_bps, 1000.0);
        assert_eq!(r.download_bps, 0.0);
    }

    #[test]
    fn interfaces_are_tracked_independently() {
        let mut s = RateSampler::new();
        s.sample("eth0", 0, 0, 0);
        s.sample("wlan0", 10_000, 10_000, 0);
        let eth = s.sample("eth0", 4000, 0, 2000);
        let wlan = s.sample("wlan0", 9_000, 12_000, 2000);
        assert_eq!(eth.upload_bps, 2000.0);
        assert_eq!(wlan, Rate::default());
        assert_eq!(s.tracked(), 2);
        s.forget("eth0");
        assert_eq!(s.sample("eth0", 8000, 0, 3000), Rate::default());
    }

    #[test]
    fn never_negative_over_mixed_readings() {
        let readings: [(u64, u64, u64); 8] = [
            (0, 10, 10),
            (1000, 50, 20),
            (2000, 40, 30),
            (2000, 90, 90),
            (3000, 0, 0),
            (2500, 10, 10),
            (4000, u64::MAX, 5),
            (5000, 3, u64::MAX),
        ];
        let mut s = RateSampler::new();
        for (ts, sent, recv) in readings {
            let r = s.sample("eth0", sent, recv, ts);
            assert!(r.upload_bps >= 0.0 && r.download_bps >= 0.0);
            assert!(r.upload_bps.is_finite() && r.download_bps.is_finite());
        }
    }
}
