//! Exact latency histogram with percentile queries.
//!
//! Samples are kept as a sorted multiset (value in nanoseconds mapped to its
//! count), so percentiles are exact rather than bucketed estimates. Intended
//! for one owning thread; the consumer records, summarizes, and clears it in
//! windows.

use std::collections::BTreeMap;
use std::fmt::Write as _;

/// p99 regression budget in nanoseconds.
pub const P99_BUDGET_NS: u64 = 200_000;
/// p99.9 regression budget in nanoseconds.
pub const P999_BUDGET_NS: u64 = 500_000;

#[derive(Debug, Default)]
pub struct LatencyHistogram {
    samples: BTreeMap<u64, u64>,
    count: u64,
    sum: u64,
}

impl LatencyHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one latency sample in nanoseconds.
    pub fn record(&mut self, latency_ns: u64) {
        *self.samples.entry(latency_ns).or_insert(0) += 1;
        self.count += 1;
        self.sum += latency_ns;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn min(&self) -> u64 {
        self.samples.keys().next().copied().unwrap_or(0)
    }

    pub fn max(&self) -> u64 {
        self.samples.keys().next_back().copied().unwrap_or(0)
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum as f64 / self.count as f64
    }

    /// Exact percentile for `p` in `[0.0, 1.0]`.
    ///
    /// Selects the sample at index `floor(p * count)`, clamped to the last
    /// sample, by walking the distinct values in ascending order.
    pub fn percentile(&self, p: f64) -> u64 {
        if self.count == 0 {
            return 0;
        }
        let mut target = (p * self.count as f64) as u64;
        if target >= self.count {
            target = self.count - 1;
        }
        let mut cumulative = 0u64;
        for (&latency, &n) in &self.samples {
            cumulative += n;
            if cumulative > target {
                return latency;
            }
        }
        self.max()
    }

    /// Drop all samples and reset the running totals.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.count = 0;
        self.sum = 0;
    }

    /// Multi-line summary with the percentile spread and the regression
    /// budget verdicts.
    pub fn summary(&self) -> String {
        if self.count == 0 {
            return "no latency samples recorded".to_string();
        }

        let us = |ns: u64| ns as f64 / 1_000.0;
        let p99 = self.percentile(0.99);
        let p999 = self.percentile(0.999);

        let mut out = String::new();
        let _ = writeln!(out, "latency summary (n={})", self.count);
        let _ = writeln!(out, "  min:  {:>10.2} us", us(self.min()));
        let _ = writeln!(out, "  mean: {:>10.2} us", self.mean() / 1_000.0);
        let _ = writeln!(out, "  p50:  {:>10.2} us", us(self.percentile(0.50)));
        let _ = writeln!(out, "  p90:  {:>10.2} us", us(self.percentile(0.90)));
        let _ = writeln!(out, "  p99:  {:>10.2} us", us(p99));
        let _ = writeln!(out, "  p999: {:>10.2} us", us(p999));
        let _ = writeln!(out, "  max:  {:>10.2} us", us(self.max()));
        let _ = writeln!(
            out,
            "  p99 < 200us:  {} ({:.2}us)",
            if p99 < P99_BUDGET_NS { "PASS" } else { "FAIL" },
            us(p99)
        );
        let _ = write!(
            out,
            "  p999 < 500us: {} ({:.2}us)",
            if p999 < P999_BUDGET_NS { "PASS" } else { "FAIL" },
            us(p999)
        );
        out
    }
}
