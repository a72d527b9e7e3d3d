//! Named scalar statistic with a fixed binning.
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Uniform binning over `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HistogramSpec {
    /// Number of bins.
    pub bins: usize,
    /// Lower edge of the first bin.
    pub min: f64,
    /// Upper edge of the last bin.
    pub max: f64,
}

/// Where a value lands in a [`HistogramSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    Underflow,
    Bin(usize),
    Overflow,
    Nowhere,
}

impl HistogramSpec {
    /// Creates a binning.
    #[must_use]
    pub fn new(bins: usize, min: f64, max: f64) -> Self {
        Self { bins, min, max }
    }

    /// Width of one bin.
    #[must_use]
    pub fn bin_width(&self) -> f64 {
        if self.bins == 0 {
            0.0
        } else {
            (self.max - self.min) / self.bins as f64
        }
    }

    pub(crate) fn locate(&self, value: f64) -> Slot {
        if value.is_nan() || self.bins == 0 {
            return Slot::Nowhere;
        }
        if value < self.min {
            return Slot::Underflow;
        }
        if value >= self.max {
            return Slot::Overflow;
        }
        let index = ((value - self.min) / self.bin_width()) as usize;
        // Guard against rounding right below `max`.
        Slot::Bin(index.min(self.bins - 1))
    }
}

/// A histogram-like accumulator for one metric.
///
/// Tracks entry count, sum and sum of squares alongside bin counts. Values
/// are recorded as given; non-finite values reach the moments unchanged and
/// `NaN` is not binned.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MetricAccumulator {
    name: String,
    spec: HistogramSpec,
    counts: Vec<u64>,
    underflow: u64,
    overflow: u64,
    entries: u64,
    sum: f64,
    sum_sq: f64,
}

impl MetricAccumulator {
    /// Creates an empty accumulator.
    pub fn new(name: impl Into<String>, spec: HistogramSpec) -> Self {
        Self {
            name: name.into(),
            spec,
            counts: vec![0; spec.bins],
            underflow: 0,
            overflow: 0,
            entries: 0,
            sum: 0.0,
            sum_sq: 0.0,
        }
    }

    /// Records one observation.
    pub fn fill(&mut self, value: f64) {
        self.entries += 1;
        self.sum += value;
        self.sum_sq += value * value;
        match self.spec.locate(value) {
            Slot::Bin(index) => self.counts[index] += 1,
            Slot::Underflow => self.underflow += 1,
            Slot::Overflow => self.overflow += 1,
            Slot::Nowhere => {}
        }
    }

    /// Metric name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Binning.
    #[must_use]
    pub fn spec(&self) -> &HistogramSpec {
        &self.spec
    }

    /// Number of observations.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.entries
    }

    /// Sum of observations.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Mean of observations, 0 when empty.
    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.entries == 0 {
            0.0
        } else {
            self.sum / self.entries as f64
        }
    }

    /// Population variance, 0 when empty.
    #[must_use]
    pub fn variance(&self) -> f64 {
        if self.entries == 0 {
            return 0.0;
        }
        let n = self.entries as f64;
        let mean = self.sum / n;
        (self.sum_sq / n - mean * mean).max(0.0)
    }

    /// Standard deviation.
    #[must_use]
    pub fn rms(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Per-bin counts.
    #[must_use]
    pub fn bin_counts(&self) -> &[u64] {
        &self.counts
    }

    /// Entries below `min`.
    #[must_use]
    pub fn underflow(&self) -> u64 {
        self.underflow
    }

    /// Entries at or above `max`.
    #[must_use]
    pub fn overflow(&self) -> u64 {
        self.overflow
    }

    /// Drops all recorded observations.
    pub fn clear(&mut self) {
        self.counts.iter_mut().for_each(|c| *c = 0);
        self.underflow = 0;
        self.overflow = 0;
        self.entries = 0;
        self.sum = 0.0;
        self.sum_sq = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_moments() {
        let mut acc = MetricAccumulator::new("cCharge", HistogramSpec::new(10, 0.0, 10.0));
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            acc.fill(v);
        }
        assert_eq!(acc.count(), 8);
        assert_relative_eq!(acc.sum(), 40.0);
        assert_relative_eq!(acc.mean(), 5.0);
        assert_relative_eq!(acc.rms(), 2.0);
    }

    #[test]
    fn test_binning_and_flows() {
        let mut acc = MetricAccumulator::new("cWidth", HistogramSpec::new(4, -0.5, 3.5));
        acc.fill(-1.0);
        acc.fill(0.0);
        acc.fill(2.9);
        acc.fill(3.5);
        assert_eq!(acc.bin_counts(), &[1, 0, 0, 1]);
        assert_eq!(acc.underflow(), 1);
        assert_eq!(acc.overflow(), 1);
        assert_eq!(acc.count(), 4);
    }

    #[test]
    fn test_non_finite_values_are_recorded() {
        let mut acc = MetricAccumulator::new("cStoN", HistogramSpec::new(4, 0.0, 4.0));
        acc.fill(f64::NAN);
        acc.fill(f64::INFINITY);
        assert_eq!(acc.count(), 2);
        assert_eq!(acc.overflow(), 1);
        assert!(acc.mean().is_nan());
    }

    #[test]
    fn test_empty_accumulator() {
        let acc = MetricAccumulator::new("cNoise", HistogramSpec::new(4, 0.0, 4.0));
        assert_eq!(acc.count(), 0);
        assert_relative_eq!(acc.mean(), 0.0);
        assert_relative_eq!(acc.rms(), 0.0);
    }

    #[test]
    fn test_clear() {
        let mut acc = MetricAccumulator::new("cPos", HistogramSpec::new(2, 0.0, 2.0));
        acc.fill(1.0);
        acc.clear();
        assert_eq!(acc.count(), 0);
        assert_eq!(acc.bin_counts(), &[0, 0]);
    }
}
