//! Trend buffer: a fixed number of event-step bins with decimation on overflow.
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
//!
//! Bin `i` covers events `[origin + i*step, origin + (i+1)*step)`. A fill
//! past the last bin lands in the overflow bin and triggers the configured
//! decimation exactly once:
//!
//! - **RebinHalve**: pairs of bins merge into the first half, `step` doubles
//! - **Slide**: bins shift one place toward bin 0, the anchor moves by `step`
//! - **Reset**: all bins clear and the window jumps `bins * step` events ahead
//!
//! The value that triggered a decimation stays in the overflow bin; it is
//! not re-binned.

use stripmon_core::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What a trend buffer does when a fill overflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum DecimationMode {
    /// Merge bin pairs and double the step.
    #[default]
    RebinHalve,
    /// Drop the oldest bin and advance the anchor by one step.
    Slide,
    /// Clear everything and start a new window.
    Reset,
}

/// Configuration for trend buffers.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct TrendConfig {
    /// Number of bins (default: 100).
    pub bins: usize,
    /// Events per bin at start (default: 1).
    pub step: u64,
    /// Overflow policy.
    pub mode: DecimationMode,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            bins: 100,
            step: 1,
            mode: DecimationMode::RebinHalve,
        }
    }
}

impl TrendConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of bins.
    #[must_use]
    pub fn with_bins(mut self, bins: usize) -> Self {
        self.bins = bins;
        self
    }

    /// Sets the initial step.
    #[must_use]
    pub fn with_step(mut self, step: u64) -> Self {
        self.step = step;
        self
    }

    /// Sets the decimation mode.
    #[must_use]
    pub fn with_mode(mut self, mode: DecimationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Checks that the buffer can be built.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if `bins < 2` or `step == 0`.
    pub fn validate(&self) -> Result<()> {
        if self.bins < 2 {
            return Err(Error::Config(format!(
                "trend needs at least 2 bins, got {}",
                self.bins
            )));
        }
        if self.step == 0 {
            return Err(Error::Config("trend step must be positive".to_string()));
        }
        Ok(())
    }
}

/// Mean, spread and entry count of one trend bin.
///
/// Values are accumulated with Welford's update; the error is the standard
/// error of the mean.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrendBin {
    entries: u64,
    mean: f64,
    m2: f64,
}

impl TrendBin {
    /// Builds a bin from its displayed quantities.
    #[must_use]
    pub fn from_parts(content: f64, error: f64, entries: u64) -> Self {
        let n = entries as f64;
        let m2 = if entries > 1 {
            error * error * n * (n - 1.0)
        } else {
            0.0
        };
        Self {
            entries,
            mean: if entries > 0 { content } else { 0.0 },
            m2,
        }
    }

    /// Number of values in the bin.
    #[must_use]
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Mean of the values in the bin.
    #[must_use]
    pub fn content(&self) -> f64 {
        self.mean
    }

    /// Standard error of the mean, 0 with fewer than two entries.
    #[must_use]
    pub fn error(&self) -> f64 {
        if self.entries < 2 {
            return 0.0;
        }
        let n = self.entries as f64;
        (self.m2 / (n - 1.0) / n).sqrt()
    }

    /// Returns true if the bin has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    fn push(&mut self, value: f64) {
        self.entries += 1;
        let delta = value - self.mean;
        self.mean += delta / self.entries as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Content is the plain mean of the pair, error their quadrature sum
    /// halved. An empty bin counts as content 0 and error 0.
    fn merge(a: &Self, b: &Self) -> Self {
        if a.is_empty() && b.is_empty() {
            return Self::default();
        }
        Self::from_parts(
            (a.content() + b.content()) / 2.0,
            a.error().hypot(b.error()) / 2.0,
            a.entries + b.entries,
        )
    }
}

/// Where a fill ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    /// Accumulated into the given bin.
    Binned(usize),
    /// Went to the overflow bin and the buffer was decimated.
    Decimated,
}

/// Fixed-size rolling time series of one metric.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrendBuffer {
    name: String,
    mode: DecimationMode,
    bins: Vec<TrendBin>,
    overflow: TrendBin,
    base_step: u64,
    step: u64,
    anchor: Option<u64>,
    resets: u64,
    decimations: u64,
    last_event: Option<u64>,
    entries: u64,
}

impl TrendBuffer {
    /// Creates an empty buffer anchored at its first fill.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the configuration is invalid.
    pub fn new(name: impl Into<String>, config: &TrendConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid(name.into(), config))
    }

    pub(crate) fn from_valid(name: String, config: &TrendConfig) -> Self {
        Self {
            name,
            mode: config.mode,
            bins: vec![TrendBin::default(); config.bins],
            overflow: TrendBin::default(),
            base_step: config.step,
            step: config.step,
            anchor: None,
            resets: 0,
            decimations: 0,
            last_event: None,
            entries: 0,
        }
    }

    /// Anchors bin 0 at `event` instead of at the first fill.
    #[must_use]
    pub fn with_anchor(mut self, event: u64) -> Self {
        self.anchor = Some(event);
        self
    }

    /// Records `value` for `event`.
    ///
    /// # Errors
    /// Returns [`Error::OutOfOrderFill`] if `event` precedes the previous
    /// fill or the start of the current window; the buffer is unchanged.
    pub fn fill(&mut self, event: u64, value: f64) -> Result<FillOutcome> {
        if let Some(last) = self.last_event {
            if event < last {
                return Err(Error::OutOfOrderFill { event, last });
            }
        }
        let anchor = self.anchor.unwrap_or(event);
        let origin = self.origin_from(anchor);
        if event < origin {
            return Err(Error::OutOfOrderFill {
                event,
                last: origin,
            });
        }

        self.anchor = Some(anchor);
        self.last_event = Some(event);
        self.entries += 1;

        let target = (event - origin) / self.step;
        match usize::try_from(target) {
            Ok(index) if index < self.bins.len() => {
                self.bins[index].push(value);
                Ok(FillOutcome::Binned(index))
            }
            _ => {
                self.overflow.push(value);
                self.decimate();
                Ok(FillOutcome::Decimated)
            }
        }
    }

    fn origin_from(&self, anchor: u64) -> u64 {
        match self.mode {
            DecimationMode::Reset => {
                anchor + self.resets * self.bins.len() as u64 * self.step
            }
            DecimationMode::RebinHalve | DecimationMode::Slide => anchor,
        }
    }

    fn decimate(&mut self) {
        self.decimations += 1;
        log::debug!(
            "trend {}: decimating ({:?}) at step {}",
            self.name,
            self.mode,
            self.step
        );
        match self.mode {
            DecimationMode::RebinHalve => self.rebin_halve(),
            DecimationMode::Slide => self.slide(),
            DecimationMode::Reset => self.reset(),
        }
    }

    fn rebin_halve(&mut self) {
        let half = self.bins.len() / 2;
        for k in 0..half {
            self.bins[k] = TrendBin::merge(&self.bins[2 * k], &self.bins[2 * k + 1]);
        }
        for bin in &mut self.bins[half..] {
            *bin = TrendBin::default();
        }
        self.overflow = TrendBin::default();
        self.step *= 2;
    }

    fn slide(&mut self) {
        self.bins.rotate_left(1);
        if let Some(last) = self.bins.last_mut() {
            *last = TrendBin::default();
        }
        if let Some(anchor) = self.anchor.as_mut() {
            *anchor += self.step;
        }
    }

    fn reset(&mut self) {
        self.bins.iter_mut().for_each(|b| *b = TrendBin::default());
        self.overflow = TrendBin::default();
        self.resets += 1;
    }

    /// Buffer name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decimation mode.
    #[must_use]
    pub fn mode(&self) -> DecimationMode {
        self.mode
    }

    /// The addressable bins.
    #[must_use]
    pub fn bins(&self) -> &[TrendBin] {
        &self.bins
    }

    /// Number of addressable bins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    /// Returns true if no value was ever filled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Events per bin.
    #[must_use]
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Anchor event, `None` before the first fill of an unanchored buffer.
    #[must_use]
    pub fn anchor(&self) -> Option<u64> {
        self.anchor
    }

    /// First event of bin 0.
    #[must_use]
    pub fn origin(&self) -> Option<u64> {
        self.anchor.map(|a| self.origin_from(a))
    }

    /// Entries in the overflow bin.
    #[must_use]
    pub fn overflow_entries(&self) -> u64 {
        self.overflow.entries
    }

    /// Times the decimation policy ran.
    #[must_use]
    pub fn decimations(&self) -> u64 {
        self.decimations
    }

    /// Total fills, including those that overflowed.
    #[must_use]
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Returns the buffer to its freshly configured state.
    ///
    /// Bins, overflow and counters are emptied and the step goes back to
    /// the configured one. The anchor survives, so the cleared buffer
    /// starts again at the same origin.
    pub fn clear(&mut self) {
        self.bins.iter_mut().for_each(|b| *b = TrendBin::default());
        self.overflow = TrendBin::default();
        self.step = self.base_step;
        self.resets = 0;
        self.decimations = 0;
        self.last_event = None;
        self.entries = 0;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use approx::assert_relative_eq;

    fn buffer(mode: DecimationMode) -> TrendBuffer {
        let config = TrendConfig::new().with_bins(4).with_step(10).with_mode(mode);
        TrendBuffer::new("Trend_cCharge", &config).unwrap()
    }

    fn fill_one_per_bin(trend: &mut TrendBuffer) {
        for event in [0, 10, 20, 30] {
            trend.fill(event, 1.0).unwrap();
        }
    }

    #[test]
    fn test_one_fill_per_bin() {
        let mut trend = buffer(DecimationMode::RebinHalve);
        fill_one_per_bin(&mut trend);
        for bin in trend.bins() {
            assert_eq!(bin.entries(), 1);
            assert_eq!(bin.content(), 1.0);
        }
        assert_eq!(trend.decimations(), 0);
    }

    #[test]
    fn test_overflow_decimates_exactly_once() {
        for mode in [
            DecimationMode::RebinHalve,
            DecimationMode::Slide,
            DecimationMode::Reset,
        ] {
            let mut trend = buffer(mode);
            fill_one_per_bin(&mut trend);
            assert_eq!(trend.fill(40, 1.0).unwrap(), FillOutcome::Decimated);
            assert_eq!(trend.decimations(), 1, "{mode:?}");
            assert_eq!(trend.len(), 4, "{mode:?}");
        }
    }

    #[test]
    fn test_rebin_halve_merges_pairs() {
        let mut trend = buffer(DecimationMode::RebinHalve);
        for (event, value) in [(0, 1.0), (10, 3.0), (20, 5.0), (25, 5.0), (30, 9.0)] {
            trend.fill(event, value).unwrap();
        }
        let before: u64 = trend.bins().iter().map(TrendBin::entries).sum();

        trend.fill(40, 100.0).unwrap();

        let bins = trend.bins();
        assert_eq!(trend.step(), 20);
        assert_relative_eq!(bins[0].content(), 2.0);
        assert_eq!(bins[0].entries(), 2);
        assert_relative_eq!(bins[1].content(), 7.0);
        assert_eq!(bins[1].entries(), 3);
        assert!(bins[2].is_empty());
        assert!(bins[3].is_empty());
        assert_eq!(trend.overflow_entries(), 0);

        let after: u64 = bins.iter().map(TrendBin::entries).sum();
        assert_eq!(before, after);
    }

    #[test]
    fn test_rebin_halve_error_propagation() {
        let mut trend = buffer(DecimationMode::RebinHalve);
        for (event, value) in [(0, 1.0), (1, 3.0), (10, 2.0), (11, 6.0)] {
            trend.fill(event, value).unwrap();
        }
        let e0 = trend.bins()[0].error();
        let e1 = trend.bins()[1].error();
        assert_relative_eq!(e0, 1.0);
        assert_relative_eq!(e1, 2.0);

        trend.fill(40, 0.0).unwrap();
        let merged = trend.bins()[0];
        assert_eq!(merged.entries(), 4);
        assert_relative_eq!(merged.content(), 3.0);
        assert_relative_eq!(
            merged.error(),
            (e0 * e0 + e1 * e1).sqrt() / 2.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_rebin_halve_rebins_later_fills() {
        let mut trend = buffer(DecimationMode::RebinHalve);
        fill_one_per_bin(&mut trend);
        trend.fill(40, 1.0).unwrap();
        // Step is now 20: event 45 belongs to bin 2.
        assert_eq!(trend.fill(45, 2.0).unwrap(), FillOutcome::Binned(2));
        assert_eq!(trend.fill(79, 2.0).unwrap(), FillOutcome::Binned(3));
        assert_eq!(trend.fill(80, 2.0).unwrap(), FillOutcome::Decimated);
        assert_eq!(trend.step(), 40);
    }

    #[test]
    fn test_merge_with_empty_partner_halves_content() {
        let mut trend = buffer(DecimationMode::RebinHalve);
        trend.fill(0, 4.0).unwrap();
        trend.fill(20, 8.0).unwrap();
        trend.fill(40, 0.0).unwrap();

        let bins = trend.bins();
        assert_relative_eq!(bins[0].content(), 2.0);
        assert_eq!(bins[0].entries(), 1);
        assert_relative_eq!(bins[1].content(), 4.0);
        assert_eq!(bins[1].entries(), 1);
        assert!(bins[2].is_empty());
    }

    #[test]
    fn test_merge_of_two_empty_bins_stays_empty() {
        let mut trend = buffer(DecimationMode::RebinHalve);
        trend.fill(0, 4.0).unwrap();
        trend.fill(40, 0.0).unwrap();
        assert!(trend.bins()[1].is_empty());
        assert_relative_eq!(trend.bins()[1].content(), 0.0);
    }

    #[test]
    fn test_slide_shifts_bins() {
        let mut trend = buffer(DecimationMode::Slide);
        for (i, event) in [0, 10, 20, 30].into_iter().enumerate() {
            trend.fill(event, i as f64).unwrap();
        }
        let before: Vec<TrendBin> = trend.bins().to_vec();

        trend.fill(40, 99.0).unwrap();

        let after = trend.bins();
        for i in 0..3 {
            assert_eq!(after[i], before[i + 1]);
        }
        assert_eq!(after[3].entries(), 0);
        assert_eq!(trend.step(), 10);
        assert_eq!(trend.anchor(), Some(10));
        assert_eq!(trend.overflow_entries(), 1);
    }

    #[test]
    fn test_slide_next_fill_lands_in_last_bin() {
        let mut trend = buffer(DecimationMode::Slide);
        fill_one_per_bin(&mut trend);
        trend.fill(40, 1.0).unwrap();
        assert_eq!(trend.fill(45, 5.0).unwrap(), FillOutcome::Binned(3));
        assert_eq!(trend.fill(50, 1.0).unwrap(), FillOutcome::Decimated);
        assert_eq!(trend.anchor(), Some(20));
        assert_eq!(trend.overflow_entries(), 2);
    }

    #[test]
    fn test_reset_clears_and_keeps_parameters() {
        let mut trend = buffer(DecimationMode::Reset);
        fill_one_per_bin(&mut trend);
        trend.fill(40, 1.0).unwrap();

        assert!(trend.bins().iter().all(TrendBin::is_empty));
        assert_eq!(trend.overflow_entries(), 0);
        assert_eq!(trend.step(), 10);
        assert_eq!(trend.anchor(), Some(0));
        assert_eq!(trend.origin(), Some(40));
        assert_eq!(trend.fill(40, 2.0).unwrap(), FillOutcome::Binned(0));
    }

    #[test]
    fn test_clear_restores_configured_window() {
        let mut trend = buffer(DecimationMode::RebinHalve);
        fill_one_per_bin(&mut trend);
        trend.fill(40, 1.0).unwrap();
        assert_eq!(trend.step(), 20);

        trend.clear();
        assert_eq!(trend.step(), 10);
        assert_eq!(trend.decimations(), 0);
        assert_eq!(trend.entries(), 0);
        assert_eq!(trend.overflow_entries(), 0);
        assert!(trend.bins().iter().all(TrendBin::is_empty));
        assert_eq!(trend.anchor(), Some(0));

        // Earlier events are accepted again and land on the original grid.
        assert_eq!(trend.fill(15, 2.0).unwrap(), FillOutcome::Binned(1));
        assert_eq!(trend.fill(30, 2.0).unwrap(), FillOutcome::Binned(3));
    }

    #[test]
    fn test_clear_rewinds_reset_window() {
        let mut trend = buffer(DecimationMode::Reset);
        fill_one_per_bin(&mut trend);
        trend.fill(40, 1.0).unwrap();
        assert_eq!(trend.origin(), Some(40));

        trend.clear();
        assert_eq!(trend.origin(), Some(0));
        assert_eq!(trend.fill(5, 1.0).unwrap(), FillOutcome::Binned(0));
    }

    #[test]
    fn test_out_of_order_fill_is_rejected() {
        let mut trend = buffer(DecimationMode::Slide);
        trend.fill(15, 1.0).unwrap();
        let snapshot = trend.clone();

        let err = trend.fill(14, 1.0).unwrap_err();
        assert_eq!(err, Error::OutOfOrderFill { event: 14, last: 15 });
        assert_eq!(trend, snapshot);
    }

    #[test]
    fn test_fill_before_anchor_is_rejected() {
        let config = TrendConfig::new().with_bins(4).with_step(10);
        let mut trend = TrendBuffer::new("t", &config).unwrap().with_anchor(100);
        assert!(trend.fill(99, 1.0).is_err());
        assert!(trend.is_empty());
        assert_eq!(trend.fill(100, 1.0).unwrap(), FillOutcome::Binned(0));
    }

    #[test]
    fn test_unanchored_buffer_anchors_on_first_fill() {
        let mut trend = buffer(DecimationMode::RebinHalve);
        assert_eq!(trend.anchor(), None);
        assert_eq!(trend.fill(1234, 1.0).unwrap(), FillOutcome::Binned(0));
        assert_eq!(trend.anchor(), Some(1234));
    }

    #[test]
    fn test_invalid_config() {
        assert!(TrendBuffer::new("t", &TrendConfig::new().with_bins(1)).is_err());
        assert!(TrendBuffer::new("t", &TrendConfig::new().with_step(0)).is_err());
    }

    #[test]
    fn test_bin_error_is_standard_error() {
        let mut bin = TrendBin::default();
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            bin.push(v);
        }
        // Sample variance 32/7, standard error sqrt(32/7/8).
        assert_relative_eq!(bin.content(), 5.0);
        assert_relative_eq!(bin.error(), (32.0f64 / 7.0 / 8.0).sqrt(), epsilon = 1e-12);
    }
}
