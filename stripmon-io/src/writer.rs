//! Writers for the aggregated registry.

use crate::naming;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use stripmon_core::MonitorKey;
use stripmon_stats::{HistogramSpec, KeyedMetricRegistry, MetricAccumulator, Profile, TrendBuffer};

/// One summary distribution in a [`Snapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarySnapshot {
    /// Display name.
    pub name: String,
    /// Number of observations.
    pub entries: u64,
    /// Mean.
    pub mean: f64,
    /// Standard deviation.
    pub rms: f64,
    /// Observations below the range.
    pub underflow: u64,
    /// Observations above the range.
    pub overflow: u64,
    /// Binning.
    pub spec: HistogramSpec,
    /// Per-bin counts.
    pub counts: Vec<u64>,
}

impl SummarySnapshot {
    fn new(name: String, acc: &MetricAccumulator) -> Self {
        Self {
            name,
            entries: acc.count(),
            mean: acc.mean(),
            rms: acc.rms(),
            underflow: acc.underflow(),
            overflow: acc.overflow(),
            spec: *acc.spec(),
            counts: acc.bin_counts().to_vec(),
        }
    }
}

/// One trend bin in a [`Snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// Fills in the bin.
    pub entries: u64,
    /// Mean of the fills.
    pub content: f64,
    /// Error on the mean.
    pub error: f64,
}

/// One trend buffer in a [`Snapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSnapshot {
    /// Display name.
    pub name: String,
    /// X-axis title carrying the current step.
    pub axis_title: String,
    /// Events per bin.
    pub step: u64,
    /// Event of bin 0.
    pub origin: Option<u64>,
    /// Fills in the overflow bin.
    pub overflow: u64,
    /// Bins in order.
    pub bins: Vec<TrendPoint>,
}

impl TrendSnapshot {
    fn new(name: String, trend: &TrendBuffer) -> Self {
        Self {
            name,
            axis_title: naming::trend_axis_title(trend.step()),
            step: trend.step(),
            origin: trend.origin(),
            overflow: trend.overflow_entries(),
            bins: trend
                .bins()
                .iter()
                .map(|b| TrendPoint {
                    entries: b.entries(),
                    content: b.content(),
                    error: b.error(),
                })
                .collect(),
        }
    }
}

/// A module pulse-height profile in a [`Snapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    /// Display name.
    pub name: String,
    /// Binning of relative strip position.
    pub spec: HistogramSpec,
    /// Fills per bin.
    pub entries: Vec<u64>,
    /// Mean relative amplitude per bin.
    pub means: Vec<f64>,
}

impl ProfileSnapshot {
    fn new(name: String, profile: &Profile) -> Self {
        Self {
            name,
            spec: *profile.spec(),
            entries: (0..profile.len()).map(|i| profile.entries(i)).collect(),
            means: (0..profile.len()).map(|i| profile.mean(i)).collect(),
        }
    }
}

/// Everything filled for one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrySnapshot {
    /// Structured key.
    pub key: MonitorKey,
    /// `<flag>_in_<scope>` label of the key.
    pub label: String,
    /// Summary distributions.
    pub summaries: Vec<SummarySnapshot>,
    /// Trend buffers.
    pub trends: Vec<TrendSnapshot>,
    /// Pulse-height profile, module keys only.
    pub profile: Option<ProfileSnapshot>,
}

/// Serializable view of a whole registry, in key order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// One entry per key.
    pub entries: Vec<EntrySnapshot>,
}

impl Snapshot {
    /// Captures the current state of `registry`.
    #[must_use]
    pub fn from_registry(registry: &KeyedMetricRegistry) -> Self {
        let entries = registry
            .iter()
            .map(|(key, bundle)| EntrySnapshot {
                key: *key,
                label: naming::key_label(key),
                summaries: bundle
                    .accumulators()
                    .map(|(kind, acc)| SummarySnapshot::new(naming::summary_name(kind, key), acc))
                    .collect(),
                trends: bundle
                    .trends()
                    .map(|(kind, trend)| TrendSnapshot::new(naming::trend_name(kind, key), trend))
                    .collect(),
                profile: bundle
                    .profile()
                    .map(|p| ProfileSnapshot::new(naming::profile_name(key), p)),
            })
            .collect();
        Self { entries }
    }
}

/// Writer for monitoring results.
///
/// Writes the registry as CSV tables or as a JSON snapshot.
pub struct SummaryWriter {
    writer: BufWriter<File>,
}

impl SummaryWriter {
    /// Creates a new file writer.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        Ok(Self { writer })
    }

    /// Writes one row per summary distribution.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_summary_csv(&mut self, registry: &KeyedMetricRegistry) -> Result<()> {
        writeln!(self.writer, "name,entries,mean,rms,underflow,overflow")?;

        for (key, bundle) in registry.iter() {
            for (kind, acc) in bundle.accumulators() {
                writeln!(
                    self.writer,
                    "{},{},{},{},{},{}",
                    naming::summary_name(kind, key),
                    acc.count(),
                    acc.mean(),
                    acc.rms(),
                    acc.underflow(),
                    acc.overflow()
                )?;
            }
        }

        self.writer.flush()?;
        Ok(())
    }

    /// Writes one row per trend bin.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_trends_csv(&mut self, registry: &KeyedMetricRegistry) -> Result<()> {
        writeln!(self.writer, "name,bin,entries,content,error")?;

        for (key, bundle) in registry.iter() {
            for (kind, trend) in bundle.trends() {
                let name = naming::trend_name(kind, key);
                for (i, bin) in trend.bins().iter().enumerate() {
                    writeln!(
                        self.writer,
                        "{},{},{},{},{}",
                        name,
                        i,
                        bin.entries(),
                        bin.content(),
                        bin.error()
                    )?;
                }
            }
        }

        self.writer.flush()?;
        Ok(())
    }

    /// Writes a pretty-printed JSON snapshot of the registry.
    ///
    /// # Errors
    /// Returns an error if serialization or writing fails.
    pub fn write_snapshot_json(&mut self, registry: &KeyedMetricRegistry) -> Result<()> {
        let snapshot = Snapshot::from_registry(registry);
        serde_json::to_writer_pretty(&mut self.writer, &snapshot)?;
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
