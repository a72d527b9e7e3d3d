//! Which metrics exist for which kind of key.

use crate::accumulator::HistogramSpec;
use stripmon_core::key::{Scope, TrackFlag};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A monitored cluster quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MetricKind {
    /// Clusters per event.
    ClusterCount,
    /// Cluster width in strips.
    Width,
    /// Cluster charge.
    Charge,
    /// Charge scaled by the track incidence cosine.
    ChargeCorrected,
    /// Signal-to-noise.
    SignalToNoise,
    /// Signal-to-noise scaled by the track incidence cosine.
    SignalToNoiseCorrected,
    /// Cluster noise.
    Noise,
    /// Barycenter strip.
    Position,
    /// Capacitive-coupling symmetric eta.
    SymmetricEta,
}

impl MetricKind {
    /// Short metric name used in published histogram names.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClusterCount => "NumberOfClusters",
            Self::Width => "cWidth",
            Self::Charge => "cCharge",
            Self::ChargeCorrected => "cChargeCorr",
            Self::SignalToNoise => "cStoN",
            Self::SignalToNoiseCorrected => "cStoNCorr",
            Self::Noise => "cNoise",
            Self::Position => "cPos",
            Self::SymmetricEta => "cSymmEtaCC",
        }
    }

    /// Metrics that need a track direction exist only for on-track keys.
    #[must_use]
    pub fn on_track_only(self) -> bool {
        matches!(self, Self::ChargeCorrected | Self::SignalToNoiseCorrected)
    }

    /// Default binning.
    #[must_use]
    pub fn default_histogram(self) -> HistogramSpec {
        match self {
            Self::ClusterCount => HistogramSpec::new(200, -0.5, 1999.5),
            Self::Width => HistogramSpec::new(20, -0.5, 19.5),
            Self::Charge | Self::ChargeCorrected => HistogramSpec::new(200, -0.5, 799.5),
            Self::SignalToNoise | Self::SignalToNoiseCorrected => {
                HistogramSpec::new(100, -0.5, 199.5)
            }
            Self::Noise => HistogramSpec::new(40, 0.0, 10.0),
            Self::Position => HistogramSpec::new(768, -0.5, 767.5),
            Self::SymmetricEta => HistogramSpec::new(120, -0.1, 1.1),
        }
    }
}

/// Aggregation category a schema applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Whole tracker.
    Global,
    /// Subdetector summaries.
    Subdetector,
    /// Layer summaries.
    Layer,
    /// Single modules.
    Module,
}

impl Category {
    /// Category of a key scope.
    #[must_use]
    pub fn of(scope: &Scope) -> Self {
        match scope {
            Scope::Global => Self::Global,
            Scope::Subdetector(_) => Self::Subdetector,
            Scope::Layer(..) => Self::Layer,
            Scope::Module(_) => Self::Module,
        }
    }
}

/// One metric of a schema.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MetricSpec {
    /// The quantity.
    pub kind: MetricKind,
    /// Binning of its accumulator.
    pub histogram: HistogramSpec,
    /// Whether it also gets a trend buffer.
    pub trend: bool,
}

impl MetricSpec {
    /// Metric with default binning.
    #[must_use]
    pub fn new(kind: MetricKind, trend: bool) -> Self {
        Self {
            kind,
            histogram: kind.default_histogram(),
            trend,
        }
    }

    /// Overrides the binning.
    #[must_use]
    pub fn with_histogram(mut self, histogram: HistogramSpec) -> Self {
        self.histogram = histogram;
        self
    }
}

/// Metric sets per aggregation category.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct MetricSchema {
    /// Whole-tracker metrics.
    pub global: Vec<MetricSpec>,
    /// Subdetector metrics.
    pub subdetector: Vec<MetricSpec>,
    /// Layer metrics.
    pub layer: Vec<MetricSpec>,
    /// Module metrics.
    pub module: Vec<MetricSpec>,
    /// Pulse-height profile binning for modules; `None` disables it.
    pub module_profile: Option<HistogramSpec>,
}

impl Default for MetricSchema {
    fn default() -> Self {
        use MetricKind::{
            Charge, ChargeCorrected, ClusterCount, Noise, Position, SignalToNoise,
            SignalToNoiseCorrected, SymmetricEta, Width,
        };
        let trended = |kinds: &[MetricKind]| {
            kinds
                .iter()
                .map(|&k| MetricSpec::new(k, true))
                .collect::<Vec<_>>()
        };

        let subdetector = trended(&[
            ClusterCount,
            Width,
            SymmetricEta,
            Noise,
            Charge,
            SignalToNoise,
            ChargeCorrected,
            SignalToNoiseCorrected,
        ]);

        let mut layer = trended(&[
            Width,
            SymmetricEta,
            Noise,
            Charge,
            SignalToNoise,
            ChargeCorrected,
            SignalToNoiseCorrected,
        ]);
        layer.push(MetricSpec::new(Position, false));

        let module = [
            Width,
            Charge,
            SignalToNoise,
            ChargeCorrected,
            SignalToNoiseCorrected,
            Position,
        ]
        .into_iter()
        .map(|k| MetricSpec::new(k, false))
        .collect();

        Self {
            global: trended(&[ClusterCount]),
            subdetector,
            layer,
            module,
            module_profile: Some(HistogramSpec::new(21, -10.5, 10.5)),
        }
    }
}

impl MetricSchema {
    /// Metrics instantiated for a key of `category` with flag `track`.
    pub fn metrics(
        &self,
        category: Category,
        track: TrackFlag,
    ) -> impl Iterator<Item = &MetricSpec> + '_ {
        let specs = match category {
            Category::Global => &self.global,
            Category::Subdetector => &self.subdetector,
            Category::Layer => &self.layer,
            Category::Module => &self.module,
        };
        specs
            .iter()
            .filter(move |spec| track.is_on_track() || !spec.kind.on_track_only())
    }
}
