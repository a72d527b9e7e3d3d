//! Keyed registry owning every accumulator and trend buffer of a run.

use crate::accumulator::{HistogramSpec, MetricAccumulator};
use crate::profile::Profile;
use crate::schema::{Category, MetricKind, MetricSchema, MetricSpec};
use crate::trend::{FillOutcome, TrendBuffer, TrendConfig};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use stripmon_core::key::MonitorKey;
use stripmon_core::Result;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Accumulators, trends and optional profile for one key.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MetricBundle {
    accumulators: BTreeMap<MetricKind, MetricAccumulator>,
    trends: BTreeMap<MetricKind, TrendBuffer>,
    profile: Option<Profile>,
}

impl MetricBundle {
    fn from_schema<'a>(
        specs: impl Iterator<Item = &'a MetricSpec>,
        trend: Option<&TrendConfig>,
        anchor: Option<u64>,
        profile: Option<HistogramSpec>,
    ) -> Self {
        let mut accumulators = BTreeMap::new();
        let mut trends = BTreeMap::new();
        for spec in specs {
            let name = spec.kind.as_str();
            accumulators.insert(spec.kind, MetricAccumulator::new(name, spec.histogram));
            if let (true, Some(config)) = (spec.trend, trend) {
                let mut buffer = TrendBuffer::from_valid(name.to_string(), config);
                if let Some(event) = anchor {
                    buffer = buffer.with_anchor(event);
                }
                trends.insert(spec.kind, buffer);
            }
        }
        Self {
            accumulators,
            trends,
            profile: profile.map(|spec| Profile::new("cPGV", spec)),
        }
    }

    /// Fills `value` into the metric's trend (if any) and accumulator.
    ///
    /// Metrics absent from the bundle are ignored.
    ///
    /// # Errors
    /// Returns [`stripmon_core::Error::OutOfOrderFill`] from the trend; the
    /// accumulator is then left untouched as well.
    pub fn fill(&mut self, kind: MetricKind, event: u64, value: f64) -> Result<()> {
        self.fill_trend(kind, event, value)?;
        self.fill_accumulator(kind, value);
        Ok(())
    }

    /// Fills only the metric's accumulator.
    pub fn fill_accumulator(&mut self, kind: MetricKind, value: f64) {
        if let Some(acc) = self.accumulators.get_mut(&kind) {
            acc.fill(value);
        }
    }

    /// Fills only the metric's trend.
    ///
    /// # Errors
    /// Returns [`stripmon_core::Error::OutOfOrderFill`] for a fill older
    /// than the trend's last one.
    pub fn fill_trend(
        &mut self,
        kind: MetricKind,
        event: u64,
        value: f64,
    ) -> Result<Option<FillOutcome>> {
        match self.trends.get_mut(&kind) {
            Some(trend) => trend.fill(event, value).map(Some),
            None => Ok(None),
        }
    }

    /// Returns true if the bundle has an accumulator for `kind`.
    #[must_use]
    pub fn has(&self, kind: MetricKind) -> bool {
        self.accumulators.contains_key(&kind)
    }

    /// Accumulator of `kind`.
    #[must_use]
    pub fn accumulator(&self, kind: MetricKind) -> Option<&MetricAccumulator> {
        self.accumulators.get(&kind)
    }

    /// Trend of `kind`.
    #[must_use]
    pub fn trend(&self, kind: MetricKind) -> Option<&TrendBuffer> {
        self.trends.get(&kind)
    }

    /// All accumulators in metric order.
    pub fn accumulators(&self) -> impl Iterator<Item = (MetricKind, &MetricAccumulator)> {
        self.accumulators.iter().map(|(k, v)| (*k, v))
    }

    /// All trends in metric order.
    pub fn trends(&self) -> impl Iterator<Item = (MetricKind, &TrendBuffer)> {
        self.trends.iter().map(|(k, v)| (*k, v))
    }

    /// Pulse-height profile, for module bundles.
    #[must_use]
    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    /// Mutable pulse-height profile.
    pub fn profile_mut(&mut self) -> Option<&mut Profile> {
        self.profile.as_mut()
    }
}

/// Owns one [`MetricBundle`] per [`MonitorKey`], created on first use.
///
/// Bundles are never removed or reset during a run.
#[derive(Debug, Clone)]
pub struct KeyedMetricRegistry {
    schema: MetricSchema,
    trend: Option<TrendConfig>,
    anchor: Option<u64>,
    bundles: BTreeMap<MonitorKey, MetricBundle>,
}

impl KeyedMetricRegistry {
    /// Creates an empty registry. `trend = None` disables trending.
    ///
    /// # Errors
    /// Returns [`stripmon_core::Error::Config`] for an invalid trend
    /// configuration.
    pub fn new(schema: MetricSchema, trend: Option<TrendConfig>) -> Result<Self> {
        if let Some(config) = &trend {
            config.validate()?;
        }
        Ok(Self {
            schema,
            trend,
            anchor: None,
            bundles: BTreeMap::new(),
        })
    }

    /// Sets the event that anchors trends created from now on.
    ///
    /// Only the first call has an effect.
    pub fn set_anchor(&mut self, event: u64) {
        self.anchor.get_or_insert(event);
    }

    /// Returns the bundle for `key`, creating it from the schema first if
    /// needed.
    pub fn resolve(&mut self, key: MonitorKey) -> &mut MetricBundle {
        match self.bundles.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let category = Category::of(&key.scope);
                let profile = match category {
                    Category::Module => self.schema.module_profile,
                    _ => None,
                };
                log::trace!("registering bundle for {key:?}");
                entry.insert(MetricBundle::from_schema(
                    self.schema.metrics(category, key.track),
                    self.trend.as_ref(),
                    self.anchor,
                    profile,
                ))
            }
        }
    }

    /// Existing bundle for `key`.
    #[must_use]
    pub fn get(&self, key: &MonitorKey) -> Option<&MetricBundle> {
        self.bundles.get(key)
    }

    /// Existing bundle for `key`, mutable.
    pub fn get_mut(&mut self, key: &MonitorKey) -> Option<&mut MetricBundle> {
        self.bundles.get_mut(key)
    }

    /// Returns true if `key` has a bundle.
    #[must_use]
    pub fn contains(&self, key: &MonitorKey) -> bool {
        self.bundles.contains_key(key)
    }

    /// All bundles in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&MonitorKey, &MetricBundle)> {
        self.bundles.iter()
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    /// Returns true if no key was registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// Trend configuration, `None` when trending is off.
    #[must_use]
    pub fn trend_config(&self) -> Option<&TrendConfig> {
        self.trend.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use stripmon_core::key::TrackFlag;
    use stripmon_core::{LayerId, ModuleId, Subdetector};

    fn registry() -> KeyedMetricRegistry {
        KeyedMetricRegistry::new(MetricSchema::default(), Some(TrendConfig::new())).unwrap()
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let mut reg = registry();
        let key = MonitorKey::layer(Subdetector::Tib, LayerId::layer(1), TrackFlag::OnTrack);

        reg.resolve(key).fill(MetricKind::Charge, 5, 120.0).unwrap();
        let bundle = reg.resolve(key);
        let acc = bundle.accumulator(MetricKind::Charge).unwrap();
        assert_eq!(acc.count(), 1);
        assert_relative_eq!(acc.mean(), 120.0);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_off_track_bundles_lack_corrected_metrics() {
        let mut reg = registry();
        let off = reg.resolve(MonitorKey::subdetector(Subdetector::Tob, TrackFlag::OffTrack));
        assert!(!off.has(MetricKind::ChargeCorrected));
        assert!(off.has(MetricKind::Charge));
        assert!(off.trend(MetricKind::Charge).is_some());
    }

    #[test]
    fn test_module_bundle_has_profile_and_no_trends() {
        let mut reg = registry();
        let bundle = reg.resolve(MonitorKey::module(ModuleId::new(42), TrackFlag::OnTrack));
        assert!(bundle.profile().is_some());
        assert_eq!(bundle.trends().count(), 0);
    }

    #[test]
    fn test_trending_disabled() {
        let mut reg = KeyedMetricRegistry::new(MetricSchema::default(), None).unwrap();
        let bundle = reg.resolve(MonitorKey::global(TrackFlag::OnTrack));
        assert!(bundle.has(MetricKind::ClusterCount));
        assert!(bundle.trend(MetricKind::ClusterCount).is_none());
    }

    #[test]
    fn test_anchor_applies_to_new_trends() {
        let mut reg = registry();
        reg.set_anchor(500);
        reg.set_anchor(900);
        let bundle = reg.resolve(MonitorKey::global(TrackFlag::OffTrack));
        assert_eq!(
            bundle.trend(MetricKind::ClusterCount).unwrap().anchor(),
            Some(500)
        );
    }

    #[test]
    fn test_fill_ignores_unknown_metric() {
        let mut reg = registry();
        let bundle = reg.resolve(MonitorKey::global(TrackFlag::OnTrack));
        bundle.fill(MetricKind::Position, 1, 3.0).unwrap();
        assert!(bundle.accumulator(MetricKind::Position).is_none());
    }

    #[test]
    fn test_rejected_trend_fill_skips_accumulator() {
        let mut reg = registry();
        let bundle = reg.resolve(MonitorKey::subdetector(Subdetector::Tec, TrackFlag::OnTrack));
        bundle.fill(MetricKind::Noise, 10, 2.0).unwrap();
        assert!(bundle.fill(MetricKind::Noise, 9, 2.0).is_err());
        assert_eq!(bundle.accumulator(MetricKind::Noise).unwrap().count(), 1);
    }

    #[test]
    fn test_invalid_trend_config() {
        let bad = TrendConfig::new().with_bins(0);
        assert!(KeyedMetricRegistry::new(MetricSchema::default(), Some(bad)).is_err());
    }
}
