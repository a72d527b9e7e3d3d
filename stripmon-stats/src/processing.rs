//! Per-event monitoring pipeline: extraction, selection and registry fills.
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]

use crate::registry::KeyedMetricRegistry;
use crate::schema::{MetricKind, MetricSchema};
use crate::trend::TrendConfig;
use stripmon_core::calibration::NoiseCalibration;
use stripmon_core::cluster::ClusterMetrics;
use stripmon_core::detector::{ModuleId, ModuleTopology, StripDetIdTopology, Subdetector};
use stripmon_core::extraction::{ClusterFeatureExtractor, ExtractionConfig};
use stripmon_core::hit::ClusterObservation;
use stripmon_core::key::{MonitorKey, TrackFlag};
use stripmon_core::selection::ClusterSelection;
use stripmon_core::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration of a monitoring run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct MonitorConfig {
    /// Fill per-module bundles for on-track clusters.
    pub module_level: bool,
    /// Monitor off-track clusters.
    pub off_track: bool,
    /// Trend buffers; `None` disables trending.
    pub trend: Option<TrendConfig>,
    /// Cuts applied after extraction.
    pub selection: ClusterSelection,
    /// Extraction settings.
    pub extraction: ExtractionConfig,
    /// Incidence cosine above which a track counts as perpendicular.
    pub perpendicular_cos: f64,
    /// Modules never monitored.
    pub excluded_modules: Vec<ModuleId>,
    /// Metrics per key category.
    pub schema: MetricSchema,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            module_level: false,
            off_track: true,
            trend: Some(TrendConfig::default()),
            selection: ClusterSelection::default(),
            extraction: ExtractionConfig::default(),
            perpendicular_cos: 0.9,
            excluded_modules: Vec::new(),
            schema: MetricSchema::default(),
        }
    }
}

impl MonitorConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables module-level bundles.
    #[must_use]
    pub fn with_module_level(mut self, enabled: bool) -> Self {
        self.module_level = enabled;
        self
    }

    /// Enables or disables off-track monitoring.
    #[must_use]
    pub fn with_off_track(mut self, enabled: bool) -> Self {
        self.off_track = enabled;
        self
    }

    /// Sets the trend configuration.
    #[must_use]
    pub fn with_trend(mut self, trend: Option<TrendConfig>) -> Self {
        self.trend = trend;
        self
    }

    /// Sets the selection cuts.
    #[must_use]
    pub fn with_selection(mut self, selection: ClusterSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Sets the extraction settings.
    #[must_use]
    pub fn with_extraction(mut self, extraction: ExtractionConfig) -> Self {
        self.extraction = extraction;
        self
    }

    /// Sets the modules to skip.
    #[must_use]
    pub fn with_excluded_modules(mut self, modules: Vec<ModuleId>) -> Self {
        self.excluded_modules = modules;
        self
    }

    /// Sets the metric schema.
    #[must_use]
    pub fn with_schema(mut self, schema: MetricSchema) -> Self {
        self.schema = schema;
        self
    }

    fn flags(&self) -> &'static [TrackFlag] {
        if self.off_track {
            &TrackFlag::ALL
        } else {
            &[TrackFlag::OnTrack]
        }
    }
}

/// What happened to one observed cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Filled into the registry.
    Accepted,
    /// Failed the selection cuts.
    Rejected,
    /// Not monitored: excluded module, unknown topology or off-track disabled.
    Skipped,
}

/// Counts for one processed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventSummary {
    /// Event id.
    pub event: u64,
    /// Clusters filled into the registry.
    pub accepted: usize,
    /// Clusters failing the selection.
    pub rejected: usize,
    /// Clusters not monitored.
    pub skipped: usize,
    /// Clusters whose extraction failed.
    pub failed: usize,
}

/// Counts accumulated over the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunStatistics {
    /// Events processed.
    pub events: u64,
    /// Clusters filled into the registry.
    pub accepted: u64,
    /// Clusters failing the selection.
    pub rejected: u64,
    /// Clusters not monitored.
    pub skipped: u64,
    /// Clusters whose extraction failed.
    pub failed: u64,
}

impl RunStatistics {
    fn add(&mut self, summary: &EventSummary) {
        self.events += 1;
        self.accepted += summary.accepted as u64;
        self.rejected += summary.rejected as u64;
        self.skipped += summary.skipped as u64;
        self.failed += summary.failed as u64;
    }
}

/// Drives clusters of successive events into a [`KeyedMetricRegistry`].
///
/// Each cluster is extracted, checked against the selection and filled into
/// its subdetector, layer and (optionally) module bundles. At the end of an
/// event the per-subdetector cluster counts are filled.
pub struct StripMonitor<C, T = StripDetIdTopology> {
    config: MonitorConfig,
    extractor: ClusterFeatureExtractor,
    calibration: C,
    topology: T,
    registry: KeyedMetricRegistry,
    current_event: Option<u64>,
    last_event: Option<u64>,
    counts: [[u64; 2]; 4],
    current: EventSummary,
    stats: RunStatistics,
}

impl<C: NoiseCalibration> StripMonitor<C> {
    /// Creates a monitor that decodes module topology from raw ids.
    ///
    /// # Errors
    /// Returns [`Error::Config`] for an invalid trend configuration.
    pub fn new(config: MonitorConfig, calibration: C) -> Result<Self> {
        Self::with_topology(config, calibration, StripDetIdTopology)
    }
}

impl<C: NoiseCalibration, T: ModuleTopology> StripMonitor<C, T> {
    /// Creates a monitor with a custom topology lookup.
    ///
    /// # Errors
    /// Returns [`Error::Config`] for an invalid trend configuration.
    pub fn with_topology(config: MonitorConfig, calibration: C, topology: T) -> Result<Self> {
        let registry = KeyedMetricRegistry::new(config.schema.clone(), config.trend.clone())?;
        let extractor = ClusterFeatureExtractor::with_config(config.extraction.clone());
        Ok(Self {
            config,
            extractor,
            calibration,
            topology,
            registry,
            current_event: None,
            last_event: None,
            counts: [[0; 2]; 4],
            current: EventSummary::default(),
            stats: RunStatistics::default(),
        })
    }

    /// Pre-registers the bundles of a list of active modules.
    pub fn book(&mut self, modules: &[ModuleId]) {
        for &module in modules {
            let Some((subdet, layer)) = self.topology.locate(module) else {
                log::error!("cannot book module {module}: unknown subdetector");
                continue;
            };
            for &flag in self.config.flags() {
                self.registry.resolve(MonitorKey::global(flag));
                self.registry.resolve(MonitorKey::subdetector(subdet, flag));
                self.registry.resolve(MonitorKey::layer(subdet, layer, flag));
            }
            if self.config.module_level {
                self.registry
                    .resolve(MonitorKey::module(module, TrackFlag::OnTrack));
            }
        }
        log::info!(
            "booked {} modules into {} bundles",
            modules.len(),
            self.registry.len()
        );
    }

    /// Opens `event`, closing a still-open previous event first.
    ///
    /// # Errors
    /// Returns [`Error::OutOfOrderFill`] if `event` is older than the last
    /// processed event.
    pub fn begin_event(&mut self, event: u64) -> Result<()> {
        if let Some(last) = self.last_event {
            if event < last {
                return Err(Error::OutOfOrderFill { event, last });
            }
        }
        if self.current_event.is_some() {
            log::debug!("event {event} opened before the previous one was closed");
            self.end_event()?;
        }
        self.registry.set_anchor(event);
        self.current_event = Some(event);
        self.last_event = Some(event);
        self.current = EventSummary {
            event,
            ..EventSummary::default()
        };
        Ok(())
    }

    /// Extracts and fills one cluster of the open event.
    ///
    /// # Errors
    /// - [`Error::NoActiveEvent`] outside `begin_event`/`end_event`.
    /// - Extraction errors ([`Error::InvalidCluster`],
    ///   [`Error::CalibrationMissing`]); nothing is filled.
    pub fn observe(&mut self, observation: &ClusterObservation) -> Result<Outcome> {
        let event = self.current_event.ok_or(Error::NoActiveEvent)?;
        if !self.is_monitored(observation) {
            self.current.skipped += 1;
            return Ok(Outcome::Skipped);
        }
        match self
            .extractor
            .extract(&observation.cluster, &self.calibration)
        {
            Ok(metrics) => self.record(event, observation, &metrics),
            Err(err) => {
                self.current.failed += 1;
                Err(err)
            }
        }
    }

    /// Closes the open event and fills cluster counts.
    ///
    /// # Errors
    /// Returns [`Error::NoActiveEvent`] if no event is open.
    pub fn end_event(&mut self) -> Result<EventSummary> {
        let event = self.current_event.ok_or(Error::NoActiveEvent)?;
        for &flag in self.config.flags() {
            let mut total = 0u64;
            for subdet in Subdetector::ALL {
                let n = self.counts[subdet.index()][flag.index()];
                let key = MonitorKey::subdetector(subdet, flag);
                if let Some(bundle) = self.registry.get_mut(&key) {
                    // Empty on-track counts would swamp the summary with zeros.
                    if n > 0 || !flag.is_on_track() {
                        bundle.fill_accumulator(MetricKind::ClusterCount, n as f64);
                    }
                    bundle.fill_trend(MetricKind::ClusterCount, event, n as f64)?;
                }
                total += n;
            }
            if total > 0 {
                self.registry.resolve(MonitorKey::global(flag)).fill(
                    MetricKind::ClusterCount,
                    event,
                    total as f64,
                )?;
            }
        }
        self.counts = [[0; 2]; 4];
        self.current_event = None;

        let summary = self.current;
        self.stats.add(&summary);
        log::debug!(
            "event {}: {} accepted, {} rejected, {} skipped, {} failed",
            summary.event,
            summary.accepted,
            summary.rejected,
            summary.skipped,
            summary.failed
        );
        Ok(summary)
    }

    /// Processes a whole event.
    ///
    /// Extraction runs in parallel; fills are applied in input order. A
    /// cluster that fails extraction is logged and counted, and does not
    /// stop the event.
    ///
    /// # Errors
    /// Returns [`Error::OutOfOrderFill`] if `event` is older than the last
    /// processed event.
    pub fn process_event(
        &mut self,
        event: u64,
        observations: &[ClusterObservation],
    ) -> Result<EventSummary> {
        self.begin_event(event)?;

        let (monitored, skipped): (Vec<&ClusterObservation>, Vec<&ClusterObservation>) =
            observations.iter().partition(|obs| self.is_monitored(obs));
        self.current.skipped += skipped.len();

        let results = self
            .extractor
            .extract_all(&monitored, &self.calibration);
        for (observation, result) in monitored.into_iter().zip(results) {
            match result {
                Ok(metrics) => {
                    self.record(event, observation, &metrics)?;
                }
                Err(err) => {
                    log::warn!("event {event}: {err}");
                    self.current.failed += 1;
                }
            }
        }

        self.end_event()
    }

    fn is_monitored(&self, observation: &ClusterObservation) -> bool {
        if !self.config.off_track && !observation.track.is_on_track() {
            return false;
        }
        if self
            .config
            .excluded_modules
            .contains(&observation.cluster.module)
        {
            log::trace!("module {} excluded", observation.cluster.module);
            return false;
        }
        true
    }

    fn record(
        &mut self,
        event: u64,
        observation: &ClusterObservation,
        metrics: &ClusterMetrics,
    ) -> Result<Outcome> {
        let Some((subdet, layer)) = self.topology.locate(metrics.module) else {
            log::error!("no such subdetector for module {}", metrics.module);
            self.current.skipped += 1;
            return Ok(Outcome::Skipped);
        };
        if !self.config.selection.accepts(metrics) {
            log::debug!(
                "module {}: cluster rejected (s/n={:.2}, width={})",
                metrics.module,
                metrics.signal_to_noise,
                metrics.width
            );
            self.current.rejected += 1;
            return Ok(Outcome::Rejected);
        }

        let flag = observation.track;
        self.counts[subdet.index()][flag.index()] += 1;
        let cos = observation.cos_incidence();

        self.fill_summary(MonitorKey::subdetector(subdet, flag), event, metrics, cos)?;
        self.fill_summary(MonitorKey::layer(subdet, layer, flag), event, metrics, cos)?;
        if self.config.module_level && flag.is_on_track() {
            self.fill_module(MonitorKey::module(metrics.module, flag), event, observation, metrics, cos)?;
        }

        self.current.accepted += 1;
        Ok(Outcome::Accepted)
    }

    fn fill_summary(
        &mut self,
        key: MonitorKey,
        event: u64,
        metrics: &ClusterMetrics,
        cos: Option<f64>,
    ) -> Result<()> {
        let perpendicular = self.config.perpendicular_cos;
        let bundle = self.registry.resolve(key);
        let charge = f64::from(metrics.charge);

        if let (true, Some(cos)) = (key.track.is_on_track(), cos) {
            bundle.fill(MetricKind::SignalToNoiseCorrected, event, metrics.signal_to_noise * cos)?;
            bundle.fill(MetricKind::ChargeCorrected, event, charge * cos)?;
        }
        bundle.fill(MetricKind::SignalToNoise, event, metrics.signal_to_noise)?;
        bundle.fill(MetricKind::Charge, event, charge)?;
        bundle.fill(MetricKind::Noise, event, metrics.noise)?;
        bundle.fill(MetricKind::Width, event, metrics.width as f64)?;
        bundle.fill(MetricKind::Position, event, metrics.barycenter)?;

        if cos.is_some_and(|c| c > perpendicular) {
            match metrics.symmetric_eta() {
                Some(eta) => {
                    log::trace!(
                        "module {}: perpendicular track, symmetric eta {eta:.3}",
                        metrics.module
                    );
                    bundle.fill(MetricKind::SymmetricEta, event, eta)?;
                }
                None => log::debug!(
                    "module {}: zero central charge, symmetric eta skipped",
                    metrics.module
                ),
            }
        }
        Ok(())
    }

    fn fill_module(
        &mut self,
        key: MonitorKey,
        event: u64,
        observation: &ClusterObservation,
        metrics: &ClusterMetrics,
        cos: Option<f64>,
    ) -> Result<()> {
        let bundle = self.registry.resolve(key);
        let charge = f64::from(metrics.charge);

        bundle.fill(MetricKind::SignalToNoise, event, metrics.signal_to_noise)?;
        bundle.fill(MetricKind::Charge, event, charge)?;
        if let Some(cos) = cos {
            bundle.fill(MetricKind::SignalToNoiseCorrected, event, metrics.signal_to_noise * cos)?;
            bundle.fill(MetricKind::ChargeCorrected, event, charge * cos)?;
        }
        bundle.fill(MetricKind::Width, event, metrics.width as f64)?;
        bundle.fill(MetricKind::Position, event, metrics.barycenter)?;

        if let Some(profile) = bundle.profile_mut() {
            // Positions relative to the max strip; strips outside the
            // cluster read as zero.
            let spec = *profile.spec();
            let start = -(metrics.max_index as i64);
            let end = start + metrics.width as i64;
            let max_charge = f64::from(metrics.max_charge);
            for pos in (spec.min.ceil() as i64)..(spec.max.ceil() as i64) {
                let y = if (start..end).contains(&pos) {
                    let amplitude = observation.cluster.amplitudes[(pos - start) as usize];
                    f64::from(amplitude) / max_charge
                } else {
                    0.0
                };
                profile.fill(pos as f64, y);
            }
        }
        Ok(())
    }

    /// The registry holding every filled metric.
    #[must_use]
    pub fn registry(&self) -> &KeyedMetricRegistry {
        &self.registry
    }

    /// Consumes the monitor, returning its registry.
    #[must_use]
    pub fn into_registry(self) -> KeyedMetricRegistry {
        self.registry
    }

    /// Counts over all closed events.
    #[must_use]
    pub fn statistics(&self) -> &RunStatistics {
        &self.stats
    }

    /// Run configuration.
    #[must_use]
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }
}
