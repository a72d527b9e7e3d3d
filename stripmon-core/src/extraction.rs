//! Cluster feature extraction.
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
//!
//! Turns a [`RawCluster`] plus a noise calibration into [`ClusterMetrics`]:
//!
//! 1. Charge: sum of the positive amplitudes
//! 2. Noise: `sqrt(sum(noise^2) / n)` over the `n` positive strips
//! 3. Max strip: first strip reaching the maximum amplitude
//! 4. Left/right charge: strips strictly before/after the max strip
//! 5. Raw charges: samples at and around the max strip, `N` neighbours each side

use crate::calibration::NoiseCalibration;
use crate::cluster::{ClusterMetrics, RawCharges, RawCluster};
use crate::error::{Error, InvalidClusterReason, Result};
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for cluster feature extraction.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct ExtractionConfig {
    /// Raw-sample neighbours summed on each side of the max strip (default: 3).
    pub neighbour_strips: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            neighbour_strips: 3,
        }
    }
}

impl ExtractionConfig {
    /// Set the raw-sample neighbour window.
    #[must_use]
    pub fn with_neighbour_strips(mut self, strips: usize) -> Self {
        self.neighbour_strips = strips;
        self
    }
}

/// Symmetric eta function `(L + R) / 2C`.
///
/// Returns `None` when the central charge is zero.
#[must_use]
pub fn symmetric_eta(central: f64, left: f64, right: f64) -> Option<f64> {
    if central == 0.0 {
        None
    } else {
        Some((left + right) / (2.0 * central))
    }
}

/// Derives [`ClusterMetrics`] from raw clusters.
#[derive(Clone, Debug, Default)]
pub struct ClusterFeatureExtractor {
    config: ExtractionConfig,
}

impl ClusterFeatureExtractor {
    /// Create with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom configuration.
    #[must_use]
    pub fn with_config(config: ExtractionConfig) -> Self {
        Self { config }
    }

    /// Get current configuration.
    #[must_use]
    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extracts the metrics of one cluster.
    ///
    /// Noise is looked up only for strips with a positive amplitude.
    ///
    /// # Errors
    /// - [`Error::InvalidCluster`] if the cluster is empty, has no
    ///   positive strip or its summed charge overflows `u32`.
    /// - [`Error::CalibrationMissing`] if a positive strip has no noise.
    pub fn extract<C>(&self, cluster: &RawCluster, calibration: &C) -> Result<ClusterMetrics>
    where
        C: NoiseCalibration + ?Sized,
    {
        if cluster.is_empty() {
            return Err(Error::InvalidCluster {
                module: cluster.module,
                reason: InvalidClusterReason::Empty,
            });
        }

        let mut charge = 0u32;
        let mut noise2 = 0.0f64;
        let mut positive = 0usize;
        let mut weighted_offset = 0.0f64;
        let mut max_index = 0usize;
        let mut max_charge = 0u16;

        for (i, (strip, amplitude)) in cluster.strips().enumerate() {
            if amplitude == 0 {
                continue;
            }
            let noise = f64::from(calibration.noise(cluster.module, strip)?);
            charge = charge
                .checked_add(u32::from(amplitude))
                .ok_or(Error::InvalidCluster {
                    module: cluster.module,
                    reason: InvalidClusterReason::ChargeOverflow,
                })?;
            noise2 += noise * noise;
            positive += 1;
            weighted_offset += i as f64 * f64::from(amplitude);
            // Strictly greater: ties keep the earliest strip.
            if amplitude > max_charge {
                max_charge = amplitude;
                max_index = i;
            }
        }

        if positive == 0 {
            return Err(Error::InvalidCluster {
                module: cluster.module,
                reason: InvalidClusterReason::NoSignal,
            });
        }

        let noise = (noise2 / positive as f64).sqrt();
        let signal_to_noise = f64::from(charge) / noise;
        let barycenter = f64::from(cluster.first_strip) + weighted_offset / f64::from(charge);

        let charge_left = cluster.amplitudes[..max_index]
            .iter()
            .map(|&a| u32::from(a))
            .sum();
        let charge_right = cluster.amplitudes[max_index + 1..]
            .iter()
            .map(|&a| u32::from(a))
            .sum();

        let max_strip = usize::from(cluster.first_strip) + max_index;
        let raw = cluster
            .raw_samples
            .as_deref()
            .and_then(|samples| self.raw_charges(samples, max_strip));
        if cluster.raw_samples.is_some() && raw.is_none() {
            log::debug!(
                "raw samples of module {} do not reach strip {max_strip}",
                cluster.module
            );
        }

        let metrics = ClusterMetrics {
            module: cluster.module,
            first_strip: cluster.first_strip,
            charge,
            noise,
            signal_to_noise,
            width: cluster.width(),
            barycenter,
            max_index,
            max_charge,
            charge_left,
            charge_right,
            raw,
        };
        log::trace!(
            "module {}: charge={} noise={:.3} s/n={:.2} width={} max_strip={}",
            metrics.module,
            metrics.charge,
            metrics.noise,
            metrics.signal_to_noise,
            metrics.width,
            metrics.max_strip()
        );
        Ok(metrics)
    }

    /// Extracts a batch of clusters in parallel.
    ///
    /// Results are returned in input order; one failing cluster does not
    /// affect the others.
    pub fn extract_all<T, C>(&self, clusters: &[T], calibration: &C) -> Vec<Result<ClusterMetrics>>
    where
        T: AsRef<RawCluster> + Sync,
        C: NoiseCalibration + ?Sized,
    {
        clusters
            .par_iter()
            .map(|cluster| self.extract(cluster.as_ref(), calibration))
            .collect()
    }

    /// Central, left and right raw charges around `max_strip`.
    ///
    /// Neighbours are clamped to the sample range. `None` if the max strip
    /// itself has no sample.
    fn raw_charges(&self, samples: &[u16], max_strip: usize) -> Option<RawCharges> {
        let central = u32::from(*samples.get(max_strip)?);
        let mut left = 0u32;
        let mut right = 0u32;
        for near in 1..=self.config.neighbour_strips {
            if let Some(idx) = max_strip.checked_sub(near) {
                left = left.saturating_add(u32::from(samples[idx]));
            }
            if let Some(&sample) = samples.get(max_strip + near) {
                right = right.saturating_add(u32::from(sample));
            }
        }
        Some(RawCharges {
            central,
            left,
            right,
        })
    }
}
