//! Cluster selection cuts applied before aggregation.

use crate::cluster::ClusterMetrics;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Signal-to-noise and width window a cluster must fall in to be monitored.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct ClusterSelection {
    /// Whether the cuts are applied at all.
    pub enabled: bool,
    /// Minimum signal-to-noise.
    pub min_signal_to_noise: f64,
    /// Maximum signal-to-noise.
    pub max_signal_to_noise: f64,
    /// Minimum width in strips.
    pub min_width: f64,
    /// Maximum width in strips.
    pub max_width: f64,
}

impl Default for ClusterSelection {
    fn default() -> Self {
        Self {
            enabled: false,
            min_signal_to_noise: 0.0,
            max_signal_to_noise: 2000.0,
            min_width: 0.0,
            max_width: 200.0,
        }
    }
}

impl ClusterSelection {
    /// Creates a disabled selection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables the cuts with the given signal-to-noise window.
    #[must_use]
    pub fn with_signal_to_noise(mut self, min: f64, max: f64) -> Self {
        self.enabled = true;
        self.min_signal_to_noise = min;
        self.max_signal_to_noise = max;
        self
    }

    /// Enables the cuts with the given width window.
    #[must_use]
    pub fn with_width(mut self, min: f64, max: f64) -> Self {
        self.enabled = true;
        self.min_width = min;
        self.max_width = max;
        self
    }

    /// Returns true if the cluster passes the cuts (or the cuts are off).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn accepts(&self, metrics: &ClusterMetrics) -> bool {
        if !self.enabled {
            return true;
        }
        let width = metrics.width as f64;
        !(metrics.signal_to_noise < self.min_signal_to_noise
            || metrics.signal_to_noise > self.max_signal_to_noise
            || width < self.min_width
            || width > self.max_width)
    }
}
