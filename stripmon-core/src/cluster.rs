//! Raw clusters and the metrics derived from them.

use crate::detector::ModuleId;
use crate::extraction::symmetric_eta;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A contiguous group of strip amplitudes on one module.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawCluster {
    /// Module the cluster was found on.
    pub module: ModuleId,
    /// Index of the first strip of the cluster.
    pub first_strip: u16,
    /// Strip amplitudes in increasing strip order.
    pub amplitudes: Vec<u16>,
    /// Unclustered samples of the whole module, indexed by strip.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub raw_samples: Option<Vec<u16>>,
}

impl RawCluster {
    /// Creates a cluster without raw samples.
    pub fn new(module: ModuleId, first_strip: u16, amplitudes: Vec<u16>) -> Self {
        Self {
            module,
            first_strip,
            amplitudes,
            raw_samples: None,
        }
    }

    /// Attaches the module's raw samples.
    #[must_use]
    pub fn with_raw_samples(mut self, samples: Vec<u16>) -> Self {
        self.raw_samples = Some(samples);
        self
    }

    /// Number of strips in the cluster.
    #[inline]
    pub fn width(&self) -> usize {
        self.amplitudes.len()
    }

    /// Returns true if the cluster has no strips.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.amplitudes.is_empty()
    }

    /// Iterates over `(absolute strip, amplitude)` pairs.
    pub fn strips(&self) -> impl Iterator<Item = (u32, u16)> + '_ {
        let first = u32::from(self.first_strip);
        (first..).zip(self.amplitudes.iter().copied())
    }
}

impl AsRef<RawCluster> for RawCluster {
    fn as_ref(&self) -> &RawCluster {
        self
    }
}

/// Charges read from the raw samples around the max strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawCharges {
    /// Sample at the max strip.
    pub central: u32,
    /// Sum of the neighbour samples left of the max strip.
    pub left: u32,
    /// Sum of the neighbour samples right of the max strip.
    pub right: u32,
}

/// Scalar metrics derived from one cluster.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusterMetrics {
    /// Module of the cluster.
    pub module: ModuleId,
    /// First strip of the cluster.
    pub first_strip: u16,
    /// Sum of the positive amplitudes.
    pub charge: u32,
    /// Quadrature mean of the noise of the positive strips.
    pub noise: f64,
    /// `charge / noise`.
    pub signal_to_noise: f64,
    /// Number of strips.
    pub width: usize,
    /// Amplitude-weighted mean strip.
    pub barycenter: f64,
    /// Offset of the max strip from `first_strip`.
    pub max_index: usize,
    /// Amplitude of the max strip.
    pub max_charge: u16,
    /// Charge strictly left of the max strip.
    pub charge_left: u32,
    /// Charge strictly right of the max strip.
    pub charge_right: u32,
    /// Raw-sample charges, when samples were supplied.
    pub raw: Option<RawCharges>,
}

impl ClusterMetrics {
    /// Absolute index of the max strip.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn max_strip(&self) -> u32 {
        u32::from(self.first_strip) + self.max_index as u32
    }

    /// Symmetric eta `(L + R) / 2C` from raw charges if present, else from
    /// the cluster's own strips. `None` when the central charge is zero.
    #[must_use]
    pub fn symmetric_eta(&self) -> Option<f64> {
        match self.raw {
            Some(raw) => symmetric_eta(
                f64::from(raw.central),
                f64::from(raw.left),
                f64::from(raw.right),
            ),
            None => symmetric_eta(
                f64::from(self.max_charge),
                f64::from(self.charge_left),
                f64::from(self.charge_right),
            ),
        }
    }
}
