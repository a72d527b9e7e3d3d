//! Profile: mean of `y` per bin of `x`.

use crate::accumulator::{HistogramSpec, Slot};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Running sums for one profile bin.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct ProfileBin {
    entries: u64,
    sum: f64,
}

/// Mean of a quantity as a function of a binned coordinate.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Profile {
    name: String,
    spec: HistogramSpec,
    bins: Vec<ProfileBin>,
}

impl Profile {
    /// Creates an empty profile.
    pub fn new(name: impl Into<String>, spec: HistogramSpec) -> Self {
        Self {
            name: name.into(),
            spec,
            bins: vec![ProfileBin::default(); spec.bins],
        }
    }

    /// Adds `y` to the bin containing `x`. Out-of-range `x` is ignored.
    pub fn fill(&mut self, x: f64, y: f64) {
        if let Slot::Bin(index) = self.spec.locate(x) {
            let bin = &mut self.bins[index];
            bin.entries += 1;
            bin.sum += y;
        }
    }

    /// Profile name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Binning of the `x` axis.
    #[must_use]
    pub fn spec(&self) -> &HistogramSpec {
        &self.spec
    }

    /// Entries in bin `index`.
    #[must_use]
    pub fn entries(&self, index: usize) -> u64 {
        self.bins.get(index).map_or(0, |b| b.entries)
    }

    /// Mean `y` in bin `index`, 0 when empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self, index: usize) -> f64 {
        match self.bins.get(index) {
            Some(b) if b.entries > 0 => b.sum / b.entries as f64,
            _ => 0.0,
        }
    }

    /// Number of bins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    /// Returns true if the profile has no bins.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_profile_means() {
        let mut p = Profile::new("cPGV", HistogramSpec::new(3, -1.5, 1.5));
        p.fill(-1.0, 0.2);
        p.fill(-1.0, 0.4);
        p.fill(0.0, 1.0);
        p.fill(5.0, 9.0);

        assert_eq!(p.entries(0), 2);
        assert_relative_eq!(p.mean(0), 0.3);
        assert_relative_eq!(p.mean(1), 1.0);
        assert_eq!(p.entries(2), 0);
        assert_relative_eq!(p.mean(2), 0.0);
    }
}
