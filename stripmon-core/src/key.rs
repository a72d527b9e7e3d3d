//! Structured keys for the metric registry.

use crate::detector::{LayerId, ModuleId, Subdetector};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Whether a cluster was associated with a reconstructed track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TrackFlag {
    /// Cluster belongs to a track.
    OnTrack,
    /// Cluster not used by any track.
    OffTrack,
}

impl TrackFlag {
    /// Both flags, on-track first.
    pub const ALL: [TrackFlag; 2] = [Self::OnTrack, Self::OffTrack];

    /// Position in [`TrackFlag::ALL`].
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::OnTrack => 0,
            Self::OffTrack => 1,
        }
    }

    /// Returns true for [`TrackFlag::OnTrack`].
    #[inline]
    #[must_use]
    pub fn is_on_track(self) -> bool {
        matches!(self, Self::OnTrack)
    }
}

/// Aggregation level of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Scope {
    /// Whole tracker.
    Global,
    /// One subassembly.
    Subdetector(Subdetector),
    /// One layer (or endcap wheel) of a subassembly.
    Layer(Subdetector, LayerId),
    /// A single module.
    Module(ModuleId),
}

/// Registry lookup key: aggregation scope plus track flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MonitorKey {
    /// Aggregation level.
    pub scope: Scope,
    /// On/off track flag.
    pub track: TrackFlag,
}

impl MonitorKey {
    /// Creates a key.
    #[must_use]
    pub fn new(scope: Scope, track: TrackFlag) -> Self {
        Self { scope, track }
    }

    /// Whole-tracker key.
    #[must_use]
    pub fn global(track: TrackFlag) -> Self {
        Self::new(Scope::Global, track)
    }

    /// Subdetector key.
    #[must_use]
    pub fn subdetector(subdet: Subdetector, track: TrackFlag) -> Self {
        Self::new(Scope::Subdetector(subdet), track)
    }

    /// Layer key.
    #[must_use]
    pub fn layer(subdet: Subdetector, layer: LayerId, track: TrackFlag) -> Self {
        Self::new(Scope::Layer(subdet, layer), track)
    }

    /// Module key.
    #[must_use]
    pub fn module(module: ModuleId, track: TrackFlag) -> Self {
        Self::new(Scope::Module(module), track)
    }
}
