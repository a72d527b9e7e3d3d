//! Track hits and the cluster observations they resolve to.
//!
//! A track measurement on a strip module comes in one of three shapes: a
//! single-sided hit, a matched pair from a glued mono/stereo module, or a
//! hit projected onto a glued module. Each shape is resolved here once, so
//! the monitor only sees flat [`ClusterObservation`]s.

use crate::cluster::RawCluster;
use crate::key::TrackFlag;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Track direction in the local frame of a module.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocalDirection {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl LocalDirection {
    /// Creates a direction vector.
    #[must_use]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean length.
    #[must_use]
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Cosine of the angle to the module normal, `|z| / |v|`.
    #[must_use]
    pub fn cos_incidence(&self) -> Option<f64> {
        let mag = self.magnitude();
        if mag > 0.0 {
            Some(self.z.abs() / mag)
        } else {
            None
        }
    }
}

/// One side of a track hit: the cluster and the local track direction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SideHit {
    pub cluster: RawCluster,
    pub direction: LocalDirection,
}

impl SideHit {
    /// Creates a side hit.
    pub fn new(cluster: RawCluster, direction: LocalDirection) -> Self {
        Self { cluster, direction }
    }
}

/// A track measurement on the strip tracker.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(tag = "type", rename_all = "snake_case")
)]
pub enum TrackHit {
    /// Hit on a single-sided module.
    Single(SideHit),
    /// Mono and stereo hits of a glued module.
    Matched { mono: SideHit, stereo: SideHit },
    /// Hit projected onto a glued module; carries the original side.
    Projected(SideHit),
}

impl TrackHit {
    /// Resolves the hit into on-track observations.
    ///
    /// Sides whose direction has zero length are dropped.
    pub fn into_observations(self) -> impl Iterator<Item = ClusterObservation> {
        let sides = match self {
            Self::Single(side) | Self::Projected(side) => vec![side],
            Self::Matched { mono, stereo } => vec![mono, stereo],
        };
        sides.into_iter().filter_map(|side| {
            if side.direction.magnitude() > 0.0 {
                Some(ClusterObservation::on_track(side.cluster, side.direction))
            } else {
                log::trace!(
                    "dropping hit on module {} with null direction",
                    side.cluster.module
                );
                None
            }
        })
    }
}

/// A cluster handed to the monitor together with its track context.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterObservation {
    /// The cluster.
    pub cluster: RawCluster,
    /// On/off track flag, decided by the caller.
    pub track: TrackFlag,
    /// Local track direction for on-track clusters.
    pub direction: Option<LocalDirection>,
}

impl ClusterObservation {
    /// An on-track observation.
    pub fn on_track(cluster: RawCluster, direction: LocalDirection) -> Self {
        Self {
            cluster,
            track: TrackFlag::OnTrack,
            direction: Some(direction),
        }
    }

    /// An off-track observation.
    pub fn off_track(cluster: RawCluster) -> Self {
        Self {
            cluster,
            track: TrackFlag::OffTrack,
            direction: None,
        }
    }

    /// Incidence cosine of the track, if any.
    pub fn cos_incidence(&self) -> Option<f64> {
        self.direction.and_then(|d| d.cos_incidence())
    }
}

impl AsRef<RawCluster> for ClusterObservation {
    fn as_ref(&self) -> &RawCluster {
        &self.cluster
    }
}
