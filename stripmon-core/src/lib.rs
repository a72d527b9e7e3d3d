//! stripmon-core: Core types and cluster feature extraction for strip detector monitoring.
//!
//! This crate provides the value types shared by the monitoring pipeline
//! (module identifiers, monitor keys, raw clusters, track hits), the error
//! taxonomy, the calibration and topology collaborator traits, and the
//! cluster feature extractor.
//!

pub mod calibration;
pub mod cluster;
pub mod detector;
pub mod error;
pub mod extraction;
pub mod hit;
pub mod key;
pub mod selection;

pub use calibration::{NoCalibration, NoiseCalibration, UniformNoise};
pub use cluster::{ClusterMetrics, RawCharges, RawCluster};
pub use detector::{LayerId, ModuleId, ModuleTopology, StripDetIdTopology, Subdetector};
pub use error::{Error, InvalidClusterReason, Result};
pub use extraction::{symmetric_eta, ClusterFeatureExtractor, ExtractionConfig};
pub use hit::{ClusterObservation, LocalDirection, SideHit, TrackHit};
pub use key::{MonitorKey, Scope, TrackFlag};
pub use selection::ClusterSelection;
