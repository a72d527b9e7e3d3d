//! stripmon-io: File formats around the stripmon monitor.
//!
//! This crate reads JSON-lines event files and JSON noise calibration
//! tables, derives display names for registry entries, and writes the
//! aggregated registry as CSV tables or a JSON snapshot.
//!

mod error;
mod input;
pub mod naming;
mod writer;

pub use error::{Error, Result};
pub use input::{CalibrationTable, EventReader, EventRecord};
pub use writer::{
    EntrySnapshot, ProfileSnapshot, Snapshot, SummarySnapshot, SummaryWriter, TrendPoint,
    TrendSnapshot,
};
