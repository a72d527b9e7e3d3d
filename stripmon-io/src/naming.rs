//! Display names for registry entries.
//!
//! Names follow the `<Kind>_<metric>_<flag>_in_<scope>` convention of the
//! strip tracker monitoring histograms, e.g.
//! `Summary_cStoN_OnTrack_in_TIB__layer__2`. They are derived from the
//! structured [`MonitorKey`] and never used for lookup.

use stripmon_core::{MonitorKey, Scope, TrackFlag};
use stripmon_stats::MetricKind;

/// Folder-style label of a scope.
#[must_use]
pub fn scope_label(scope: &Scope) -> String {
    match *scope {
        Scope::Global => "Tracker".to_string(),
        Scope::Subdetector(subdet) => subdet.as_str().to_string(),
        Scope::Layer(subdet, layer) if subdet.is_barrel() => {
            format!("{subdet}__layer__{}", layer.number)
        }
        Scope::Layer(subdet, wheel) => {
            format!("{subdet}__side__{}__wheel__{}", wheel.side, wheel.number)
        }
        Scope::Module(module) => format!("module_{}", module.raw()),
    }
}

/// Label of a track flag.
#[must_use]
pub fn flag_label(flag: TrackFlag) -> &'static str {
    match flag {
        TrackFlag::OnTrack => "OnTrack",
        TrackFlag::OffTrack => "OffTrack",
    }
}

/// `<flag>_in_<scope>` suffix shared by every entry of a key.
#[must_use]
pub fn key_label(key: &MonitorKey) -> String {
    format!("{}_in_{}", flag_label(key.track), scope_label(&key.scope))
}

/// Name of a summary distribution.
#[must_use]
pub fn summary_name(kind: MetricKind, key: &MonitorKey) -> String {
    format!("Summary_{}_{}", kind.as_str(), key_label(key))
}

/// Name of a trend buffer.
#[must_use]
pub fn trend_name(kind: MetricKind, key: &MonitorKey) -> String {
    format!("Trend_{}_{}", kind.as_str(), key_label(key))
}

/// Name of a module's pulse-height profile.
#[must_use]
pub fn profile_name(key: &MonitorKey) -> String {
    format!("Summary_cPGV_{}", key_label(key))
}

/// X-axis title of a trend with the given step, e.g. `EventId/4`.
#[must_use]
pub fn trend_axis_title(step: u64) -> String {
    format!("EventId/{step}")
}
