//! JSON-lines event files and JSON noise calibration tables.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines, Read};
use std::path::Path;
use stripmon_core::{ClusterObservation, ModuleId, NoiseCalibration, RawCluster, TrackHit};

/// One event as stored in the input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Event id; must not decrease along the file.
    pub event: u64,
    /// Track hits of the event.
    #[serde(default)]
    pub hits: Vec<TrackHit>,
    /// Clusters not associated with any track.
    #[serde(default)]
    pub off_track: Vec<RawCluster>,
}

impl EventRecord {
    /// Flattens the record into on-track then off-track observations.
    #[must_use]
    pub fn into_observations(self) -> Vec<ClusterObservation> {
        let mut observations: Vec<ClusterObservation> = self
            .hits
            .into_iter()
            .flat_map(TrackHit::into_observations)
            .collect();
        observations.extend(self.off_track.into_iter().map(ClusterObservation::off_track));
        observations
    }

    /// Number of clusters carried by the record, counting both sides of
    /// matched hits.
    #[must_use]
    pub fn cluster_count(&self) -> usize {
        let on_track: usize = self
            .hits
            .iter()
            .map(|hit| match hit {
                TrackHit::Matched { .. } => 2,
                TrackHit::Single(_) | TrackHit::Projected(_) => 1,
            })
            .sum();
        on_track + self.off_track.len()
    }
}

/// Streaming reader over a JSON-lines event file.
///
/// Blank lines are skipped. Each item is one parsed [`EventRecord`].
pub struct EventReader<R> {
    lines: Lines<R>,
    line: usize,
}

impl EventReader<BufReader<File>> {
    /// Opens an event file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> EventReader<R> {
    /// Wraps a buffered reader.
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }

    /// Number of lines consumed so far.
    #[must_use]
    pub fn line(&self) -> usize {
        self.line
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = Result<EventRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(err) => return Some(Err(err.into())),
            };
            self.line += 1;
            if line.trim().is_empty() {
                continue;
            }
            return Some(
                serde_json::from_str(&line)
                    .map_err(|e| Error::InvalidFormat(format!("line {}: {e}", self.line))),
            );
        }
    }
}

/// Per-strip noise of every calibrated module.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationTable {
    noise: HashMap<ModuleId, Vec<f32>>,
}

impl CalibrationTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a table from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not a valid table.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parses a JSON object mapping decimal module ids to per-strip noise.
    ///
    /// # Errors
    /// Returns [`Error::Json`] for malformed JSON and
    /// [`Error::InvalidFormat`] for keys that are not module ids.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let raw: BTreeMap<String, Vec<f32>> = serde_json::from_reader(reader)?;
        let mut table = Self::new();
        for (key, strips) in raw {
            let id = key
                .trim()
                .parse::<u32>()
                .map_err(|e| Error::InvalidFormat(format!("module id {key:?}: {e}")))?;
            table.insert(ModuleId::new(id), strips);
        }
        log::info!("loaded noise for {} modules", table.len());
        Ok(table)
    }

    /// Sets the noise of every strip of `module`.
    pub fn insert(&mut self, module: ModuleId, strips: Vec<f32>) {
        self.noise.insert(module, strips);
    }

    /// Noise of all strips of `module`.
    #[must_use]
    pub fn module(&self, module: ModuleId) -> Option<&[f32]> {
        self.noise.get(&module).map(Vec::as_slice)
    }

    /// Number of calibrated modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.noise.len()
    }

    /// Returns true if no module is calibrated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.noise.is_empty()
    }
}

impl NoiseCalibration for CalibrationTable {
    fn noise(&self, module: ModuleId, strip: u32) -> stripmon_core::Result<f32> {
        self.noise
            .get(&module)
            .and_then(|strips| strips.get(usize::try_from(strip).ok()?))
            .copied()
            .ok_or(stripmon_core::Error::CalibrationMissing { module, strip })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const EVENTS: &str = r#"{"event": 1, "hits": [{"type": "single", "cluster": {"module": 369120277, "first_strip": 10, "amplitudes": [12, 30]}, "direction": {"x": 0.0, "y": 0.1, "z": 1.0}}]}

{"event": 2, "off_track": [{"module": 369120277, "first_strip": 40, "amplitudes": [8]}]}
{"event": 3, "hits": [{"type": "matched", "mono": {"cluster": {"module": 436228134, "first_strip": 0, "amplitudes": [9]}, "direction": {"x": 0.0, "y": 0.0, "z": 1.0}}, "stereo": {"cluster": {"module": 436228138, "first_strip": 5, "amplitudes": [7, 7]}, "direction": {"x": 0.2, "y": 0.0, "z": 1.0}}}]}
"#;

    #[test]
    fn test_reads_events_and_skips_blank_lines() {
        let records: Vec<EventRecord> = EventReader::new(Cursor::new(EVENTS))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].event, 1);
        assert_eq!(records[1].off_track[0].first_strip, 40);
        assert_eq!(records[2].cluster_count(), 2);
    }

    #[test]
    fn test_line_counter_includes_blank_lines() {
        let mut reader = EventReader::new(Cursor::new(EVENTS));
        assert_eq!(reader.line(), 0);
        assert_eq!(reader.by_ref().take(2).count(), 2);
        assert_eq!(reader.line(), 3);
        assert_eq!(reader.by_ref().count(), 1);
        assert_eq!(reader.line(), 4);
    }

    #[test]
    fn test_observations_flatten_hits() {
        let record = EventReader::new(Cursor::new(EVENTS)).nth(2).unwrap().unwrap();
        let observations = record.into_observations();
        assert_eq!(observations.len(), 2);
        assert!(observations.iter().all(|o| o.track.is_on_track()));
        assert_eq!(observations[1].cluster.module, ModuleId::new(436_228_138));
    }

    #[test]
    fn test_bad_line_reports_line_number() {
        let input = "{\"event\": 1}\n\n{\"event\": \n";
        let mut reader = EventReader::new(Cursor::new(input));
        assert!(reader.next().unwrap().is_ok());
        let err = reader.next().unwrap().unwrap_err();
        assert!(err.to_string().contains("line 3"), "{err}");
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_calibration_lookup() {
        let json = r#"{"369120277": [1.5, 2.0, 2.5], "436228134": [3.0]}"#;
        let table = CalibrationTable::from_reader(json.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);

        let module = ModuleId::new(369_120_277);
        assert!((table.noise(module, 1).unwrap() - 2.0).abs() < f32::EPSILON);
        assert_eq!(
            table.noise(module, 3).unwrap_err(),
            stripmon_core::Error::CalibrationMissing { module, strip: 3 }
        );
        assert!(table.noise(ModuleId::new(1), 0).is_err());
    }

    #[test]
    fn test_calibration_rejects_bad_module_id() {
        let err = CalibrationTable::from_reader(r#"{"TIB": [1.0]}"#.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));
    }
}
