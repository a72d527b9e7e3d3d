use std::io::Write;
use stripmon_core::{MonitorKey, Subdetector, TrackFlag};
use stripmon_io::{CalibrationTable, EventReader, Snapshot, SummaryWriter};
use stripmon_stats::{MetricKind, MonitorConfig, StripMonitor};
use tempfile::{tempdir, NamedTempFile};

// TIB layer 1 and TOB layer 3
const TIB: u32 = (1 << 28) | (3 << 25) | (1 << 14);
const TOB: u32 = (1 << 28) | (5 << 25) | (3 << 14);

fn write_events() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for event in 1..=3 {
        writeln!(
            file,
            r#"{{"event": {event}, "hits": [{{"type": "single", "cluster": {{"module": {TIB}, "first_strip": 3, "amplitudes": [4, 20, 6]}}, "direction": {{"x": 0.0, "y": 0.0, "z": 1.0}}}}], "off_track": [{{"module": {TOB}, "first_strip": 0, "amplitudes": [10]}}]}}"#
        )
        .unwrap();
    }
    // Cluster on a strip the calibration does not cover
    writeln!(
        file,
        r#"{{"event": 4, "off_track": [{{"module": {TOB}, "first_strip": 9, "amplitudes": [10]}}]}}"#
    )
    .unwrap();
    file
}

fn write_calibration() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"{TIB}": [2, 2, 2, 2, 2, 2, 2, 2], "{TOB}": [2.5, 2.5]}}"#
    )
    .unwrap();
    file
}

fn run() -> StripMonitor<CalibrationTable> {
    let events = write_events();
    let calibration = CalibrationTable::open(write_calibration().path()).unwrap();
    let config = MonitorConfig::new().with_module_level(true);
    let mut monitor = StripMonitor::new(config, calibration).unwrap();
    for record in EventReader::open(events.path()).unwrap() {
        let record = record.unwrap();
        monitor
            .process_event(record.event, &record.into_observations())
            .unwrap();
    }
    monitor
}

#[test]
fn test_events_from_files_reach_registry() {
    let monitor = run();
    let stats = monitor.statistics();
    assert_eq!(stats.events, 4);
    assert_eq!(stats.accepted, 6);
    assert_eq!(stats.failed, 1);

    let tib = monitor
        .registry()
        .get(&MonitorKey::subdetector(Subdetector::Tib, TrackFlag::OnTrack))
        .unwrap();
    let ston = tib.accumulator(MetricKind::SignalToNoise).unwrap();
    assert_eq!(ston.count(), 3);
    assert!((ston.mean() - 15.0).abs() < 1e-9);
}

#[test]
fn test_outputs_written_as_csv_and_json() {
    let monitor = run();
    let dir = tempdir().unwrap();

    let csv = dir.path().join("summary.csv");
    SummaryWriter::create(&csv)
        .unwrap()
        .write_summary_csv(monitor.registry())
        .unwrap();
    let content = std::fs::read_to_string(&csv).unwrap();
    assert!(content.contains("Summary_cStoN_OnTrack_in_TIB__layer__1,3,15,0,0,0"));
    assert!(content.contains("Summary_NumberOfClusters_OffTrack_in_TOB,4,"));

    let json = dir.path().join("summary.json");
    SummaryWriter::create(&json)
        .unwrap()
        .write_snapshot_json(monitor.registry())
        .unwrap();
    let snapshot: Snapshot =
        serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
    let module = snapshot
        .entries
        .iter()
        .find(|e| e.label == format!("OnTrack_in_module_{TIB}"))
        .unwrap();
    let profile = module.profile.as_ref().unwrap();
    assert_eq!(profile.entries[10], 3);
    assert!((profile.means[10] - 1.0).abs() < 1e-12);
    assert!((profile.means[9] - 0.2).abs() < 1e-12);
}
