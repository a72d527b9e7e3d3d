use approx::assert_relative_eq;
use stripmon_core::{
    ClusterObservation, LocalDirection, ModuleId, RawCluster, Subdetector, UniformNoise,
};
use stripmon_stats::{
    DecimationMode, FillOutcome, KeyedMetricRegistry, MetricKind, MetricSchema, MonitorConfig,
    MonitorKey, StripMonitor, TrackFlag, TrendBuffer, TrendConfig,
};

fn four_by_ten(mode: DecimationMode) -> TrendBuffer {
    let config = TrendConfig::new().with_bins(4).with_step(10).with_mode(mode);
    let mut trend = TrendBuffer::new("cCharge", &config).unwrap();
    for event in [0, 10, 20, 30] {
        assert!(matches!(
            trend.fill(event, 1.0).unwrap(),
            FillOutcome::Binned(_)
        ));
    }
    trend
}

#[test]
fn test_overflow_decimates_once_in_every_mode() {
    for mode in [
        DecimationMode::RebinHalve,
        DecimationMode::Slide,
        DecimationMode::Reset,
    ] {
        let mut trend = four_by_ten(mode);
        assert!(trend.bins().iter().all(|b| b.entries() == 1));
        assert!(trend.bins().iter().all(|b| b.content() == 1.0));

        assert_eq!(trend.fill(40, 1.0).unwrap(), FillOutcome::Decimated);
        assert_eq!(trend.decimations(), 1, "{mode:?}");
        assert_eq!(trend.len(), 4, "{mode:?}");
    }
}

#[test]
fn test_rebin_keeps_history_at_half_resolution() {
    let mut trend = four_by_ten(DecimationMode::RebinHalve);
    trend.fill(40, 1.0).unwrap();
    assert_eq!(trend.step(), 20);
    let entries: Vec<u64> = trend.bins().iter().map(|b| b.entries()).collect();
    assert_eq!(entries, vec![2, 2, 0, 0]);

    // Event 50 now falls in bin 2 of the coarser grid
    assert_eq!(trend.fill(50, 3.0).unwrap(), FillOutcome::Binned(2));
    assert_relative_eq!(trend.bins()[2].content(), 3.0);
}

#[test]
fn test_slide_follows_the_stream() {
    let mut trend = four_by_ten(DecimationMode::Slide);
    trend.fill(40, 1.0).unwrap();
    assert_eq!(trend.anchor(), Some(10));
    assert_eq!(trend.bins()[3].entries(), 0);
    assert_eq!(trend.fill(45, 2.0).unwrap(), FillOutcome::Binned(3));
}

#[test]
fn test_out_of_order_fill_leaves_buffer_untouched() {
    let mut trend = four_by_ten(DecimationMode::RebinHalve);
    let before = trend.clone();
    assert!(trend.fill(5, 9.0).is_err());
    assert_eq!(trend, before);
}

#[test]
fn test_resolved_bundle_is_shared() {
    let mut registry = KeyedMetricRegistry::new(MetricSchema::default(), None).unwrap();
    let key = MonitorKey::subdetector(Subdetector::Tec, TrackFlag::OnTrack);

    registry
        .resolve(key)
        .fill(MetricKind::Width, 1, 3.0)
        .unwrap();
    let width = registry
        .resolve(key)
        .accumulator(MetricKind::Width)
        .unwrap();
    assert_eq!(width.count(), 1);
    assert_relative_eq!(width.mean(), 3.0);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_monitor_run_with_rebinned_trends() {
    let tec = ModuleId::new((1 << 28) | (6 << 25) | (1 << 18) | (3 << 14));
    let config = MonitorConfig::new()
        .with_module_level(true)
        .with_trend(Some(
            TrendConfig::new()
                .with_bins(4)
                .with_mode(DecimationMode::RebinHalve),
        ));
    let mut monitor = StripMonitor::new(config, UniformNoise(3.0)).unwrap();

    for event in 1..=20u64 {
        let amplitude = u16::try_from(event).unwrap() * 3;
        let hits = vec![
            ClusterObservation::on_track(
                RawCluster::new(tec, 100, vec![amplitude]),
                LocalDirection::new(0.0, 0.0, -1.0),
            ),
            ClusterObservation::off_track(RawCluster::new(tec, 300, vec![amplitude, 4])),
        ];
        let summary = monitor.process_event(event, &hits).unwrap();
        assert_eq!(summary.accepted, 2);
    }
    assert_eq!(monitor.statistics().events, 20);
    assert_eq!(monitor.statistics().accepted, 40);

    let registry = monitor.into_registry();
    let on = registry
        .get(&MonitorKey::subdetector(Subdetector::Tec, TrackFlag::OnTrack))
        .unwrap();
    let ston = on.trend(MetricKind::SignalToNoise).unwrap();
    // S/N equals the event id; events 5, 9 and 17 overflowed and triggered rebins
    assert_eq!(ston.step(), 8);
    assert_eq!(ston.decimations(), 3);
    let entries: Vec<u64> = ston.bins().iter().map(|b| b.entries()).collect();
    assert_eq!(entries, vec![7, 7, 3, 0]);
    let contents: Vec<f64> = ston.bins().iter().map(|b| b.content()).collect();
    for (got, want) in contents.iter().zip([4.625, 12.75, 19.0, 0.0]) {
        assert_relative_eq!(*got, want, epsilon = 1e-9);
    }
    assert_eq!(on.accumulator(MetricKind::SignalToNoise).unwrap().count(), 20);

    let module = registry
        .get(&MonitorKey::module(tec, TrackFlag::OnTrack))
        .unwrap();
    assert!(module.trends().next().is_none());
    assert_eq!(module.accumulator(MetricKind::Width).unwrap().count(), 20);
}
