use rstest::rstest;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use weigher_core::collector::SampleCollector;
use weigher_core::config::SampleCfg;
use weigher_core::error::MeasureError;
use weigher_core::mocks::{ManualClock, ScriptedDevice, frame_with_total};
use weigher_traits::clock::Clock;

fn collector(clock: &ManualClock, shutdown: &Arc<AtomicBool>) -> SampleCollector {
    SampleCollector::new(SampleCfg::default(), Arc::new(clock.clone()), shutdown.clone())
}

#[test]
fn all_noise_never_starts_and_times_out_at_thirty_seconds() {
    let clock = ManualClock::new();
    let shutdown = Arc::new(AtomicBool::new(false));
    let epoch = clock.now();

    // A burst of sub-floor readings, then silence. None of them may start
    // the settle window.
    let dev = ScriptedDevice::new("balanceboard")
        .with_events((0..10).map(|_| Some(frame_with_total(999))));

    let err = collector(&clock, &shutdown).collect(Box::new(dev)).unwrap_err();
    assert_eq!(err, MeasureError::Timeout);
    assert_eq!(clock.ms_since(epoch), 30_000);
}

#[test]
fn averages_exactly_the_last_hundred_valid_readings() {
    let clock = ManualClock::new();
    let shutdown = Arc::new(AtomicBool::new(false));

    // 150 valid readings arrive in a burst; the ring must forget the first
    // 50 and average 2050..=2149 only.
    let dev = ScriptedDevice::new("balanceboard")
        .with_events((0..150).map(|i| Some(frame_with_total(2000 + i))));

    let weight = collector(&clock, &shutdown).collect(Box::new(dev)).unwrap();
    assert!((weight - 20.995).abs() < 1e-3, "got {weight}");
}

#[test]
fn too_few_valid_readings_yield_insufficient_data() {
    let clock = ManualClock::new();
    let shutdown = Arc::new(AtomicBool::new(false));

    let dev = ScriptedDevice::new("balanceboard")
        .with_events((0..50).map(|_| Some(frame_with_total(2000))));

    let err = collector(&clock, &shutdown).collect(Box::new(dev)).unwrap_err();
    assert_eq!(err, MeasureError::InsufficientData);
}

#[test]
fn evenly_paced_constant_load_measures_its_exact_weight() {
    let clock = ManualClock::new();
    let shutdown = Arc::new(AtomicBool::new(false));

    // 150 readings of raw 2000 spaced ~23 ms apart (3.5 s overall): the
    // settle window closes after 3 s with a full ring of constant sums.
    let dev = ScriptedDevice::new("balanceboard")
        .with_events((0..150).map(|_| Some(frame_with_total(2000))))
        .paced(&clock, Duration::from_millis(23));

    let weight = collector(&clock, &shutdown).collect(Box::new(dev)).unwrap();
    assert!((weight - 20.0).abs() < 1e-6, "got {weight}");
}

#[rstest]
#[case::just_below_floor(999, None)]
#[case::at_floor(1000, Some(10.0))]
fn noise_floor_boundary(#[case] total: i32, #[case] expected: Option<f32>) {
    let clock = ManualClock::new();
    let shutdown = Arc::new(AtomicBool::new(false));

    let dev = ScriptedDevice::new("balanceboard")
        .with_events((0..120).map(|_| Some(frame_with_total(total))));

    let result = collector(&clock, &shutdown).collect(Box::new(dev));
    match expected {
        Some(w) => assert!((result.unwrap() - w).abs() < 1e-6),
        None => assert_eq!(result.unwrap_err(), MeasureError::Timeout),
    }
}

#[test]
fn channel_open_failure_is_immediate() {
    let clock = ManualClock::new();
    let shutdown = Arc::new(AtomicBool::new(false));
    let epoch = clock.now();

    let dev = ScriptedDevice::new("balanceboard").failing_channel();

    let err = collector(&clock, &shutdown).collect(Box::new(dev)).unwrap_err();
    assert_eq!(err, MeasureError::DeviceOpenFailed);
    // No polling happened.
    assert_eq!(clock.ms_since(epoch), 0);
}

#[test]
fn shutdown_cancels_sampling() {
    let clock = ManualClock::new();
    let shutdown = Arc::new(AtomicBool::new(true));

    let dev = ScriptedDevice::new("balanceboard")
        .with_events((0..10).map(|_| Some(frame_with_total(2000))));

    let err = collector(&clock, &shutdown).collect(Box::new(dev)).unwrap_err();
    assert_eq!(err, MeasureError::Canceled);
}

#[test]
fn noise_after_onset_is_still_discarded() {
    let clock = ManualClock::new();
    let shutdown = Arc::new(AtomicBool::new(false));

    // Valid readings of 3000 interleaved with sub-floor dips; only the
    // valid readings may reach the ring, so the mean stays exactly 30.0.
    let events = (0..240).map(|i| {
        if i % 2 == 0 {
            Some(frame_with_total(3000))
        } else {
            Some(frame_with_total(500))
        }
    });
    let dev = ScriptedDevice::new("balanceboard").with_events(events);

    let weight = collector(&clock, &shutdown).collect(Box::new(dev)).unwrap();
    assert!((weight - 30.0).abs() < 1e-6, "got {weight}");
}
