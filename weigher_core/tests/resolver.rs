use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use weigher_core::config::ResolveCfg;
use weigher_core::error::MeasureError;
use weigher_core::mocks::{ManualClock, ScriptedDevice, ScriptedMonitor};
use weigher_core::resolver::DeviceResolver;

const PATH: &str = "/dev/input/event7";

fn resolver(cfg: ResolveCfg, clock: &ManualClock, shutdown: &Arc<AtomicBool>) -> DeviceResolver {
    DeviceResolver::new(cfg, Arc::new(clock.clone()), shutdown.clone())
}

#[test]
fn unresolved_devtype_exhausts_attempts_and_leaves_nothing_open() {
    let clock = ManualClock::new();
    let shutdown = Arc::new(AtomicBool::new(false));
    let closes = Arc::new(AtomicUsize::new(0));

    let mut monitor = ScriptedMonitor::new().announce_after(0, PATH);
    for _ in 0..10 {
        monitor = monitor.with_device(ScriptedDevice::new("pending").track_close(&closes));
    }
    let opens = monitor.open_counter();

    let r = resolver(ResolveCfg::default(), &clock, &shutdown);
    let err = r.resolve(&mut monitor).unwrap_err();

    assert_eq!(err, MeasureError::DevtypeResolution);
    assert_eq!(opens.load(Ordering::Relaxed), 10);
    // Every opened handle was dropped before returning.
    assert_eq!(closes.load(Ordering::Relaxed), 10);
}

#[test]
fn transient_devtype_resolves_on_a_later_attempt() {
    let clock = ManualClock::new();
    let shutdown = Arc::new(AtomicBool::new(false));
    let closes = Arc::new(AtomicUsize::new(0));

    let mut monitor = ScriptedMonitor::new().announce_after(3, PATH);
    for _ in 0..2 {
        monitor = monitor.with_device(ScriptedDevice::new("unknown").track_close(&closes));
    }
    monitor = monitor.with_device(ScriptedDevice::new("balanceboard").track_close(&closes));
    let opens = monitor.open_counter();

    let r = resolver(ResolveCfg::default(), &clock, &shutdown);
    let dev = r.resolve(&mut monitor).unwrap();

    assert_eq!(opens.load(Ordering::Relaxed), 3);
    // The two mismatched handles were closed; the confirmed one is still ours.
    assert_eq!(closes.load(Ordering::Relaxed), 2);
    drop(dev);
    assert_eq!(closes.load(Ordering::Relaxed), 3);
}

#[test]
fn bounded_discovery_times_out() {
    let clock = ManualClock::new();
    let shutdown = Arc::new(AtomicBool::new(false));
    let mut monitor = ScriptedMonitor::new();

    let cfg = ResolveCfg {
        discovery_max_ms: Some(1_000),
        ..ResolveCfg::default()
    };
    let r = resolver(cfg, &clock, &shutdown);
    let err = r.resolve(&mut monitor).unwrap_err();
    assert_eq!(err, MeasureError::Timeout);
}

#[test]
fn shutdown_cancels_discovery_immediately() {
    let clock = ManualClock::new();
    let shutdown = Arc::new(AtomicBool::new(true));
    let mut monitor = ScriptedMonitor::new();
    let opens = monitor.open_counter();

    let r = resolver(ResolveCfg::default(), &clock, &shutdown);
    let err = r.resolve(&mut monitor).unwrap_err();
    assert_eq!(err, MeasureError::Canceled);
    assert_eq!(opens.load(Ordering::Relaxed), 0);
}

#[test]
fn shutdown_cancels_devtype_confirmation() {
    let clock = ManualClock::new();
    let shutdown = Arc::new(AtomicBool::new(false));
    let mut monitor = ScriptedMonitor::new().announce_after(0, PATH);

    // Cancel as soon as the discovery phase hands over to confirmation.
    shutdown.store(true, Ordering::Relaxed);
    let r = resolver(ResolveCfg::default(), &clock, &shutdown);
    let err = r.resolve(&mut monitor).unwrap_err();
    assert_eq!(err, MeasureError::Canceled);
}
