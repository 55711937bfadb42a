//! Scripted collaborators and a manual clock for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use weigher_traits::clock::Clock;
use weigher_traits::{
    BoardFrame, Bus, BusSignal, DeviceInterface, DeviceMonitor, HwResult, PropValue,
};

use crate::signal::PROPERTIES_CHANGED_SIGNATURE;

/// Clock whose time only moves when something sleeps on it.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, d: Duration) {
        if let Ok(mut off) = self.offset.lock() {
            *off = off.saturating_add(d);
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let off = self.offset.lock().map(|g| *g).unwrap_or(Duration::ZERO);
        self.origin + off
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

/// A well-formed properties-changed notification for `path`.
pub fn connected_signal(path: &str, connected: bool) -> BusSignal {
    BusSignal {
        path: path.to_owned(),
        body_signature: PROPERTIES_CHANGED_SIGNATURE.to_owned(),
        interface: "org.bluez.Device1".to_owned(),
        changed: vec![("Connected".to_owned(), PropValue::Bool(connected))],
        invalidated: Vec::new(),
    }
}

/// A frame whose four sensors sum to `total`.
pub fn frame_with_total(total: i32) -> BoardFrame {
    BoardFrame {
        axes: [total, 0, 0, 0],
    }
}

/// Bus that replays a scripted signal queue and records disconnect calls.
///
/// Once drained it keeps returning `Ok(None)`; pair with
/// `stop_when_drained` so watch loops terminate instead of spinning.
pub struct ScriptedBus {
    signals: VecDeque<BusSignal>,
    drained_stop: Option<Arc<AtomicBool>>,
    disconnects: Arc<Mutex<Vec<String>>>,
}

impl ScriptedBus {
    pub fn new(signals: impl IntoIterator<Item = BusSignal>) -> Self {
        Self {
            signals: signals.into_iter().collect(),
            drained_stop: None,
            disconnects: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Raise `flag` once the script is exhausted.
    pub fn stop_when_drained(mut self, flag: &Arc<AtomicBool>) -> Self {
        self.drained_stop = Some(flag.clone());
        self
    }

    /// Shared view of the disconnect calls issued so far.
    pub fn disconnect_log(&self) -> Arc<Mutex<Vec<String>>> {
        self.disconnects.clone()
    }
}

impl Bus for ScriptedBus {
    fn recv(&mut self, _timeout: Duration) -> HwResult<Option<BusSignal>> {
        match self.signals.pop_front() {
            Some(sig) => Ok(Some(sig)),
            None => {
                if let Some(flag) = &self.drained_stop {
                    flag.store(true, Ordering::Relaxed);
                }
                Ok(None)
            }
        }
    }

    fn disconnect(&mut self, object_path: &str) -> HwResult<()> {
        if let Ok(mut log) = self.disconnects.lock() {
            log.push(object_path.to_owned());
        }
        Ok(())
    }
}

/// Monitor that yields scripted discovery results and hands out scripted
/// devices, counting every open.
pub struct ScriptedMonitor {
    paths: VecDeque<Option<String>>,
    devices: VecDeque<ScriptedDevice>,
    opens: Arc<AtomicUsize>,
}

impl ScriptedMonitor {
    pub fn new() -> Self {
        Self {
            paths: VecDeque::new(),
            devices: VecDeque::new(),
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Enumerate `path` after `silent_polls` empty polls.
    pub fn announce_after(mut self, silent_polls: usize, path: &str) -> Self {
        for _ in 0..silent_polls {
            self.paths.push_back(None);
        }
        self.paths.push_back(Some(path.to_owned()));
        self
    }

    /// Queue a device to be handed out by the next `open` call.
    pub fn with_device(mut self, dev: ScriptedDevice) -> Self {
        self.devices.push_back(dev);
        self
    }

    pub fn open_counter(&self) -> Arc<AtomicUsize> {
        self.opens.clone()
    }
}

impl Default for ScriptedMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceMonitor for ScriptedMonitor {
    fn poll_new_path(&mut self) -> HwResult<Option<String>> {
        Ok(self.paths.pop_front().flatten())
    }

    fn open(&mut self, _path: &str) -> HwResult<Box<dyn DeviceInterface>> {
        self.opens.fetch_add(1, Ordering::Relaxed);
        match self.devices.pop_front() {
            Some(dev) => Ok(Box::new(dev)),
            None => Err("no scripted device left".into()),
        }
    }
}

/// Device whose devtype, channel result and event stream are scripted.
///
/// `None` entries in the event script simulate "nothing ready"; an
/// exhausted script keeps returning `None`. When paced, every poll advances
/// the shared manual clock, simulating evenly spaced arrivals.
#[derive(Debug)]
pub struct ScriptedDevice {
    devtype: String,
    channel_error: bool,
    events: VecDeque<Option<BoardFrame>>,
    pacing: Option<(ManualClock, Duration)>,
    closes: Option<Arc<AtomicUsize>>,
}

impl ScriptedDevice {
    pub fn new(devtype: &str) -> Self {
        Self {
            devtype: devtype.to_owned(),
            channel_error: false,
            events: VecDeque::new(),
            pacing: None,
            closes: None,
        }
    }

    pub fn with_events(mut self, events: impl IntoIterator<Item = Option<BoardFrame>>) -> Self {
        self.events.extend(events);
        self
    }

    pub fn failing_channel(mut self) -> Self {
        self.channel_error = true;
        self
    }

    pub fn paced(mut self, clock: &ManualClock, step: Duration) -> Self {
        self.pacing = Some((clock.clone(), step));
        self
    }

    /// Increment `counter` when this device drops (i.e. closes).
    pub fn track_close(mut self, counter: &Arc<AtomicUsize>) -> Self {
        self.closes = Some(counter.clone());
        self
    }
}

impl DeviceInterface for ScriptedDevice {
    fn devtype(&mut self) -> HwResult<String> {
        Ok(self.devtype.clone())
    }

    fn open_channel(&mut self) -> HwResult<()> {
        if self.channel_error {
            Err("scripted channel failure".into())
        } else {
            Ok(())
        }
    }

    fn poll_event(&mut self) -> HwResult<Option<BoardFrame>> {
        if let Some((clock, step)) = &self.pacing {
            clock.advance(*step);
        }
        Ok(self.events.pop_front().flatten())
    }
}

impl Drop for ScriptedDevice {
    fn drop(&mut self) {
        if let Some(counter) = &self.closes {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }
}
