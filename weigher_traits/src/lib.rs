pub mod clock;

pub use clock::{Clock, MonotonicClock};

use std::time::Duration;

/// Result alias shared by all collaborator traits.
pub type HwResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// A property value carried inside a bus notification.
///
/// Only booleans are semantically meaningful to the watch; anything else is
/// preserved as a debug rendering so rejections can be logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropValue {
    Bool(bool),
    Str(String),
    /// Any other wire type, rendered for logging.
    Other(String),
}

/// One property-change notification as delivered by the bus adapter.
///
/// Adapters forward the actual body signature even when the payload could
/// not be decoded, so the core can reject malformed shapes itself.
#[derive(Debug, Clone)]
pub struct BusSignal {
    /// Object path the notification was emitted for.
    pub path: String,
    /// Actual signature of the message body, e.g. `sa{sv}as`.
    pub body_signature: String,
    /// Name of the interface whose properties changed.
    pub interface: String,
    /// Changed properties as (name, value) pairs.
    pub changed: Vec<(String, PropValue)>,
    /// Properties invalidated without a replacement value.
    pub invalidated: Vec<String>,
}

/// One raw sensor event: four independent force-sensor readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardFrame {
    pub axes: [i32; 4],
}

impl BoardFrame {
    /// Instantaneous raw weight: the sum of all four sensors.
    pub fn total(&self) -> i64 {
        self.axes.iter().map(|&v| i64::from(v)).sum()
    }
}

/// Inbound notification stream plus the outbound disconnect command.
pub trait Bus {
    /// Wait up to `timeout` for the next notification; `Ok(None)` on a quiet
    /// interval so callers can interleave polls with cancellation checks.
    fn recv(&mut self, timeout: Duration) -> HwResult<Option<BusSignal>>;

    /// Ask the remote device to drop the connection. Best-effort; the return
    /// value carries transport errors only.
    fn disconnect(&mut self, object_path: &str) -> HwResult<()>;
}

/// Discovery side of the device layer: enumerate newly attached devices and
/// open an interface at a discovered path.
pub trait DeviceMonitor {
    /// Non-blocking poll for a newly enumerated device path.
    fn poll_new_path(&mut self) -> HwResult<Option<String>>;

    fn open(&mut self, path: &str) -> HwResult<Box<dyn DeviceInterface>>;
}

/// An open hardware interface. Dropping the handle closes it.
pub trait DeviceInterface: std::fmt::Debug {
    /// The device category the interface declares, e.g. `balanceboard`.
    /// May be transient right after pairing; callers re-query.
    fn devtype(&mut self) -> HwResult<String>;

    /// Open the force-sensor data channel.
    fn open_channel(&mut self) -> HwResult<()>;

    /// Non-blocking poll for the next raw sensor event.
    fn poll_event(&mut self) -> HwResult<Option<BoardFrame>>;
}
