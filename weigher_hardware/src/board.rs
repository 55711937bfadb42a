//! Kernel input-device backend for the balance board.
//!
//! The kernel driver exposes the board's four force sensors as an absolute-
//! axis input device. Discovery is a diff over the enumerated device nodes;
//! the data channel is the event stream read in non-blocking mode.

use std::collections::HashSet;
use std::os::fd::AsRawFd;
use std::path::PathBuf;

use evdev::{AbsoluteAxisType, InputEventKind};

use weigher_traits::{BoardFrame, DeviceInterface, DeviceMonitor, HwResult};

use crate::error::HwError;

/// Device-name fragment the kernel driver assigns to the board's sensors.
const BOARD_NAME: &str = "Balance Board";

/// Device category reported for a recognized board.
const BOARD_DEVTYPE: &str = "balanceboard";

pub struct InputMonitor {
    seen: HashSet<PathBuf>,
}

impl InputMonitor {
    /// Snapshot the nodes present before the connect event so only newly
    /// enumerated devices are reported.
    pub fn new() -> Self {
        let seen = evdev::enumerate().map(|(path, _)| path).collect();
        Self { seen }
    }
}

impl Default for InputMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceMonitor for InputMonitor {
    fn poll_new_path(&mut self) -> HwResult<Option<String>> {
        for (path, _) in evdev::enumerate() {
            if self.seen.insert(path.clone()) {
                return Ok(Some(path.to_string_lossy().into_owned()));
            }
        }
        Ok(None)
    }

    fn open(&mut self, path: &str) -> HwResult<Box<dyn DeviceInterface>> {
        let dev = evdev::Device::open(path).map_err(|e| HwError::Input(e.to_string()))?;
        set_nonblocking(&dev)?;
        Ok(Box::new(BoardDevice::new(dev)))
    }
}

/// Non-blocking reads; the collector paces its own polling.
fn set_nonblocking(dev: &evdev::Device) -> HwResult<()> {
    let fd = dev.as_raw_fd();
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 || unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(Box::new(HwError::Input(
            "failed to set O_NONBLOCK on event device".to_owned(),
        )));
    }
    Ok(())
}

/// The four sensors arrive as hat-axis events; a synchronization event
/// terminates each frame.
pub struct BoardDevice {
    dev: evdev::Device,
    pending: [i32; 4],
}

impl std::fmt::Debug for BoardDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardDevice")
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl BoardDevice {
    fn new(dev: evdev::Device) -> Self {
        Self {
            dev,
            pending: [0; 4],
        }
    }
}

impl DeviceInterface for BoardDevice {
    fn devtype(&mut self) -> HwResult<String> {
        let name = self.dev.name().unwrap_or_default().to_owned();
        if name.contains(BOARD_NAME) {
            Ok(BOARD_DEVTYPE.to_owned())
        } else {
            // Right after pairing the node may still carry a placeholder
            // name; report it as-is so the resolver keeps retrying.
            Ok(name.to_ascii_lowercase().replace(' ', ""))
        }
    }

    fn open_channel(&mut self) -> HwResult<()> {
        let axes = self.dev.supported_absolute_axes().unwrap_or_default();
        if axes.contains(AbsoluteAxisType::ABS_HAT0X) {
            Ok(())
        } else {
            Err(Box::new(HwError::Input(
                "device exposes no force-sensor axes".to_owned(),
            )))
        }
    }

    fn poll_event(&mut self) -> HwResult<Option<BoardFrame>> {
        match self.dev.fetch_events() {
            Ok(events) => {
                let mut complete = None;
                for ev in events {
                    match ev.kind() {
                        InputEventKind::AbsAxis(axis) => {
                            if let Some(i) = sensor_index(axis) {
                                self.pending[i] = ev.value();
                            }
                        }
                        InputEventKind::Synchronization(_) => {
                            complete = Some(BoardFrame { axes: self.pending });
                        }
                        _ => {}
                    }
                }
                Ok(complete)
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(Box::new(HwError::Io(e))),
        }
    }
}

fn sensor_index(axis: AbsoluteAxisType) -> Option<usize> {
    if axis == AbsoluteAxisType::ABS_HAT0X {
        Some(0)
    } else if axis == AbsoluteAxisType::ABS_HAT0Y {
        Some(1)
    } else if axis == AbsoluteAxisType::ABS_HAT1X {
        Some(2)
    } else if axis == AbsoluteAxisType::ABS_HAT1Y {
        Some(3)
    } else {
        None
    }
}
