#[cfg(feature = "hardware")]
pub mod bluez;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod board;
pub mod error;

use std::collections::VecDeque;
use std::time::Duration;

use weigher_traits::{
    BoardFrame, Bus, BusSignal, DeviceInterface, DeviceMonitor, HwResult, PropValue,
};

/// Simulated bus: announces the watched address once, then stays quiet.
pub struct SimulatedBus {
    pending: VecDeque<BusSignal>,
}

impl SimulatedBus {
    pub fn new(address: &str) -> Self {
        let path = format!("/sim/hci0/dev_{}", address.replace(':', "_"));
        let mut pending = VecDeque::new();
        pending.push_back(BusSignal {
            path,
            body_signature: "sa{sv}as".to_owned(),
            interface: "sim.Device".to_owned(),
            changed: vec![("Connected".to_owned(), PropValue::Bool(true))],
            invalidated: Vec::new(),
        });
        Self { pending }
    }
}

impl Bus for SimulatedBus {
    fn recv(&mut self, timeout: Duration) -> HwResult<Option<BusSignal>> {
        match self.pending.pop_front() {
            Some(sig) => Ok(Some(sig)),
            None => {
                std::thread::sleep(timeout);
                Ok(None)
            }
        }
    }

    fn disconnect(&mut self, object_path: &str) -> HwResult<()> {
        tracing::info!(path = %object_path, "disconnect requested (simulated)");
        Ok(())
    }
}

/// Simulated monitor: enumerates one board after a couple of empty polls,
/// mimicking slow hardware enumeration.
pub struct SimulatedMonitor {
    silent_polls: u32,
    announced: bool,
}

impl SimulatedMonitor {
    pub fn new() -> Self {
        Self {
            silent_polls: 2,
            announced: false,
        }
    }
}

impl Default for SimulatedMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceMonitor for SimulatedMonitor {
    fn poll_new_path(&mut self) -> HwResult<Option<String>> {
        if self.announced {
            return Ok(None);
        }
        if self.silent_polls > 0 {
            self.silent_polls -= 1;
            return Ok(None);
        }
        self.announced = true;
        Ok(Some("/sim/input/board0".to_owned()))
    }

    fn open(&mut self, _path: &str) -> HwResult<Box<dyn DeviceInterface>> {
        Ok(Box::new(SimulatedBoard::new()))
    }
}

/// Simulated board: streams a constant 2000-unit load at roughly 200 Hz,
/// which averages to 20.00 on the console.
#[derive(Debug)]
pub struct SimulatedBoard;

impl SimulatedBoard {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SimulatedBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceInterface for SimulatedBoard {
    fn devtype(&mut self) -> HwResult<String> {
        Ok("balanceboard".to_owned())
    }

    fn open_channel(&mut self) -> HwResult<()> {
        tracing::debug!("sensor channel opened (simulated)");
        Ok(())
    }

    fn poll_event(&mut self) -> HwResult<Option<BoardFrame>> {
        std::thread::sleep(Duration::from_millis(5));
        Ok(Some(BoardFrame {
            axes: [512, 488, 505, 495],
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_bus_announces_the_watched_address_once() {
        let mut bus = SimulatedBus::new("AA:BB:CC:DD:EE:FF");
        let sig = bus.recv(Duration::from_millis(1)).unwrap().unwrap();
        assert!(sig.path.ends_with("dev_AA_BB_CC_DD_EE_FF"));
        assert!(bus.recv(Duration::from_millis(1)).unwrap().is_none());
    }

    #[test]
    fn simulated_monitor_enumerates_after_a_few_polls() {
        let mut monitor = SimulatedMonitor::new();
        assert!(monitor.poll_new_path().unwrap().is_none());
        assert!(monitor.poll_new_path().unwrap().is_none());
        let path = monitor.poll_new_path().unwrap().unwrap();
        assert_eq!(path, "/sim/input/board0");
        // Only ever announced once.
        assert!(monitor.poll_new_path().unwrap().is_none());
    }

    #[test]
    fn simulated_board_reports_a_constant_load() {
        let mut board = SimulatedBoard::new();
        assert_eq!(board.devtype().unwrap(), "balanceboard");
        board.open_channel().unwrap();
        let frame = board.poll_event().unwrap().unwrap();
        assert_eq!(frame.total(), 2000);
    }
}
