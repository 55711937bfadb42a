//! Two-phase device resolution after a connect transition.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use weigher_traits::clock::Clock;
use weigher_traits::{DeviceInterface, DeviceMonitor};

use crate::config::ResolveCfg;
use crate::error::MeasureError;

/// Waits for the kernel to enumerate the freshly connected device, then
/// confirms its declared type before handing the open interface onward.
pub struct DeviceResolver {
    cfg: ResolveCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    shutdown: Arc<AtomicBool>,
}

impl DeviceResolver {
    pub fn new(
        cfg: ResolveCfg,
        clock: Arc<dyn Clock + Send + Sync>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            cfg,
            clock,
            shutdown,
        }
    }

    /// Resolve the device and transfer ownership of the open interface to
    /// the caller. Nothing stays open on any failure path.
    pub fn resolve<M: DeviceMonitor + ?Sized>(
        &self,
        monitor: &mut M,
    ) -> Result<Box<dyn DeviceInterface>, MeasureError> {
        let path = self.wait_for_path(monitor)?;
        self.confirm_devtype(monitor, &path)
    }

    /// Phase 1: poll the discovery subsystem until a new path appears.
    /// Unbounded unless `discovery_max_ms` is set; the shutdown flag is
    /// observed every iteration.
    fn wait_for_path<M: DeviceMonitor + ?Sized>(
        &self,
        monitor: &mut M,
    ) -> Result<String, MeasureError> {
        let epoch = self.clock.now();
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                return Err(MeasureError::Canceled);
            }
            if let Some(max_ms) = self.cfg.discovery_max_ms
                && self.clock.ms_since(epoch) >= max_ms
            {
                tracing::warn!(max_ms, "gave up waiting for device enumeration");
                return Err(MeasureError::Timeout);
            }
            match monitor.poll_new_path() {
                Ok(Some(path)) => {
                    tracing::debug!(%path, "device path enumerated");
                    return Ok(path);
                }
                Ok(None) => {}
                Err(e) => return Err(MeasureError::Hardware(e.to_string())),
            }
            self.clock
                .sleep(Duration::from_millis(self.cfg.path_poll_ms));
        }
    }

    /// Phase 2: the device may report a transient type right after pairing,
    /// so open, query and compare up to `devtype_attempts` times with a
    /// fresh handle each round. The previous handle drops (closing it)
    /// before the next attempt.
    fn confirm_devtype<M: DeviceMonitor + ?Sized>(
        &self,
        monitor: &mut M,
        path: &str,
    ) -> Result<Box<dyn DeviceInterface>, MeasureError> {
        for attempt in 1..=self.cfg.devtype_attempts {
            if self.shutdown.load(Ordering::Relaxed) {
                return Err(MeasureError::Canceled);
            }
            match monitor.open(path) {
                Ok(mut dev) => match dev.devtype() {
                    Ok(kind) if kind == self.cfg.expected_devtype => {
                        tracing::info!(%path, %kind, attempt, "device type confirmed");
                        return Ok(dev);
                    }
                    Ok(kind) => {
                        tracing::debug!(%path, %kind, attempt, "device type not ready yet");
                    }
                    Err(e) => {
                        tracing::debug!(%path, attempt, error = %e, "devtype query failed");
                    }
                },
                Err(e) => {
                    tracing::debug!(%path, attempt, error = %e, "interface open failed");
                }
            }
            if attempt < self.cfg.devtype_attempts {
                self.clock
                    .sleep(Duration::from_millis(self.cfg.devtype_poll_ms));
            }
        }
        tracing::warn!(
            %path,
            attempts = self.cfg.devtype_attempts,
            "device type never resolved"
        );
        Err(MeasureError::DevtypeResolution)
    }
}
