//! End-to-end watch orchestration: signal → resolve → sample → disconnect.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use weigher_traits::clock::{Clock, MonotonicClock};
use weigher_traits::{Bus, DeviceMonitor};

use crate::collector::SampleCollector;
use crate::config::{FailurePolicy, ResolveCfg, SampleCfg, WatchCfg};
use crate::error::{BuildError, MeasureError, Result};
use crate::resolver::DeviceResolver;
use crate::signal::{DeviceIdentity, SignalFilter};

/// Outcome of one connect-triggered measurement session.
#[derive(Debug)]
pub enum SessionOutcome {
    Measured(f32),
    Failed(MeasureError),
}

/// Long-lived watch over one device identity.
///
/// A connect transition runs the whole resolve → sample sequence
/// synchronously before the next notification is looked at; only one
/// session is meaningful at a time, and the device cannot announce a new
/// connection while already connected.
pub struct Watch<B: Bus, M: DeviceMonitor> {
    bus: B,
    monitor: M,
    filter: SignalFilter,
    resolve_cfg: ResolveCfg,
    sample_cfg: SampleCfg,
    watch_cfg: WatchCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    shutdown: Arc<AtomicBool>,
    on_weight: Option<Box<dyn FnMut(f32)>>,
}

/// Validate configuration and assemble a watch.
#[allow(clippy::too_many_arguments)]
pub fn build_watch<B, M>(
    bus: B,
    monitor: M,
    identity: DeviceIdentity,
    resolve_cfg: ResolveCfg,
    sample_cfg: SampleCfg,
    watch_cfg: WatchCfg,
    shutdown: Arc<AtomicBool>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    on_weight: Option<Box<dyn FnMut(f32)>>,
) -> Result<Watch<B, M>>
where
    B: Bus,
    M: DeviceMonitor,
{
    if sample_cfg.window == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "sample window must be > 0",
        )));
    }
    if sample_cfg.settle_ms >= sample_cfg.max_run_ms {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "settle_ms must be below max_run_ms",
        )));
    }
    if sample_cfg.idle_poll_ms == 0 || watch_cfg.poll_ms == 0 || resolve_cfg.path_poll_ms == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "poll intervals must be >= 1 ms",
        )));
    }
    if resolve_cfg.devtype_attempts == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "devtype_attempts must be > 0",
        )));
    }
    if resolve_cfg.expected_devtype.is_empty() {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "expected devtype must not be empty",
        )));
    }
    let clock: Arc<dyn Clock + Send + Sync> = match clock {
        Some(b) => Arc::from(b),
        None => Arc::new(MonotonicClock::new()),
    };
    Ok(Watch {
        bus,
        monitor,
        filter: SignalFilter::new(identity),
        resolve_cfg,
        sample_cfg,
        watch_cfg,
        clock,
        shutdown,
        on_weight,
    })
}

impl<B: Bus, M: DeviceMonitor> Watch<B, M> {
    /// Run the watch loop until shutdown or a terminal policy decision.
    ///
    /// Returns the last measured weight, if any. Dropping the bus adapter
    /// afterwards releases the subscription and the connection.
    pub fn run(&mut self) -> Result<Option<f32>> {
        let poll = Duration::from_millis(self.watch_cfg.poll_ms);
        let mut last = None;
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                tracing::info!("watch stopped by shutdown request");
                return Ok(last);
            }
            let sig = match self.bus.recv(poll) {
                Ok(Some(sig)) => sig,
                Ok(None) => continue,
                Err(e) => return Err(eyre::Report::new(MeasureError::Bus(e.to_string()))),
            };
            let Some(event) = self.filter.filter(&sig) else {
                continue;
            };
            if !event.connected {
                tracing::info!(path = %event.path, "device disconnected");
                continue;
            }

            tracing::info!(path = %event.path, "device connected; starting session");
            match self.run_session() {
                SessionOutcome::Measured(weight) => {
                    last = Some(weight);
                    tracing::info!(weight, "measurement complete");
                    if let Some(cb) = self.on_weight.as_mut() {
                        cb(weight);
                    }
                    // Best-effort: without this the board stays connected
                    // and never announces itself again.
                    if let Err(e) = self.bus.disconnect(&event.path) {
                        tracing::warn!(error = %e, "disconnect request failed");
                    }
                    if self.watch_cfg.stop_after_measurement {
                        return Ok(last);
                    }
                }
                SessionOutcome::Failed(MeasureError::Canceled) => {
                    tracing::info!("session canceled by shutdown request");
                    return Ok(last);
                }
                SessionOutcome::Failed(e) => {
                    tracing::error!(error = %e, "session ended without a measurement");
                    match self.watch_cfg.on_failure {
                        FailurePolicy::Continue => {}
                        FailurePolicy::Stop => return Err(eyre::Report::new(e)),
                    }
                }
            }
        }
    }

    fn run_session(&mut self) -> SessionOutcome {
        let resolver = DeviceResolver::new(
            self.resolve_cfg.clone(),
            self.clock.clone(),
            self.shutdown.clone(),
        );
        let dev = match resolver.resolve(&mut self.monitor) {
            Ok(dev) => dev,
            Err(e) => return SessionOutcome::Failed(e),
        };
        let collector = SampleCollector::new(
            self.sample_cfg.clone(),
            self.clock.clone(),
            self.shutdown.clone(),
        );
        match collector.collect(dev) {
            Ok(weight) => SessionOutcome::Measured(weight),
            Err(e) => SessionOutcome::Failed(e),
        }
    }
}
