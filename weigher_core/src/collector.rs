//! Bounded sampling and averaging of raw sensor events.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use weigher_traits::DeviceInterface;
use weigher_traits::clock::Clock;

use crate::config::SampleCfg;
use crate::error::MeasureError;

/// Raw sensor units per reported weight unit.
pub const RAW_PER_UNIT: f32 = 100.0;

/// Fixed-capacity ring over the most recent raw sums.
///
/// Only meaningful once it has wrapped at least once; the average then
/// covers exactly the last `capacity` readings, no matter how many valid
/// readings arrived before that.
#[derive(Debug)]
pub struct SampleRing {
    buf: Vec<i64>,
    next: usize,
    wrapped: bool,
}

impl SampleRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity.max(1)],
            next: 0,
            wrapped: false,
        }
    }

    pub fn push(&mut self, value: i64) {
        self.buf[self.next] = value;
        self.next += 1;
        if self.next == self.buf.len() {
            self.next = 0;
            self.wrapped = true;
        }
    }

    pub fn is_full(&self) -> bool {
        self.wrapped
    }

    /// Mean over the whole buffer; only meaningful when `is_full()`.
    pub fn mean(&self) -> f64 {
        let sum: i64 = self.buf.iter().sum();
        sum as f64 / self.buf.len() as f64
    }
}

/// Samples an open interface until the weight settles or a bound trips.
pub struct SampleCollector {
    cfg: SampleCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    shutdown: Arc<AtomicBool>,
}

impl SampleCollector {
    pub fn new(
        cfg: SampleCfg,
        clock: Arc<dyn Clock + Send + Sync>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            cfg,
            clock,
            shutdown,
        }
    }

    /// Collect and average one measurement.
    ///
    /// Takes ownership of the handle; dropping it here closes the interface
    /// on every exit path, success and failure alike.
    pub fn collect(&self, mut dev: Box<dyn DeviceInterface>) -> Result<f32, MeasureError> {
        if let Err(e) = dev.open_channel() {
            tracing::error!(error = %e, "sensor channel open failed");
            return Err(MeasureError::DeviceOpenFailed);
        }

        let mut ring = SampleRing::new(self.cfg.window);
        let epoch = self.clock.now();
        // Set once the first above-floor reading arrives.
        let mut started_at_ms: Option<u64> = None;

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                return Err(MeasureError::Canceled);
            }
            let now = self.clock.ms_since(epoch);
            if now >= self.cfg.max_run_ms {
                tracing::warn!(elapsed_ms = now, "measurement timed out");
                return Err(MeasureError::Timeout);
            }
            if let Some(started) = started_at_ms
                && now.saturating_sub(started) >= self.cfg.settle_ms
            {
                break;
            }

            match dev.poll_event() {
                Ok(Some(frame)) => {
                    let sum = frame.total();
                    if sum < self.cfg.noise_floor {
                        continue;
                    }
                    if started_at_ms.is_none() {
                        started_at_ms = Some(now);
                        tracing::debug!(raw = sum, "measurement started");
                    }
                    ring.push(sum);
                }
                Ok(None) => {
                    self.clock
                        .sleep(Duration::from_millis(self.cfg.idle_poll_ms));
                }
                Err(e) => return Err(MeasureError::Hardware(e.to_string())),
            }
        }

        if !ring.is_full() {
            tracing::warn!(
                window = self.cfg.window,
                "settle window closed before the ring filled"
            );
            return Err(MeasureError::InsufficientData);
        }
        Ok((ring.mean() / f64::from(RAW_PER_UNIT)) as f32)
    }
}
