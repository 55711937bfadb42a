//! Runtime configuration for the watch pipeline.
//!
//! Everything is validated in `watch::build_watch`; the defaults are tuned
//! for a balance board streaming at roughly 100 Hz.

/// Bounds and pacing for device resolution after a connect event.
#[derive(Debug, Clone)]
pub struct ResolveCfg {
    /// Sleep between discovery polls (ms).
    pub path_poll_ms: u64,
    /// Optional cap on the discovery phase (ms). `None` waits indefinitely;
    /// hardware enumeration has no useful upper bound of its own.
    pub discovery_max_ms: Option<u64>,
    /// Sleep between devtype confirmation attempts (ms).
    pub devtype_poll_ms: u64,
    /// Devtype confirmation attempts before giving up.
    pub devtype_attempts: u32,
    /// Device category required before sampling starts.
    pub expected_devtype: String,
}

impl Default for ResolveCfg {
    fn default() -> Self {
        Self {
            path_poll_ms: 100,
            discovery_max_ms: None,
            devtype_poll_ms: 500,
            devtype_attempts: 10,
            expected_devtype: "balanceboard".to_owned(),
        }
    }
}

/// Sampling, noise gating and averaging parameters.
#[derive(Debug, Clone)]
pub struct SampleCfg {
    /// Raw sums below this floor are discarded as noise and never start the
    /// settle window.
    pub noise_floor: i64,
    /// Ring capacity; the final average covers exactly this many readings.
    pub window: usize,
    /// Settle window after the first valid reading (ms).
    pub settle_ms: u64,
    /// Hard cap on a single measurement session (ms).
    pub max_run_ms: u64,
    /// Idle sleep when no sensor event is ready (ms).
    pub idle_poll_ms: u64,
}

impl Default for SampleCfg {
    fn default() -> Self {
        Self {
            noise_floor: 1000,
            window: 100,
            settle_ms: 3_000,
            max_run_ms: 30_000,
            idle_poll_ms: 50,
        }
    }
}

/// What to do when a session ends without a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log and keep watching.
    #[default]
    Continue,
    /// Terminate the watch with the session error.
    Stop,
}

/// Watch-loop pacing and continuation policy.
#[derive(Debug, Clone)]
pub struct WatchCfg {
    /// Per-poll timeout on the bus receive (ms); bounds shutdown latency.
    pub poll_ms: u64,
    pub on_failure: FailurePolicy,
    /// Terminate the watch after the first successful measurement.
    pub stop_after_measurement: bool,
}

impl Default for WatchCfg {
    fn default() -> Self {
        Self {
            poll_ms: 200,
            on_failure: FailurePolicy::Continue,
            stop_after_measurement: true,
        }
    }
}
