#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Connection-and-measurement state machine (hardware-agnostic).
//!
//! This crate turns system-bus property-change notifications into a single
//! averaged weight reading. All bus and device interactions go through the
//! `weigher_traits` seams; real adapters live in `weigher_hardware`.
//!
//! ## Architecture
//!
//! - **Signal filtering**: reduce notifications to connect/disconnect
//!   transitions of one device identity (`signal` module)
//! - **Resolution**: two-phase path discovery + devtype confirmation with
//!   bounded retries (`resolver` module)
//! - **Sampling**: noise gate, settle window, last-100 ring average under a
//!   hard session timeout (`collector` module)
//! - **Orchestration**: watch loop, disconnect request, continuation policy
//!   (`watch` module)
//!
//! Every polling loop observes a shared stop flag each iteration, so the
//! whole pipeline shuts down promptly on ctrl-c.

pub mod collector;
pub mod config;
pub mod error;
pub mod mocks;
pub mod resolver;
pub mod signal;
pub mod watch;

pub use collector::{RAW_PER_UNIT, SampleCollector, SampleRing};
pub use config::{FailurePolicy, ResolveCfg, SampleCfg, WatchCfg};
pub use error::{BuildError, MeasureError};
pub use resolver::DeviceResolver;
pub use signal::{ConnectionEvent, DeviceIdentity, SignalFilter};
pub use watch::{SessionOutcome, Watch, build_watch};
