//! Collaborator assembly and watch execution.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use weigher_core::config::{ResolveCfg, SampleCfg, WatchCfg};
use weigher_core::error::Result as CoreResult;
use weigher_core::signal::DeviceIdentity;
use weigher_core::watch::build_watch;

/// Assemble bus + monitor for the current build and run the watch until a
/// measurement completes or shutdown is requested.
pub fn run_watch(address: &str, shutdown: Arc<AtomicBool>) -> CoreResult<Option<f32>> {
    let identity = DeviceIdentity::new(address).map_err(eyre::Report::new)?;

    #[cfg(feature = "hardware")]
    let (bus, monitor) = {
        let bus = weigher_hardware::bluez::BluezBus::system()?;
        let monitor = weigher_hardware::board::InputMonitor::new();
        (bus, monitor)
    };
    #[cfg(not(feature = "hardware"))]
    let (bus, monitor) = {
        tracing::info!("hardware feature disabled; using the simulated board");
        (
            weigher_hardware::SimulatedBus::new(address),
            weigher_hardware::SimulatedMonitor::new(),
        )
    };

    let mut watch = build_watch(
        bus,
        monitor,
        identity,
        ResolveCfg::default(),
        SampleCfg::default(),
        WatchCfg::default(),
        shutdown,
        None,
        Some(Box::new(|weight| println!("Weight: {weight:.2} kg"))),
    )?;

    tracing::info!(address, "watching for board connection");
    watch.run()
}
