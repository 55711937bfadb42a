use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;

mod cli;
mod error_fmt;
mod measure;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    // Logs go to stderr; stdout carries only the measurement.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let _ = color_eyre::install();
    init_tracing();

    let args = cli::Cli::parse();

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
            tracing::warn!(error = %e, "ctrl-c handler not installed");
        }
    }

    match measure::run_watch(&args.address, shutdown) {
        Ok(Some(_)) => {}
        Ok(None) => {
            tracing::info!("watch ended without a measurement");
        }
        Err(e) => {
            eprintln!("{}", error_fmt::humanize(&e));
            std::process::exit(error_fmt::exit_code_for_error(&e));
        }
    }
}
