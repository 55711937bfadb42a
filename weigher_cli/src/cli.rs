//! CLI argument definitions.

use clap::Parser;

/// Watch for a balance board and print its averaged weight.
///
/// The single positional argument is the board's hardware address; the
/// watch runs until one measurement completes or ctrl-c is pressed.
#[derive(Parser, Debug)]
#[command(name = "weigher", version, about = "Balance board weight watcher")]
pub struct Cli {
    /// Hardware address of the board, e.g. AA:BB:CC:DD:EE:FF
    pub address: String,
}
