//! Human-readable error descriptions for the console.

use weigher_core::error::{BuildError, MeasureError};

/// Map an eyre::Report to an explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::EmptyIdentity => {
                "What happened: The device address was empty.\nLikely causes: A blank argument was passed on the command line.\nHow to fix: Pass the board's hardware address, e.g. `weigher AA:BB:CC:DD:EE:FF`.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values wired into the watch builder.\nHow to fix: Restore the default timing parameters."
            ),
        };
    }

    if let Some(me) = err.downcast_ref::<MeasureError>() {
        return match me {
            MeasureError::Timeout => {
                "What happened: No stable weight within the session timeout.\nLikely causes: Nobody stepped on the board, or readings stayed below the noise floor.\nHow to fix: Step on the board shortly after it connects and stand still.".to_string()
            }
            MeasureError::InsufficientData => {
                "What happened: Too few readings arrived while the weight settled.\nLikely causes: The board stopped streaming or the link dropped mid-measurement.\nHow to fix: Check the battery and stay on the board for a few seconds.".to_string()
            }
            MeasureError::DeviceOpenFailed => {
                "What happened: The sensor data channel could not be opened.\nLikely causes: Missing permissions on the input device node.\nHow to fix: Run with access to /dev/input (e.g. the input group).".to_string()
            }
            MeasureError::DevtypeResolution => {
                "What happened: The connected device never identified as a balance board.\nLikely causes: A different device paired, or the kernel driver is missing.\nHow to fix: Verify the address and that the board driver is loaded.".to_string()
            }
            MeasureError::Bus(msg) => format!(
                "What happened: The system bus connection failed ({msg}).\nLikely causes: No bus daemon, or the Bluetooth service is not running.\nHow to fix: Start the Bluetooth service and retry."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with RUST_LOG=debug for more detail."
            ),
        };
    }

    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!("Something went wrong.{cause}\nHow to fix: Re-run with RUST_LOG=debug for details. Original: {err}")
}

/// Exit code for a failed run: startup and fatal session failures alike
/// map to 1; argument errors are clap's own exit code.
pub fn exit_code_for_error(_err: &eyre::Report) -> i32 {
    1
}
