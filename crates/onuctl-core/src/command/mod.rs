// ── Device command text ──
//
// Everything the engine types into the OLT shell is built here. Builders
// are pure: identical inputs give identical text, and blank fields become
// blank tokens. Whether the device accepts the result is its own call.

mod blocks;

pub use blocks::{build_config_block, build_register_block};

/// Commands that put a fresh shell into a state where `show` output is
/// not paginated.
pub const EXEC_PREAMBLE: [&str; 2] = ["enable", "terminal length 0"];

/// Commands that enter global configuration mode.
pub const CONFIG_ENTRY: [&str; 2] = ["enable", "configure terminal"];

/// Persist the running configuration to non-volatile storage.
pub const WRITE_COMMAND: &str = "write";

/// Substrings that mark a rejected command in device output.
pub const ERROR_MARKERS: [&str; 2] = ["%Error", "Invalid"];

/// Query listing every unit the device has committed on `interface`.
pub fn state_query(interface: &str) -> String {
    format!("show gpon onu state {interface}")
}

pub fn contains_error_marker(output: &str) -> bool {
    ERROR_MARKERS.iter().any(|m| output.contains(m))
}

/// First output line carrying an error marker, trimmed.
pub fn first_error_line(output: &str) -> Option<&str> {
    output
        .lines()
        .find(|line| contains_error_marker(line))
        .map(str::trim)
}
