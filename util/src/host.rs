//! Host environment utility functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::env;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Environment variable pointing at the root of the software checkout.
pub const ROOT_ENV_VAR: &str = "SPLINE_DRIVE_ROOT";

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the software root directory.
///
/// Uses `$SPLINE_DRIVE_ROOT` if it is set, otherwise the current working
/// directory.
pub fn get_root() -> std::io::Result<PathBuf> {
    match env::var_os(ROOT_ENV_VAR) {
        Some(p) => Ok(PathBuf::from(p)),
        None => env::current_dir()
    }
}
