// common.rs — console output and error reporting shared by the loader and its front ends
//
// Output is routed through the `log` facade; whoever owns the process installs a logger.

use crate::cvar::cvar_variable_value;

/// Error codes for `com_error`.
pub const ERR_FATAL: i32 = 0;
/// Print to console and disconnect from game.
pub const ERR_DROP: i32 = 1;

// ============================================================
// Com_Printf / Com_DPrintf / Com_Error
// ============================================================

/// General-purpose print function.
pub fn com_printf(msg: &str) {
    let msg = msg.trim_end_matches('\n');
    if !msg.is_empty() {
        log::info!("{}", msg);
    }
}

/// Developer-only print. Only prints when the "developer" cvar is set.
pub fn com_dprintf(msg: &str) {
    if cvar_variable_value("developer") == 0.0 {
        return;
    }
    let msg = msg.trim_end_matches('\n');
    if !msg.is_empty() {
        log::debug!("{}", msg);
    }
}

/// Engine error handler.
/// - `ERR_FATAL`: logs and panics; nothing may run past it.
/// - `ERR_DROP`: logs; the caller abandons the operation and carries on.
pub fn com_error(code: i32, msg: &str) {
    if code == ERR_FATAL {
        log::error!("Error: {}", msg);
        panic!("Fatal error: {}", msg);
    }
    log::error!("********************\nERROR: {}\n********************", msg);
}
