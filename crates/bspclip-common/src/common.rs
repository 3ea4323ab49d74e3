// common.rs — print and error routing for the collision subsystem

use crate::q_shared::ERR_FATAL;

// ============================================================
// Com_Printf / Com_DPrintf / Com_Warning / Com_Error
// ============================================================

/// General-purpose print, routed to the `log` facade at info level.
pub fn com_printf(msg: &str) {
    log::info!("{}", msg.trim_end());
}

/// Developer-only print. Controlled by the "developer" cvar.
pub fn com_dprintf(msg: &str) {
    if crate::cvar::cvar_variable_value("developer") == 0.0 {
        return;
    }
    log::debug!("{}", msg.trim_end());
}

/// Recoverable geometry anomaly: the offending primitive is skipped and loading continues.
pub fn com_warning(msg: &str) {
    log::warn!("{}", msg.trim_end());
}

/// Engine error handler. `ERR_FATAL` panics after logging; used when level
/// data exceeds engine limits or references records that don't exist.
pub fn com_error(code: i32, msg: &str) {
    log::error!("{}", msg.trim_end());
    if code == ERR_FATAL {
        panic!("Fatal error: {}", msg.trim_end());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "Fatal error: MAX_PATCH_PLANES")]
    fn test_fatal_panics() {
        com_error(ERR_FATAL, "MAX_PATCH_PLANES\n");
    }

    #[test]
    fn test_prints_return() {
        com_printf("still running\n");
        com_dprintf("developer only\n");
        com_warning("warning only\n");
    }
}
