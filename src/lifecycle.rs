//! Restoration of display state on the way out.
//!
//! Restoration is reached three ways: an explicit `shutdown()` from a quit
//! action, `Drop` of the coordinator on any other exit from `main`, and
//! unwinding after a panic. All of them end in [`restore_all`].

use crate::overlay::OverlayDimmer;
use crate::registry::MonitorRegistry;
use crate::{log_error, log_info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub displays_restored: usize,
    pub overlays_destroyed: usize,
}

impl RestoreReport {
    pub fn is_noop(&self) -> bool {
        self.displays_restored == 0 && self.overlays_destroyed == 0
    }
}

/// Writes back every captured ramp, releases the handles and destroys all
/// overlays. Safe to repeat; later calls find nothing left to do.
pub fn restore_all(registry: &mut MonitorRegistry, overlays: &mut OverlayDimmer) -> RestoreReport {
    let report = RestoreReport {
        displays_restored: registry.release_all(),
        overlays_destroyed: overlays.deactivate(),
    };
    if !report.is_noop() {
        log_info!(
            "Restored {} display(s), destroyed {} overlay(s)",
            report.displays_restored,
            report.overlays_destroyed
        );
    }
    report
}

/// Logs panics and flushes the session log before unwinding continues.
pub fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        log_error!("Panic: {}", info);
        let _ = crate::logger::flush_logs();
        previous(info);
    }));
}
