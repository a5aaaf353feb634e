use crate::display::{overlay_area, Display, DisplayTarget, Rect, GENERIC_MONITOR_NAME};
use crate::error::DimmerResult;
use crate::gamma::{self, GammaBackend, GammaHandle};
use crate::{log_error, log_info, log_warn};

/// One entry of the OS display topology, in enumeration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorInfo {
    pub system_id: String,
    pub bounds: Rect,
    pub work_area: Rect,
}

impl MonitorInfo {
    pub fn overlay_bounds(&self) -> Rect {
        overlay_area(self.bounds, self.work_area)
    }
}

pub trait TopologySource {
    fn monitors(&self) -> DimmerResult<Vec<MonitorInfo>>;
}

/// Best-effort human readable monitor names, in the same order as the
/// topology. Lengths are allowed to disagree.
pub trait NameResolver {
    fn friendly_names(&self) -> DimmerResult<Vec<String>>;
}

/// Splits name-lookup output into one label per non-blank line.
pub fn parse_friendly_names(output: &str) -> Vec<String> {
    output
        .lines()
        .map(|line| line.replace('\0', ""))
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Owns every display that could be opened for gamma control, and remembers
/// the full topology so monitors without gamma support can still be covered
/// by overlays.
#[derive(Debug, Default)]
pub struct MonitorRegistry {
    monitors: Vec<MonitorInfo>,
    displays: Vec<Display>,
}

impl MonitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the registry from the current topology and returns the number
    /// of usable displays. Handles from a previous pass are restored and
    /// released first.
    pub fn enumerate(
        &mut self,
        topology: &dyn TopologySource,
        names: &dyn NameResolver,
        backend: &dyn GammaBackend,
    ) -> usize {
        let released = self.release_all();
        if released > 0 {
            log_info!("Released {} display handle(s) before re-enumerating", released);
        }
        self.displays.clear();
        self.monitors.clear();

        let monitors = match topology.monitors() {
            Ok(monitors) => monitors,
            Err(e) => {
                log_error!("Display enumeration failed: {}", e);
                return 0;
            }
        };
        self.monitors = monitors.clone();

        let friendly_names = names.friendly_names().unwrap_or_else(|e| {
            log_warn!("Falling back to generic monitor names: {}", e);
            Vec::new()
        });

        for (position, monitor) in monitors.into_iter().enumerate() {
            let handle = match GammaHandle::acquire(backend, &monitor.system_id) {
                Ok(handle) => handle,
                Err(e) => {
                    log_warn!("Skipping {}: {}", monitor.system_id, e);
                    continue;
                }
            };

            let friendly_name = friendly_names
                .get(position)
                .cloned()
                .unwrap_or_else(|| GENERIC_MONITOR_NAME.to_string());

            let index = self.displays.len();
            log_info!(
                "Display {} = {} ({}) {}x{} at {},{}",
                index,
                monitor.system_id,
                friendly_name,
                monitor.bounds.width,
                monitor.bounds.height,
                monitor.bounds.x,
                monitor.bounds.y
            );

            self.displays.push(Display::new(
                index,
                monitor.system_id,
                friendly_name,
                monitor.bounds,
                monitor.work_area,
                handle,
            ));
        }

        self.displays.len()
    }

    /// Every monitor of the last enumeration, with or without gamma control.
    pub fn monitors(&self) -> &[MonitorInfo] {
        &self.monitors
    }

    pub fn displays(&self) -> &[Display] {
        &self.displays
    }

    pub(crate) fn displays_mut(&mut self) -> &mut [Display] {
        &mut self.displays
    }

    pub fn get(&self, index: usize) -> Option<&Display> {
        self.displays.get(index)
    }

    pub fn len(&self) -> usize {
        self.displays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.displays.is_empty()
    }

    pub fn primary(&self) -> Option<&Display> {
        self.displays.iter().find(|d| d.is_primary())
    }

    /// Restores every live handle. Records stay in place so indices remain
    /// valid for the rest of the session.
    pub fn release_all(&mut self) -> usize {
        gamma::restore(&mut self.displays, DisplayTarget::All)
    }

    pub fn live_count(&self) -> usize {
        self.displays.iter().filter(|d| d.is_live()).count()
    }
}
