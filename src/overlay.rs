use crate::display::{Intensity, Rect};
use crate::error::DimmerResult;
use crate::registry::MonitorInfo;
use crate::{log_info, log_warn};

/// Overlays never become fully opaque so the desktop stays readable.
pub const MAX_OVERLAY_ALPHA: f32 = 0.98;

pub fn alpha_for(intensity: Intensity) -> f32 {
    f32::from(intensity.percent()) / 100.0 * MAX_OVERLAY_ALPHA
}

/// A borderless, topmost, click-through window. Dropping it destroys the
/// window.
pub trait OverlaySurface {
    fn set_alpha(&mut self, alpha: f32) -> DimmerResult<()>;
}

pub trait OverlayBackend {
    fn create(&mut self, bounds: Rect, alpha: f32) -> DimmerResult<Box<dyn OverlaySurface>>;
}

pub struct OverlayWindow {
    monitor_index: usize,
    bounds: Rect,
    alpha: f32,
    surface: Box<dyn OverlaySurface>,
}

impl OverlayWindow {
    /// Position of the covered monitor in the topology.
    pub fn monitor_index(&self) -> usize {
        self.monitor_index
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }
}

pub struct OverlayDimmer {
    backend: Box<dyn OverlayBackend>,
    windows: Vec<OverlayWindow>,
    alpha: f32,
}

impl OverlayDimmer {
    pub fn new(backend: Box<dyn OverlayBackend>) -> Self {
        Self {
            backend,
            windows: Vec::new(),
            alpha: 0.0,
        }
    }

    /// Creates one overlay per monitor, including monitors whose gamma ramp
    /// is out of reach. When overlays already exist only their transparency
    /// is updated.
    pub fn activate(&mut self, monitors: &[MonitorInfo], alpha: f32) -> usize {
        if !self.windows.is_empty() {
            self.set_transparency(alpha);
            return self.windows.len();
        }

        self.alpha = clamp_alpha(alpha);
        for (monitor_index, monitor) in monitors.iter().enumerate() {
            let bounds = monitor.overlay_bounds();
            match self.backend.create(bounds, self.alpha) {
                Ok(surface) => self.windows.push(OverlayWindow {
                    monitor_index,
                    bounds,
                    alpha: self.alpha,
                    surface,
                }),
                Err(e) => log_warn!("Overlay for {} failed: {}", monitor.system_id, e),
            }
        }

        log_info!("Created {} overlay window(s) at alpha {:.3}", self.windows.len(), self.alpha);
        self.windows.len()
    }

    pub fn set_transparency(&mut self, alpha: f32) {
        self.alpha = clamp_alpha(alpha);
        for window in &mut self.windows {
            match window.surface.set_alpha(self.alpha) {
                Ok(()) => window.alpha = self.alpha,
                Err(e) => log_warn!("Overlay alpha update failed for monitor {}: {}", window.monitor_index, e),
            }
        }
    }

    /// Destroys every overlay and returns how many there were.
    pub fn deactivate(&mut self) -> usize {
        let count = self.windows.len();
        self.windows.clear();
        if count > 0 {
            log_info!("Destroyed {} overlay window(s)", count);
        }
        count
    }

    pub fn is_active(&self) -> bool {
        !self.windows.is_empty()
    }

    pub fn windows(&self) -> &[OverlayWindow] {
        &self.windows
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }
}

fn clamp_alpha(alpha: f32) -> f32 {
    if alpha.is_nan() {
        return 0.0;
    }
    alpha.clamp(0.0, MAX_OVERLAY_ALPHA)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_scales_to_the_cap() {
        assert!((alpha_for(Intensity::clamped(30)) - 0.294).abs() < 1e-6);
        assert!((alpha_for(Intensity::MAX) - MAX_OVERLAY_ALPHA).abs() < 1e-6);
        assert_eq!(alpha_for(Intensity::NONE), 0.0);
    }

    #[test]
    fn alpha_is_clamped_below_full_opacity() {
        assert_eq!(clamp_alpha(1.5), MAX_OVERLAY_ALPHA);
        assert_eq!(clamp_alpha(-0.2), 0.0);
        assert_eq!(clamp_alpha(f32::NAN), 0.0);
    }
}
