//! Master/per-display intensity state and routing to the two dimmers.
//!
//! State only flows outward: views render a [`DimmingSnapshot`] and report
//! direct user edits back as [`ControlEvent`]s. Rendering a snapshot never
//! produces events, so a master change that moves every display slider
//! cannot feed back into another update.

use crate::display::{DisplayTarget, Intensity};
use crate::gamma::{self, GammaBackend};
use crate::lifecycle::{self, RestoreReport};
use crate::overlay::{alpha_for, OverlayBackend, OverlayDimmer};
use crate::registry::{MonitorRegistry, NameResolver, TopologySource};
use crate::{log_info, log_warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Gamma ramps only.
    #[default]
    Normal,
    /// Overlay windows on top of the gamma ramps.
    Hyper,
}

impl Mode {
    pub fn is_hyper(self) -> bool {
        self == Mode::Hyper
    }
}

/// A single user edit coming from a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    Master(Intensity),
    Display { index: usize, intensity: Intensity },
    ToggleMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DimmingSnapshot {
    pub mode: Mode,
    pub master: Intensity,
    pub displays: Vec<Intensity>,
    pub overlay_count: usize,
}

/// The OS services the coordinator is built on.
pub struct Backends {
    pub topology: Box<dyn TopologySource>,
    pub names: Box<dyn NameResolver>,
    pub gamma: Box<dyn GammaBackend>,
    pub overlays: Box<dyn OverlayBackend>,
}

pub struct DimmingCoordinator {
    topology: Box<dyn TopologySource>,
    names: Box<dyn NameResolver>,
    gamma: Box<dyn GammaBackend>,
    registry: MonitorRegistry,
    overlays: OverlayDimmer,
    mode: Mode,
    master: Intensity,
    shut_down: bool,
}

impl DimmingCoordinator {
    /// Enumerates displays and captures their ramps. Nothing is dimmed yet.
    pub fn init(backends: Backends) -> Self {
        let Backends {
            topology,
            names,
            gamma,
            overlays,
        } = backends;

        let mut registry = MonitorRegistry::new();
        let count = registry.enumerate(topology.as_ref(), names.as_ref(), gamma.as_ref());
        log_info!("Dimming initialized with {} display(s)", count);

        Self {
            topology,
            names,
            gamma,
            registry,
            overlays: OverlayDimmer::new(overlays),
            mode: Mode::Normal,
            master: Intensity::NONE,
            shut_down: false,
        }
    }

    /// Re-enumerates displays, e.g. after a monitor was plugged in, and
    /// re-applies the master level to the fresh set.
    pub fn reinitialize(&mut self) {
        self.overlays.deactivate();
        let count = self
            .registry
            .enumerate(self.topology.as_ref(), self.names.as_ref(), self.gamma.as_ref());
        self.shut_down = false;
        log_info!("Dimming re-initialized with {} display(s)", count);
        self.set_master(self.master);
    }

    /// Applies `percent` to every display and makes it the master level.
    pub fn set_master(&mut self, percent: impl Into<Intensity>) {
        if self.shut_down {
            return;
        }
        let intensity = percent.into();

        gamma::apply(self.registry.displays_mut(), DisplayTarget::All, intensity);
        for display in self.registry.displays_mut() {
            display.set_intensity(intensity);
        }
        self.master = intensity;

        match self.mode {
            Mode::Hyper => {
                self.overlays.activate(self.registry.monitors(), alpha_for(intensity));
            }
            Mode::Normal => {
                self.overlays.deactivate();
            }
        }
    }

    /// Dims a single display. With only one display the master follows.
    /// Unknown indices are ignored.
    pub fn set_individual(&mut self, index: usize, percent: impl Into<Intensity>) {
        if self.shut_down {
            return;
        }
        let count = self.registry.len();
        if index >= count {
            log_warn!("Ignoring dim request for display {} ({} known)", index, count);
            return;
        }
        let intensity = percent.into();

        gamma::apply(self.registry.displays_mut(), DisplayTarget::Index(index), intensity);
        self.registry.displays_mut()[index].set_intensity(intensity);

        if count == 1 {
            self.master = intensity;
        }

        // A single process-wide overlay level follows the latest change.
        if self.mode.is_hyper() {
            self.overlays.activate(self.registry.monitors(), alpha_for(intensity));
        }
    }

    pub fn toggle_mode(&mut self) {
        if self.shut_down {
            return;
        }
        self.mode = match self.mode {
            Mode::Normal => {
                self.overlays.activate(self.registry.monitors(), alpha_for(self.master));
                Mode::Hyper
            }
            Mode::Hyper => {
                self.overlays.deactivate();
                Mode::Normal
            }
        };
        log_info!("Mode is now {:?}", self.mode);
    }

    pub fn set_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            self.toggle_mode();
        }
    }

    pub fn dispatch(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::Master(intensity) => self.set_master(intensity),
            ControlEvent::Display { index, intensity } => self.set_individual(index, intensity),
            ControlEvent::ToggleMode => self.toggle_mode(),
        }
    }

    pub fn snapshot(&self) -> DimmingSnapshot {
        DimmingSnapshot {
            mode: self.mode,
            master: self.master,
            displays: self.registry.displays().iter().map(|d| d.intensity()).collect(),
            overlay_count: self.overlays.windows().len(),
        }
    }

    /// Restores every display and removes all overlays. Further dimming
    /// requests are ignored until [`reinitialize`](Self::reinitialize).
    pub fn shutdown(&mut self) -> RestoreReport {
        let report = lifecycle::restore_all(&mut self.registry, &mut self.overlays);
        if !self.shut_down {
            self.shut_down = true;
            log_info!("Dimming shut down");
        }
        report
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn master(&self) -> Intensity {
        self.master
    }

    pub fn registry(&self) -> &MonitorRegistry {
        &self.registry
    }

    pub fn overlays(&self) -> &OverlayDimmer {
        &self.overlays
    }
}

impl Drop for DimmingCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
