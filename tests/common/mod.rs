//! In-memory stand-ins for the monitor topology, gamma devices and overlay
//! windows. All fakes share one [`Hardware`] so tests can inspect what the
//! dimmer actually wrote.

#![allow(dead_code)]

use nox::{
    Backends, DimmerError, DimmerResult, DimmingCoordinator, GammaBackend, GammaDevice, GammaRamp,
    MonitorInfo, NameResolver, OverlayBackend, OverlaySurface, Rect, TopologySource,
};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

pub const TASKBAR_HEIGHT: i32 = 48;

#[derive(Default)]
pub struct Hardware {
    pub monitors: Vec<MonitorInfo>,
    /// `None` makes the name lookup fail.
    pub names: Option<Vec<String>>,
    pub topology_fails: bool,
    pub unopenable: HashSet<String>,
    pub unreadable: HashSet<String>,
    pub unwritable: HashSet<String>,

    pub ramps: HashMap<String, GammaRamp>,
    pub writes: HashMap<String, usize>,
    pub open_devices: usize,

    pub overlays: BTreeMap<u32, (Rect, f32)>,
    pub overlays_created: usize,
    next_overlay: u32,
}

pub type Shared = Rc<RefCell<Hardware>>;

impl Hardware {
    pub fn ramp(&self, system_id: &str) -> GammaRamp {
        self.ramps.get(system_id).cloned().unwrap_or_else(GammaRamp::zeroed)
    }

    pub fn writes_to(&self, system_id: &str) -> usize {
        self.writes.get(system_id).copied().unwrap_or(0)
    }

    pub fn total_writes(&self) -> usize {
        self.writes.values().sum()
    }

    pub fn reset_writes(&mut self) {
        self.writes.clear();
    }

    pub fn overlay_alphas(&self) -> Vec<f32> {
        self.overlays.values().map(|(_, alpha)| *alpha).collect()
    }

    pub fn overlay_bounds(&self) -> Vec<Rect> {
        self.overlays.values().map(|(bounds, _)| *bounds).collect()
    }

    pub fn plug_in(&mut self, monitor: MonitorInfo) {
        self.ramps.insert(monitor.system_id.clone(), calibrated_ramp(self.monitors.len()));
        self.monitors.push(monitor);
    }
}

/// A slightly non-linear ramp, different per display, so restores can be
/// told apart from a plain identity write.
pub fn calibrated_ramp(seed: usize) -> GammaRamp {
    let mut ramp = GammaRamp::zeroed();
    for i in 0..256usize {
        let value = (i * 257).saturating_sub(seed * 3 + (i % 7)) as u16;
        ramp.red[i] = value;
        ramp.green[i] = value.saturating_sub(1);
        ramp.blue[i] = value.saturating_sub(2);
    }
    ramp
}

/// `\\.\DISPLAYn` laid out left to right, the first one at the origin.
pub fn monitor(n: usize) -> MonitorInfo {
    let x = (n as i32 - 1) * 1920;
    let bounds = Rect::new(x, 0, 1920, 1080);
    let work_area = Rect::new(x, 0, 1920, 1080 - TASKBAR_HEIGHT);
    MonitorInfo {
        system_id: format!("\\\\.\\DISPLAY{}", n),
        bounds,
        work_area,
    }
}

pub fn system_id(n: usize) -> String {
    format!("\\\\.\\DISPLAY{}", n)
}

pub fn hardware(count: usize) -> Shared {
    let mut hw = Hardware::default();
    for n in 1..=count {
        hw.plug_in(monitor(n));
    }
    hw.names = Some((1..=count).map(|n| format!("MONITOR {}", n)).collect());
    Rc::new(RefCell::new(hw))
}

pub fn backends(hw: &Shared) -> Backends {
    Backends {
        topology: Box::new(FakeTopology(Rc::clone(hw))),
        names: Box::new(FakeNames(Rc::clone(hw))),
        gamma: Box::new(FakeGamma(Rc::clone(hw))),
        overlays: Box::new(FakeOverlays(Rc::clone(hw))),
    }
}

pub fn coordinator(hw: &Shared) -> DimmingCoordinator {
    DimmingCoordinator::init(backends(hw))
}

pub fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}

pub struct FakeTopology(pub Shared);

impl TopologySource for FakeTopology {
    fn monitors(&self) -> DimmerResult<Vec<MonitorInfo>> {
        let hw = self.0.borrow();
        if hw.topology_fails {
            return Err(DimmerError::Topology("display driver unavailable".to_string()));
        }
        Ok(hw.monitors.clone())
    }
}

pub struct FakeNames(pub Shared);

impl NameResolver for FakeNames {
    fn friendly_names(&self) -> DimmerResult<Vec<String>> {
        self.0
            .borrow()
            .names
            .clone()
            .ok_or_else(|| DimmerError::NameLookup("WMI service not running".to_string()))
    }
}

pub struct FakeGamma(pub Shared);

impl GammaBackend for FakeGamma {
    fn open(&self, system_id: &str) -> DimmerResult<Box<dyn GammaDevice>> {
        let mut hw = self.0.borrow_mut();
        if hw.unopenable.contains(system_id) {
            return Err(DimmerError::DeviceUnavailable {
                system_id: system_id.to_string(),
                reason: "CreateDC failed".to_string(),
            });
        }
        hw.open_devices += 1;
        Ok(Box::new(FakeDevice {
            system_id: system_id.to_string(),
            hw: Rc::clone(&self.0),
        }))
    }
}

struct FakeDevice {
    system_id: String,
    hw: Shared,
}

impl GammaDevice for FakeDevice {
    fn read_ramp(&mut self) -> DimmerResult<GammaRamp> {
        let hw = self.hw.borrow();
        if hw.unreadable.contains(&self.system_id) {
            return Err(DimmerError::RampRead {
                system_id: self.system_id.clone(),
            });
        }
        Ok(hw.ramp(&self.system_id))
    }

    fn write_ramp(&mut self, ramp: &GammaRamp) -> DimmerResult<()> {
        let mut hw = self.hw.borrow_mut();
        if hw.unwritable.contains(&self.system_id) {
            return Err(DimmerError::RampWrite {
                system_id: self.system_id.clone(),
            });
        }
        hw.ramps.insert(self.system_id.clone(), ramp.clone());
        *hw.writes.entry(self.system_id.clone()).or_insert(0) += 1;
        Ok(())
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.hw.borrow_mut().open_devices -= 1;
    }
}

pub struct FakeOverlays(pub Shared);

impl OverlayBackend for FakeOverlays {
    fn create(&mut self, bounds: Rect, alpha: f32) -> DimmerResult<Box<dyn OverlaySurface>> {
        let mut hw = self.0.borrow_mut();
        let id = hw.next_overlay;
        hw.next_overlay += 1;
        hw.overlays_created += 1;
        hw.overlays.insert(id, (bounds, alpha));
        Ok(Box::new(FakeSurface {
            id,
            hw: Rc::clone(&self.0),
        }))
    }
}

struct FakeSurface {
    id: u32,
    hw: Shared,
}

impl OverlaySurface for FakeSurface {
    fn set_alpha(&mut self, alpha: f32) -> DimmerResult<()> {
        if let Some(entry) = self.hw.borrow_mut().overlays.get_mut(&self.id) {
            entry.1 = alpha;
        }
        Ok(())
    }
}

impl Drop for FakeSurface {
    fn drop(&mut self) {
        self.hw.borrow_mut().overlays.remove(&self.id);
    }
}
