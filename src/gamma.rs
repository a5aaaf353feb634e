//! Hardware gamma ramps.
//!
//! Every display gets one [`GammaHandle`] at enumeration time. The handle
//! remembers the ramp that was active before we touched anything and writes
//! it back when it is restored or dropped, whichever comes first.

use crate::display::{Display, DisplayTarget, Intensity};
use crate::error::{DimmerError, DimmerResult};
use crate::{log_info, log_warn};

pub const RAMP_SIZE: usize = 256;

/// Three 256-entry 16-bit channel curves, laid out the way the OS expects.
#[derive(Clone, PartialEq, Eq)]
#[repr(C)]
pub struct GammaRamp {
    pub red: [u16; RAMP_SIZE],
    pub green: [u16; RAMP_SIZE],
    pub blue: [u16; RAMP_SIZE],
}

impl GammaRamp {
    pub fn zeroed() -> Self {
        Self {
            red: [0; RAMP_SIZE],
            green: [0; RAMP_SIZE],
            blue: [0; RAMP_SIZE],
        }
    }

    /// Uniform brightness scale: entry `i` becomes `round(i * 256 * m)`
    /// on every channel, where `m` is the remaining brightness.
    pub fn dimmed(intensity: Intensity) -> Self {
        let multiplier = intensity.brightness_multiplier();
        let mut channel = [0u16; RAMP_SIZE];
        for (i, entry) in channel.iter_mut().enumerate() {
            let value = ((i * 256) as f64 * multiplier).round();
            *entry = value.clamp(0.0, f64::from(u16::MAX)) as u16;
        }
        Self {
            red: channel,
            green: channel,
            blue: channel,
        }
    }
}

impl std::fmt::Debug for GammaRamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GammaRamp")
            .field("red[255]", &self.red[RAMP_SIZE - 1])
            .field("green[255]", &self.green[RAMP_SIZE - 1])
            .field("blue[255]", &self.blue[RAMP_SIZE - 1])
            .finish()
    }
}

/// An open, exclusively owned device context for one display.
/// Dropping it releases the OS handle.
pub trait GammaDevice {
    fn read_ramp(&mut self) -> DimmerResult<GammaRamp>;
    fn write_ramp(&mut self, ramp: &GammaRamp) -> DimmerResult<()>;
}

pub trait GammaBackend {
    fn open(&self, system_id: &str) -> DimmerResult<Box<dyn GammaDevice>>;
}

/// Scoped owner of a display's device and its captured original ramp.
pub struct GammaHandle {
    system_id: String,
    device: Option<Box<dyn GammaDevice>>,
    original: GammaRamp,
}

impl GammaHandle {
    /// Opens the device and captures its current ramp. If the read fails the
    /// device is released again before the error is returned.
    pub fn acquire(backend: &dyn GammaBackend, system_id: &str) -> DimmerResult<Self> {
        let mut device = backend.open(system_id)?;
        let original = device.read_ramp()?;
        Ok(Self {
            system_id: system_id.to_string(),
            device: Some(device),
            original,
        })
    }

    pub fn original(&self) -> &GammaRamp {
        &self.original
    }

    pub fn is_live(&self) -> bool {
        self.device.is_some()
    }

    pub fn write(&mut self, ramp: &GammaRamp) -> DimmerResult<()> {
        match self.device.as_mut() {
            Some(device) => device.write_ramp(ramp),
            None => Err(DimmerError::DeviceUnavailable {
                system_id: self.system_id.clone(),
                reason: "handle already released".to_string(),
            }),
        }
    }

    /// Writes the captured ramp back and releases the device.
    /// Returns false when the handle had already been released.
    pub fn restore(&mut self) -> bool {
        let Some(mut device) = self.device.take() else {
            return false;
        };
        if let Err(e) = device.write_ramp(&self.original) {
            log_warn!("Restoring {} failed: {}", self.system_id, e);
        }
        drop(device);
        log_info!("Released {}", self.system_id);
        true
    }
}

impl Drop for GammaHandle {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Writes the dimmed ramp for `intensity` to the targeted displays and
/// returns how many writes succeeded. Unknown indices are ignored.
pub fn apply(displays: &mut [Display], target: DisplayTarget, intensity: Intensity) -> usize {
    let ramp = GammaRamp::dimmed(intensity);
    let mut written = 0;

    for display in select(displays, target) {
        match display.handle_mut().write(&ramp) {
            Ok(()) => written += 1,
            Err(e) => log_warn!("Gamma write skipped for display {}: {}", display.index(), e),
        }
    }

    written
}

/// Restores and releases the targeted displays. Already released displays
/// are skipped, so this can be called any number of times.
pub fn restore(displays: &mut [Display], target: DisplayTarget) -> usize {
    select(displays, target)
        .map(|display| display.handle_mut().restore())
        .filter(|&released| released)
        .count()
}

fn select<'a>(displays: &'a mut [Display], target: DisplayTarget) -> impl Iterator<Item = &'a mut Display> {
    let range = match target {
        DisplayTarget::All => 0..displays.len(),
        DisplayTarget::Index(i) if i < displays.len() => i..i + 1,
        DisplayTarget::Index(_) => 0..0,
    };
    displays[range].iter_mut()
}
