use crate::gamma::{GammaHandle, GammaRamp};
use serde::{Deserialize, Serialize};

pub const GENERIC_MONITOR_NAME: &str = "Generic Monitor";

/// Screen rectangle in virtual-desktop coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// The primary display is the one whose origin sits at (0,0).
    pub fn is_at_origin(&self) -> bool {
        self.x == 0 && self.y == 0
    }
}

/// Geometry an overlay for a monitor should cover. The primary display
/// leaves the taskbar uncovered.
pub(crate) fn overlay_area(bounds: Rect, work_area: Rect) -> Rect {
    if bounds.is_at_origin() && work_area.width > 0 && work_area.height > 0 {
        work_area
    } else {
        bounds
    }
}

/// Dim level in percent. 0 leaves the display untouched, 100 is the darkest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "u8")]
pub struct Intensity(u8);

impl Intensity {
    pub const NONE: Intensity = Intensity(0);
    pub const MAX: Intensity = Intensity(100);

    /// Out-of-range values are clamped, never rejected.
    pub fn clamped(percent: i64) -> Self {
        Intensity(percent.clamp(0, 100) as u8)
    }

    pub fn percent(self) -> u8 {
        self.0
    }

    /// Fraction of the original brightness that remains, e.g. 0.70 at 30%.
    pub fn brightness_multiplier(self) -> f64 {
        f64::from(100 - self.0) / 100.0
    }
}

impl From<i64> for Intensity {
    fn from(percent: i64) -> Self {
        Intensity::clamped(percent)
    }
}

impl From<i32> for Intensity {
    fn from(percent: i32) -> Self {
        Intensity::clamped(i64::from(percent))
    }
}

impl From<u8> for Intensity {
    fn from(percent: u8) -> Self {
        Intensity::clamped(i64::from(percent))
    }
}

/// Parses typed percentages such as `"45"` or `" 45% "`, clamping the result.
impl std::str::FromStr for Intensity {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().trim_end_matches('%').trim_end();
        digits.parse::<i64>().map(Intensity::clamped)
    }
}

impl From<Intensity> for u8 {
    fn from(intensity: Intensity) -> Self {
        intensity.0
    }
}

impl std::fmt::Display for Intensity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Which displays a gamma operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayTarget {
    All,
    Index(usize),
}

/// One physical monitor together with the gamma handle acquired for it.
pub struct Display {
    index: usize,
    system_id: String,
    friendly_name: String,
    bounds: Rect,
    work_area: Rect,
    handle: GammaHandle,
    intensity: Intensity,
}

impl Display {
    pub(crate) fn new(
        index: usize,
        system_id: String,
        friendly_name: String,
        bounds: Rect,
        work_area: Rect,
        handle: GammaHandle,
    ) -> Self {
        Self {
            index,
            system_id,
            friendly_name,
            bounds,
            work_area,
            handle,
            intensity: Intensity::NONE,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn system_id(&self) -> &str {
        &self.system_id
    }

    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    /// Label shown next to the display's slider.
    pub fn label(&self) -> String {
        format!("Display {} • {}", self.index + 1, self.friendly_name)
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn work_area(&self) -> Rect {
        self.work_area
    }

    pub fn is_primary(&self) -> bool {
        self.bounds.is_at_origin()
    }

    pub fn overlay_bounds(&self) -> Rect {
        overlay_area(self.bounds, self.work_area)
    }

    pub fn intensity(&self) -> Intensity {
        self.intensity
    }

    pub(crate) fn set_intensity(&mut self, intensity: Intensity) {
        self.intensity = intensity;
    }

    pub fn original_ramp(&self) -> &GammaRamp {
        self.handle.original()
    }

    pub(crate) fn handle_mut(&mut self) -> &mut GammaHandle {
        &mut self.handle
    }

    pub fn is_live(&self) -> bool {
        self.handle.is_live()
    }
}

impl std::fmt::Debug for Display {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Display")
            .field("index", &self.index)
            .field("system_id", &self.system_id)
            .field("friendly_name", &self.friendly_name)
            .field("bounds", &self.bounds)
            .field("intensity", &self.intensity)
            .field("live", &self.handle.is_live())
            .finish()
    }
}
