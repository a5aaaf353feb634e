pub mod logger;
pub mod error;
pub mod display;
pub mod gamma;
pub mod registry;
pub mod overlay;
pub mod lifecycle;
pub mod coordinator;
pub mod state;
pub mod platform;

pub use logger::*;
pub use error::{DimmerError, DimmerResult};
pub use display::{Display, DisplayTarget, Intensity, Rect};
pub use gamma::{GammaBackend, GammaDevice, GammaHandle, GammaRamp};
pub use registry::{MonitorInfo, MonitorRegistry, NameResolver, TopologySource};
pub use overlay::{OverlayBackend, OverlayDimmer, OverlaySurface};
pub use coordinator::{Backends, ControlEvent, DimmingCoordinator, DimmingSnapshot, Mode};
pub use state::{AppState, StateManager};
