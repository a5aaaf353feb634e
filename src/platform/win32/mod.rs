mod gamma;
mod names;
mod overlay;
pub mod startup;
mod topology;

pub use gamma::GdiGammaBackend;
pub use names::WmiNameResolver;
pub use overlay::LayeredOverlayBackend;
pub use topology::Win32Topology;

use crate::coordinator::Backends;

pub fn native_backends() -> Backends {
    Backends {
        topology: Box::new(Win32Topology),
        names: Box::new(WmiNameResolver),
        gamma: Box::new(GdiGammaBackend),
        overlays: Box::new(LayeredOverlayBackend::default()),
    }
}
