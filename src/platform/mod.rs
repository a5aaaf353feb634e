//! OS implementations of the display, gamma and overlay backends.
//!
//! Only Windows exposes per-display gamma ramps and layered click-through
//! windows the way the dimmer needs them.

#[cfg(windows)]
pub mod win32;

#[cfg(windows)]
pub use win32::native_backends;
