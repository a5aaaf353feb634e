use thiserror::Error;

/// Failures reported by display, gamma and overlay backends.
///
/// None of these are fatal: callers log them and carry on with the
/// remaining displays.
#[derive(Debug, Error)]
pub enum DimmerError {
    #[error("display {system_id} could not be opened: {reason}")]
    DeviceUnavailable { system_id: String, reason: String },

    #[error("failed to read gamma ramp of {system_id}")]
    RampRead { system_id: String },

    #[error("failed to write gamma ramp of {system_id}")]
    RampWrite { system_id: String },

    #[error("overlay window error: {0}")]
    Overlay(String),

    #[error("display topology query failed: {0}")]
    Topology(String),

    #[error("monitor name lookup failed: {0}")]
    NameLookup(String),
}

pub type DimmerResult<T> = std::result::Result<T, DimmerError>;
