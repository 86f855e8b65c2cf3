use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AutotuneError {
    #[error("invalid density {0}: must be a positive number of cells per axis")]
    InvalidDensity(u32),
    #[error("invalid test inset fraction {0}: must be 0 (disabled) or a finite value >= 2")]
    InvalidInsetFraction(f64),
    #[error("non-finite value for {0}")]
    NonFinite(&'static str),
    #[error("invalid velocity range [{min}, {max}]")]
    InvalidVelocityRange { min: f64, max: f64 },
    #[error("pose source error: {0}")]
    PoseSource(String),
    #[error("actuator error: {0}")]
    Actuator(String),
    #[error("timeout waiting for pose")]
    Timeout,
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing mechanism config")]
    MissingMechanism,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
