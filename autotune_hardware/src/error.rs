use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("pose read timeout")]
    Timeout,
    #[error("invalid plant parameter: {0}")]
    InvalidParams(&'static str),
    #[error("non-finite voltage command {0}")]
    NonFiniteCommand(f64),
}

pub type Result<T> = std::result::Result<T, HwError>;
