use crate::config::ConfigError;
use crate::rewards::{RewardDataError, RewardServiceError, StoreError};
use crate::telemetry::TelemetryError;
use std::fmt;

/// Startup and runtime failures surfaced by the binaries.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    RewardData(RewardDataError),
    Decision(RewardServiceError),
    Store(StoreError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::RewardData(err) => write!(f, "reward data error: {}", err),
            AppError::Decision(err) => write!(f, "decision error: {}", err),
            AppError::Store(err) => write!(f, "reward store error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::RewardData(err) => Some(err),
            AppError::Decision(err) => Some(err),
            AppError::Store(err) => Some(err),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<RewardDataError> for AppError {
    fn from(value: RewardDataError) -> Self {
        Self::RewardData(value)
    }
}

impl From<RewardServiceError> for AppError {
    fn from(value: RewardServiceError) -> Self {
        Self::Decision(value)
    }
}

impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}
