use thiserror::Error;

use crate::race::RaceStatus;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Invalid generation parameters: {0}")]
    InvalidParams(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RaceError {
    #[error("Cannot {action} a race that is {status}")]
    InvalidTransition {
        action: &'static str,
        status: RaceStatus,
    },
    #[error("Race controller has shut down")]
    ControllerClosed,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}
