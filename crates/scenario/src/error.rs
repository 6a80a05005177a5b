//! Scenario error types

use contracts::ContractError;
use monitors::MonitorError;
use thiserror::Error;

/// Scenario loading and replay errors
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// Script or blueprint could not be read
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// Step addressed a monitor name the blueprint does not declare
    #[error("step {index}: unknown monitor '{name}'")]
    UnknownMonitor { index: usize, name: String },

    /// Step is malformed or out of time order
    #[error("step {index}: {message}")]
    InvalidStep { index: usize, message: String },

    /// Monitor rejected a runtime control
    #[error(transparent)]
    Monitor(#[from] MonitorError),
}

impl ScenarioError {
    pub fn invalid_step(index: usize, message: impl Into<String>) -> Self {
        Self::InvalidStep {
            index,
            message: message.into(),
        }
    }
}
