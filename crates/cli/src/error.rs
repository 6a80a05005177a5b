//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Input file not found
    #[error("{what} file not found: {path}")]
    FileNotFound { what: &'static str, path: String },

    /// The blocking replay task died before reporting
    #[error("Scenario runner stopped unexpectedly: {message}")]
    RunnerAborted { message: String },
}

impl CliError {
    pub fn file_not_found(what: &'static str, path: impl Into<String>) -> Self {
        Self::FileNotFound {
            what,
            path: path.into(),
        }
    }

    pub fn runner_aborted(message: impl Into<String>) -> Self {
        Self::RunnerAborted {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CliError::file_not_found("Scenario", "missing.toml");
        assert_eq!(err.to_string(), "Scenario file not found: missing.toml");

        let err = CliError::runner_aborted("panicked");
        assert!(err.to_string().contains("panicked"));
    }
}
