//! Dispatcher error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Sink backend could not be opened (file path, permissions ...)
    #[error("failed to open sink '{name}'")]
    SinkOpen {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Two sinks share a name, their metrics would be indistinguishable
    #[error("duplicate sink name '{0}'")]
    DuplicateSink(String),
}

impl DispatcherError {
    pub fn sink_open(name: impl Into<String>, source: std::io::Error) -> Self {
        Self::SinkOpen {
            name: name.into(),
            source,
        }
    }
}
