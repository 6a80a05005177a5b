//! LogSink - one tracing line per finished event

use contracts::{ContractError, EventSink, FinishedEvent};
use tracing::{info, instrument};

/// Sink that logs event summaries
pub struct LogSink {
    name: String,
    written: u64,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            written: 0,
        }
    }

    fn log_event(&self, event: &FinishedEvent) {
        info!(
            sink = %self.name,
            kind = %event.kind,
            self_entity = %event.self_entity,
            other = %event.other,
            start = event.start,
            end = event.end,
            duration = event.duration(),
            label = event.label.as_deref().unwrap_or(""),
            "Event finished"
        );
    }
}

impl EventSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        level = "trace",
        name = "log_sink_write",
        skip(self, event),
        fields(sink = %self.name, kind = %event.kind)
    )]
    async fn write(&mut self, event: &FinishedEvent) -> Result<(), ContractError> {
        self.log_event(event);
        self.written += 1;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, events = self.written, "LogSink closed");
        Ok(())
    }
}
