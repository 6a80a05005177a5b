//! Dispatcher - fan-out of finished events to sinks

use std::collections::HashSet;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use contracts::{FinishedEvent, SinkConfig, SinkType};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::{JsonlSink, LogSink};

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Sink configurations
    pub sinks: Vec<SinkConfig>,
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    input_rx: mpsc::Receiver<FinishedEvent>,
}

impl DispatcherBuilder {
    pub fn new(config: DispatcherConfig, input_rx: mpsc::Receiver<FinishedEvent>) -> Self {
        Self { config, input_rx }
    }

    /// Open every sink and start its worker
    #[instrument(name = "dispatcher_builder_build", skip(self))]
    pub fn build(self) -> Result<Dispatcher, DispatcherError> {
        let mut names = HashSet::new();
        for sink_config in &self.config.sinks {
            if !names.insert(sink_config.name.as_str()) {
                return Err(DispatcherError::DuplicateSink(sink_config.name.clone()));
            }
        }

        let mut handles = Vec::with_capacity(self.config.sinks.len());
        for sink_config in &self.config.sinks {
            handles.push(create_sink_handle(sink_config)?);
        }

        Ok(Dispatcher {
            handles,
            input_rx: self.input_rx,
        })
    }
}

/// Create a SinkHandle from configuration (must run inside a tokio runtime)
#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    match config.sink_type {
        SinkType::Log => {
            let sink = LogSink::new(&config.name);
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        SinkType::Jsonl => {
            let sink = JsonlSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_open(&config.name, e))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
    }
}

/// Fans finished events out to every sink
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    input_rx: mpsc::Receiver<FinishedEvent>,
}

impl Dispatcher {
    /// Dispatcher over ready-made sink handles
    pub fn with_handles(
        handles: Vec<SinkHandle>,
        input_rx: mpsc::Receiver<FinishedEvent>,
    ) -> Self {
        Self { handles, input_rx }
    }

    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        collect_metrics(&self.handles)
    }

    /// Run until the input channel closes, then drain and close every sink
    ///
    /// Returns the final per-sink metrics.
    #[instrument(name = "dispatcher_run", skip(self))]
    pub async fn run(mut self) -> Vec<(String, MetricsSnapshot)> {
        info!(sinks = self.handles.len(), "Dispatcher started");

        let mut event_count: u64 = 0;
        while let Some(event) = self.input_rx.recv().await {
            event_count += 1;
            self.dispatch_event(&event);

            if event_count.is_multiple_of(100) {
                debug!(events = event_count, "Dispatcher progress");
            }
        }

        info!(events = event_count, "Dispatcher input closed, shutting down");

        let metrics_handles: Vec<_> = self
            .handles
            .iter()
            .map(|h| (h.name().to_string(), std::sync::Arc::clone(h.metrics())))
            .collect();
        for handle in self.handles {
            handle.shutdown().await;
        }

        info!("Dispatcher shutdown complete");
        metrics_handles
            .into_iter()
            .map(|(name, m)| (name, m.snapshot()))
            .collect()
    }

    pub fn spawn(self) -> JoinHandle<Vec<(String, MetricsSnapshot)>> {
        tokio::spawn(self.run())
    }

    fn dispatch_event(&self, event: &FinishedEvent) {
        for handle in &self.handles {
            handle.try_send(event.clone());
        }
    }
}

fn collect_metrics(handles: &[SinkHandle]) -> Vec<(String, MetricsSnapshot)> {
    handles
        .iter()
        .map(|h| (h.name().to_string(), h.metrics().snapshot()))
        .collect()
}

/// Build a dispatcher from sink configs
#[instrument(name = "dispatcher_create", skip(sink_configs, input_rx))]
pub fn create_dispatcher(
    sink_configs: Vec<SinkConfig>,
    input_rx: mpsc::Receiver<FinishedEvent>,
) -> Result<Dispatcher, DispatcherError> {
    let config = DispatcherConfig {
        sinks: sink_configs,
    };
    DispatcherBuilder::new(config, input_rx).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::tests::event;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_dispatcher_fanout() {
        let (input_tx, input_rx) = mpsc::channel(10);

        let handles = vec![
            SinkHandle::spawn(LogSink::new("sink1"), 10),
            SinkHandle::spawn(LogSink::new("sink2"), 10),
        ];

        let dispatcher = Dispatcher::with_handles(handles, input_rx);
        let handle = dispatcher.spawn();

        for i in 0..5 {
            input_tx.send(event(i)).await.unwrap();
        }
        drop(input_tx);

        let metrics = handle.await.unwrap();
        assert_eq!(metrics.len(), 2);
        assert!(metrics.iter().all(|(_, m)| m.write_count == 5));
    }

    #[tokio::test]
    async fn test_create_dispatcher_from_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let (input_tx, input_rx) = mpsc::channel(10);

        let configs = vec![
            SinkConfig {
                name: "log".to_string(),
                sink_type: SinkType::Log,
                queue_capacity: 50,
                params: HashMap::new(),
            },
            SinkConfig {
                name: "file".to_string(),
                sink_type: SinkType::Jsonl,
                queue_capacity: 50,
                params: HashMap::from([("path".to_string(), path.display().to_string())]),
            },
        ];

        let dispatcher = create_dispatcher(configs, input_rx).unwrap();
        let handle = dispatcher.spawn();

        input_tx.send(event(1)).await.unwrap();
        drop(input_tx);
        handle.await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_sink_names_rejected() {
        let (_input_tx, input_rx) = mpsc::channel(1);
        let sink = |name: &str| SinkConfig {
            name: name.to_string(),
            sink_type: SinkType::Log,
            queue_capacity: 1,
            params: HashMap::new(),
        };

        let err = create_dispatcher(vec![sink("log"), sink("log")], input_rx)
            .err()
            .expect("duplicate");
        assert!(matches!(err, DispatcherError::DuplicateSink(name) if name == "log"));
    }

    #[tokio::test]
    async fn test_unopenable_jsonl_sink() {
        let dir = tempdir().unwrap();
        let (_input_tx, input_rx) = mpsc::channel(1);
        let configs = vec![SinkConfig {
            name: "file".to_string(),
            sink_type: SinkType::Jsonl,
            queue_capacity: 1,
            // a directory cannot be opened as the output file
            params: HashMap::from([("path".to_string(), dir.path().display().to_string())]),
        }];

        let err = create_dispatcher(configs, input_rx).err().expect("open failure");
        assert!(matches!(err, DispatcherError::SinkOpen { ref name, .. } if name == "file"));
    }
}
