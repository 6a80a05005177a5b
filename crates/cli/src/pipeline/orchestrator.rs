//! Pipeline - wires the scenario runner to the sink dispatcher
//!
//! The monitors are single-threaded and run on a blocking task. Finished
//! events cross into the async side over a bounded channel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::{Context, Result};
use contracts::{FinishedEventCallback, LoggerBlueprint, SinkConfig, SinkType};
use observability::EventMetricsAggregator;
use scenario::{ScenarioRunner, ScenarioScript};
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use super::stats::PipelineStats;
use crate::error::CliError;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub blueprint: LoggerBlueprint,
    pub script: ScenarioScript,
    /// Capacity of the runner → dispatcher channel
    pub buffer_size: usize,
    /// Prometheus port (None = disabled)
    pub metrics_port: Option<u16>,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Replay the scenario to completion and drain every sink
    #[instrument(
        name = "pipeline_run",
        skip(self),
        fields(episode = %self.config.blueprint.episode.id)
    )]
    pub async fn run(self) -> Result<PipelineStats> {
        let started = Instant::now();
        let PipelineConfig {
            blueprint,
            script,
            buffer_size,
            metrics_port,
        } = self.config;

        if let Some(port) = metrics_port {
            observability::init_metrics_only(port)?;
        }

        let sinks = effective_sinks(&blueprint);
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        let dispatcher = dispatcher::create_dispatcher(sinks, rx)
            .context("Failed to create dispatcher")?;
        let dispatcher_handle = dispatcher.spawn();

        let aggregator = Arc::new(Mutex::new(EventMetricsAggregator::new()));
        let callback: FinishedEventCallback = {
            let aggregator = Arc::clone(&aggregator);
            Arc::new(move |event| {
                if let Ok(mut agg) = aggregator.lock() {
                    agg.update(&event);
                }
                if tx.blocking_send(event).is_err() {
                    warn!("Dispatcher closed, finished event lost");
                }
            })
        };

        info!(
            monitors = blueprint.monitor_count(),
            steps = script.steps.len(),
            "Starting scenario replay"
        );

        // The runner owns the only sender; dropping it closes the dispatcher input.
        let report = tokio::task::spawn_blocking(move || {
            ScenarioRunner::new(&blueprint, script, callback)?.run()
        })
        .await
        .map_err(|e| CliError::runner_aborted(e.to_string()))?
        .context("Scenario replay failed")?;

        let sink_metrics = dispatcher_handle
            .await
            .map_err(|e| CliError::runner_aborted(format!("dispatcher: {e}")))?;

        for (name, _) in &report.init_failures {
            observability::record_monitor_init_failure(name);
        }
        for (name, snapshot) in &sink_metrics {
            observability::record_sink_dropped(name, snapshot.lost());
        }
        observability::record_episode_finished(
            &report.episode_id,
            report.end_time,
            report.assembler.finished,
        );

        let events = match aggregator.lock() {
            Ok(agg) => agg.summary(),
            Err(poisoned) => poisoned.into_inner().summary(),
        };

        Ok(PipelineStats {
            report,
            sink_metrics,
            events,
            duration: started.elapsed(),
        })
    }
}

/// Configured sinks, or a single log sink when none are given
fn effective_sinks(blueprint: &LoggerBlueprint) -> Vec<SinkConfig> {
    if !blueprint.sinks.is_empty() {
        return blueprint.sinks.clone();
    }
    warn!("No sinks configured, falling back to the log sink");
    vec![SinkConfig {
        name: "log".to_string(),
        sink_type: SinkType::Log,
        queue_capacity: 100,
        params: HashMap::new(),
    }]
}
