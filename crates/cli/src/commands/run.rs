//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::LoggerBlueprint;
use scenario::ScenarioScript;
use tracing::{error, info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), scenario = %args.scenario.display(), "Loading inputs");

    if !args.config.exists() {
        return Err(CliError::file_not_found("Blueprint", args.config.display().to_string()).into());
    }
    if !args.scenario.exists() {
        return Err(
            CliError::file_not_found("Scenario", args.scenario.display().to_string()).into(),
        );
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load blueprint from {}", args.config.display()))?;
    let script = ScenarioScript::load_from_path(&args.scenario)
        .with_context(|| format!("Failed to load scenario from {}", args.scenario.display()))?;

    info!(
        episode = %blueprint.episode.id,
        entities = blueprint.entities.len(),
        monitors = blueprint.monitor_count(),
        sinks = blueprint.sinks.len(),
        steps = script.steps.len(),
        "Inputs loaded"
    );

    if args.dry_run {
        info!("Dry run mode - inputs are valid, exiting");
        print_run_summary(&blueprint, &script);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        script,
        buffer_size: args.buffer_size,
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    });

    let shutdown_signal = setup_shutdown_signal();

    tokio::select! {
        result = pipeline.run() => {
            let stats = result.context("Pipeline execution failed")?;
            info!(
                events = stats.report.assembler.finished,
                lost = stats.events_lost(),
                sim_time = stats.report.end_time,
                duration_secs = stats.duration.as_secs_f64(),
                "Pipeline completed successfully"
            );
            stats.print_summary();
        }
        _ = shutdown_signal => {
            warn!("Received shutdown signal, stopping replay...");
        }
    }

    info!("Semlog finished");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print blueprint and scenario summary for dry-run mode
fn print_run_summary(blueprint: &LoggerBlueprint, script: &ScenarioScript) {
    println!("\n=== Run Summary ===\n");
    println!("Episode: {}", blueprint.episode.id);
    println!("  Tick interval: {}s", script.tick_interval.unwrap_or(blueprint.episode.tick_interval));
    match script.end_time.or(blueprint.episode.end_time) {
        Some(end) => println!("  End time: {end}s"),
        None => println!("  End time: last step ({}s)", script.last_step_time()),
    }

    println!("\nMonitors ({}):", blueprint.monitor_count());
    for shape in &blueprint.contact_shapes {
        println!("  - {} (contact shape, volume {})", shape.name, shape.volume);
    }
    for hand in &blueprint.manipulators {
        println!("  - {} (manipulator, {:?})", hand.name, hand.preset);
    }
    for reach in &blueprint.reach_monitors {
        println!("  - {} (reach, volume {})", reach.name, reach.volume);
    }

    println!("\nScenario:");
    println!("  Bone volumes: {}", script.bones.len());
    println!("  Steps: {}", script.steps.len());

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    println!();
}
