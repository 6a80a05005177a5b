//! Pipeline statistics.

use std::time::Duration;

use dispatcher::MetricsSnapshot;
use observability::EventSummary;
use scenario::RunReport;

/// Statistics from a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineStats {
    /// Runner outcome (monitor, hub and assembler counters)
    pub report: RunReport,

    /// Final per-sink metrics
    pub sink_metrics: Vec<(String, MetricsSnapshot)>,

    /// Per-kind duration statistics of the finished events
    pub events: EventSummary,

    /// Wall-clock duration of the run
    pub duration: Duration,
}

impl PipelineStats {
    /// Events that did not reach at least one sink
    pub fn events_lost(&self) -> u64 {
        self.sink_metrics.iter().map(|(_, m)| m.lost()).sum()
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        let report = &self.report;
        println!("\n=== Episode '{}' ===", report.episode_id);
        println!("   ├─ Simulated time: {:.3}s", report.end_time);
        println!("   ├─ Wall time: {:.3}s", self.duration.as_secs_f64());
        println!("   ├─ Steps replayed: {}", report.steps);
        println!(
            "   ├─ Overlaps: {} routed, {} unrouted",
            report.hub.overlaps_routed, report.hub.overlaps_unrouted
        );
        println!("   ├─ Timers fired: {}", report.hub.timers_fired);
        println!(
            "   └─ Events: {} finished, {} inverted, {} unmatched ends",
            report.assembler.finished, report.assembler.inverted, report.assembler.unmatched_ends
        );

        if !report.init_failures.is_empty() {
            println!("\nMonitors that failed init ({})", report.init_failures.len());
            for (name, reason) in &report.init_failures {
                println!("   - {name}: {reason}");
            }
        }

        if !report.assist_actions.is_empty() {
            println!("\nGrasp assist");
            for (name, action) in &report.assist_actions {
                println!("   - {name}: {action:?}");
            }
        }

        println!("\n{}", self.events);

        println!("Sinks ({})", self.sink_metrics.len());
        for (name, m) in &self.sink_metrics {
            println!(
                "   - {name}: {} written, {} failed, {} dropped",
                m.write_count, m.failure_count, m.dropped_count
            );
        }
        println!();
    }
}
