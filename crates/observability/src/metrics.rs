//! 语义事件指标收集模块
//!
//! 监视器在热路径上直接通过 `metrics` 宏计数；这里负责片段级指标
//! 以及内存中的事件聚合统计（运行结束时打印摘要）。

use std::collections::BTreeMap;

use contracts::{EventKind, FinishedEvent};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, Unit};

/// 注册 `semlog_*` 指标描述（Prometheus HELP 文本）
pub fn describe_metrics() {
    describe_counter!("semlog_signals_total", "Monitor signals delivered to listeners");
    describe_counter!("semlog_finished_events_total", "Finished semantic events by kind");
    describe_histogram!(
        "semlog_event_duration_seconds",
        Unit::Seconds,
        "Duration of finished semantic events"
    );
    describe_counter!(
        "semlog_concatenations_total",
        "End/begin pairs absorbed by a jitter buffer"
    );
    describe_counter!("semlog_anomalies_total", "Consistency anomalies, derived event dropped");
    describe_counter!("semlog_sink_writes_total", "Events written by each sink");
    describe_gauge!("semlog_sink_dropped", "Events a sink lost (queue full or write error)");
    describe_counter!(
        "semlog_monitor_init_failures_total",
        "Monitors left inert after a failed init"
    );
    describe_counter!("semlog_episodes_total", "Episodes replayed to completion");
    describe_gauge!(
        "semlog_episode_sim_time_seconds",
        Unit::Seconds,
        "Final simulation time of the episode"
    );
    describe_gauge!("semlog_episode_events", "Finished events of the episode");
}

/// 记录片段结束
///
/// `sim_time` 为片段最终仿真时间（秒）。
pub fn record_episode_finished(episode_id: &str, sim_time: f64, events: u64) {
    counter!("semlog_episodes_total").increment(1);
    gauge!("semlog_episode_sim_time_seconds", "episode" => episode_id.to_string()).set(sim_time);
    gauge!("semlog_episode_events", "episode" => episode_id.to_string()).set(events as f64);
}

/// 记录监视器初始化失败（监视器保持静默）
pub fn record_monitor_init_failure(monitor: &str) {
    counter!("semlog_monitor_init_failures_total", "monitor" => monitor.to_string()).increment(1);
}

/// 记录 sink 最终丢弃数
pub fn record_sink_dropped(sink_name: &str, dropped: u64) {
    gauge!("semlog_sink_dropped", "sink" => sink_name.to_string()).set(dropped as f64);
}

/// 事件指标聚合器
///
/// 在内存中按事件类型聚合数量与时长，便于输出摘要。
#[derive(Debug, Clone, Default)]
pub struct EventMetricsAggregator {
    /// 总事件数
    pub total_events: u64,

    /// 各类型时长统计（秒）
    pub durations: BTreeMap<EventKind, RunningStats>,

    /// 各抓取类型次数
    pub grasp_types: BTreeMap<String, u64>,

    /// 最晚结束时间
    pub last_end: f64,
}

impl EventMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, event: &FinishedEvent) {
        self.total_events += 1;
        self.durations
            .entry(event.kind)
            .or_default()
            .push(event.duration());

        if event.kind == EventKind::Grasp {
            let label = event.label.clone().unwrap_or_default();
            *self.grasp_types.entry(label).or_insert(0) += 1;
        }
        self.last_end = self.last_end.max(event.end);
    }

    /// 某类型事件数
    pub fn count(&self, kind: EventKind) -> u64 {
        self.durations.get(&kind).map_or(0, RunningStats::count)
    }

    /// 生成摘要报告
    pub fn summary(&self) -> EventSummary {
        EventSummary {
            total_events: self.total_events,
            last_end: self.last_end,
            per_kind: EventKind::ALL
                .iter()
                .map(|kind| {
                    let stats = self.durations.get(kind).cloned().unwrap_or_default();
                    (*kind, StatsSummary::from(&stats))
                })
                .collect(),
            grasp_types: self.grasp_types.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 事件摘要
#[derive(Debug, Clone, Default)]
pub struct EventSummary {
    pub total_events: u64,
    pub last_end: f64,
    /// 各类型时长（秒），按 `EventKind::ALL` 顺序
    pub per_kind: Vec<(EventKind, StatsSummary)>,
    pub grasp_types: BTreeMap<String, u64>,
}

impl std::fmt::Display for EventSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Semantic Event Summary ===")?;
        writeln!(f, "Total events: {}", self.total_events)?;
        writeln!(f, "Last event end: {:.3}s", self.last_end)?;
        for (kind, stats) in &self.per_kind {
            writeln!(f, "{kind} duration (s): {stats}")?;
        }

        if !self.grasp_types.is_empty() {
            writeln!(f, "Grasp types:")?;
            for (label, count) in &self.grasp_types {
                writeln!(f, "  {}: {}", label, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
