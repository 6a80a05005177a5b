//! # Dispatcher
//!
//! 事件分发模块。
//!
//! 负责：
//! - 消费 `FinishedEvent`
//! - Fan-out 到多个 sinks（日志 / JSON Lines 文件）
//! - 每个 sink 独立有界队列，慢 sink 不阻塞监视器

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{EventSink, FinishedEvent};
pub use dispatcher::{create_dispatcher, Dispatcher, DispatcherBuilder, DispatcherConfig};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{JsonlSink, JsonlSinkConfig, LogSink};
