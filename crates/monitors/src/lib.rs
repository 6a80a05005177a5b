//! # Monitors
//!
//! 语义事件监视器核心（单线程，仿真时间驱动）。
//!
//! 负责：
//! - 接触体监视（contact / supported-by）
//! - 机械手抓取监视（grasp，手指组 A + 拇指组 B）
//! - 伸手 / 预抓取监视（reach / pre-grasp）
//! - 抖动拼接缓冲（所有监视器共用）
//! - `MonitorHub` 路由重叠通知、触发定时器、分发信号
//! - `EventAssembler` 将 begin/end 信号配对为 `FinishedEvent`
//!
//! ## 使用示例
//!
//! ```ignore
//! use std::sync::Arc;
//! use monitors::{EventAssembler, MonitorHub};
//!
//! let mut hub = MonitorHub::from_blueprint(&blueprint, registry);
//! hub.add_listener(Box::new(EventAssembler::new(Arc::new(|event| {
//!     println!("{event:?}");
//! }))));
//!
//! for (name, err) in hub.init_all(&physics) {
//!     eprintln!("{name}: {err}");
//! }
//! hub.start_all(&physics);
//!
//! // Feed physics notifications in time order
//! hub.overlap_begin(&physics, &notification);
//!
//! hub.advance_to(&physics, end_time);
//! hub.finish_all(&physics, false);
//! ```

mod assembler;
mod contact_shape;
mod context;
mod delay_buffer;
mod error;
mod grasp_assist;
mod hub;
mod lifecycle;
mod manipulator;
mod monitor;
mod reach;
mod scheduler;
mod tally;

#[cfg(test)]
mod testing;

pub use assembler::{AssemblerStats, EventAssembler};
pub use contact_shape::ContactShapeMonitor;
pub use context::{MonitorContext, MonitorId};
pub use delay_buffer::{Concatenation, ConcatenationBuffer, EndedRecord};
pub use error::{BoneGroup, MonitorError};
pub use grasp_assist::{AssistAction, GraspAssist, RecordingGraspAssist};
pub use hub::{HubStats, MonitorHub};
pub use lifecycle::Lifecycle;
pub use manipulator::ManipulatorMonitor;
pub use monitor::Monitor;
pub use reach::ReachMonitor;
pub use scheduler::{FiredTimer, Scheduler, TimerHandle, TimerKind};
