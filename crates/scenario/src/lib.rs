//! # Scenario
//!
//! 脚本化片段回放。
//!
//! 负责：
//! - 解析场景脚本（TOML / JSON）
//! - `SimWorld` 保存位置、速度、重叠与骨骼碰撞体，实现 `PhysicsView`
//! - `ScenarioRunner` 按时间推进 `MonitorHub` 并收集 `FinishedEvent`
//!
//! ## 使用示例
//!
//! ```ignore
//! use scenario::{ScenarioRunner, ScenarioScript};
//!
//! let script = ScenarioScript::load_from_path(Path::new("episode.toml"))?;
//! let runner = ScenarioRunner::new(&blueprint, script, Arc::new(|event| {
//!     println!("{event:?}");
//! }))?;
//! let report = runner.run()?;
//! ```

mod error;
mod runner;
mod script;
mod world;

pub use error::ScenarioError;
pub use runner::{RunReport, ScenarioRunner};
pub use script::{BoneVolume, OverlapSpec, ScenarioScript, ScenarioStep, StepAction};
pub use world::SimWorld;
