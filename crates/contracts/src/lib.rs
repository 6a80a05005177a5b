//! # Contracts
//!
//! Shared interface contracts for the semantic event logger: entity identity,
//! physics-facing inbound notifications, outbound monitor signals, finished
//! events and configuration. Every other crate depends on this one, never the
//! other way round.
//!
//! ## Time Model
//! - Simulation time in seconds (f64) is the only clock
//! - Timestamps carried by signals are the physics notification times

mod blueprint;
mod entity;
mod error;
mod event;
mod monitor_config;
mod pair_key;
mod physics;
mod registry;
mod signal;
mod sink;

pub use blueprint::*;
pub use entity::*;
pub use error::*;
pub use event::*;
pub use monitor_config::*;
pub use pair_key::{ordered_pair_key, pair_key};
pub use physics::*;
pub use registry::*;
pub use signal::*;
pub use sink::*;
