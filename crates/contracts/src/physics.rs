//! Physics-facing inbound interface
//!
//! The physics simulation itself is a black box; monitors only see overlap
//! notifications and a few read-only state queries.

use serde::{Deserialize, Serialize};

use crate::{ActorHandle, ShapeHandle};

/// 3D vector (meters or meters per second)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl From<[f64; 3]> for Vector3 {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self { x, y, z }
    }
}

/// What kind of shape sits on the other side of an overlap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    /// Plain collision mesh
    #[default]
    Mesh,
    /// Another contact-shape monitor volume
    ContactTrigger,
}

/// Overlap begin/end notification from the collision subsystem
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlapNotification {
    /// Volume that observed the overlap
    pub volume: ShapeHandle,

    /// Actor of the other party
    pub other_actor: ActorHandle,

    /// Shape of the other party
    pub other_shape: ShapeHandle,

    /// Kind of the other shape
    #[serde(default)]
    pub other_kind: ShapeKind,

    /// Simulation time of the transition
    pub timestamp: f64,
}

/// Something currently overlapping a volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlapCandidate {
    pub other_actor: ActorHandle,
    pub other_shape: ShapeHandle,
    #[serde(default)]
    pub other_kind: ShapeKind,
}

impl OverlapCandidate {
    /// Turn a standing overlap into a begin notification at `timestamp`
    pub fn into_notification(self, volume: ShapeHandle, timestamp: f64) -> OverlapNotification {
        OverlapNotification {
            volume,
            other_actor: self.other_actor,
            other_shape: self.other_shape,
            other_kind: self.other_kind,
            timestamp,
        }
    }
}

/// Read-only view of physical state
pub trait PhysicsView {
    /// World location of an actor
    fn location(&self, actor: ActorHandle) -> Option<Vector3>;

    /// Linear velocity of an actor
    fn velocity(&self, actor: ActorHandle) -> Option<Vector3>;

    /// Everything currently overlapping `volume`
    fn overlapping(&self, volume: ShapeHandle) -> Vec<OverlapCandidate>;

    /// Overlap volume attached to a named bone of a skeletal actor
    fn bone_volume(&self, actor: ActorHandle, bone: &str) -> Option<ShapeHandle>;
}
