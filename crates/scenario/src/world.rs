//! SimWorld - scripted physical state behind the `PhysicsView` trait

use std::collections::HashMap;

use contracts::{ActorHandle, OverlapCandidate, PhysicsView, ShapeHandle, Vector3};
use tracing::{debug, trace};

use crate::script::{BoneVolume, OverlapSpec};

/// Locations, velocities, standing overlaps and bone volumes
#[derive(Debug, Default)]
pub struct SimWorld {
    locations: HashMap<ActorHandle, Vector3>,
    velocities: HashMap<ActorHandle, Vector3>,
    overlaps: HashMap<ShapeHandle, Vec<OverlapCandidate>>,
    bones: HashMap<(ActorHandle, String), ShapeHandle>,
}

impl SimWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// World with the script's bone volumes registered
    pub fn with_bones(bones: &[BoneVolume]) -> Self {
        let mut world = Self::new();
        for bone in bones {
            world.add_bone(bone.actor, &bone.bone, bone.volume);
        }
        world
    }

    pub fn add_bone(&mut self, actor: ActorHandle, bone: &str, volume: ShapeHandle) {
        self.bones.insert((actor, bone.to_string()), volume);
    }

    pub fn set_location(&mut self, actor: ActorHandle, location: Vector3) {
        trace!(%actor, x = location.x, y = location.y, z = location.z, "Location set");
        self.locations.insert(actor, location);
    }

    pub fn set_velocity(&mut self, actor: ActorHandle, velocity: Vector3) {
        self.velocities.insert(actor, velocity);
    }

    /// Record a standing overlap. Returns false if it was already present.
    pub fn begin_overlap(&mut self, spec: &OverlapSpec) -> bool {
        let candidate = spec.candidate();
        let standing = self.overlaps.entry(spec.volume).or_default();
        if standing.contains(&candidate) {
            debug!(volume = %spec.volume, other = %spec.other_actor, "Overlap already standing");
            return false;
        }
        standing.push(candidate);
        true
    }

    /// Forget a standing overlap. Returns false if it was not present.
    pub fn end_overlap(&mut self, spec: &OverlapSpec) -> bool {
        let candidate = spec.candidate();
        let Some(standing) = self.overlaps.get_mut(&spec.volume) else {
            return false;
        };
        let before = standing.len();
        standing.retain(|c| c != &candidate);
        standing.len() != before
    }

    /// Number of standing overlaps over all volumes
    pub fn overlap_count(&self) -> usize {
        self.overlaps.values().map(Vec::len).sum()
    }
}

impl PhysicsView for SimWorld {
    fn location(&self, actor: ActorHandle) -> Option<Vector3> {
        self.locations.get(&actor).copied()
    }

    fn velocity(&self, actor: ActorHandle) -> Option<Vector3> {
        self.velocities.get(&actor).copied()
    }

    fn overlapping(&self, volume: ShapeHandle) -> Vec<OverlapCandidate> {
        self.overlaps.get(&volume).cloned().unwrap_or_default()
    }

    fn bone_volume(&self, actor: ActorHandle, bone: &str) -> Option<ShapeHandle> {
        self.bones.get(&(actor, bone.to_string())).copied()
    }
}
