//! EntityRegistry - engine handle to Entity lookup
//!
//! Read-only from every monitor's point of view. A single instance is built
//! before monitors are created and injected into each of them.

use std::collections::HashMap;

use crate::{ActorHandle, ContractError, Entity, EntityConfig, ShapeHandle};

/// Read-only lookup from low-level engine handles to semantic entities
pub trait EntityRegistry: Send + Sync {
    /// Resolve an actor handle
    fn resolve_actor(&self, actor: ActorHandle) -> Option<Entity>;

    /// Resolve a shape handle (a component of some actor)
    fn resolve_shape(&self, shape: ShapeHandle) -> Option<Entity>;

    /// Resolve the other party of an overlap: shape first, then its actor
    fn resolve(&self, actor: ActorHandle, shape: ShapeHandle) -> Option<Entity> {
        self.resolve_shape(shape)
            .or_else(|| self.resolve_actor(actor))
    }
}

/// Registry backed by hash maps, filled at configuration time
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    /// Actor handle -> Entity
    by_actor: HashMap<ActorHandle, Entity>,

    /// Shape handle -> owning actor
    shape_owner: HashMap<ShapeHandle, ActorHandle>,
}

impl InMemoryRegistry {
    /// Create empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from blueprint entity declarations
    pub fn from_configs(configs: &[EntityConfig]) -> Result<Self, ContractError> {
        let mut registry = Self::new();
        for config in configs {
            registry.register(config.to_entity(), &config.shapes)?;
        }
        Ok(registry)
    }

    /// Register an entity and the shapes that belong to it
    pub fn register(&mut self, entity: Entity, shapes: &[ShapeHandle]) -> Result<(), ContractError> {
        if let Some(existing) = self.by_actor.get(&entity.actor) {
            return Err(ContractError::RegistryConflict {
                handle: entity.actor.to_string(),
                existing: existing.id.0,
            });
        }
        for shape in shapes {
            if let Some(owner) = self.shape_owner.get(shape) {
                let existing = self.by_actor.get(owner).map(|e| e.id.0).unwrap_or_default();
                return Err(ContractError::RegistryConflict {
                    handle: shape.to_string(),
                    existing,
                });
            }
        }

        for shape in shapes {
            self.shape_owner.insert(*shape, entity.actor);
        }
        self.by_actor.insert(entity.actor, entity);
        Ok(())
    }

    /// Number of registered entities
    pub fn len(&self) -> usize {
        self.by_actor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_actor.is_empty()
    }
}

impl EntityRegistry for InMemoryRegistry {
    fn resolve_actor(&self, actor: ActorHandle) -> Option<Entity> {
        self.by_actor.get(&actor).cloned()
    }

    fn resolve_shape(&self, shape: ShapeHandle) -> Option<Entity> {
        self.shape_owner
            .get(&shape)
            .and_then(|actor| self.by_actor.get(actor))
            .cloned()
    }
}
