use specs::prelude::*;
use specs::storage::InsertResult;
use specs::world::EntitiesRes;

use common::*;

use crate::ecs::{Entity, E};
use std::ops::{Deref, DerefMut};

/// Thin wrapper around [specs::World] so the rest of the core never names `specs` directly.
pub struct EcsWorld {
    world: World,
}

/// World reference for the current frame only - very unsafe, don't store!
pub struct EcsWorldFrameRef(&'static EcsWorld);

#[macro_export]
macro_rules! entity_pretty {
    ($e:expr) => {
        format_args!("{}:{}", $e.gen().id(), $e.id())
    };
}

#[derive(Debug, Error)]
pub enum ComponentGetError {
    #[error("The entity {} doesn't exist", E(*.0))]
    NoSuchEntity(Entity),

    #[error("The entity {} doesn't have the given component '{1}'", E(*.0))]
    NoSuchComponent(Entity, &'static str),
}

/// Entities queued for destruction this tick. Reaped in insertion order at the end of the tick,
/// after every system has run - see §3 "Lifecycle" for why this must be deferred rather than
/// immediate.
#[derive(Default)]
pub struct EntitiesToKill(Vec<Entity>);

impl EntitiesToKill {
    pub fn mark(&mut self, entity: Entity) {
        if !self.0.contains(&entity) {
            self.0.push(entity);
        }
    }

    pub fn drain(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.0)
    }

    pub fn count(&self) -> usize {
        self.0.len()
    }
}

pub trait ComponentWorld: Sized {
    fn component<T: Component>(&self, entity: Entity) -> Result<&T, ComponentGetError>;
    fn component_mut<T: Component>(&self, entity: Entity) -> Result<&mut T, ComponentGetError>;
    fn has_component<T: Component>(&self, entity: Entity) -> bool;
    fn components<J: Join>(&self, entity: Entity, storages: J) -> Option<J::Type>;

    fn resource<T: Resource>(&self) -> &T;
    #[allow(clippy::mut_from_ref)]
    fn resource_mut<T: Resource>(&self) -> &mut T;

    fn add_now<T: Component>(&mut self, entity: Entity, component: T) -> InsertResult<T>;
    fn remove_now<T: Component>(&mut self, entity: Entity) -> Option<T>;

    fn add_lazy<T: Component>(&self, entity: Entity, component: T);
    fn remove_lazy<T: Component>(&self, entity: Entity);

    /// From specs:
    /// > You have to make sure that no component storage is borrowed during the building!
    fn create_entity(&self) -> EntityBuilder;

    /// Defers actual removal to end-of-tick reaping; see [EntitiesToKill].
    fn kill_entity(&self, entity: Entity);
    fn is_entity_alive(&self, entity: Entity) -> bool;

    /// Reaps all entities marked via [Self::kill_entity] since the last call, in insertion order.
    fn reap_dead_entities(&mut self);

    // ---
    fn mk_component_error<T: Component>(&self, entity: Entity) -> ComponentGetError {
        if self.is_entity_alive(entity) {
            ComponentGetError::no_such_component::<T>(entity)
        } else {
            ComponentGetError::NoSuchEntity(entity)
        }
    }
}

impl Deref for EcsWorld {
    type Target = World;

    fn deref(&self) -> &Self::Target {
        &self.world
    }
}

impl DerefMut for EcsWorld {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.world
    }
}

impl EcsWorld {
    pub fn new() -> Self {
        let mut world = World::new();
        crate::ecs::register_components(&mut world);
        world.insert(EntitiesToKill::default());
        EcsWorld { world }
    }
}

impl Default for EcsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentWorld for EcsWorld {
    fn component<T: Component>(&self, entity: Entity) -> Result<&T, ComponentGetError> {
        let storage = self.read_storage::<T>();
        // safety: storage has the same lifetime as self, so its ok to "upcast" the components
        // lifetime from that of the storage to that of self
        let result: Option<&T> = unsafe { std::mem::transmute(storage.get(entity.into())) };
        result.ok_or_else(|| self.mk_component_error::<T>(entity))
    }

    fn component_mut<T: Component>(&self, entity: Entity) -> Result<&mut T, ComponentGetError> {
        let mut storage = self.write_storage::<T>();
        let result: Option<&mut T> =
            unsafe { std::mem::transmute(storage.get_mut(entity.into())) };
        result.ok_or_else(|| self.mk_component_error::<T>(entity))
    }

    fn has_component<T: Component>(&self, entity: Entity) -> bool {
        let storage = self.read_storage::<T>();
        storage.contains(entity.into())
    }

    fn components<J: Join>(&self, entity: Entity, storages: J) -> Option<J::Type> {
        let entities = self.read_resource::<EntitiesRes>();
        storages.join().get(entity.into(), &entities)
    }

    fn resource<T: Resource>(&self) -> &T {
        let res = self.read_resource::<T>();
        unsafe { std::mem::transmute(res.deref()) }
    }

    fn resource_mut<T: Resource>(&self) -> &mut T {
        let mut res = self.write_resource::<T>();
        let res: &mut T = unsafe { std::mem::transmute(res.deref_mut()) };
        res
    }

    fn add_now<T: Component>(&mut self, entity: Entity, component: T) -> InsertResult<T> {
        let mut storage = self.write_storage::<T>();
        storage.insert(entity.into(), component)
    }

    fn remove_now<T: Component>(&mut self, entity: Entity) -> Option<T> {
        let mut storage = self.write_storage::<T>();
        storage.remove(entity.into())
    }

    fn add_lazy<T: Component>(&self, entity: Entity, component: T) {
        let lazy = self.read_resource::<LazyUpdate>();
        lazy.insert(entity.into(), component);
    }

    fn remove_lazy<T: Component>(&self, entity: Entity) {
        let lazy = self.read_resource::<LazyUpdate>();
        lazy.remove::<T>(entity.into());
    }

    fn create_entity(&self) -> EntityBuilder {
        WorldExt::create_entity_unchecked(&self.world)
    }

    fn kill_entity(&self, entity: Entity) {
        self.resource_mut::<EntitiesToKill>().mark(entity);
    }

    fn is_entity_alive(&self, entity: Entity) -> bool {
        let raw: specs::Entity = entity.into();
        // must check if generation is alive first to avoid panic
        raw.gen().is_alive() && self.is_alive(raw)
    }

    fn reap_dead_entities(&mut self) {
        let dead = self.resource_mut::<EntitiesToKill>().drain();
        if dead.is_empty() {
            return;
        }

        my_debug!("reaping {} dead entities", dead.len());
        {
            let entities = self.world.read_resource::<EntitiesRes>();
            for &e in &dead {
                if let Err(err) = entities.delete(e.into()) {
                    my_warn!("failed to delete entity"; e, "error" => %err);
                }
            }
        }

        self.world.maintain();
    }
}

impl EcsWorldFrameRef {
    /// # Safety
    /// Caller must ensure the referenced [EcsWorld] outlives this value and is not moved.
    pub unsafe fn init(world_ref: &EcsWorld) -> Self {
        Self(std::mem::transmute(world_ref))
    }
}

impl Default for EcsWorldFrameRef {
    fn default() -> Self {
        unreachable!("ecs world ref missing")
    }
}

impl Deref for EcsWorldFrameRef {
    type Target = EcsWorld;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

impl ComponentGetError {
    fn no_such_component<T>(entity: Entity) -> Self {
        Self::NoSuchComponent(entity, std::any::type_name::<T>())
    }
}
