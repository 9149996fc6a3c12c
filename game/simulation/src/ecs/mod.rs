mod entity;
mod world;

pub use specs::{
    Builder, Component, DenseVecStorage, HashMapStorage, Join, LazyUpdate, NullStorage, Read,
    ReadExpect, ReadStorage, RunNow, System, SystemData, VecStorage, WorldExt, Write, WriteExpect,
    WriteStorage,
};
pub use specs_derive::Component;

pub use self::entity::{Entity, EntityWrapper};
pub use self::world::{ComponentGetError, ComponentWorld, EcsWorld, EcsWorldFrameRef, EntitiesToKill};

pub struct E(pub Entity);

/// One entry per `#[derive(EcsComponent)]` component, submitted at link time via `inventory` and
/// used to register every known component type with a fresh [specs::World] without each call site
/// needing to know the full component list.
pub struct ComponentEntry {
    pub name: &'static str,
    pub register_comp_fn: fn(&mut specs::World),
}

inventory::collect!(ComponentEntry);

pub(crate) fn register_components(world: &mut specs::World) {
    for entry in inventory::iter::<ComponentEntry> {
        (entry.register_comp_fn)(world);
    }
}

mod entity_fmt {
    use super::E;
    use common::*;

    impl slog::KV for E {
        fn serialize(&self, _: &Record, serializer: &mut dyn Serializer) -> SlogResult<()> {
            serializer.emit_arguments("entity", &format_args!("{}", self))
        }
    }

    impl slog::Value for E {
        fn serialize(
            &self,
            _: &Record,
            key: Key,
            serializer: &mut dyn Serializer,
        ) -> SlogResult<()> {
            serializer.emit_arguments(key, &format_args!("{}", self))
        }
    }

    impl Display for E {
        fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
            write!(f, "E{}", crate::entity_pretty!(self.0))
        }
    }
}
