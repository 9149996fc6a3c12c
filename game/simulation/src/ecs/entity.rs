use common::*;
use std::ops::Deref;

/// Stable 64-bit-ish identifier with a generation counter (§3 "Entity"). Wraps `specs::Entity` so
/// the rest of the core never names the ECS crate directly.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Entity(specs::Entity);

/// A copy of [Entity] but constructible manually from index+generation, e.g. for replay log
/// deserialization.
///
/// It's technically undefined to transmute like this but a unit test below confirms the layout
/// assumption holds for the pinned `specs` version in use.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(test, derive(Eq, PartialEq))]
pub struct EntityWrapper(pub specs::world::Index, pub std::num::NonZeroI32);

impl Display for EntityWrapper {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&Entity::from(*self), f)
    }
}

impl Deref for Entity {
    type Target = specs::Entity;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Entity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "E{}:{}", self.0.gen().id(), self.0.id())
    }
}

impl Debug for Entity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl From<specs::Entity> for Entity {
    #[inline(always)]
    fn from(e: specs::Entity) -> Self {
        Self(e)
    }
}

impl From<Entity> for specs::Entity {
    #[inline(always)]
    fn from(e: Entity) -> Self {
        e.0
    }
}

impl slog::KV for Entity {
    fn serialize(&self, _: &Record, serializer: &mut dyn Serializer) -> SlogResult<()> {
        serializer.emit_arguments("entity", &format_args!("{}", self))
    }
}

impl slog::Value for Entity {
    fn serialize(&self, _: &Record, key: Key, serializer: &mut dyn Serializer) -> SlogResult<()> {
        serializer.emit_arguments(key, &format_args!("{}", self))
    }
}

impl From<EntityWrapper> for Entity {
    fn from(e: EntityWrapper) -> Self {
        // safety: see doc comment on EntityWrapper (and unit test below)
        let specs = unsafe { std::mem::transmute::<_, specs::Entity>(e) };
        Self(specs)
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroI32;

    use specs::WorldExt;

    use super::*;

    #[test]
    fn entity_id_conversion() {
        let mut world = specs::World::new();

        for i in 0..50 {
            let e = world.create_entity().build();

            let index = e.id();
            let gen = e.gen();

            let my_e = EntityWrapper(index, NonZeroI32::new(gen.id()).unwrap());
            let my_e = Entity::from(my_e);
            assert_eq!(e, my_e.0, "specs entity layout has changed");
            assert_eq!(Entity::from(e), my_e, "specs entity layout has changed");

            if i % 2 == 0 {
                world.delete_entity(e).unwrap();
            }
        }
    }
}
