use std::fmt::Debug;

use common::*;

use crate::camera::Camera;
use crate::ecs::*;
use crate::spatial::Aabb;
use crate::TransformComponent;

/// Opaque handle into whatever the host renderer uses for sprite/atlas lookups; the core never
/// interprets it (§6 "handles in Renderable are opaque").
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct RenderHandle(pub u64);

#[derive(Debug, Clone, Copy, Component, EcsComponent)]
#[storage(VecStorage)]
#[name("renderable")]
pub struct RenderableComponent {
    pub handle: RenderHandle,
    /// Set by gameplay systems when appearance-affecting state changes; the host may use this to
    /// skip re-uploading unchanged sprites. The core never clears it itself.
    pub dirty: bool,
}

impl RenderableComponent {
    pub fn new(handle: RenderHandle) -> Self {
        Self {
            handle,
            dirty: true,
        }
    }
}

/// One entity as seen by the renderer this frame.
#[derive(Debug, Clone, Copy)]
pub struct RenderableEntity {
    pub entity: Entity,
    pub position: Point2,
    pub heading: Option<f32>,
    pub handle: RenderHandle,
}

/// Non-simulation visuals the host may optionally draw (pathing lines, quadtree bounds, ...).
#[derive(Debug, Clone, Default)]
pub struct DebugOverlays {
    pub lines: Vec<(Point2, Point2)>,
}

/// The read-only per-frame snapshot handed to the host renderer (§6 "Display library").
pub struct RenderView {
    pub camera: Camera,
    pub entities: Vec<RenderableEntity>,
    pub selection_box: Option<Aabb>,
    pub debug_overlays: Option<DebugOverlays>,
}

/// Implemented by whatever 2D rendering collaborator the host embeds. The core calls this once
/// per rendered frame with an immutable snapshot; it never reads mid-tick state (§5).
pub trait Renderer {
    type Error: Debug;

    fn render(&mut self, view: &RenderView) -> Result<(), Self::Error>;
}

/// Builds the frame snapshot from current ECS state. Called outside the fixed tick, on whatever
/// cadence the host renders at (§4.1, §6).
pub fn build_render_view(
    camera: Camera,
    entities: &EntitiesRes,
    transforms: &ReadStorage<TransformComponent>,
    renderables: &ReadStorage<RenderableComponent>,
    selection_box: Option<Aabb>,
    debug_overlays: Option<DebugOverlays>,
) -> RenderView {
    let mut out: Vec<RenderableEntity> = (entities, transforms, renderables)
        .join()
        .map(|(e, transform, renderable)| RenderableEntity {
            entity: e.into(),
            position: transform.position(),
            heading: transform.heading,
            handle: renderable.handle,
        })
        .collect();

    // stable order so two hosts rendering the same tick draw in the same order
    out.sort_by_key(|r| r.entity.id());

    RenderView {
        camera,
        entities: out,
        selection_box,
        debug_overlays,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use specs::WorldExt;

    #[test]
    fn render_view_is_sorted_by_entity_id() {
        let mut world = specs::World::new();
        world.register::<TransformComponent>();
        world.register::<RenderableComponent>();

        for i in (0..5).rev() {
            world
                .create_entity()
                .with(TransformComponent::new(i as f32, 0.0))
                .with(RenderableComponent::new(RenderHandle(i)))
                .build();
        }

        let view = build_render_view(
            Camera::default(),
            &world.entities(),
            &world.read_storage(),
            &world.read_storage(),
            None,
            None,
        );

        // entities are created in descending handle order, so entity id (creation order)
        // ascending recovers that same descending handle order
        let ids: Vec<u64> = view.entities.iter().map(|r| r.handle.0).collect();
        assert_eq!(ids, vec![4, 3, 2, 1, 0]);
    }
}
