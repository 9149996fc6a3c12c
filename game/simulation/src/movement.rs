use common::*;

use crate::ecs::*;
use crate::event::{EventQueue, SimEvent};
use crate::grid::Grid;
use crate::path::{request_path, PathFollowerComponent, PathRequestQueue};
use crate::spatial::Spatial;
use crate::{ColliderComponent, KinematicsComponent, TransformComponent};

/// Steers every entity with a [KinematicsComponent] and a [PathFollowerComponent] towards its
/// current waypoint each tick (§4.9).
///
/// Lower entity id yields higher priority in the separation pass, giving a deterministic,
/// RNG-free ordering (§4.9 "Determinism").
pub struct MovementSystem;

impl<'a> System<'a> for MovementSystem {
    type SystemData = (
        Read<'a, EntitiesRes>,
        WriteStorage<'a, TransformComponent>,
        WriteStorage<'a, KinematicsComponent>,
        WriteStorage<'a, PathFollowerComponent>,
        ReadStorage<'a, ColliderComponent>,
        ReadExpect<'a, Spatial>,
        ReadExpect<'a, Grid>,
        Write<'a, PathRequestQueue>,
        Write<'a, EventQueue>,
    );

    fn run(
        &mut self,
        (
            entities,
            mut transforms,
            mut kinematics,
            mut followers,
            colliders,
            spatial,
            grid,
            mut path_queue,
            mut events,
        ): Self::SystemData,
    ) {
        let dt = crate::time::FIXED_DT;
        let cfg = config::get();
        let arrival_eps2 = cfg.movement.arrival_eps * cfg.movement.arrival_eps;
        let separation_factor = cfg.movement.separation_radius_factor;
        let blocked_ticks_before_replan = cfg.movement.blocked_ticks_before_replan;
        drop(cfg);

        let movers: Vec<Entity> = (&entities, &kinematics, &followers)
            .join()
            .map(|(e, _, _)| e.into())
            .collect();

        for id in movers {
            let raw: specs::Entity = id.into();

            followers.get_mut(raw).unwrap().tick_replan_cooldown(dt);

            if !followers.get(raw).unwrap().has_path() {
                kinematics.get_mut(raw).unwrap().set_velocity(Vector2::zero());
                continue;
            }

            let waypoint = followers.get(raw).unwrap().current_waypoint().unwrap();
            let pos = transforms.get(raw).unwrap().position();
            let to_waypoint = Vector2::new(waypoint.0 - pos.x, waypoint.1 - pos.y);

            if to_waypoint.magnitude2() <= arrival_eps2 {
                let follower = followers.get_mut(raw).unwrap();
                follower.advance_waypoint();
                if !follower.has_path() {
                    events.push(SimEvent::NavigationTargetReached { entity: id });
                }
                continue;
            }

            let kinematic = *kinematics.get(raw).unwrap();
            let current_vel = kinematic.velocity();
            let desired_vel = to_waypoint.normalize_to(kinematic.max_speed);
            let separation = separation_impulse(
                id,
                pos,
                colliders.get(raw),
                kinematic.max_speed,
                separation_factor,
                &spatial,
                &transforms,
            );

            let wanted = desired_vel + separation;
            let accel_step = truncate(wanted - current_vel, kinematic.accel * dt);
            let new_vel = truncate(current_vel + accel_step, kinematic.max_speed);

            kinematics.get_mut(raw).unwrap().set_velocity(new_vel);
            let transform = transforms.get_mut(raw).unwrap();
            transform.x += new_vel.x * dt;
            transform.y += new_vel.y * dt;

            let crawling = new_vel.magnitude2() < (kinematic.max_speed * 0.05).powi(2);
            if !crawling {
                followers.get_mut(raw).unwrap().reset_blocked();
                continue;
            }

            let blocked_ticks = followers.get_mut(raw).unwrap().note_blocked();
            let can_replan = blocked_ticks > blocked_ticks_before_replan
                && followers.get(raw).unwrap().replan_cooldown() <= 0.0
                && !followers.get(raw).unwrap().is_pending();
            if can_replan {
                if let Some(destination) = followers.get(raw).unwrap().destination() {
                    let goal = grid.world_to_cell(destination.0, destination.1);
                    let _ = request_path(
                        &entities,
                        &transforms,
                        &mut followers,
                        &grid,
                        &mut path_queue,
                        id,
                        goal,
                        false,
                    );
                }
            }
        }
    }
}

/// A higher-priority (lower id) neighbour within `separation_factor * radius` pushes us away, in
/// proportion to how deep the overlap is (§4.9 "collision avoidance").
fn separation_impulse(
    id: Entity,
    pos: Point2,
    collider: Option<&ColliderComponent>,
    max_speed: f32,
    separation_factor: f32,
    spatial: &Spatial,
    transforms: &ReadStorage<TransformComponent>,
) -> Vector2 {
    let radius = match collider {
        Some(c) => c.bounding_radius(),
        None => return Vector2::zero(),
    };
    let probe_radius = radius * separation_factor;
    if probe_radius <= 0.0 {
        return Vector2::zero();
    }

    let mut impulse = Vector2::zero();
    for other in spatial.query_radius(pos, probe_radius) {
        if other.id() >= id.id() {
            continue;
        }
        let other_raw: specs::Entity = other.into();
        let other_pos = match transforms.get(other_raw) {
            Some(t) => t.position(),
            None => continue,
        };
        let away = Vector2::new(pos.x - other_pos.x, pos.y - other_pos.y);
        let dist = away.magnitude();
        if dist > 0.0 && dist < probe_radius {
            let depth = (probe_radius - dist) / probe_radius;
            impulse += away.normalize_to(depth * max_speed);
        }
    }
    impulse
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::EcsWorld;
    use crate::grid::Grid;
    use crate::path::PathfindingSystem;
    use crate::spatial::Aabb;

    fn setup() -> EcsWorld {
        config::init_for_testing();
        let mut world = EcsWorld::new();
        world.insert(Grid::new(16, 16, 128.0));
        world.insert(Spatial::new(Aabb::new(0.0, 0.0, 2048.0, 2048.0)));
        world.insert(crate::path::PathCache::default());
        world.insert(PathRequestQueue::default());
        world.insert(EventQueue::default());
        world.insert(crate::time::Tick::default());
        world
    }

    #[test]
    fn entity_without_path_has_zero_velocity() {
        let mut world = setup();
        let e = world
            .create_entity()
            .with(TransformComponent::new(0.0, 0.0))
            .with(KinematicsComponent::new(100.0, 500.0))
            .with(PathFollowerComponent::default())
            .build();

        MovementSystem.run_now(&world);
        world.maintain();

        let kinematics = world.read_storage::<KinematicsComponent>();
        let k = kinematics.get(e).unwrap();
        assert_eq!((k.vx, k.vy), (0.0, 0.0));
    }

    #[test]
    fn entity_moves_towards_requested_goal() {
        let mut world = setup();
        let e = world
            .create_entity()
            .with(TransformComponent::new(0.0, 0.0))
            .with(KinematicsComponent::new(200.0, 1000.0))
            .with(PathFollowerComponent::default())
            .build();

        {
            let entities = world.entities();
            let transforms = world.read_storage::<TransformComponent>();
            let mut followers = world.write_storage::<PathFollowerComponent>();
            let grid = world.resource::<Grid>();
            let mut queue = world.write_resource::<PathRequestQueue>();
            request_path(&entities, &transforms, &mut followers, grid, &mut queue, e.into(), (3, 0), false).unwrap();
        }

        PathfindingSystem.run_now(&world);
        world.maintain();
        MovementSystem.run_now(&world);
        world.maintain();

        let transforms = world.read_storage::<TransformComponent>();
        let t = transforms.get(e).unwrap();
        assert!(t.x > 0.0, "entity should have advanced towards its goal");
    }
}
