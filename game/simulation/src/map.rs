use serde::Deserialize;

use common::*;

use crate::command::CommandableComponent;
use crate::ecs::*;
use crate::grid::{FootprintError, Grid};
use crate::harvester::{Economies, HarvesterComponent, RefineryComponent, ResourceNodeComponent};
use crate::health::{ArmorKind, HealthComponent};
use crate::path::PathFollowerComponent;
use crate::selection::SelectableComponent;
use crate::spatial::{Aabb, Spatial};
use crate::{ColliderComponent, KinematicsComponent, TransformComponent};

/// Read-only payload consumed once at startup; the core never writes this back out (§6 "Persisted
/// state").
#[derive(Debug, Clone, Deserialize)]
pub struct MapData {
    pub width: i32,
    pub height: i32,
    pub cell_size: f32,
    pub impassable_cells: Vec<(i32, i32)>,
    pub entities: Vec<MapEntitySpec>,
    pub starting_economies: Vec<(u32, u32)>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapEntitySpec {
    pub x: f32,
    pub y: f32,
    pub collider_radius: f32,
    pub kind: MapEntityKind,
}

#[derive(Debug, Clone, Deserialize)]
pub enum MapEntityKind {
    Unit {
        team_id: u32,
        max_hp: f32,
        armor: ArmorKind,
    },
    Harvester {
        team_id: u32,
    },
    ResourceNode {
        remaining: u32,
    },
    Refinery {
        team_id: u32,
    },
}

#[derive(Debug, Error)]
pub enum MapLoadError {
    #[error("map dimensions must be positive, got {0}x{1}")]
    InvalidDimensions(i32, i32),
    #[error("impassable cell failed to place: {0}")]
    Footprint(#[from] FootprintError),
}

/// The resources a loaded map hands back to the caller, ready to insert into the [EcsWorld] as
/// specs resources. [Spatial] starts empty; [crate::spatial::SpatialSystem] picks up the spawned
/// entities on its first run, same as any entity created at runtime.
pub struct LoadedMap {
    pub grid: Grid,
    pub spatial: Spatial,
    pub economies: Economies,
}

/// Builds a [Grid], empty [Spatial] sized to it, starting [Economies], and spawns every entity the
/// map describes. The core never persists state itself; a host loads a [MapData] once at startup
/// (§6).
pub fn load_map(world: &mut EcsWorld, map: &MapData) -> Result<LoadedMap, MapLoadError> {
    if map.width <= 0 || map.height <= 0 {
        return Err(MapLoadError::InvalidDimensions(map.width, map.height));
    }

    let mut grid = Grid::new(map.width, map.height, map.cell_size);
    for &(cx, cy) in &map.impassable_cells {
        grid.place_footprint(&[(cx, cy)])?;
    }

    let world_bounds = Aabb::new(
        0.0,
        0.0,
        map.width as f32 * map.cell_size,
        map.height as f32 * map.cell_size,
    );
    let spatial = Spatial::new(world_bounds);

    let mut economies = Economies::default();
    for &(team, credits) in &map.starting_economies {
        economies.add_credits(team, credits);
    }

    for spec in &map.entities {
        spawn_entity(world, &grid, spec);
    }

    Ok(LoadedMap {
        grid,
        spatial,
        economies,
    })
}

/// Default unit mobility, used until the map format grows a per-unit-type speed table.
const UNIT_MAX_SPEED: f32 = 120.0;
const UNIT_ACCEL: f32 = 300.0;
const HARVESTER_MAX_SPEED: f32 = 80.0;
const HARVESTER_ACCEL: f32 = 200.0;

fn spawn_entity(world: &mut EcsWorld, grid: &Grid, spec: &MapEntitySpec) {
    let transform = TransformComponent::new(spec.x, spec.y);
    let collider = ColliderComponent::circle(spec.collider_radius);
    let cell = grid.world_to_cell(spec.x, spec.y);

    let builder = world.create_entity().with(transform).with(collider);

    match &spec.kind {
        MapEntityKind::Unit {
            team_id,
            max_hp,
            armor,
        } => {
            builder
                .with(HealthComponent::new(*max_hp, *armor))
                .with(SelectableComponent::new(*team_id, 0))
                .with(KinematicsComponent::new(UNIT_MAX_SPEED, UNIT_ACCEL))
                .with(PathFollowerComponent::default())
                .with(CommandableComponent::default())
                .build();
        }
        MapEntityKind::Harvester { team_id } => {
            builder
                .with(HarvesterComponent::new(*team_id))
                .with(SelectableComponent::new(*team_id, 0))
                .with(KinematicsComponent::new(HARVESTER_MAX_SPEED, HARVESTER_ACCEL))
                .with(PathFollowerComponent::default())
                .with(CommandableComponent::default())
                .build();
        }
        MapEntityKind::ResourceNode { remaining } => {
            builder.with(ResourceNodeComponent::new(*remaining, cell)).build();
        }
        MapEntityKind::Refinery { team_id } => {
            builder
                .with(RefineryComponent {
                    team_id: *team_id,
                    docking_cell: cell,
                })
                .with(SelectableComponent::new(*team_id, 0))
                .build();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_map() -> MapData {
        MapData {
            width: 8,
            height: 8,
            cell_size: 128.0,
            impassable_cells: vec![(3, 3)],
            entities: vec![
                MapEntitySpec {
                    x: 100.0,
                    y: 100.0,
                    collider_radius: 10.0,
                    kind: MapEntityKind::Harvester { team_id: 1 },
                },
                MapEntitySpec {
                    x: 500.0,
                    y: 500.0,
                    collider_radius: 20.0,
                    kind: MapEntityKind::ResourceNode { remaining: 1000 },
                },
            ],
            starting_economies: vec![(1, 250)],
        }
    }

    #[test]
    fn loads_grid_and_starting_credits_and_spawns_entities() {
        config::init_for_testing();
        let mut world = EcsWorld::new();
        let map = tiny_map();
        let loaded = load_map(&mut world, &map).unwrap();

        assert!(!loaded.grid.is_passable(3, 3));
        assert_eq!(loaded.economies.credits(1), 250);
        assert_eq!(loaded.spatial.tree().len(), 0);

        let transforms = world.read_storage::<TransformComponent>();
        let colliders = world.read_storage::<ColliderComponent>();
        let entities = world.entities();
        let spawned = (&entities, &transforms, &colliders).join().count();
        assert_eq!(spawned, 2);
    }

    #[test]
    fn rejects_non_positive_dimensions() {
        let mut world = EcsWorld::new();
        let mut map = tiny_map();
        map.width = 0;
        assert!(matches!(
            load_map(&mut world, &map),
            Err(MapLoadError::InvalidDimensions(0, 8))
        ));
    }
}
