//! Host-facing API: the single entry point a game shell/UI embeds (§6 "Game shell / UI").
//!
//! [SimulationBackend] owns a [Simulation] plus the host-session state that doesn't belong in the
//! ECS - the camera and the gesture classifier - and turns raw input and editing requests into
//! ECS mutations, funnelled through the same selection/command/spatial-index paths the gameplay
//! systems use (§4.6, §4.7).

use std::time::Instant;

use common::*;

use crate::camera::{Camera, CanvasRect};
use crate::command::{CommandIssuer, CommandModifier};
use crate::ecs::*;
use crate::event::{EventQueue, SimEvent};
use crate::governor::Phase;
use crate::grid::{FootprintError, Grid};
use crate::harvester::HarvesterComponent;
use crate::input::{Gesture, GestureClassifier, RawInputEvent};
use crate::map::{MapData, MapLoadError};
use crate::path::{PathCache, PathRequestQueue};
use crate::render::{build_render_view, DebugOverlays, RenderView};
use crate::selection::{drag_box, hit_test, set_selection, SelectableComponent, Selection, SelectionModifier};
use crate::simulation::{Simulation, TickReport};
use crate::spatial::{Aabb, Spatial};
use crate::{ColliderComponent, TransformComponent};

const MIN_ZOOM: f32 = 0.25;
const MAX_ZOOM: f32 = 4.0;
const WHEEL_ZOOM_STEP: f32 = 0.9;
const PINCH_ZOOM_SENSITIVITY: f32 = 0.01;

/// Editing/gameplay requests a host issues outside the fixed tick (§6, §4.7). Distinct from
/// [Gesture]: a gesture is classified input, a `HostCommand` is what the shell decided to do
/// about it - which may not even come from input at all, e.g. building placement from a UI panel.
#[derive(Debug, Clone)]
pub enum HostCommand {
    SelectTap { world: Point2, team: u32, modifier: SelectionModifier },
    SelectDrag { rect: Aabb, team: u32, modifier: SelectionModifier },
    IssueMove { goal_world: Point2, modifier: CommandModifier },
    IssueStop,
    IssueHold,
    /// Attack, unless the target is a resource node a harvester in the selection can work - then
    /// harvest instead (§4.7 "mixed roles fan out").
    IssueContextual { target: Entity, modifier: CommandModifier },
    PlaceBuilding { footprint: Vec<(i32, i32)> },
    DestroyBuilding { entity: Entity, footprint: Vec<(i32, i32)> },
}

#[derive(Debug, Error)]
pub enum HostCommandError {
    #[error("building placement failed: {0}")]
    Footprint(#[from] FootprintError),
    #[error("no entity under the given target")]
    NoTarget,
}

/// Owns the simulation core plus the session-local state (camera, gesture classifier) a host
/// needs to turn raw input into gameplay intents and drive rendering (§4.10, §6).
pub struct SimulationBackend {
    simulation: Simulation,
    camera: Camera,
    gestures: GestureClassifier,
}

impl SimulationBackend {
    pub fn new(map: &MapData) -> Result<Self, MapLoadError> {
        Ok(Self {
            simulation: Simulation::new(map)?,
            camera: Camera::default(),
            gestures: GestureClassifier::new(),
        })
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    pub fn camera(&self) -> Camera {
        self.camera
    }

    pub fn pause(&mut self) {
        self.simulation.pause();
    }

    pub fn resume(&mut self) {
        self.simulation.resume();
    }

    pub fn step(&mut self) {
        self.simulation.step();
    }

    /// Drives the fixed tick loop; see [Simulation::advance] (§4.1).
    pub fn advance(&mut self, real_dt: f32) -> TickReport {
        self.simulation.advance(real_dt)
    }

    /// Classifies one raw input event, folding any resulting camera pan/zoom directly into the
    /// camera and timing the classification under [Phase::Input] (§4.10, §4.11). Gestures that
    /// need gameplay state - taps, drags - are handed back for the caller to turn into a
    /// [HostCommand], since the backend doesn't know which team is selecting.
    pub fn handle_input(&mut self, event: RawInputEvent, canvas_rect: CanvasRect) -> Option<Gesture> {
        let start = Instant::now();
        let gesture = self.gestures.classify(event, &self.camera, canvas_rect);

        if let Some(gesture) = gesture {
            match gesture {
                Gesture::Pan { dx, dy } => self.camera.pan_by(-dx, -dy),
                Gesture::WheelZoom { delta_y, .. } => {
                    let factor = if delta_y > 0.0 { WHEEL_ZOOM_STEP } else { 1.0 / WHEEL_ZOOM_STEP };
                    self.camera.zoom_by(factor, MIN_ZOOM, MAX_ZOOM);
                }
                Gesture::PinchZoom { distance_delta, .. } => {
                    let factor = 1.0 + distance_delta * PINCH_ZOOM_SENSITIVITY;
                    self.camera.zoom_by(factor, MIN_ZOOM, MAX_ZOOM);
                }
                _ => {}
            }
        }

        self.simulation.record_phase(Phase::Input, start.elapsed());
        gesture
    }

    /// Applies a host editing/gameplay command, timed under [Phase::Commands] (§4.11). Selection
    /// and command issuance both funnel through the spatial index, same as every other command
    /// path in the core (§4.6, §4.7).
    pub fn apply_command(&mut self, command: HostCommand) -> Result<(), HostCommandError> {
        let start = Instant::now();

        let result = match command {
            HostCommand::SelectTap { world, team, modifier } => {
                self.select_tap(world, team, modifier);
                Ok(())
            }
            HostCommand::SelectDrag { rect, team, modifier } => {
                self.select_drag(rect, team, modifier);
                Ok(())
            }
            HostCommand::IssueMove { goal_world, modifier } => {
                let selection = self.selected_entities();
                self.with_command_issuer(|issuer| issuer.issue_move(&selection, goal_world, modifier));
                Ok(())
            }
            HostCommand::IssueStop => {
                let selection = self.selected_entities();
                self.with_command_issuer(|issuer| issuer.issue_stop(&selection));
                Ok(())
            }
            HostCommand::IssueHold => {
                let selection = self.selected_entities();
                self.with_command_issuer(|issuer| issuer.issue_hold(&selection));
                Ok(())
            }
            HostCommand::IssueContextual { target, modifier } => self.issue_contextual(target, modifier),
            HostCommand::PlaceBuilding { footprint } => self.place_building(footprint),
            HostCommand::DestroyBuilding { entity, footprint } => self.destroy_building(entity, footprint),
        };

        self.simulation.record_phase(Phase::Commands, start.elapsed());
        result
    }

    fn selected_entities(&self) -> Vec<Entity> {
        self.simulation.world().resource::<Selection>().iter_sorted()
    }

    /// Runs a closure with a freshly-fetched [CommandIssuer], mirroring the pattern
    /// `simulation.rs`'s governed systems use to assemble their `SystemData` (§4.7).
    fn with_command_issuer<R>(&mut self, f: impl FnOnce(&mut CommandIssuer) -> R) -> R {
        let world = self.simulation.world();

        let entities = world.entities();
        let transforms = world.read_storage::<TransformComponent>();
        let mut commandables = world.write_storage::<crate::command::CommandableComponent>();
        let mut followers = world.write_storage::<crate::path::PathFollowerComponent>();
        let grid = world.resource::<Grid>();
        let path_queue = world.resource_mut::<PathRequestQueue>();
        let events = world.resource_mut::<EventQueue>();

        let mut issuer = CommandIssuer {
            entities: &entities,
            transforms: &transforms,
            commandables: &mut commandables,
            followers: &mut followers,
            grid,
            path_queue,
            events,
        };

        f(&mut issuer)
    }

    fn select_tap(&mut self, world_pt: Point2, team: u32, modifier: SelectionModifier) {
        let hit = {
            let world = self.simulation.world();
            let spatial = world.resource::<Spatial>();
            let transforms = world.read_storage::<TransformComponent>();
            let colliders = world.read_storage::<ColliderComponent>();
            let selectables = world.read_storage::<SelectableComponent>();

            hit_test(world_pt, spatial, &transforms, &colliders, &selectables).filter(|&e| {
                let raw: specs::Entity = e.into();
                selectables.get(raw).map(|s| s.team_id == team).unwrap_or(false)
            })
        };

        let hits: Vec<Entity> = hit.into_iter().collect();
        self.commit_selection(&hits, modifier);
    }

    fn select_drag(&mut self, rect: Aabb, team: u32, modifier: SelectionModifier) {
        let hits = {
            let world = self.simulation.world();
            let spatial = world.resource::<Spatial>();
            let transforms = world.read_storage::<TransformComponent>();
            let colliders = world.read_storage::<ColliderComponent>();
            let selectables = world.read_storage::<SelectableComponent>();
            drag_box(rect, team, spatial, &transforms, &colliders, &selectables)
        };

        self.commit_selection(&hits, modifier);
    }

    fn commit_selection(&mut self, hits: &[Entity], modifier: SelectionModifier) {
        let world = self.simulation.world();
        let entities = world.entities();
        let mut selectables = world.write_storage::<SelectableComponent>();
        let selection = world.resource_mut::<Selection>();
        let events = world.resource_mut::<EventQueue>();

        set_selection(selection, &entities, &mut selectables, events, hits, modifier);
    }

    fn issue_contextual(&mut self, target: Entity, modifier: CommandModifier) -> Result<(), HostCommandError> {
        if !self.simulation.world().is_entity_alive(target) {
            return Err(HostCommandError::NoTarget);
        }
        let target_is_resource_node = self
            .simulation
            .world()
            .has_component::<crate::harvester::ResourceNodeComponent>(target);
        let selection = self.selected_entities();

        let world = self.simulation.world();
        let entities = world.entities();
        let transforms = world.read_storage::<TransformComponent>();
        let mut commandables = world.write_storage::<crate::command::CommandableComponent>();
        let mut followers = world.write_storage::<crate::path::PathFollowerComponent>();
        let grid = world.resource::<Grid>();
        let path_queue = world.resource_mut::<PathRequestQueue>();
        let events = world.resource_mut::<EventQueue>();
        let harvesters = world.read_storage::<HarvesterComponent>();

        let mut issuer = CommandIssuer {
            entities: &entities,
            transforms: &transforms,
            commandables: &mut commandables,
            followers: &mut followers,
            grid,
            path_queue,
            events,
        };
        issuer.issue_contextual(&selection, target, target_is_resource_node, &harvesters, modifier);
        Ok(())
    }

    /// Validates and carves the footprint out of the grid, invalidates cached paths past the new
    /// grid version, and emits `BuildingPlaced` (§4.4 "validates ... before committing", §4.5
    /// cache invalidation keyed on grid version).
    fn place_building(&mut self, footprint: Vec<(i32, i32)>) -> Result<(), HostCommandError> {
        let world = self.simulation.world();
        let version = {
            let grid = world.resource_mut::<Grid>();
            grid.place_footprint(&footprint)?;
            grid.version()
        };
        world.resource_mut::<PathCache>().invalidate_stale_versions(version);
        world.resource_mut::<EventQueue>().push(SimEvent::BuildingPlaced { footprint });
        Ok(())
    }

    /// Restores the footprint's passability, invalidates stale cached paths, marks the building
    /// entity for deferred destruction (§3 "Lifecycle"), and emits `BuildingDestroyed`.
    fn destroy_building(&mut self, entity: Entity, footprint: Vec<(i32, i32)>) -> Result<(), HostCommandError> {
        let world = self.simulation.world();
        let version = {
            let grid = world.resource_mut::<Grid>();
            grid.clear_footprint(&footprint);
            grid.version()
        };
        world.resource_mut::<PathCache>().invalidate_stale_versions(version);
        world.kill_entity(entity);
        world.resource_mut::<EventQueue>().push(SimEvent::BuildingDestroyed { footprint });
        Ok(())
    }

    /// Builds the read-only per-frame render snapshot; called outside the fixed tick, on whatever
    /// cadence the host renders at (§4.1, §6).
    pub fn render_view(&mut self, selection_box: Option<Aabb>, debug_overlays: Option<DebugOverlays>) -> RenderView {
        let _timing = self.simulation.perf_mut().render.time();

        let world = self.simulation.world();
        let entities = world.entities();
        let transforms = world.read_storage::<TransformComponent>();
        let renderables = world.read_storage::<crate::render::RenderableComponent>();

        build_render_view(self.camera, &entities, &transforms, &renderables, selection_box, debug_overlays)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{MapData, MapEntityKind, MapEntitySpec};

    fn tiny_map() -> MapData {
        MapData {
            width: 16,
            height: 16,
            cell_size: 128.0,
            impassable_cells: vec![],
            entities: vec![
                MapEntitySpec {
                    x: 100.0,
                    y: 100.0,
                    collider_radius: 10.0,
                    kind: MapEntityKind::Harvester { team_id: 1 },
                },
                MapEntitySpec {
                    x: 900.0,
                    y: 900.0,
                    collider_radius: 20.0,
                    kind: MapEntityKind::ResourceNode { remaining: 500 },
                },
            ],
            starting_economies: vec![(1, 0)],
        }
    }

    #[test]
    fn tap_selects_entity_of_own_team() {
        config::init_for_testing();
        let mut backend = SimulationBackend::new(&tiny_map()).unwrap();
        backend
            .apply_command(HostCommand::SelectTap {
                world: Point2::new(100.0, 100.0),
                team: 1,
                modifier: SelectionModifier::Replace,
            })
            .unwrap();
        assert_eq!(backend.selected_entities().len(), 1);
    }

    #[test]
    fn tap_on_enemy_team_selects_nothing() {
        config::init_for_testing();
        let mut backend = SimulationBackend::new(&tiny_map()).unwrap();
        backend
            .apply_command(HostCommand::SelectTap {
                world: Point2::new(100.0, 100.0),
                team: 2,
                modifier: SelectionModifier::Replace,
            })
            .unwrap();
        assert_eq!(backend.selected_entities().len(), 0);
    }

    #[test]
    fn placing_a_building_bumps_grid_version_and_blocks_the_cell() {
        config::init_for_testing();
        let mut backend = SimulationBackend::new(&tiny_map()).unwrap();
        let v0 = backend.simulation().world().resource::<Grid>().version();
        backend
            .apply_command(HostCommand::PlaceBuilding { footprint: vec![(5, 5)] })
            .unwrap();
        let v1 = backend.simulation().world().resource::<Grid>().version();
        assert!(v1 > v0);
        assert!(!backend.simulation().world().resource::<Grid>().is_passable(5, 5));
    }

    #[test]
    fn placing_a_building_on_an_already_blocked_cell_fails() {
        config::init_for_testing();
        let mut backend = SimulationBackend::new(&tiny_map()).unwrap();
        backend
            .apply_command(HostCommand::PlaceBuilding { footprint: vec![(5, 5)] })
            .unwrap();
        let err = backend.apply_command(HostCommand::PlaceBuilding { footprint: vec![(5, 5)] });
        assert!(err.is_err());
    }
}
