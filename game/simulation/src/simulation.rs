use std::time::Instant;

use common::*;

use crate::ecs::*;
use crate::event::{EventQueue, SimEvent};
use crate::governor::{Phase, PerformanceGovernor};
use crate::grid::Grid;
use crate::harvester::{Economies, HarvesterSystem};
use crate::map::{load_map, MapData, MapLoadError};
use crate::memory::{MemoryAudit, MemoryAuditSystem};
use crate::movement::MovementSystem;
use crate::path::{PathCache, PathRequestQueue, PathfindingSystem};
use crate::perf::Perf;
use crate::queued_update::QueuedUpdates;
use crate::selection::Selection;
use crate::spatial::{Spatial, SpatialSystem};
use crate::time::{FrameOutcome, Tick, TimeDriver};

/// Everything the tick loop produced for one [Simulation::advance] call: how many fixed steps ran,
/// the render interpolation factor, and every event queued since the last drain (§4.1, §6 "Game
/// shell / UI").
#[derive(Default)]
pub struct TickReport {
    pub steps_run: u32,
    pub alpha: f32,
    pub events: Vec<SimEvent>,
}

/// Owns the ECS world and drives it through its fixed-timestep tick loop (§2 "System overview",
/// §4.1, §5 "single-threaded, cooperative").
///
/// Every resource a system declares via `ReadExpect`/`WriteExpect` is inserted up front in [new] -
/// `specs` panics on first access otherwise, even for types with a `Default` impl.
pub struct Simulation {
    ecs_world: EcsWorld,
    time: TimeDriver,
    governor: PerformanceGovernor,
    perf: Perf,
}

impl Simulation {
    pub fn new(map: &MapData) -> Result<Self, MapLoadError> {
        let mut ecs_world = EcsWorld::new();
        let loaded = load_map(&mut ecs_world, map)?;

        ecs_world.insert(loaded.grid);
        ecs_world.insert(loaded.spatial);
        ecs_world.insert(loaded.economies);
        ecs_world.insert(PathCache::default());
        ecs_world.insert(PathRequestQueue::default());
        ecs_world.insert(Selection::default());
        ecs_world.insert(EventQueue::default());
        ecs_world.insert(QueuedUpdates::default());
        ecs_world.insert(MemoryAudit::default());
        ecs_world.insert(Tick::default());

        Ok(Self {
            ecs_world,
            time: TimeDriver::with_config(),
            governor: PerformanceGovernor::default(),
            perf: Perf::default(),
        })
    }

    pub fn world(&self) -> &EcsWorld {
        &self.ecs_world
    }

    pub fn world_mut(&mut self) -> &mut EcsWorld {
        &mut self.ecs_world
    }

    pub fn governor(&self) -> &PerformanceGovernor {
        &self.governor
    }

    pub fn perf(&self) -> &Perf {
        &self.perf
    }

    pub fn perf_mut(&mut self) -> &mut Perf {
        &mut self.perf
    }

    /// Times a host-driven (non-system) phase against the governor's per-phase budget, the same
    /// way [Self::tick_once]'s `run_governed!` macro times gameplay systems (§4.11). Exposed so
    /// `backend.rs` can account for input classification and command issuance, which run outside
    /// the fixed tick.
    pub fn record_phase(&mut self, phase: Phase, elapsed: std::time::Duration) {
        let events = self.ecs_world.resource_mut::<EventQueue>();
        self.governor.record(phase, elapsed, events);
    }

    pub fn pause(&mut self) {
        self.time.pause();
    }

    pub fn resume(&mut self) {
        self.time.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.time.is_paused()
    }

    /// Advances exactly one fixed step on the next [Self::advance] call, regardless of pause state
    /// (§4.1 "step").
    pub fn step(&mut self) {
        self.time.step();
    }

    pub fn current_tick(&self) -> Tick {
        *self.ecs_world.resource::<Tick>()
    }

    /// Feeds `real_dt` seconds of wall-clock time into the [TimeDriver], runs zero or more fixed
    /// simulation steps, and drains every event queued along the way (§4.1, §6).
    pub fn advance(&mut self, real_dt: f32) -> TickReport {
        let outcome: FrameOutcome = self.time.advance(real_dt);

        if let Some(slowdown) = outcome.slowdown {
            self.ecs_world
                .resource_mut::<EventQueue>()
                .push(SimEvent::Slowdown {
                    discarded_secs: slowdown.discarded_secs,
                });
        }

        for _ in 0..outcome.steps {
            let _timing = self.perf.tick.time();
            self.tick_once();
        }

        let events = self.ecs_world.resource_mut::<EventQueue>().drain();
        TickReport {
            steps_run: outcome.steps,
            alpha: outcome.alpha,
            events,
        }
    }

    /// Runs every gameplay system once, in the fixed order that keeps pathfinding results, motion
    /// and the economy FSM mutually consistent within a tick (§4.1, §5), then drains queued
    /// updates and reaps entities killed this tick.
    fn tick_once(&mut self) {
        macro_rules! run_governed {
            ($phase:expr, $system:expr) => {{
                let start = Instant::now();
                $system.run_now(&self.ecs_world);
                let elapsed = start.elapsed();
                let events = self.ecs_world.resource_mut::<EventQueue>();
                self.governor.record($phase, elapsed, events);
            }};
        }

        run_governed!(Phase::Pathfinding, PathfindingSystem);
        run_governed!(Phase::Movement, MovementSystem);
        run_governed!(Phase::AiEconomy, HarvesterSystem);
        run_governed!(Phase::SpatialUpdate, SpatialSystem);

        MemoryAuditSystem.run_now(&self.ecs_world);

        // swapped out so a queued update can itself queue further updates without re-borrowing
        // the resource it was fetched from
        let mut taken = std::mem::take(self.ecs_world.resource_mut::<QueuedUpdates>());
        taken.execute(&mut self.ecs_world);
        *self.ecs_world.resource_mut::<QueuedUpdates>() = taken;

        self.ecs_world.reap_dead_entities();

        self.ecs_world.resource_mut::<Tick>().advance();
    }
}

/// Credit balance and active-unit count for `team`, used to build a
/// [crate::advisor::StrategicQuery] outside the tick loop (§6 "Strategic advisor").
pub fn team_snapshot(world: &EcsWorld, team: u32) -> (u32, usize) {
    let economies = world.resource::<Economies>();
    let selectables = world.read_storage::<crate::selection::SelectableComponent>();
    let entities = world.entities();
    let active_units = (&entities, &selectables)
        .join()
        .filter(|(_, s)| s.team_id == team)
        .count();
    (economies.credits(team), active_units)
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
                MapEntitySpec {
                    x: 200.0,
                    y: 200.0,
                    collider_radius: 10.0,
                    kind: MapEntityKind::Refinery { team_id: 1 },
                },
            ],
            starting_economies: vec![(1, 0)],
        }
    }

    #[test]
    fn new_simulation_inserts_every_required_resource() {
        config::init_for_testing();
        let sim = Simulation::new(&tiny_map()).unwrap();
        // would panic on ReadExpect<Spatial>/ReadExpect<MemoryAudit> if either were missing
        sim.world().resource::<Spatial>();
        sim.world().resource::<MemoryAudit>();
        sim.world().resource::<Grid>();
    }

    #[test]
    fn paused_simulation_produces_no_steps() {
        config::init_for_testing();
        let mut sim = Simulation::new(&tiny_map()).unwrap();
        sim.pause();
        let report = sim.advance(1.0);
        assert_eq!(report.steps_run, 0);
    }

    #[test]
    fn ticking_advances_the_tick_resource() {
        config::init_for_testing();
        let mut sim = Simulation::new(&tiny_map()).unwrap();
        let report = sim.advance(1.0 / 60.0);
        assert_eq!(report.steps_run, 1);
        assert_eq!(sim.current_tick().value(), 1);
    }
}
