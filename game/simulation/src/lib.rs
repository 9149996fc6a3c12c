#![allow(clippy::type_complexity)]

//! Simulation core: fixed-timestep ECS substrate driving an RTS match. See `backend` for the host
//! facing API and `simulation` for the tick loop itself.

mod advisor;
mod backend;
mod camera;
mod command;
mod ecs;
mod event;
mod governor;
mod grid;
mod harvester;
mod health;
mod input;
mod map;
mod memory;
mod movement;
mod path;
mod perf;
mod queued_update;
mod render;
mod selection;
mod simulation;
mod spatial;
mod time;
mod transform;

pub use advisor::{AdvisorError, AdvisorPort, StrategicAdvice, StrategicAdvisor, StrategicQuery};
pub use backend::{HostCommand, SimulationBackend};
pub use camera::{Camera, CanvasRect};
pub use command::{CommandModifier, CommandableComponent, Intent, MAX_COMMAND_QUEUE};
pub use ecs::{ComponentGetError, ComponentWorld, EcsWorld, Entity};
pub use event::{EventQueue, SimEvent};
pub use governor::{PerformanceGovernor, Phase};
pub use grid::{Cell, FootprintError, Grid};
pub use harvester::{
    Economies, HarvesterComponent, HarvesterState, HarvesterSystem, RefineryComponent,
    ResourceNodeComponent,
};
pub use health::{ArmorKind, HealthComponent};
pub use input::{Gesture, GestureClassifier, Modifiers, PointerButton, RawInputEvent};
pub use map::{load_map, LoadedMap, MapData, MapEntityKind, MapEntitySpec, MapLoadError};
pub use memory::{MemoryAudit, MemoryAuditSystem};
pub use movement::MovementSystem;
pub use path::{
    request_path, PathCache, PathFollowerComponent, PathRequestError, PathRequestQueue,
    PathfindingSystem,
};
pub use perf::{Perf, PerfAvg, Timing};
pub use queued_update::QueuedUpdates;
pub use render::{
    build_render_view, DebugOverlays, RenderHandle, RenderView, RenderableComponent,
    RenderableEntity, Renderer,
};
pub use selection::{SelectableComponent, Selection, SelectionModifier};
pub use simulation::{Simulation, TickReport};
pub use spatial::{Aabb, QuadTree, Spatial, SpatialSystem};
pub use time::{FrameOutcome, SlowdownEvent, Tick, TimeDriver, FIXED_DT, TICKS_PER_SECOND};
pub use transform::{ColliderComponent, KinematicsComponent, TransformComponent};
