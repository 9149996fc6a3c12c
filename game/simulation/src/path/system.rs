use std::collections::VecDeque;
use std::time::{Duration, Instant};

use common::*;

use crate::ecs::*;
use crate::event::{EventQueue, SimEvent};
use crate::grid::Grid;
use crate::path::astar::{astar, smooth_path, Cell};
use crate::path::cache::{CacheKey, PathCache};
use crate::time::Tick;
use crate::TransformComponent;

/// Active path and replan state for a unit (§3 "PathFollower").
#[derive(Default, Component, EcsComponent)]
#[storage(VecStorage)]
#[name("path-follower")]
pub struct PathFollowerComponent {
    path: Vec<(f32, f32)>,
    waypoint: usize,
    pending: bool,
    replan_cooldown: f32,
    blocked_ticks: u32,
    request_id: u64,
}

impl PathFollowerComponent {
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn has_path(&self) -> bool {
        self.waypoint < self.path.len()
    }

    /// Current waypoint, if any remain. Invariant 5: `waypoint` is kept in `[0, path.len()]`.
    pub fn current_waypoint(&self) -> Option<(f32, f32)> {
        self.path.get(self.waypoint).copied()
    }

    pub fn advance_waypoint(&mut self) {
        if self.waypoint < self.path.len() {
            self.waypoint += 1;
        }
        debug_assert!(self.waypoint <= self.path.len());
    }

    pub fn clear(&mut self) {
        self.path.clear();
        self.waypoint = 0;
        self.pending = false;
    }

    /// The final destination of the current path, used to re-request a path from a new start cell
    /// when movement stalls (§4.9 "replan on blocked").
    pub fn destination(&self) -> Option<(f32, f32)> {
        self.path.last().copied()
    }

    pub fn replan_cooldown(&self) -> f32 {
        self.replan_cooldown
    }

    pub fn tick_replan_cooldown(&mut self, dt: f32) {
        self.replan_cooldown = (self.replan_cooldown - dt).max(0.0);
    }

    pub fn note_blocked(&mut self) -> u32 {
        self.blocked_ticks += 1;
        self.blocked_ticks
    }

    pub fn reset_blocked(&mut self) {
        self.blocked_ticks = 0;
    }

    fn set_path(&mut self, path: Vec<Cell>, grid: &Grid) {
        self.path = path
            .into_iter()
            .map(|(cx, cy)| grid.cell_center(cx, cy))
            .collect();
        self.waypoint = 0;
        self.pending = false;
    }

    fn request(&mut self, request_id: u64, replan_cooldown_secs: f32) {
        self.pending = true;
        self.request_id = request_id;
        self.replan_cooldown = replan_cooldown_secs;
        self.blocked_ticks = 0;
    }
}

#[derive(Debug, Error)]
pub enum PathRequestError {
    #[error("entity {0} no longer exists")]
    DeadEntity(Entity),
    #[error("start/goal cell is out of the grid bounds")]
    OutOfBounds,
}

struct PathRequest {
    entity: Entity,
    start: Cell,
    goal: Cell,
    request_id: u64,
    player_issued: bool,
}

/// FIFO request queue with a priority boost for player-issued commands (§4.5 "Budgeted
/// execution"). Player-issued requests are served from a separate queue drained first.
#[derive(Default)]
pub struct PathRequestQueue {
    priority: VecDeque<PathRequest>,
    normal: VecDeque<PathRequest>,
    next_id: u64,
}

impl PathRequestQueue {
    pub fn submit(
        &mut self,
        entity: Entity,
        start: Cell,
        goal: Cell,
        player_issued: bool,
    ) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        let req = PathRequest {
            entity,
            start,
            goal,
            request_id: id,
            player_issued,
        };
        if player_issued {
            self.priority.push_back(req);
        } else {
            self.normal.push_back(req);
        }
        id
    }

    fn pop(&mut self) -> Option<PathRequest> {
        self.priority.pop_front().or_else(|| self.normal.pop_front())
    }

    pub fn pending_count(&self) -> usize {
        self.priority.len() + self.normal.len()
    }
}

/// Runs A* under a per-tick time budget, applying completed paths to [PathFollowerComponent] and
/// leaving excess requests queued for the next tick (§4.5 "Budgeted execution", §5 "results
/// applied ... never mid-tick").
pub struct PathfindingSystem;

impl<'a> System<'a> for PathfindingSystem {
    type SystemData = (
        Read<'a, EntitiesRes>,
        ReadStorage<'a, TransformComponent>,
        WriteStorage<'a, PathFollowerComponent>,
        ReadExpect<'a, Grid>,
        Write<'a, PathCache>,
        Write<'a, PathRequestQueue>,
        Write<'a, EventQueue>,
        Read<'a, Tick>,
    );

    fn run(
        &mut self,
        (entities, transforms, mut followers, grid, mut cache, mut queue, mut events, tick): Self::SystemData,
    ) {
        let cfg = config::get();
        let budget = Duration::from_micros(cfg.pathfinder.tick_budget_micros);
        let max_expansions = cfg.pathfinder.max_expansions;
        let now = *tick;

        let start_time = Instant::now();

        while start_time.elapsed() < budget {
            let request = match queue.pop() {
                Some(r) => r,
                None => break,
            };

            let raw: specs::Entity = request.entity.into();
            if !entities.is_alive(raw) {
                continue;
            }

            let follower = match followers.get_mut(raw) {
                Some(f) if f.pending && f.request_id == request.request_id => f,
                // superseded or cancelled by a newer request/command - discard result (§5
                // "Cancellation")
                _ => continue,
            };

            let key = CacheKey {
                start: request.start,
                goal: request.goal,
                grid_version: grid.version(),
            };

            let path = if let Some(cached) = cache.get(&key, now) {
                Some(cached)
            } else {
                match astar(&grid, request.start, request.goal, max_expansions) {
                    Some(raw_path) => {
                        let smoothed = smooth_path(&grid, &raw_path);
                        cache.insert(key, smoothed.clone(), now);
                        Some(smoothed)
                    }
                    None => None,
                }
            };

            match path {
                Some(path) => follower.set_path(path, &grid),
                None => {
                    follower.clear();
                    events.push(SimEvent::CannotComply {
                        entity: request.entity,
                    });
                }
            }
        }
    }
}

/// Requests a path for `entity` from its current transform-derived cell to `goal`, marking its
/// [PathFollowerComponent] pending until the [PathfindingSystem] serves it.
pub fn request_path(
    entities: &EntitiesRes,
    transforms: &ReadStorage<TransformComponent>,
    followers: &mut WriteStorage<PathFollowerComponent>,
    grid: &Grid,
    queue: &mut PathRequestQueue,
    entity: Entity,
    goal: Cell,
    player_issued: bool,
) -> Result<(), PathRequestError> {
    let raw: specs::Entity = entity.into();
    if !entities.is_alive(raw) {
        return Err(PathRequestError::DeadEntity(entity));
    }
    let transform = transforms.get(raw).ok_or(PathRequestError::DeadEntity(entity))?;
    let start = grid.world_to_cell(transform.x, transform.y);
    if !grid.in_bounds(start.0, start.1) || !grid.in_bounds(goal.0, goal.1) {
        return Err(PathRequestError::OutOfBounds);
    }

    let cfg = config::get();
    let id = queue.submit(entity, start, goal, player_issued);

    let follower = followers
        .entry(raw)
        .expect("specs entry on live entity")
        .or_insert_with(PathFollowerComponent::default);
    follower.request(id, cfg.pathfinder.replan_cooldown_secs);

    Ok(())
}

