use ahash::AHashMap;
use common::*;

use crate::ecs::*;
use crate::event::{EventQueue, SimEvent};
use crate::grid::Grid;
use crate::path::{request_path, Cell, PathFollowerComponent, PathRequestQueue};
use crate::time::Tick;
use crate::TransformComponent;

/// A harvestable deposit (§3 "ResourceNode").
#[derive(Debug, Clone, Copy, Component, EcsComponent)]
#[storage(VecStorage)]
#[name("resource-node")]
pub struct ResourceNodeComponent {
    pub remaining: u32,
    pub depleted: bool,
    pub harvest_cell: Cell,
}

impl ResourceNodeComponent {
    pub fn new(remaining: u32, harvest_cell: Cell) -> Self {
        Self {
            remaining,
            depleted: remaining == 0,
            harvest_cell,
        }
    }
}

/// A building that accepts harvester loads and converts them to credits (GLOSSARY "Refinery").
#[derive(Debug, Clone, Copy, Component, EcsComponent)]
#[storage(VecStorage)]
#[name("refinery")]
pub struct RefineryComponent {
    pub team_id: u32,
    pub docking_cell: Cell,
}

/// Per-team credit balance (§4.8 "Resource accounting"). A named resource rather than a singleton
/// component, per the "global mutable state" design note (§9).
#[derive(Default)]
pub struct Economies {
    credits: AHashMap<u32, u32>,
}

impl Economies {
    pub fn credits(&self, team: u32) -> u32 {
        self.credits.get(&team).copied().unwrap_or(0)
    }

    /// Credits are never negative; this only ever adds (invariant 4, §4.8).
    pub fn add_credits(&mut self, team: u32, amount: u32) {
        *self.credits.entry(team).or_insert(0) += amount;
    }
}

/// §4.8 Harvester/Economy finite state machine.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum HarvesterState {
    Idle,
    SeekingResource,
    Harvesting,
    ReturningToRefinery,
    Unloading,
}

#[derive(Debug, Clone, Copy, Component, EcsComponent)]
#[storage(VecStorage)]
#[name("harvester")]
pub struct HarvesterComponent {
    pub team_id: u32,
    pub state: HarvesterState,
    pub load: u32,
    pub capacity: u32,
    pub per_bail: u32,
    pub bail_interval_secs: f32,
    bail_timer: f32,
    target_node: Option<Entity>,
    target_refinery: Option<Entity>,
}

impl HarvesterComponent {
    pub fn new(team_id: u32) -> Self {
        let cfg = config::get();
        Self {
            team_id,
            state: HarvesterState::Idle,
            load: 0,
            capacity: cfg.harvester.capacity,
            per_bail: cfg.harvester.per_bail,
            bail_interval_secs: cfg.harvester.bail_interval_secs,
            bail_timer: 0.0,
            target_node: None,
            target_refinery: None,
        }
    }
}

fn arrived(transform: &TransformComponent, grid: &Grid, cell: Cell, follower: Option<&PathFollowerComponent>) -> bool {
    if let Some(f) = follower {
        if f.is_pending() || f.has_path() {
            return false;
        }
    }
    let (cx, cy) = grid.cell_center(cell.0, cell.1);
    let dx = transform.x - cx;
    let dy = transform.y - cy;
    let half_cell = grid.cell_size() * 0.75;
    dx * dx + dy * dy <= half_cell * half_cell
}

/// Deterministic tie-break: nearest by squared distance, then lowest entity id (§4.8).
fn nearest_by_distance<'a, I: Iterator<Item = (Entity, f32)>>(candidates: I) -> Option<Entity> {
    let mut best: Option<(Entity, f32)> = None;
    for (id, dist2) in candidates {
        best = match best {
            None => Some((id, dist2)),
            Some((best_id, best_dist)) => {
                if dist2 < best_dist || (dist2 == best_dist && id.id() < best_id.id()) {
                    Some((id, dist2))
                } else {
                    Some((best_id, best_dist))
                }
            }
        };
    }
    best.map(|(id, _)| id)
}

/// Drives every [HarvesterComponent] through its FSM each tick (§4.8).
pub struct HarvesterSystem;

impl<'a> System<'a> for HarvesterSystem {
    type SystemData = (
        Read<'a, EntitiesRes>,
        WriteStorage<'a, HarvesterComponent>,
        WriteStorage<'a, ResourceNodeComponent>,
        ReadStorage<'a, RefineryComponent>,
        ReadStorage<'a, TransformComponent>,
        WriteStorage<'a, PathFollowerComponent>,
        ReadExpect<'a, Grid>,
        Write<'a, PathRequestQueue>,
        Write<'a, Economies>,
        Write<'a, EventQueue>,
        Read<'a, Tick>,
    );

    fn run(
        &mut self,
        (
            entities,
            mut harvesters,
            mut nodes,
            refineries,
            transforms,
            mut followers,
            grid,
            mut path_queue,
            mut economies,
            mut events,
            _tick,
        ): Self::SystemData,
    ) {
        let dt = crate::time::FIXED_DT;

        let harvester_ids: Vec<Entity> = (&entities, &harvesters).join().map(|(e, _)| e.into()).collect();

        for id in harvester_ids {
            let raw: specs::Entity = id.into();
            let team_id = harvesters.get(raw).unwrap().team_id;
            let state = harvesters.get(raw).unwrap().state;

            match state {
                HarvesterState::Idle => {
                    let candidates: Vec<(Entity, f32)> = (&entities, &nodes, &transforms)
                        .join()
                        .filter(|(_, node, _)| !node.depleted)
                        .map(|(e, _, _)| {
                            let node_id: Entity = e.into();
                            let node_transform = transforms.get(e).unwrap();
                            let my_pos = transforms.get(raw).map(|t| t.position());
                            let dist2 = my_pos
                                .map(|p| {
                                    let dx = node_transform.x - p.x;
                                    let dy = node_transform.y - p.y;
                                    dx * dx + dy * dy
                                })
                                .unwrap_or(f32::INFINITY);
                            (node_id, dist2)
                        })
                        .collect();

                    if let Some(node_id) = nearest_by_distance(candidates.into_iter()) {
                        let h = harvesters.get_mut(raw).unwrap();
                        h.target_node = Some(node_id);
                        h.state = HarvesterState::SeekingResource;

                        let node_raw: specs::Entity = node_id.into();
                        let harvest_cell = nodes.get(node_raw).unwrap().harvest_cell;
                        let _ = request_path(
                            &entities,
                            &transforms,
                            &mut followers,
                            &grid,
                            &mut path_queue,
                            id,
                            harvest_cell,
                            false,
                        );
                    }
                }

                HarvesterState::SeekingResource => {
                    let target_node = harvesters.get(raw).unwrap().target_node;
                    let node_id = match target_node {
                        Some(n) if entities.is_alive(n.into()) => n,
                        _ => {
                            harvesters.get_mut(raw).unwrap().state = HarvesterState::Idle;
                            continue;
                        }
                    };
                    let node_raw: specs::Entity = node_id.into();
                    let node = match nodes.get(node_raw) {
                        Some(n) => *n,
                        None => {
                            harvesters.get_mut(raw).unwrap().state = HarvesterState::Idle;
                            continue;
                        }
                    };
                    if node.depleted {
                        harvesters.get_mut(raw).unwrap().target_node = None;
                        harvesters.get_mut(raw).unwrap().state = HarvesterState::Idle;
                        continue;
                    }

                    let transform = *transforms.get(raw).unwrap();
                    let follower = followers.get(raw);
                    if arrived(&transform, &grid, node.harvest_cell, follower) {
                        let h = harvesters.get_mut(raw).unwrap();
                        h.state = HarvesterState::Harvesting;
                        h.bail_timer = 0.0;
                    }
                }

                HarvesterState::Harvesting => {
                    // work on an owned copy to avoid overlapping borrows of `harvesters`; written
                    // back at the end of the arm
                    let mut h = *harvesters.get(raw).unwrap();

                    if h.load >= h.capacity {
                        h.state = HarvesterState::ReturningToRefinery;
                        *harvesters.get_mut(raw).unwrap() = h;
                        continue;
                    }

                    let node_id = match h.target_node {
                        Some(n) => n,
                        None => {
                            h.state = HarvesterState::Idle;
                            *harvesters.get_mut(raw).unwrap() = h;
                            continue;
                        }
                    };
                    h.bail_timer += dt;

                    if h.bail_timer >= h.bail_interval_secs {
                        h.bail_timer -= h.bail_interval_secs;

                        let node_raw: specs::Entity = node_id.into();
                        if let Some(node) = nodes.get_mut(node_raw) {
                            let room = h.capacity - h.load;
                            let bailed = h.per_bail.min(room).min(node.remaining);
                            node.remaining -= bailed;
                            if node.remaining == 0 {
                                node.depleted = true;
                                events.push(SimEvent::ResourceNodeDepleted { node: node_id });
                            }

                            h.load += bailed;
                            if h.load >= h.capacity || node.depleted {
                                h.state = HarvesterState::ReturningToRefinery;
                            }
                        } else {
                            h.state = HarvesterState::ReturningToRefinery;
                        }
                    }

                    *harvesters.get_mut(raw).unwrap() = h;
                }

                HarvesterState::ReturningToRefinery => {
                    let refinery_target = harvesters.get(raw).unwrap().target_refinery;
                    let refinery_id = match refinery_target {
                        Some(r) if entities.is_alive(r.into()) => Some(r),
                        _ => {
                            let candidates: Vec<(Entity, f32)> = (&entities, &refineries, &transforms)
                                .join()
                                .filter(|(_, r, _)| r.team_id == team_id)
                                .map(|(e, _, t)| {
                                    let my_pos = transforms.get(raw).map(|t| t.position());
                                    let dist2 = my_pos
                                        .map(|p| {
                                            let dx = t.x - p.x;
                                            let dy = t.y - p.y;
                                            dx * dx + dy * dy
                                        })
                                        .unwrap_or(f32::INFINITY);
                                    (e.into(), dist2)
                                })
                                .collect();
                            nearest_by_distance(candidates.into_iter())
                        }
                    };

                    let refinery_id = match refinery_id {
                        Some(r) => r,
                        None => continue, // no refinery yet; try again next tick
                    };

                    let h = harvesters.get_mut(raw).unwrap();
                    let is_new_target = h.target_refinery != Some(refinery_id);
                    h.target_refinery = Some(refinery_id);

                    let refinery_raw: specs::Entity = refinery_id.into();
                    let docking_cell = refineries.get(refinery_raw).unwrap().docking_cell;

                    if is_new_target {
                        let _ = request_path(
                            &entities,
                            &transforms,
                            &mut followers,
                            &grid,
                            &mut path_queue,
                            id,
                            docking_cell,
                            false,
                        );
                    }

                    let transform = *transforms.get(raw).unwrap();
                    let follower = followers.get(raw);
                    if arrived(&transform, &grid, docking_cell, follower) {
                        let h = harvesters.get_mut(raw).unwrap();
                        h.state = HarvesterState::Unloading;
                        h.bail_timer = 0.0;
                    }
                }

                HarvesterState::Unloading => {
                    let h = harvesters.get_mut(raw).unwrap();
                    if h.load == 0 {
                        h.state = HarvesterState::SeekingResource;
                        h.target_node = None;
                        continue;
                    }

                    h.bail_timer += dt;
                    if h.bail_timer >= h.bail_interval_secs {
                        h.bail_timer -= h.bail_interval_secs;
                        let bailed = h.per_bail.min(h.load);
                        h.load -= bailed;
                        economies.add_credits(team_id, bailed);
                        events.push(SimEvent::EconomyChanged {
                            team: team_id,
                            credits: economies.credits(team_id),
                        });

                        if h.load == 0 {
                            h.state = HarvesterState::SeekingResource;
                            h.target_node = None;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn economies_never_go_negative_and_only_accumulate() {
        let mut econ = Economies::default();
        assert_eq!(econ.credits(1), 0);
        econ.add_credits(1, 25);
        econ.add_credits(1, 25);
        assert_eq!(econ.credits(1), 50);
        assert_eq!(econ.credits(2), 0);
    }

    #[test]
    fn load_at_capacity_forces_return_next_tick() {
        config::init_for_testing();
        let cfg = config::get();
        let mut h = HarvesterComponent::new(0);
        h.load = cfg.harvester.capacity;
        h.state = HarvesterState::Harvesting;
        // mirrors the top-of-match capacity check in HarvesterSystem::run
        if h.load >= h.capacity {
            h.state = HarvesterState::ReturningToRefinery;
        }
        assert_eq!(h.state, HarvesterState::ReturningToRefinery);
    }
}
