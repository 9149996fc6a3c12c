use serde::Deserialize;

#[derive(Deserialize)]
pub struct Config {
    pub simulation: Simulation,
    pub spatial: Spatial,
    pub grid: Grid,
    pub pathfinder: Pathfinder,
    pub harvester: Harvester,
    pub movement: Movement,
    pub input: Input,
    pub governor: Governor,
    pub advisor: Advisor,
}

#[derive(Deserialize)]
pub struct Simulation {
    pub random_seed: Option<u64>,
    pub spiral_of_death_max_steps: u32,
}

#[derive(Deserialize)]
pub struct Spatial {
    pub max_entities_per_node: usize,
    pub max_depth: u32,
    pub rebuild_threshold: f32,
}

#[derive(Deserialize)]
pub struct Grid {
    pub cell_size: f32,
}

#[derive(Deserialize)]
pub struct Pathfinder {
    pub cache_capacity: usize,
    pub tick_budget_micros: u64,
    pub max_expansions: u32,
    pub replan_cooldown_secs: f32,
}

#[derive(Deserialize)]
pub struct Harvester {
    pub capacity: u32,
    pub per_bail: u32,
    pub bail_interval_secs: f32,
}

#[derive(Deserialize)]
pub struct Movement {
    pub arrival_eps: f32,
    pub separation_radius_factor: f32,
    pub blocked_ticks_before_replan: u32,
}

#[derive(Deserialize)]
pub struct Input {
    pub drag_threshold_px: f32,
    pub pinch_threshold_px: f32,
}

#[derive(Deserialize)]
pub struct Governor {
    pub input_budget_micros: u64,
    pub commands_budget_micros: u64,
    pub pathfinding_budget_micros: u64,
    pub movement_budget_micros: u64,
    pub ai_economy_budget_micros: u64,
    pub spatial_update_budget_micros: u64,
    pub sustained_exhaustion_threshold: u32,
}

#[derive(Deserialize)]
pub struct Advisor {
    pub timeout_ms: u64,
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_reset_secs: u64,
}
