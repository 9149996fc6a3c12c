use crate::ecs::Entity;

/// Events the core emits for the game shell/UI to subscribe to (§6 "Game shell / UI").
#[derive(Debug, Clone)]
pub enum SimEvent {
    SelectionChanged,
    CommandIssued { entity: Entity },
    BuildingPlaced { footprint: Vec<(i32, i32)> },
    BuildingDestroyed { footprint: Vec<(i32, i32)> },
    ResourceNodeDepleted { node: Entity },
    EconomyChanged { team: u32, credits: u32 },
    PerformanceDegraded { phase: &'static str, exhaustion_count: u32 },
    /// "Cannot comply" failure surfaced as an event rather than an error code (§7).
    CannotComply { entity: Entity },
    NavigationTargetReached { entity: Entity },
    Slowdown { discarded_secs: f32 },
}

/// Drains into the host each frame; never read mid-tick by simulation systems themselves (§5).
#[derive(Default)]
pub struct EventQueue {
    events: Vec<SimEvent>,
}

impl EventQueue {
    pub fn push(&mut self, event: SimEvent) {
        self.events.push(event);
    }

    /// Takes every event queued since the last drain, in emission order.
    pub fn drain(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
