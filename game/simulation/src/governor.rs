use std::time::Duration;

use common::*;

use crate::event::{EventQueue, SimEvent};

/// The ordered tick phases the governor tracks budgets for (§4.11).
#[derive(Debug, Clone, Copy, Eq, PartialEq, strum::EnumIter)]
pub enum Phase {
    Input,
    Commands,
    Pathfinding,
    Movement,
    AiEconomy,
    SpatialUpdate,
}

impl Phase {
    fn name(self) -> &'static str {
        match self {
            Phase::Input => "input",
            Phase::Commands => "commands",
            Phase::Pathfinding => "pathfinding",
            Phase::Movement => "movement",
            Phase::AiEconomy => "ai_economy",
            Phase::SpatialUpdate => "spatial_update",
        }
    }

    fn budget(self, cfg: &config::Config) -> Duration {
        let micros = match self {
            Phase::Input => cfg.governor.input_budget_micros,
            Phase::Commands => cfg.governor.commands_budget_micros,
            Phase::Pathfinding => cfg.governor.pathfinding_budget_micros,
            Phase::Movement => cfg.governor.movement_budget_micros,
            Phase::AiEconomy => cfg.governor.ai_economy_budget_micros,
            Phase::SpatialUpdate => cfg.governor.spatial_update_budget_micros,
        };
        Duration::from_micros(micros)
    }
}

#[derive(Default, Copy, Clone)]
struct PhaseState {
    consecutive_exhaustions: u32,
    degraded_reported: bool,
}

/// Tracks per-phase time budgets and raises [SimEvent::PerformanceDegraded] on sustained
/// exhaustion (§4.11, §7 "resource exhaustion").
#[derive(Default)]
pub struct PerformanceGovernor {
    input: PhaseState,
    commands: PhaseState,
    pathfinding: PhaseState,
    movement: PhaseState,
    ai_economy: PhaseState,
    spatial_update: PhaseState,
}

impl PerformanceGovernor {
    fn state_mut(&mut self, phase: Phase) -> &mut PhaseState {
        match phase {
            Phase::Input => &mut self.input,
            Phase::Commands => &mut self.commands,
            Phase::Pathfinding => &mut self.pathfinding,
            Phase::Movement => &mut self.movement,
            Phase::AiEconomy => &mut self.ai_economy,
            Phase::SpatialUpdate => &mut self.spatial_update,
        }
    }

    /// Records how long `phase` took this tick, comparing against its configured budget.
    pub fn record(&mut self, phase: Phase, elapsed: Duration, events: &mut EventQueue) {
        let cfg = config::get();
        let budget = phase.budget(&cfg);
        let threshold = cfg.governor.sustained_exhaustion_threshold;

        let state = self.state_mut(phase);
        if elapsed > budget {
            state.consecutive_exhaustions += 1;
            if state.consecutive_exhaustions >= threshold && !state.degraded_reported {
                state.degraded_reported = true;
                events.push(SimEvent::PerformanceDegraded {
                    phase: phase.name(),
                    exhaustion_count: state.consecutive_exhaustions,
                });
            }
        } else {
            state.consecutive_exhaustions = 0;
            state.degraded_reported = false;
        }
    }

    pub fn exhaustion_count(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Input => self.input.consecutive_exhaustions,
            Phase::Commands => self.commands.consecutive_exhaustions,
            Phase::Pathfinding => self.pathfinding.consecutive_exhaustions,
            Phase::Movement => self.movement.consecutive_exhaustions,
            Phase::AiEconomy => self.ai_economy.consecutive_exhaustions,
            Phase::SpatialUpdate => self.spatial_update.consecutive_exhaustions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhaustion_resets_on_a_fast_tick() {
        config::init_for_testing();
        let mut gov = PerformanceGovernor::default();
        let mut events = EventQueue::default();
        gov.record(Phase::Movement, Duration::from_secs(10), &mut events);
        assert_eq!(gov.exhaustion_count(Phase::Movement), 1);
        gov.record(Phase::Movement, Duration::from_micros(1), &mut events);
        assert_eq!(gov.exhaustion_count(Phase::Movement), 0);
    }

    #[test]
    fn sustained_exhaustion_emits_one_degraded_event() {
        config::init_for_testing();
        let mut gov = PerformanceGovernor::default();
        let mut events = EventQueue::default();
        let threshold = config::get().governor.sustained_exhaustion_threshold;

        for _ in 0..threshold + 3 {
            gov.record(Phase::Pathfinding, Duration::from_secs(10), &mut events);
        }

        let drained = events.drain();
        let degraded: Vec<_> = drained
            .iter()
            .filter(|e| matches!(e, SimEvent::PerformanceDegraded { .. }))
            .collect();
        assert_eq!(degraded.len(), 1);
    }
}
