use common::*;

use crate::ecs::*;
use crate::event::EventQueue;
use crate::spatial::Spatial;
use crate::{ColliderComponent, TransformComponent};

/// Periodically compares live-entity counts against the spatial index size; divergence flags a
/// bug rather than being silently tolerated (§4.12 "leak detector").
pub struct MemoryAudit {
    period_ticks: u64,
}

impl MemoryAudit {
    pub fn new(period_ticks: u64) -> Self {
        Self { period_ticks }
    }
}

impl Default for MemoryAudit {
    fn default() -> Self {
        Self::new(crate::time::TICKS_PER_SECOND as u64)
    }
}

/// Runs [MemoryAudit] once per `period_ticks`; any mismatch between the live `Transform`+
/// `Collider` population and [Spatial]'s tracked count is a bug, not a recoverable condition
/// (§4.12, §7 "invariant violation").
pub struct MemoryAuditSystem;

impl<'a> System<'a> for MemoryAuditSystem {
    type SystemData = (
        Read<'a, EntitiesRes>,
        ReadStorage<'a, TransformComponent>,
        ReadStorage<'a, ColliderComponent>,
        ReadExpect<'a, Spatial>,
        ReadExpect<'a, MemoryAudit>,
        Read<'a, crate::time::Tick>,
        Write<'a, EventQueue>,
    );

    fn run(&mut self, (entities, transforms, colliders, spatial, audit, tick, _events): Self::SystemData) {
        if audit.period_ticks == 0 || tick.value() % audit.period_ticks != 0 {
            return;
        }

        let live = (&entities, &transforms, &colliders).join().count();
        let tracked = spatial.tree().len();

        if live != tracked {
            // a bug, not a transient condition: the spatial system keeps itself in sync with
            // Transform+Collider every tick, so any divergence here outlived a full tick
            my_error!(
                "memory audit: {live} live entities but spatial index tracks {tracked}",
                live = live,
                tracked = tracked,
            );
            debug_assert_eq!(live, tracked, "spatial index diverged from live entity count");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_disabled_with_zero_period() {
        let audit = MemoryAudit::new(0);
        assert_eq!(audit.period_ticks, 0);
    }
}
