use ahash::AHashSet;
use common::*;

use crate::ecs::*;
use crate::event::{EventQueue, SimEvent};
use crate::spatial::{Aabb, Spatial};
use crate::{ColliderComponent, TransformComponent};

/// `(is_selected, team_id, priority)` (§3 "Selectable"). Priority breaks ties when several
/// colliders overlap under the cursor (§4.6).
#[derive(Debug, Clone, Copy, Component, EcsComponent)]
#[storage(VecStorage)]
#[name("selectable")]
pub struct SelectableComponent {
    pub is_selected: bool,
    pub team_id: u32,
    pub priority: i32,
}

impl SelectableComponent {
    pub fn new(team_id: u32, priority: i32) -> Self {
        Self {
            is_selected: false,
            team_id,
            priority,
        }
    }
}

/// How a new set of hits combines with the existing selection (§4.6).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SelectionModifier {
    /// Plain tap: replaces the selection.
    Replace,
    /// `shift`: adds to the selection.
    Add,
    /// `ctrl`/`cmd`: toggles membership.
    Toggle,
}

/// Process-wide selection state (§4.6 "Selection is a process-wide state").
#[derive(Default)]
pub struct Selection {
    current: AHashSet<Entity>,
}

impl Selection {
    pub fn contains(&self, id: Entity) -> bool {
        self.current.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Stable (sorted by entity id) view, so replay comparisons and UI iteration are deterministic.
    pub fn iter_sorted(&self) -> Vec<Entity> {
        let mut v: Vec<_> = self.current.iter().copied().collect();
        v.sort_by_key(|e| e.id());
        v
    }

    /// Applies `hits` to the current selection per `modifier`, returning whether anything changed.
    pub fn apply(&mut self, hits: &[Entity], modifier: SelectionModifier) -> bool {
        let before: AHashSet<Entity> = self.current.clone();

        match modifier {
            SelectionModifier::Replace => {
                self.current.clear();
                self.current.extend(hits.iter().copied());
            }
            SelectionModifier::Add => {
                self.current.extend(hits.iter().copied());
            }
            SelectionModifier::Toggle => {
                for &id in hits {
                    if !self.current.remove(&id) {
                        self.current.insert(id);
                    }
                }
            }
        }

        before != self.current
    }
}

/// Returns the topmost selectable entity whose collider contains `world_pt`: ties are broken by
/// descending [SelectableComponent::priority], then descending `y`, then ascending entity id
/// (§4.6, §8 "Selection stability").
pub fn hit_test(
    world_pt: Point2,
    spatial: &Spatial,
    transforms: &ReadStorage<TransformComponent>,
    colliders: &ReadStorage<ColliderComponent>,
    selectables: &ReadStorage<SelectableComponent>,
) -> Option<Entity> {
    // a small radius query bounds the candidate set via the spatial index (§4.6 "funneling
    // through the spatial index"); colliders are typically far smaller than this
    const PROBE_RADIUS: f32 = 64.0;

    let candidates = spatial.query_radius(world_pt, PROBE_RADIUS);
    let mut best: Option<(Entity, i32, f32)> = None;

    for id in candidates {
        let raw: specs::Entity = id.into();
        let (transform, collider, selectable) = match (
            transforms.get(raw),
            colliders.get(raw),
            selectables.get(raw),
        ) {
            (Some(t), Some(c), Some(s)) => (t, c, s),
            _ => continue,
        };

        if !collider.contains_point(transform.position(), world_pt) {
            continue;
        }

        let candidate = (id, selectable.priority, transform.y);
        best = match best {
            None => Some(candidate),
            Some((best_id, best_prio, best_y)) => {
                let better = candidate.1 > best_prio
                    || (candidate.1 == best_prio && candidate.2 > best_y)
                    || (candidate.1 == best_prio && candidate.2 == best_y && candidate.0.id() < best_id.id());
                if better {
                    Some(candidate)
                } else {
                    Some((best_id, best_prio, best_y))
                }
            }
        };
    }

    best.map(|(id, _, _)| id)
}

/// All entities whose collider intersects `rect`, filtered to those selectable on `team` (§4.6
/// "drag_box", §9.1 open-question decision: partial overlap selects).
pub fn drag_box(
    rect: Aabb,
    team: u32,
    spatial: &Spatial,
    transforms: &ReadStorage<TransformComponent>,
    colliders: &ReadStorage<ColliderComponent>,
    selectables: &ReadStorage<SelectableComponent>,
) -> Vec<Entity> {
    spatial
        .query_rect(rect)
        .into_iter()
        .filter(|&id| {
            let raw: specs::Entity = id.into();
            match (transforms.get(raw), colliders.get(raw), selectables.get(raw)) {
                (Some(t), Some(c), Some(s)) => {
                    s.team_id == team && c.derive_aabb(t.position()).intersects(&rect)
                }
                _ => false,
            }
        })
        .collect()
}

/// Mutates [Selection] and [SelectableComponent::is_selected] to match, emitting
/// `SelectionChanged` on change (§4.6, §6).
pub fn set_selection(
    selection: &mut Selection,
    entities: &EntitiesRes,
    selectables: &mut WriteStorage<SelectableComponent>,
    events: &mut EventQueue,
    hits: &[Entity],
    modifier: SelectionModifier,
) {
    let changed = selection.apply(hits, modifier);
    if !changed {
        return;
    }

    for (e, s) in (entities, &mut *selectables).join() {
        s.is_selected = selection.contains(e.into());
    }

    events.push(SimEvent::SelectionChanged);
}

#[cfg(test)]
mod tests {
    use super::*;
    use specs::WorldExt;

    #[test]
    fn selection_replace_add_toggle() {
        let mut sel = Selection::default();
        let mut world = specs::World::new();
        let e1: Entity = world.create_entity().build().into();
        let e2: Entity = world.create_entity().build().into();

        assert!(sel.apply(&[e1], SelectionModifier::Replace));
        assert!(sel.contains(e1));

        assert!(sel.apply(&[e2], SelectionModifier::Add));
        assert!(sel.contains(e1) && sel.contains(e2));

        assert!(sel.apply(&[e1], SelectionModifier::Toggle));
        assert!(!sel.contains(e1) && sel.contains(e2));

        // replacing with the same set is a no-op
        assert!(!sel.apply(&[e2], SelectionModifier::Replace));
    }
}
