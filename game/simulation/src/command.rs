use std::collections::VecDeque;

use common::*;

use crate::ecs::*;
use crate::event::{EventQueue, SimEvent};
use crate::grid::Grid;
use crate::harvester::HarvesterComponent;
use crate::path::{request_path, Cell, PathFollowerComponent, PathRequestQueue};
use crate::TransformComponent;

/// Maximum depth of a unit's command queue; overflow drops the oldest entry (§3 invariant 3).
pub const MAX_COMMAND_QUEUE: usize = 32;

/// A gameplay intent issued to a single unit (§3 "Commandable").
#[derive(Debug, Clone, Copy)]
pub enum Intent {
    Move { goal: Cell },
    Attack { target: Entity },
    Harvest { node: Entity },
    Stop,
    Hold,
    Patrol { a: Cell, b: Cell },
}

/// Whether a new intent overrides the current queue or appends to it (§4.7).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CommandModifier {
    /// Plain issue: clears the queue first.
    Override,
    /// `shift`-issue: appends.
    Queue,
}

/// Bounded FIFO of intents for a unit (§3 "Commandable", GLOSSARY "Commandable queue").
#[derive(Default, Component, EcsComponent)]
#[storage(VecStorage)]
#[name("commandable")]
pub struct CommandableComponent {
    queue: VecDeque<Intent>,
}

impl CommandableComponent {
    pub fn push(&mut self, intent: Intent, modifier: CommandModifier) {
        if modifier == CommandModifier::Override {
            self.queue.clear();
        }

        if self.queue.len() >= MAX_COMMAND_QUEUE {
            self.queue.pop_front();
        }
        self.queue.push_back(intent);
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn head(&self) -> Option<Intent> {
        self.queue.front().copied()
    }

    pub fn advance(&mut self) -> Option<Intent> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

pub struct CommandIssuer<'a> {
    pub entities: &'a EntitiesRes,
    pub transforms: &'a ReadStorage<'a, TransformComponent>,
    pub commandables: &'a mut WriteStorage<'a, CommandableComponent>,
    pub followers: &'a mut WriteStorage<'a, PathFollowerComponent>,
    pub grid: &'a Grid,
    pub path_queue: &'a mut PathRequestQueue,
    pub events: &'a mut EventQueue,
}

impl<'a> CommandIssuer<'a> {
    fn enqueue(&mut self, entity: Entity, intent: Intent, modifier: CommandModifier) {
        let raw: specs::Entity = entity.into();
        if !self.entities.is_alive(raw) {
            return;
        }
        let commandable = self
            .commandables
            .entry(raw)
            .expect("specs entry on live entity")
            .or_insert_with(CommandableComponent::default);
        commandable.push(intent, modifier);
        self.events.push(SimEvent::CommandIssued { entity });
    }

    /// For each unit: resolve the cell of `world_pt`, request a path, enqueue a `Move` intent
    /// (§4.7).
    pub fn issue_move(&mut self, selection: &[Entity], world_pt: Point2, modifier: CommandModifier) {
        let goal = self.grid.world_to_cell(world_pt.x, world_pt.y);
        for &entity in selection {
            self.enqueue(entity, Intent::Move { goal }, modifier);
            let _ = request_path(
                self.entities,
                self.transforms,
                self.followers,
                self.grid,
                self.path_queue,
                entity,
                goal,
                true,
            );
        }
    }

    pub fn issue_attack(&mut self, selection: &[Entity], target: Entity, modifier: CommandModifier) {
        for &entity in selection {
            self.enqueue(entity, Intent::Attack { target }, modifier);
        }
    }

    pub fn issue_harvest(&mut self, selection: &[Entity], node: Entity, modifier: CommandModifier) {
        for &entity in selection {
            self.enqueue(entity, Intent::Harvest { node }, modifier);
        }
    }

    pub fn issue_stop(&mut self, selection: &[Entity]) {
        for &entity in selection {
            let raw: specs::Entity = entity.into();
            if let Some(commandable) = self.commandables.get_mut(raw) {
                commandable.clear();
            }
            if let Some(follower) = self.followers.get_mut(raw) {
                follower.clear();
            }
            self.enqueue(entity, Intent::Stop, CommandModifier::Override);
        }
    }

    pub fn issue_hold(&mut self, selection: &[Entity]) {
        for &entity in selection {
            self.enqueue(entity, Intent::Hold, CommandModifier::Override);
        }
    }

    pub fn issue_patrol(&mut self, selection: &[Entity], a: Cell, b: Cell, modifier: CommandModifier) {
        for &entity in selection {
            self.enqueue(entity, Intent::Patrol { a, b }, modifier);
        }
    }

    /// Fans out a contextual command issued on a target: harvesters receive `harvest` when the
    /// target is a resource node, everything else receives `attack` (§4.7 "mixed roles fan out").
    pub fn issue_contextual(
        &mut self,
        selection: &[Entity],
        target: Entity,
        target_is_resource_node: bool,
        harvesters: &ReadStorage<HarvesterComponent>,
        modifier: CommandModifier,
    ) {
        for &entity in selection {
            let raw: specs::Entity = entity.into();
            let intent = if target_is_resource_node && harvesters.contains(raw) {
                Intent::Harvest { node: target }
            } else {
                Intent::Attack { target }
            };
            self.enqueue(entity, intent, modifier);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_overflow_drops_oldest() {
        let mut c = CommandableComponent::default();
        for i in 0..(MAX_COMMAND_QUEUE + 5) {
            c.push(Intent::Move { goal: (i as i32, 0) }, CommandModifier::Queue);
        }
        assert_eq!(c.len(), MAX_COMMAND_QUEUE);
        match c.head() {
            Some(Intent::Move { goal }) => assert_eq!(goal.0, 5),
            _ => panic!("expected a move intent"),
        }
    }

    #[test]
    fn override_modifier_clears_queue() {
        let mut c = CommandableComponent::default();
        c.push(Intent::Hold, CommandModifier::Queue);
        c.push(Intent::Stop, CommandModifier::Queue);
        c.push(Intent::Move { goal: (1, 1) }, CommandModifier::Override);
        assert_eq!(c.len(), 1);
    }
}
