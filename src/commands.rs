use crate::actor;
use crate::callbacks::{DeferredAction, DeferredCallbacks, DeferredEntry};
use crate::combat;
use crate::interaction;
use crate::map::{self, GameMap};
use crate::skill;
use crate::time::SimClock;
use bevy_ecs::prelude::*;

/// Work a system wants done against the whole world. Systems only queue;
/// the frame loop applies the queue after the schedule has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimCommand {
    Attack { attacker: Entity },
    Interact { user: Entity, target: Entity },
    ProjectileHit { projectile: Entity, target: Entity },
    DespawnProjectile { projectile: Entity },
}

#[derive(Resource, Debug, Default)]
pub struct CommandQueue {
    pending: Vec<SimCommand>,
}

impl CommandQueue {
    pub fn push(&mut self, command: SimCommand) {
        self.pending.push(command);
    }

    pub fn drain(&mut self) -> Vec<SimCommand> {
        std::mem::take(&mut self.pending)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

fn exists(world: &World, entity: Entity) -> bool {
    world.get_entity(entity).is_ok()
}

pub fn apply(world: &mut World, command: SimCommand) {
    match command {
        SimCommand::Attack { attacker } if exists(world, attacker) => {
            combat::attack(world, attacker);
        }
        SimCommand::Interact { user, target } if exists(world, user) && exists(world, target) => {
            interaction::on_interact(world, user, target);
        }
        SimCommand::ProjectileHit { projectile, target } if exists(world, projectile) && exists(world, target) => {
            combat::projectile_hit(world, projectile, target);
        }
        SimCommand::DespawnProjectile { projectile } if exists(world, projectile) => {
            map::remove_dynamic_actor(world, projectile);
        }
        other => log::debug!("[commands] dropped {other:?}, an entity is gone"),
    }
}

/// Applies queued commands until the queue stays empty; a command may queue
/// follow-up work.
pub fn apply_queued(world: &mut World) -> usize {
    let mut applied = 0;
    loop {
        let batch = world.resource_mut::<CommandQueue>().drain();
        if batch.is_empty() {
            return applied;
        }
        applied += batch.len();
        for command in batch {
            apply(world, command);
        }
    }
}

pub fn run_deferred(world: &mut World, entry: DeferredEntry) {
    let owner = entry.owner;
    if !exists(world, owner) {
        return;
    }
    match entry.action {
        DeferredAction::RevertSkill { skill } => {
            skill::revert_skill(world, owner, skill);
        }
        DeferredAction::MeleeHit => {
            combat::melee_hit(world, owner);
        }
        DeferredAction::RemoveFromMap => {
            if world.resource::<GameMap>().contains(owner) {
                map::remove_dynamic_actor(world, owner);
            } else {
                actor::remove_from_map(world, owner);
            }
        }
    }
}

/// Runs every callback whose deadline has been reached, in registration order.
pub fn run_due_callbacks(world: &mut World) -> usize {
    let clock = *world.resource::<SimClock>();
    let due = world.resource_mut::<DeferredCallbacks>().drain_due(&clock);
    let count = due.len();
    for entry in due {
        run_deferred(world, entry);
    }
    count
}
