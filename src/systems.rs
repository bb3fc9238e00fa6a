use crate::actor::{DynamicActor, Projectile, Transform, Velocity};
use crate::character::{apply_jump, apply_move, Character, CharacterProfile, DerivedStats, Equipment, MovementIntent};
use crate::commands::{CommandQueue, SimCommand};
use crate::events::{EventBus, GameEvent};
use crate::interaction::will_interact_on_contact;
use crate::physics::{Category, ContactEvent, ContactPhase, PhysicsWorld};
use crate::time::SimClock;
use bevy_ecs::prelude::*;

pub fn sys_step_physics(clock: Res<SimClock>, mut physics: ResMut<PhysicsWorld>) {
    physics.step(clock.delta_seconds());
}

pub fn sys_sync_transforms(
    physics: Res<PhysicsWorld>,
    mut query: Query<(&DynamicActor, &mut Transform, Option<&mut Velocity>)>,
) {
    for (actor, mut transform, velocity) in &mut query {
        let Some(body) = actor.body() else {
            continue;
        };
        if let Some(position) = physics.body_position_px(body) {
            transform.translation = position;
        }
        if let (Some(mut velocity), Some(linvel)) = (velocity, physics.linvel(body)) {
            velocity.0 = linvel;
        }
    }
}

/// Dispatches drained contacts: feet landing and interaction prompts, weapon
/// reach tracking, projectile hits. Anything that touches more than the two
/// fixtures involved is queued as a `SimCommand`.
pub fn sys_process_contacts(
    mut physics: ResMut<PhysicsWorld>,
    mut events: ResMut<EventBus>,
    mut commands: ResMut<CommandQueue>,
    mut characters: Query<&mut Character>,
    actors: Query<&DynamicActor>,
    projectiles: Query<&Projectile>,
) {
    for contact in physics.drain_contacts() {
        if let (Some(a), Some(b)) = (contact.a.actor, contact.b.actor) {
            if a != b {
                events.push(match contact.phase {
                    ContactPhase::Began => GameEvent::contact_began(a, b),
                    ContactPhase::Ended => GameEvent::contact_ended(a, b),
                });
            }
        }
        if contact.split(Category::FEET).is_some() {
            handle_feet(&contact, &mut characters, &actors, &mut commands);
        } else if contact.split(Category::WEAPON).is_some() {
            handle_weapon(&contact, &mut characters);
        } else if contact.split(Category::PROJECTILE).is_some() {
            handle_projectile(&contact, &projectiles, &mut commands);
        }
    }
}

fn handle_feet(
    contact: &ContactEvent,
    characters: &mut Query<&mut Character>,
    actors: &Query<&DynamicActor>,
    commands: &mut CommandQueue,
) {
    let Some((feet, other)) = contact.split(Category::FEET) else {
        return;
    };
    let Some(owner) = feet.actor else {
        return;
    };
    let Ok(mut character) = characters.get_mut(owner) else {
        return;
    };
    if other.category.is_walkable() {
        match contact.phase {
            ContactPhase::Began => character.land(),
            ContactPhase::Ended => character.leave_ground(),
        }
        return;
    }
    if !other.category.intersects(Category::INTERACTABLE_OBJECT) {
        return;
    }
    let Some(target) = other.actor.filter(|t| *t != owner) else {
        return;
    };
    match contact.phase {
        ContactPhase::Began => {
            character.interactable_target = Some(target);
            let triggers = actors.get(target).is_ok_and(|actor| will_interact_on_contact(actor.kind));
            if triggers && !character.killed {
                commands.push(SimCommand::Interact { user: owner, target });
            }
        }
        ContactPhase::Ended => {
            if character.interactable_target == Some(target) {
                character.interactable_target = None;
            }
        }
    }
}

fn handle_weapon(contact: &ContactEvent, characters: &mut Query<&mut Character>) {
    let Some((weapon, other)) = contact.split(Category::WEAPON) else {
        return;
    };
    let (Some(attacker), Some(target)) = (weapon.actor, other.actor) else {
        return;
    };
    if attacker == target || !other.category.intersects(Category::CHARACTER_BODY) {
        return;
    }
    if let Ok(mut character) = characters.get_mut(attacker) {
        match contact.phase {
            ContactPhase::Began => character.add_in_range_target(target),
            ContactPhase::Ended => character.remove_in_range_target(target),
        }
    }
}

fn handle_projectile(contact: &ContactEvent, projectiles: &Query<&Projectile>, commands: &mut CommandQueue) {
    if contact.phase != ContactPhase::Began {
        return;
    }
    let Some((missile, other)) = contact.split(Category::PROJECTILE) else {
        return;
    };
    let Some(projectile) = missile.actor else {
        return;
    };
    let Ok(state) = projectiles.get(projectile) else {
        return;
    };
    if state.spent {
        return;
    }
    if other.category.intersects(Category::CHARACTER_BODY) {
        if let Some(target) = other.actor.filter(|t| *t != state.owner) {
            commands.push(SimCommand::ProjectileHit { projectile, target });
        }
    } else if other.category.intersects(Category::WALL | Category::GROUND) {
        commands.push(SimCommand::DespawnProjectile { projectile });
    }
}

/// Applies each character's intent to its body. Velocity is only written
/// while there is horizontal intent, so friction and skill impulses are left
/// alone otherwise.
pub fn sys_apply_movement_intents(
    mut physics: ResMut<PhysicsWorld>,
    mut query: Query<(&mut Character, &CharacterProfile, Option<&Equipment>, &mut MovementIntent, &DynamicActor)>,
) {
    for (mut character, profile, equipment, mut intent, actor) in &mut query {
        let Some(body) = actor.body() else {
            continue;
        };
        if character.killed {
            *intent = MovementIntent::default();
            continue;
        }
        character.crouching = intent.crouch;
        let stats = DerivedStats::compute(profile, equipment);
        if intent.horizontal != 0.0 {
            apply_move(&mut character, &mut physics, body, stats.move_speed, intent.horizontal);
        }
        if let Some(face_right) = intent.face_right.take() {
            character.facing_right = face_right;
        }
        if std::mem::take(&mut intent.jump) {
            apply_jump(&mut character, &mut physics, body, stats.jump_height);
        }
        // A landing that happened before the jump flag was raised.
        let falling = physics.linvel(body).is_some_and(|v| v.y <= 0.0);
        if character.jumping && character.ground_contacts > 0 && falling {
            character.jumping = false;
        }
    }
}

pub fn sys_tick_projectiles(
    clock: Res<SimClock>,
    mut commands: ResMut<CommandQueue>,
    mut query: Query<(Entity, &mut Projectile, &DynamicActor)>,
) {
    let delta = clock.delta_seconds();
    for (entity, mut projectile, actor) in &mut query {
        if !actor.is_shown() || projectile.spent {
            continue;
        }
        projectile.remaining_lifetime -= delta;
        if projectile.remaining_lifetime <= 0.0 {
            commands.push(SimCommand::DespawnProjectile { projectile: entity });
        }
    }
}
