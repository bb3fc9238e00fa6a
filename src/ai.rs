use crate::actor::{position_of, ContentId, DynamicActor, Transform};
use crate::character::{Character, CharacterProfile, Disposition, MovementIntent, NpcBrain, NpcProfile, NpcState};
use crate::combat::faction;
use crate::commands::{CommandQueue, SimCommand};
use crate::config::NpcConfig;
use crate::party::{self, Party, PartyMembership};
use crate::spawn::SpawnRegistry;
use crate::time::SimClock;
use crate::world::SimRng;
use bevy_ecs::prelude::*;

/// Horizontal intent that closes the gap to `target_x` until within
/// `stop_distance`.
pub fn move_to_target(self_x: f32, target_x: f32, stop_distance: f32) -> f32 {
    let dx = target_x - self_x;
    if dx.abs() <= stop_distance {
        0.0
    } else {
        dx.signum()
    }
}

/// Picks a replacement lock-on target after `killed` died. Keeps the current
/// target when it is still someone else; otherwise the nearest living member
/// of the killed character's party.
pub fn find_new_locked_on_target_from_party(world: &mut World, npc: Entity, killed: Entity) -> Option<Entity> {
    let roster = party_roster(world, killed);
    retarget_from_roster(world, npc, killed, &roster)
}

/// Leader and members of the party `entity` belongs to or leads. Empty for
/// characters outside any party.
pub fn party_roster(world: &World, entity: Entity) -> Vec<Entity> {
    let leader = match party::leader_of(world, entity) {
        Some(leader) => Some(leader),
        None => world.get::<Party>(entity).map(|_| entity),
    };
    leader.map(|leader| party::leader_and_members(world, leader)).unwrap_or_default()
}

/// Same as `find_new_locked_on_target_from_party` but against a roster taken
/// before the death transition dissolved the party.
pub(crate) fn retarget_from_roster(world: &mut World, npc: Entity, killed: Entity, roster: &[Entity]) -> Option<Entity> {
    let current = world.get::<NpcBrain>(npc)?.locked_on_target;
    if let Some(target) = current.filter(|t| *t != killed && is_valid_target(world, *t)) {
        return Some(target);
    }
    let origin = position_of(world, npc).unwrap_or_default();
    let replacement = roster
        .iter()
        .copied()
        .filter(|candidate| *candidate != killed && *candidate != npc && is_valid_target(world, *candidate))
        .min_by(|a, b| {
            let da = position_of(world, *a).unwrap_or_default().distance_squared(origin);
            let db = position_of(world, *b).unwrap_or_default().distance_squared(origin);
            da.total_cmp(&db)
        });
    if let Some(mut brain) = world.get_mut::<NpcBrain>(npc) {
        brain.locked_on_target = replacement;
    }
    if let Some(target) = replacement {
        log::debug!("[ai] {npc:?} switched its target to {target:?}");
    }
    replacement
}

fn is_valid_target(world: &World, target: Entity) -> bool {
    world.get::<Character>(target).is_some_and(|c| !c.killed)
        && world.get::<DynamicActor>(target).is_some_and(DynamicActor::is_shown)
}

type NpcItem<'a> = (
    Entity,
    &'a mut NpcBrain,
    &'a NpcProfile,
    &'a mut MovementIntent,
    &'a Character,
    &'a CharacterProfile,
    &'a Transform,
    &'a DynamicActor,
    Option<&'a PartyMembership>,
    &'a ContentId,
);

type TargetItem<'a> = (
    Entity,
    &'a Character,
    &'a CharacterProfile,
    &'a Transform,
    &'a DynamicActor,
    Option<&'a NpcProfile>,
    Option<&'a PartyMembership>,
);

fn is_hostile_target(me: Entity, own_faction: Disposition, target: &TargetItem<'_>) -> bool {
    let (other, character, _, _, actor, npc, membership) = *target;
    other != me && !character.killed && actor.is_shown() && faction(npc, membership) != own_faction
}

/// Per-frame NPC decision pass. Writes movement intents and queues attacks;
/// frozen entirely while NPCs are not allowed to act.
#[allow(clippy::too_many_arguments)]
pub fn sys_npc_act(
    clock: Res<SimClock>,
    registry: Res<SpawnRegistry>,
    config: Res<NpcConfig>,
    mut rng: ResMut<SimRng>,
    mut commands: ResMut<CommandQueue>,
    mut npcs: Query<NpcItem>,
    targets: Query<TargetItem>,
    parties: Query<&Party>,
) {
    if !registry.npcs_allowed_to_act() {
        for (_, _, _, mut intent, ..) in &mut npcs {
            intent.horizontal = 0.0;
        }
        return;
    }
    let delta = clock.delta_seconds();
    for (entity, mut brain, npc, mut intent, character, profile, transform, actor, membership, id) in &mut npcs {
        if character.killed || !actor.is_shown() {
            intent.horizontal = 0.0;
            continue;
        }
        let position = transform.translation;
        let waiting = membership
            .and_then(|m| parties.get(m.leader).ok())
            .is_some_and(|party| party.has_waiting_member(id.as_str()));
        if waiting {
            brain.state = NpcState::Idle;
            intent.horizontal = 0.0;
            continue;
        }

        let own_faction = faction(Some(npc), membership);
        if let Some(locked) = brain.locked_on_target {
            if !targets.get(locked).is_ok_and(|t| is_hostile_target(entity, own_faction, &t)) {
                brain.locked_on_target = None;
            }
        }
        let seeks_fights = own_faction == Disposition::Enemy || membership.is_some();
        if brain.locked_on_target.is_none() && seeks_fights {
            brain.locked_on_target = targets
                .iter()
                .filter(|t| is_hostile_target(entity, own_faction, t))
                .map(|t| (t.0, t.3.translation.distance(position)))
                .filter(|(_, distance)| *distance <= config.perception_range)
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(target, _)| target);
        }

        let horizontal = if let Some((target_position, target_half_width)) = brain
            .locked_on_target
            .and_then(|t| targets.get(t).ok())
            .map(|t| (t.3.translation, t.2.body_half_extents().0))
        {
            let dx = target_position.x - position.x;
            if dx.abs() - target_half_width <= profile.attack_range {
                brain.state = NpcState::Combat;
                intent.face_right = Some(dx >= 0.0);
                if !character.attacking {
                    commands.push(SimCommand::Attack { attacker: entity });
                }
                0.0
            } else {
                brain.state = NpcState::MoveToTarget;
                dx.signum()
            }
        } else if let Some(membership) = membership {
            let leader_position = targets.get(membership.leader).ok().map(|t| t.3.translation);
            let horizontal = leader_position
                .map(|leader| move_to_target(position.x, leader.x, config.follow_distance))
                .unwrap_or(0.0);
            brain.state = if horizontal == 0.0 { NpcState::Idle } else { NpcState::MoveToTarget };
            horizontal
        } else if npc.should_sandbox {
            brain.state = NpcState::WanderRandomly;
            brain.move_randomly(
                delta,
                &mut rng.0,
                (config.min_move, config.max_move),
                (config.min_wait, config.max_wait),
            )
        } else {
            brain.state = NpcState::Idle;
            0.0
        };
        intent.horizontal = horizontal;

        if brain.jump_if_stuck(delta, config.stuck_check_interval, position, horizontal, config.stuck_threshold) {
            if character.is_airborne() && brain.state == NpcState::WanderRandomly {
                brain.reverse_direction();
            } else {
                intent.jump = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_to_target_stops_inside_distance() {
        assert_eq!(move_to_target(0.0, 100.0, 60.0), 1.0);
        assert_eq!(move_to_target(100.0, 0.0, 60.0), -1.0);
        assert_eq!(move_to_target(0.0, 40.0, 60.0), 0.0);
    }
}
