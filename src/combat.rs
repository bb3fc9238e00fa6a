use crate::actor::{self, position_of, ContentId, DynamicActor, Projectile};
use crate::ai;
use crate::callbacks::{DeferredAction, DeferredCallbacks};
use crate::character::{derived_stats, Behavior, Character, CharacterProfile, Disposition, MovementIntent, NpcBrain, NpcProfile, NpcState};
use crate::config::CombatConfig;
use crate::content::ContentLibrary;
use crate::events::{EventBus, GameEvent};
use crate::map;
use crate::notifications;
use crate::party::{self, PartyMembership};
use crate::physics::{Category, FixtureSlot, PhysicsWorld};
use crate::spawn::{self, SpawnRegistry};
use crate::time::SimClock;
use crate::world::SimRng;
use bevy_ecs::prelude::*;
use glam::Vec2;

pub fn effective_damage(power: i32, defense: i32) -> i32 {
    (power - defense).max(0)
}

/// Player, party members and allies fight on one side; unrecruited enemies
/// on the other.
pub fn faction(npc: Option<&NpcProfile>, membership: Option<&PartyMembership>) -> Disposition {
    match (npc, membership) {
        (_, Some(_)) => Disposition::Ally,
        (Some(profile), None) => profile.disposition,
        (None, None) => Disposition::Ally,
    }
}

pub fn faction_of(world: &World, entity: Entity) -> Disposition {
    faction(world.get::<NpcProfile>(entity), world.get::<PartyMembership>(entity))
}

pub fn is_hostile(world: &World, a: Entity, b: Entity) -> bool {
    a != b && faction_of(world, a) != faction_of(world, b)
}

fn is_alive_and_shown(world: &World, entity: Entity) -> bool {
    world.get::<Character>(entity).is_some_and(|c| !c.killed) && actor::is_shown(world, entity)
}

/// Horizontal reach check: the target's near edge lies within `attack_range`
/// and on the side the attacker faces.
pub fn in_attack_range(world: &World, attacker: Entity, target: Entity) -> bool {
    let (Some(from), Some(to)) = (position_of(world, attacker), position_of(world, target)) else {
        return false;
    };
    let (Some(character), Some(profile)) = (world.get::<Character>(attacker), world.get::<CharacterProfile>(attacker))
    else {
        return false;
    };
    let target_half_width = world.get::<CharacterProfile>(target).map(|p| p.body_half_extents().0).unwrap_or(0.0);
    let dx = to.x - from.x;
    let facing = dx.abs() <= f32::EPSILON || (dx > 0.0) == character.facing_right;
    facing && dx.abs() - target_half_width <= profile.attack_range
}

/// Attacker-side entry point: resolves range and facing, subtracts the
/// target's defense, applies knockback, then delegates to `receive_damage`.
pub fn inflict_damage(world: &mut World, attacker: Entity, target: Entity, power: i32) -> bool {
    if attacker == target || !is_alive_and_shown(world, attacker) || !is_alive_and_shown(world, target) {
        return false;
    }
    if !in_attack_range(world, attacker, target) {
        log::debug!("[combat] {target:?} is out of {attacker:?}'s reach");
        return false;
    }
    let defense = derived_stats(world, target).map(|s| s.defense).unwrap_or(0);
    let amount = effective_damage(power, defense);

    let knockback = {
        let facing_right = world.get::<Character>(attacker).is_some_and(|c| c.facing_right);
        let force = world.get::<CharacterProfile>(attacker).map(|p| p.attack_force).unwrap_or(0.0);
        let scale = world.resource::<CombatConfig>().knockback_scale;
        Vec2::new(if facing_right { force } else { -force } * scale, 0.0)
    };
    if knockback != Vec2::ZERO {
        if let Some(body) = world.get::<DynamicActor>(target).and_then(DynamicActor::body) {
            world.resource_mut::<PhysicsWorld>().apply_impulse(body, knockback);
        }
    }
    receive_damage(world, target, Some(attacker), amount)
}

/// Subtracts `amount` from health (zeroed while invincible, clamped at 0) and
/// runs the death transition when health reaches 0.
pub fn receive_damage(world: &mut World, target: Entity, source: Option<Entity>, amount: i32) -> bool {
    let invincible = match world.get::<Character>(target) {
        Some(character) if !character.killed => character.invincible,
        _ => return false,
    };
    let amount = if invincible { 0 } else { amount.max(0) };
    let remaining = {
        let Some(mut profile) = world.get_mut::<CharacterProfile>(target) else {
            return false;
        };
        profile.health = (profile.health - amount).max(0);
        profile.health
    };

    notifications::show_damage(world, target, amount);
    world.resource_mut::<EventBus>().push(GameEvent::DamageDealt { source, target, amount, remaining });

    if let Some(source) = source.filter(|s| *s != target && is_alive_and_shown(world, *s)) {
        if let Some(mut brain) = world.get_mut::<NpcBrain>(target) {
            brain.locked_on_target = Some(source);
        }
    }
    if remaining <= 0 {
        kill(world, target, source);
    }
    true
}

/// Death transition. Runs once; later calls return false.
pub fn kill(world: &mut World, victim: Entity, killer: Option<Entity>) -> bool {
    {
        let Some(mut character) = world.get_mut::<Character>(victim) else {
            return false;
        };
        if character.killed {
            return false;
        }
        character.killed = true;
        character.attacking = false;
        character.crouching = false;
    }
    if let Some(mut intent) = world.get_mut::<MovementIntent>(victim) {
        *intent = MovementIntent::default();
    }
    if let Some(mut brain) = world.get_mut::<NpcBrain>(victim) {
        brain.state = NpcState::Dead;
        brain.locked_on_target = None;
    }

    let respawnable = world.get::<NpcProfile>(victim).map(|npc| npc.is_respawnable);
    let content_id = world.get::<ContentId>(victim).map(|id| id.0.clone());
    if let (Some(false), Some(id)) = (respawnable, content_id.as_deref()) {
        world.resource_mut::<SpawnRegistry>().set_npc_allowed_to_spawn(id, false);
    }

    // Dissolving the party scrubs lock-ons, so capture both sides first.
    let hunters = hunters_of(world, victim);
    let roster = ai::party_roster(world, victim);
    party::detach_on_death(world, victim);
    strip_interaction(world, victim);

    if let Some(killer) = killer.filter(|k| *k != victim) {
        award_exp(world, killer, victim);
    }
    drop_items(world, victim);
    for hunter in hunters {
        ai::retarget_from_roster(world, hunter, victim, &roster);
    }

    let linger = world.resource::<CombatConfig>().corpse_linger_frames;
    let clock = *world.resource::<SimClock>();
    world.resource_mut::<DeferredCallbacks>().run_after_frames(&clock, victim, linger, DeferredAction::RemoveFromMap);

    let name = world.get::<CharacterProfile>(victim).map(|p| p.name.clone()).unwrap_or_default();
    log::info!("[combat] {victim:?} ({name}) was killed by {killer:?}");
    world.resource_mut::<EventBus>().push(GameEvent::CharacterKilled { entity: victim, killer });
    notifications::notify(world, format!("{name} has been slain."));
    true
}

fn strip_interaction(world: &mut World, victim: Entity) {
    let Some(actor) = world.get::<DynamicActor>(victim) else {
        return;
    };
    let (feet, interactable) = (actor.fixture(FixtureSlot::Feet), actor.fixture(FixtureSlot::Interactable));
    let mut physics = world.resource_mut::<PhysicsWorld>();
    if let Some(feet) = feet {
        if let Some((_, mask)) = physics.filter_bits(feet) {
            physics.set_collision_mask(feet, mask.difference(Category::INTERACTABLE_OBJECT));
        }
    }
    if let Some(interactable) = interactable {
        physics.set_collision_mask(interactable, Category::empty());
    }
}

fn award_exp(world: &mut World, killer: Entity, victim: Entity) {
    if !world.get::<Character>(killer).is_some_and(|c| !c.killed) {
        return;
    }
    let victim_level = world.get::<CharacterProfile>(victim).map(|p| p.level.max(1)).unwrap_or(1);
    let amount = victim_level.saturating_mul(world.resource::<CombatConfig>().exp_per_victim_level);
    let table = world.resource::<ContentLibrary>().exp_table.clone();
    let gained = {
        let Some(mut profile) = world.get_mut::<CharacterProfile>(killer) else {
            return;
        };
        let gained = table.gain_exp(&mut *profile, amount);
        (gained > 0).then_some(profile.level)
    };
    if let Some(level) = gained {
        world.resource_mut::<EventBus>().push(GameEvent::LeveledUp { entity: killer, level });
        notifications::notify(world, format!("Level up! ({level})"));
    }
}

fn drop_items(world: &mut World, victim: Entity) {
    let Some(npc) = world.get::<NpcProfile>(victim).cloned() else {
        return;
    };
    let drops = npc.roll_drops(&mut world.resource_mut::<SimRng>().0);
    let origin = position_of(world, victim).unwrap_or_default();
    for (index, (item_id, amount)) in drops.into_iter().enumerate() {
        let at = origin + Vec2::new(0.0, 10.0 * (index as f32 + 1.0));
        if let Err(err) = spawn::spawn_item(world, &item_id, amount, at) {
            log::warn!("[combat] dropped item skipped: {err}");
        }
    }
}

fn hunters_of(world: &mut World, victim: Entity) -> Vec<Entity> {
    let mut query = world.query::<(Entity, &NpcBrain)>();
    query
        .iter(world)
        .filter(|(_, brain)| brain.locked_on_target == Some(victim))
        .map(|(entity, _)| entity)
        .collect()
}

/// Starts a melee swing; the hit lands `attack_time` seconds later.
pub fn attack(world: &mut World, attacker: Entity) -> bool {
    let autonomous = world.get::<Behavior>(attacker) == Some(&Behavior::Autonomy);
    let attack_time = world.get::<CharacterProfile>(attacker).map(|p| p.attack_time).unwrap_or(0.0);
    {
        let Some(mut character) = world.get_mut::<Character>(attacker) else {
            return false;
        };
        if character.killed || character.attacking {
            return false;
        }
        if character.weapon_sheathed {
            if !autonomous {
                return false;
            }
            // NPCs draw their weapon when a fight starts.
            character.weapon_sheathed = false;
        }
        character.attacking = true;
    }
    let clock = *world.resource::<SimClock>();
    world.resource_mut::<DeferredCallbacks>().run_after_seconds(&clock, attacker, attack_time, DeferredAction::MeleeHit);
    true
}

/// Resolves a pending swing against every hostile in reach.
pub fn melee_hit(world: &mut World, attacker: Entity) -> usize {
    let mut candidates: Vec<Entity> = {
        let Some(mut character) = world.get_mut::<Character>(attacker) else {
            return 0;
        };
        character.attacking = false;
        if character.killed {
            return 0;
        }
        character.in_range_targets.to_vec()
    };
    if let Some(locked) = world.get::<NpcBrain>(attacker).and_then(|b| b.locked_on_target) {
        if !candidates.contains(&locked) {
            candidates.push(locked);
        }
    }
    let power = derived_stats(world, attacker).map(|s| s.physical_damage).unwrap_or(0);
    let mut hits = 0;
    for target in candidates {
        if is_hostile(world, attacker, target) && inflict_damage(world, attacker, target, power) {
            hits += 1;
        }
    }
    hits
}

/// A projectile touched a character body.
pub fn projectile_hit(world: &mut World, projectile: Entity, target: Entity) -> bool {
    let Some(state) = world.get::<Projectile>(projectile).cloned() else {
        return false;
    };
    if state.spent || state.owner == target {
        return false;
    }
    let owner_exists = world.get_entity(state.owner).is_ok();
    if owner_exists && !is_hostile(world, state.owner, target) {
        return false;
    }
    if let Some(mut projectile) = world.get_mut::<Projectile>(projectile) {
        projectile.spent = true;
    }
    let defense = derived_stats(world, target).map(|s| s.defense).unwrap_or(0);
    let source = owner_exists.then_some(state.owner);
    let landed = receive_damage(world, target, source, effective_damage(state.damage, defense));
    map::remove_dynamic_actor(world, projectile);
    landed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_damage_never_goes_negative() {
        assert_eq!(effective_damage(30, 5), 25);
        assert_eq!(effective_damage(3, 10), 0);
    }

    #[test]
    fn party_members_side_with_the_player() {
        let mut world = World::new();
        let leader = world.spawn_empty().id();
        let enemy = NpcProfile { disposition: Disposition::Enemy, ..NpcProfile::default() };
        assert_eq!(faction(Some(&enemy), None), Disposition::Enemy);
        assert_eq!(faction(Some(&enemy), Some(&PartyMembership { leader })), Disposition::Ally);
        assert_eq!(faction(None, None), Disposition::Ally);
    }
}
