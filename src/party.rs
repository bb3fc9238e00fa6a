use crate::actor::{self, position_of, ContentId};
use crate::character::{CharacterProfile, MovementIntent, NpcBrain, NpcProfile, NpcState};
use crate::events::{EventBus, GameEvent};
use crate::map::{self, GameMap};
use crate::notifications;
use crate::spawn::SpawnRegistry;
use bevy_ecs::prelude::*;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Back-reference from a member to its leader.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartyMembership {
    pub leader: Entity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaitingLocation {
    pub map_id: String,
    pub x: f32,
    pub y: f32,
}

/// Lives on the leader entity. The leader is never in `members`; waiting
/// records are keyed by content id so they survive re-instantiation.
#[derive(Component, Debug, Clone, Default)]
pub struct Party {
    members: BTreeSet<Entity>,
    waiting: HashMap<String, WaitingLocation>,
}

impl Party {
    pub fn members(&self) -> impl Iterator<Item = Entity> + '_ {
        self.members.iter().copied()
    }

    pub fn contains(&self, member: Entity) -> bool {
        self.members.contains(&member)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn has_waiting_member(&self, content_id: &str) -> bool {
        self.waiting.contains_key(content_id)
    }

    pub fn waiting_location(&self, content_id: &str) -> Option<&WaitingLocation> {
        self.waiting.get(content_id)
    }
}

fn name_of(world: &World, entity: Entity) -> String {
    world.get::<CharacterProfile>(entity).map(|p| p.name.clone()).unwrap_or_default()
}

fn content_id_of(world: &World, entity: Entity) -> Option<String> {
    world.get::<ContentId>(entity).map(|id| id.0.clone())
}

fn is_member(world: &World, leader: Entity, target: Entity) -> bool {
    world.get::<Party>(leader).is_some_and(|party| party.contains(target))
}

pub fn leader_of(world: &World, member: Entity) -> Option<Entity> {
    world.get::<PartyMembership>(member).map(|m| m.leader)
}

pub fn members(world: &World, leader: Entity) -> Vec<Entity> {
    world.get::<Party>(leader).map(|party| party.members().collect()).unwrap_or_default()
}

pub fn leader_and_members(world: &World, leader: Entity) -> Vec<Entity> {
    let mut all = vec![leader];
    all.extend(members(world, leader));
    all
}

/// Resolves a member by authored content id.
pub fn get_member(world: &World, leader: Entity, content_id: &str) -> Option<Entity> {
    let party = world.get::<Party>(leader)?;
    party.members().find(|member| world.get::<ContentId>(*member).is_some_and(|id| id.as_str() == content_id))
}

pub fn has_member(world: &World, leader: Entity, content_id: &str) -> bool {
    get_member(world, leader, content_id).is_some()
}

pub fn has_waiting_member(world: &World, leader: Entity, content_id: &str) -> bool {
    world.get::<Party>(leader).is_some_and(|party| party.has_waiting_member(content_id))
}

pub fn waiting_member_location(world: &World, leader: Entity, content_id: &str) -> Option<WaitingLocation> {
    world.get::<Party>(leader).and_then(|party| party.waiting_location(content_id).cloned())
}

/// Whether `member` is parked at a waiting location of its leader's party.
pub fn is_waiting(world: &World, member: Entity) -> bool {
    let (Some(leader), Some(id)) = (leader_of(world, member), world.get::<ContentId>(member)) else {
        return false;
    };
    has_waiting_member(world, leader, id.as_str())
}

/// Whether any party in the world has a member built from `content_id`.
pub fn any_party_has_member(world: &mut World, content_id: &str) -> bool {
    let mut members = world.query_filtered::<&ContentId, With<PartyMembership>>();
    members.iter(world).any(|id| id.as_str() == content_id)
}

pub fn recruit(world: &mut World, leader: Entity, target: Entity) -> bool {
    if leader == target {
        log::warn!("[party] {leader:?} cannot recruit itself");
        return false;
    }
    if world.get_entity(leader).is_err() {
        log::warn!("[party] leader {leader:?} no longer exists");
        return false;
    }
    if world.get::<PartyMembership>(target).is_some() {
        log::warn!("[party] {target:?} is already a party member");
        return false;
    }
    if world.get::<Party>(target).is_some_and(|party| !party.is_empty()) {
        log::warn!("[party] {target:?} leads its own party");
        return false;
    }
    let Some(position) = position_of(world, target) else {
        log::warn!("[party] {target:?} is not an actor");
        return false;
    };

    world.entity_mut(target).insert(PartyMembership { leader });
    match world.get_mut::<Party>(leader) {
        Some(mut party) => {
            party.members.insert(target);
        }
        None => {
            let mut party = Party::default();
            party.members.insert(target);
            world.entity_mut(leader).insert(party);
        }
    }

    world.resource_mut::<GameMap>().release(target);
    actor::remove_from_map(world, target);

    // A spawn-once NPC that joins the party must not reappear from the map.
    let respawnable = world.get::<NpcProfile>(target).map(|npc| npc.is_respawnable);
    if let (Some(false), Some(id)) = (respawnable, content_id_of(world, target)) {
        world.resource_mut::<SpawnRegistry>().set_npc_allowed_to_spawn(&id, false);
    }

    actor::show_on_map(world, target, position);
    if let Some(mut brain) = world.get_mut::<NpcBrain>(target) {
        brain.locked_on_target = None;
        brain.state = NpcState::MoveToTarget;
    }

    let name = name_of(world, target);
    log::info!("[party] {target:?} ({name}) joined {leader:?}");
    notifications::notify(world, format!("{name} is now following you."));
    world.resource_mut::<EventBus>().push(GameEvent::Recruited { leader, member: target });
    true
}

pub fn dismiss(world: &mut World, leader: Entity, target: Entity, add_to_map: bool) -> bool {
    if !is_member(world, leader, target) {
        log::warn!("[party] {target:?} is not a member of {leader:?}'s party");
        return false;
    }
    let name = name_of(world, target);
    let position = position_of(world, target).unwrap_or_default();
    if let Some(mut party) = world.get_mut::<Party>(leader) {
        party.members.remove(&target);
    }
    if let Some(id) = content_id_of(world, target) {
        if let Some(mut party) = world.get_mut::<Party>(leader) {
            party.waiting.remove(&id);
        }
    }
    world.entity_mut(target).remove::<PartyMembership>();
    actor::remove_from_map(world, target);

    notifications::notify(world, format!("{name} has left your party."));
    world.resource_mut::<EventBus>().push(GameEvent::Dismissed { leader, member: target });
    if add_to_map {
        map::show_dynamic_actor(world, target, position);
    } else {
        map::release_if_unowned(world, target);
    }
    log::info!("[party] {target:?} ({name}) left {leader:?}");
    true
}

pub fn ask_member_to_wait(world: &mut World, leader: Entity, target: Entity) -> bool {
    if !is_member(world, leader, target) {
        log::warn!("[party] {target:?} is not a member of {leader:?}'s party");
        return false;
    }
    let Some(id) = content_id_of(world, target) else {
        return false;
    };
    if has_waiting_member(world, leader, &id) {
        log::warn!("[party] '{id}' is already a waiting member");
        return false;
    }
    let position = position_of(world, target).unwrap_or_default();
    let map_id = world.resource::<GameMap>().id().to_string();
    if let Some(mut party) = world.get_mut::<Party>(leader) {
        party.waiting.insert(id, WaitingLocation { map_id, x: position.x, y: position.y });
    }
    if let Some(mut intent) = world.get_mut::<MovementIntent>(target) {
        *intent = MovementIntent::default();
    }
    if let Some(mut brain) = world.get_mut::<NpcBrain>(target) {
        brain.state = NpcState::Idle;
    }
    let name = name_of(world, target);
    notifications::notify(world, format!("{name} will be waiting for you."));
    true
}

pub fn ask_member_to_follow(world: &mut World, leader: Entity, target: Entity) -> bool {
    if !is_member(world, leader, target) {
        log::warn!("[party] {target:?} is not a member of {leader:?}'s party");
        return false;
    }
    let Some(id) = content_id_of(world, target) else {
        return false;
    };
    let removed = world.get_mut::<Party>(leader).and_then(|mut party| party.waiting.remove(&id));
    if removed.is_none() {
        log::warn!("[party] '{id}' is not a waiting member");
        return false;
    }
    let name = name_of(world, target);
    notifications::notify(world, format!("{name} is now following you."));
    true
}

/// Death transition hook: a dead member leaves its party, a dead leader
/// dissolves its party onto the map.
pub fn detach_on_death(world: &mut World, victim: Entity) {
    if let Some(leader) = leader_of(world, victim) {
        dismiss(world, leader, victim, true);
    }
    for member in members(world, victim) {
        let shown = actor::is_shown(world, member);
        dismiss(world, victim, member, shown);
    }
}

/// Unlinks a despawning actor from party bookkeeping. Returns the members
/// that lost their leader.
pub(crate) fn forget_actor(world: &mut World, entity: Entity) -> Vec<Entity> {
    if let Some(leader) = leader_of(world, entity) {
        let id = content_id_of(world, entity);
        if let Some(mut party) = world.get_mut::<Party>(leader) {
            party.members.remove(&entity);
            if let Some(id) = id {
                party.waiting.remove(&id);
            }
        }
    }
    let orphans = members(world, entity);
    for member in &orphans {
        world.entity_mut(*member).remove::<PartyMembership>();
    }
    orphans
}
