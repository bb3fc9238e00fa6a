use crate::actor::{ActorKind, Chest, ContentId, DynamicActor, ItemDrop, Transform, Velocity};
use crate::character::{
    Behavior, Character, CharacterProfile, Equipment, EquippedItem, Inventory, MovementIntent, NpcBrain,
};
use crate::content::{CharacterDefinition, ContentError, ContentLibrary};
use crate::map;
use crate::skill::{ActiveSkills, SkillBook};
use bevy_ecs::prelude::*;
use glam::Vec2;
use std::collections::HashSet;

/// Spawn-once suppression plus the global "NPCs may act" gate. Survives map
/// reloads; only `reset` (new game) clears it.
#[derive(Resource, Debug)]
pub struct SpawnRegistry {
    blacklist: HashSet<String>,
    npcs_allowed_to_act: bool,
}

impl Default for SpawnRegistry {
    fn default() -> Self {
        Self { blacklist: HashSet::new(), npcs_allowed_to_act: true }
    }
}

impl SpawnRegistry {
    pub fn is_npc_allowed_to_spawn(&self, content_id: &str) -> bool {
        !self.blacklist.contains(content_id)
    }

    pub fn set_npc_allowed_to_spawn(&mut self, content_id: &str, allowed: bool) {
        if allowed {
            self.blacklist.remove(content_id);
        } else if self.blacklist.insert(content_id.to_string()) {
            log::debug!("[spawn] '{content_id}' will no longer spawn");
        }
    }

    pub fn npcs_allowed_to_act(&self) -> bool {
        self.npcs_allowed_to_act
    }

    pub fn set_npcs_allowed_to_act(&mut self, allowed: bool) {
        self.npcs_allowed_to_act = allowed;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn character_bundle(
    world: &World,
    content_id: &str,
    definition: &CharacterDefinition,
    behavior: Behavior,
) -> impl Bundle {
    let library = world.resource::<ContentLibrary>();
    let mut profile: CharacterProfile = definition.profile.clone();
    profile.level = profile.level.max(1);
    profile.clamp_pools();

    let mut book = SkillBook::default();
    for skill_id in &definition.skills {
        match library.skill(skill_id) {
            Ok(skill) => book.learn(skill_id.clone(), skill.clone()),
            Err(err) => log::warn!("[content] {content_id}: {err}"),
        }
    }
    let mut equipment = Equipment::default();
    for item_id in &definition.equipment {
        match library.item(item_id) {
            Ok(item) => match item.slot {
                Some(slot) if item.is_equipment() => {
                    equipment.equip(slot, EquippedItem { item_id: item_id.clone(), profile: item.clone() });
                }
                _ => log::warn!("[content] {content_id}: '{item_id}' is not equipment"),
            },
            Err(err) => log::warn!("[content] {content_id}: {err}"),
        }
    }
    let mut inventory = Inventory::default();
    for (item_id, amount) in &definition.inventory {
        inventory.add(item_id, *amount);
    }
    let visual = (!profile.texture_res_path.is_empty()).then(|| profile.texture_res_path.clone());
    (
        ContentId(content_id.to_string()),
        DynamicActor::new(ActorKind::Character, visual),
        profile,
        Character::default(),
        (equipment, inventory, book, ActiveSkills::default()),
        (MovementIntent::default(), Transform::default(), Velocity::default(), behavior),
    )
}

/// Spawns the player (not shown yet; owned by the world, not the map).
pub fn spawn_player(world: &mut World, content_id: &str) -> Result<Entity, ContentError> {
    let definition = world.resource::<ContentLibrary>().character(content_id)?.clone();
    let bundle = character_bundle(world, content_id, &definition, Behavior::PlayerInput);
    let player = world.spawn(bundle).id();
    log::info!("[spawn] player '{content_id}' -> {player:?}");
    Ok(player)
}

/// Builds an NPC entity without placing it anywhere.
pub fn spawn_npc_detached(world: &mut World, content_id: &str) -> Result<Entity, ContentError> {
    let definition = world.resource::<ContentLibrary>().npc(content_id)?.clone();
    let bundle = character_bundle(world, content_id, &definition.character, Behavior::Autonomy);
    let character = Character { weapon_sheathed: !definition.npc.is_unsheathed, ..Character::default() };
    let npc = world.spawn(bundle).insert((definition.npc, NpcBrain::default(), character)).id();
    Ok(npc)
}

/// Spawns an NPC onto the map unless it is suppressed.
pub fn spawn_npc(world: &mut World, content_id: &str, position: Vec2) -> Result<Option<Entity>, ContentError> {
    if !world.resource::<SpawnRegistry>().is_npc_allowed_to_spawn(content_id) {
        log::debug!("[spawn] '{content_id}' is suppressed");
        return Ok(None);
    }
    let npc = spawn_npc_detached(world, content_id)?;
    map::show_dynamic_actor(world, npc, position);
    Ok(Some(npc))
}

pub fn spawn_item(world: &mut World, item_id: &str, amount: u32, position: Vec2) -> Result<Entity, ContentError> {
    let profile = world.resource::<ContentLibrary>().item(item_id)?.clone();
    let visual = Some(profile.icon_path());
    let item = world
        .spawn((
            ContentId(item_id.to_string()),
            DynamicActor::new(ActorKind::Item, visual),
            ItemDrop { profile, amount: amount.max(1) },
            Transform::default(),
            Velocity::default(),
        ))
        .id();
    map::show_dynamic_actor(world, item, position);
    Ok(item)
}

pub fn spawn_chest(world: &mut World, items: Vec<String>, position: Vec2) -> Entity {
    let chest = world
        .spawn((
            DynamicActor::new(ActorKind::Chest, Some("chest".to_string())),
            Chest { opened: false, items },
            Transform::default(),
            Velocity::default(),
        ))
        .id();
    map::show_dynamic_actor(world, chest, position);
    chest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suppression_survives_until_reset() {
        let mut registry = SpawnRegistry::default();
        assert!(registry.is_npc_allowed_to_spawn("goblin_01"));
        registry.set_npc_allowed_to_spawn("goblin_01", false);
        registry.set_npcs_allowed_to_act(false);
        assert!(!registry.is_npc_allowed_to_spawn("goblin_01"));
        assert!(registry.is_npc_allowed_to_spawn("goblin_02"));
        registry.reset();
        assert!(registry.is_npc_allowed_to_spawn("goblin_01"));
        assert!(registry.npcs_allowed_to_act());
    }
}
