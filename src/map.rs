use crate::actor::{self, DynamicActor};
use crate::callbacks::DeferredCallbacks;
use crate::character::Behavior;
use crate::events::{EventBus, GameEvent};
use crate::interaction::{self, ActiveDialogue};
use crate::party::{self, PartyMembership};
use crate::physics::{BodyBuilder, BodyKind, Category, FixtureDef, PhysicsWorld};
use crate::spawn;
use bevy_ecs::prelude::*;
use glam::Vec2;
use rapier2d::prelude::RigidBodyHandle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Axis-aligned rectangle in pixels, centered on `(x, y)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RectDef {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PointDef {
    pub x: f32,
    pub y: f32,
}

impl PointDef {
    pub fn to_vec2(self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NpcSpawn {
    pub content_id: String,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ChestSpawn {
    pub x: f32,
    pub y: f32,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSpawn {
    pub content_id: String,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default = "ItemSpawn::default_amount")]
    pub amount: u32,
}

impl ItemSpawn {
    const fn default_amount() -> u32 {
        1
    }
}

/// Already-parsed map data; tile formats are parsed elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MapDefinition {
    pub id: String,
    pub ground: Vec<RectDef>,
    pub platforms: Vec<RectDef>,
    pub walls: Vec<RectDef>,
    pub npcs: Vec<NpcSpawn>,
    pub chests: Vec<ChestSpawn>,
    pub items: Vec<ItemSpawn>,
    pub player_spawn: Option<PointDef>,
}

/// The ambient map: owns its actors and static geometry.
#[derive(Resource, Debug, Default)]
pub struct GameMap {
    id: String,
    actors: BTreeSet<Entity>,
    geometry: Vec<RigidBodyHandle>,
    player_spawn: Vec2,
}

impl GameMap {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.actors.contains(&entity)
    }

    pub fn actors(&self) -> impl Iterator<Item = Entity> + '_ {
        self.actors.iter().copied()
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    pub fn geometry_count(&self) -> usize {
        self.geometry.len()
    }

    pub fn player_spawn(&self) -> Vec2 {
        self.player_spawn
    }

    pub(crate) fn adopt(&mut self, entity: Entity) -> bool {
        self.actors.insert(entity)
    }

    pub(crate) fn release(&mut self, entity: Entity) -> bool {
        self.actors.remove(&entity)
    }
}

/// Something still holds the actor: the map, a party, or the world (player).
pub fn is_owned(world: &World, entity: Entity) -> bool {
    world.resource::<GameMap>().contains(entity)
        || world.get::<PartyMembership>(entity).is_some()
        || world.get::<Behavior>(entity) == Some(&Behavior::PlayerInput)
}

/// Transfers ownership of `entity` to the map and shows it at `position`.
pub fn show_dynamic_actor(world: &mut World, entity: Entity, position: Vec2) -> bool {
    if world.get::<DynamicActor>(entity).is_none() {
        return false;
    }
    let adopted = world.resource_mut::<GameMap>().adopt(entity);
    let shown = actor::show_on_map(world, entity, position);
    adopted || shown
}

/// Transfers ownership out of the map. An actor nobody else owns is despawned.
pub fn remove_dynamic_actor(world: &mut World, entity: Entity) -> bool {
    if !world.resource_mut::<GameMap>().release(entity) {
        log::debug!("[map] {entity:?} is not owned by the map");
        return false;
    }
    actor::remove_from_map(world, entity);
    release_if_unowned(world, entity);
    true
}

pub fn release_if_unowned(world: &mut World, entity: Entity) -> bool {
    if world.get_entity(entity).is_err() || is_owned(world, entity) {
        return false;
    }
    despawn_actor(world, entity)
}

/// Removes the actor from the simulation for good, cancelling every deferred
/// callback it owns. Members of a despawned leader go with it unless someone
/// else owns them.
pub fn despawn_actor(world: &mut World, entity: Entity) -> bool {
    if world.get_entity(entity).is_err() {
        return false;
    }
    actor::remove_from_map(world, entity);
    let cancelled = world.resource_mut::<DeferredCallbacks>().cancel_owner(entity);
    world.resource_mut::<GameMap>().release(entity);
    let orphans = party::forget_actor(world, entity);
    let in_dialogue = world
        .get_resource::<ActiveDialogue>()
        .is_some_and(|dialogue| dialogue.npc == Some(entity) || dialogue.user == Some(entity));
    if in_dialogue {
        interaction::end_dialogue(world);
    }
    world.despawn(entity);
    log::debug!("[map] despawned {entity:?} ({cancelled} pending callbacks cancelled)");
    world.resource_mut::<EventBus>().push(GameEvent::ActorDespawned { entity });
    for orphan in orphans {
        release_if_unowned(world, orphan);
    }
    true
}

fn build_geometry(physics: &mut PhysicsWorld, rect: &RectDef, category: Category) -> RigidBodyHandle {
    BodyBuilder::new(BodyKind::Static)
        .position(Vec2::new(rect.x, rect.y))
        .fixture(
            FixtureDef::rectangle((rect.width * 0.5).max(0.5), (rect.height * 0.5).max(0.5))
                .category(category)
                .mask(Category::all()),
        )
        .build(physics, None)
        .body
}

fn find_player(world: &mut World) -> Option<Entity> {
    let mut query = world.query::<(Entity, &Behavior)>();
    query.iter(world).find(|(_, behavior)| **behavior == Behavior::PlayerInput).map(|(entity, _)| entity)
}

const FOLLOWER_SPACING: f32 = 24.0;

/// Replaces the ambient map. Spawn suppression and party state carry over.
pub fn load_map(world: &mut World, definition: &MapDefinition) {
    let previous: Vec<Entity> = world.resource::<GameMap>().actors().collect();
    for entity in previous {
        despawn_actor(world, entity);
    }
    let old_geometry = std::mem::take(&mut world.resource_mut::<GameMap>().geometry);
    {
        let mut physics = world.resource_mut::<PhysicsWorld>();
        for handle in old_geometry {
            physics.remove_body(handle);
        }
    }

    let player_spawn = definition.player_spawn.map(PointDef::to_vec2).unwrap_or_default();
    let geometry = {
        let mut physics = world.resource_mut::<PhysicsWorld>();
        let mut handles = Vec::new();
        for (rects, category) in [
            (&definition.ground, Category::GROUND),
            (&definition.platforms, Category::PLATFORM),
            (&definition.walls, Category::WALL),
        ] {
            for rect in rects {
                handles.push(build_geometry(&mut physics, rect, category));
            }
        }
        handles
    };
    {
        let mut map = world.resource_mut::<GameMap>();
        map.id = definition.id.clone();
        map.geometry = geometry;
        map.player_spawn = player_spawn;
    }

    if let Some(player) = find_player(world) {
        actor::remove_from_map(world, player);
        actor::show_on_map(world, player, player_spawn);
        let mut slot = 1.0;
        for member in party::members(world, player) {
            actor::remove_from_map(world, member);
            match party::waiting_member_location(world, player, &content_id(world, member)) {
                Some(location) if location.map_id == definition.id => {
                    actor::show_on_map(world, member, Vec2::new(location.x, location.y));
                }
                Some(_) => {}
                None => {
                    actor::show_on_map(world, member, player_spawn - Vec2::new(FOLLOWER_SPACING * slot, 0.0));
                    slot += 1.0;
                }
            }
        }
    }

    for npc in &definition.npcs {
        if party::any_party_has_member(world, &npc.content_id) {
            continue;
        }
        if let Err(err) = spawn::spawn_npc(world, &npc.content_id, Vec2::new(npc.x, npc.y)) {
            log::warn!("[map] {}: {err}", definition.id);
        }
    }
    for chest in &definition.chests {
        spawn::spawn_chest(world, chest.items.clone(), Vec2::new(chest.x, chest.y));
    }
    for item in &definition.items {
        if let Err(err) = spawn::spawn_item(world, &item.content_id, item.amount, Vec2::new(item.x, item.y)) {
            log::warn!("[map] {}: {err}", definition.id);
        }
    }

    let map = world.resource::<GameMap>();
    log::info!("[map] loaded '{}' ({} actors, {} static bodies)", map.id(), map.actor_count(), map.geometry_count());
    world.resource_mut::<EventBus>().push(GameEvent::MapLoaded { id: definition.id.clone() });
}

fn content_id(world: &World, entity: Entity) -> String {
    world.get::<actor::ContentId>(entity).map(|id| id.0.clone()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_definition_defaults() {
        let map: MapDefinition = serde_json::from_str(
            r#"{ "id": "forest_01", "ground": [{ "x": 0, "y": 0, "width": 800, "height": 20 }],
                 "items": [{ "content_id": "herb" }] }"#,
        )
        .expect("parse map");
        assert_eq!(map.id, "forest_01");
        assert_eq!(map.ground[0].width, 800.0);
        assert_eq!(map.items[0].amount, 1);
        assert!(map.player_spawn.is_none());
    }
}
