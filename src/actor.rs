use crate::character::{Character, CharacterProfile, ItemProfile, NpcBrain, NpcProfile};
use crate::events::{EventBus, GameEvent};
use crate::physics::{BodyBuilder, BodyKind, BuiltBody, Category, FixtureDef, FixtureSlot, PhysicsWorld};
use bevy_ecs::prelude::*;
use glam::Vec2;
use rapier2d::prelude::{ColliderHandle, RigidBodyHandle};
use smallvec::SmallVec;

/// Authored content identifier (the json record key an actor was built from).
#[derive(Component, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentId(pub String);

impl ContentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorKind {
    Character,
    Item,
    Chest,
    Projectile,
}

/// Body-backed simulated entity. The body only exists while shown on the map.
#[derive(Component, Debug, Clone)]
pub struct DynamicActor {
    pub kind: ActorKind,
    body: Option<RigidBodyHandle>,
    fixtures: SmallVec<[(FixtureSlot, ColliderHandle); 4]>,
    visual: Option<String>,
    shown: bool,
}

impl DynamicActor {
    pub fn new(kind: ActorKind, visual: Option<String>) -> Self {
        Self { kind, body: None, fixtures: SmallVec::new(), visual, shown: false }
    }

    pub fn body(&self) -> Option<RigidBodyHandle> {
        self.body
    }

    pub fn fixture(&self, slot: FixtureSlot) -> Option<ColliderHandle> {
        self.fixtures.iter().find(|(s, _)| *s == slot).map(|(_, handle)| *handle)
    }

    pub fn is_shown(&self) -> bool {
        self.shown
    }

    pub fn visual(&self) -> Option<&str> {
        self.visual.as_deref()
    }

    fn attach(&mut self, built: BuiltBody) {
        self.body = Some(built.body);
        self.fixtures = built.fixtures.into_iter().collect();
        self.shown = true;
    }

    fn detach(&mut self) -> Option<RigidBodyHandle> {
        self.shown = false;
        self.fixtures.clear();
        self.body.take()
    }
}

/// Pixel-space position mirrored from the physics body every frame.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct Transform {
    pub translation: Vec2,
}

/// Linear velocity in meters per second.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct Velocity(pub Vec2);

#[derive(Component, Debug, Clone, Default)]
pub struct Chest {
    pub opened: bool,
    pub items: Vec<String>,
}

#[derive(Component, Debug, Clone)]
pub struct ItemDrop {
    pub profile: ItemProfile,
    pub amount: u32,
}

#[derive(Component, Debug, Clone)]
pub struct Projectile {
    pub owner: Entity,
    pub damage: i32,
    /// Meters per second.
    pub velocity: Vec2,
    pub remaining_lifetime: f32,
    pub spent: bool,
}

const CHEST_HALF_EXTENT: f32 = 8.0;
const ITEM_HALF_EXTENT: f32 = 5.0;
const PROJECTILE_RADIUS: f32 = 4.0;
const FEET_HALF_HEIGHT: f32 = 5.0;

fn character_body(profile: &CharacterProfile, is_npc: bool, killed: bool, position: Vec2) -> BodyBuilder {
    let (hw, hh) = profile.body_half_extents();
    let mut feet_mask = Category::GROUND | Category::PLATFORM | Category::INTERACTABLE_OBJECT;
    if killed {
        feet_mask.remove(Category::INTERACTABLE_OBJECT);
    }
    let mut builder = BodyBuilder::new(BodyKind::Dynamic)
        .position(position)
        .fixed_rotation(true)
        .fixture(
            FixtureDef::rectangle(hw, hh)
                .category(Category::CHARACTER_BODY)
                .mask(Category::TERRAIN | Category::WEAPON | Category::PROJECTILE)
                .friction(0.0),
        )
        .fixture(
            FixtureDef::rectangle(hw * 0.8, FEET_HALF_HEIGHT)
                .offset(Vec2::new(0.0, -hh))
                .category(Category::FEET)
                .mask(feet_mask)
                .slot(FixtureSlot::Feet),
        )
        .fixture(
            FixtureDef::rectangle(profile.attack_range.max(1.0), hh)
                .category(Category::WEAPON)
                .mask(Category::CHARACTER_BODY)
                .sensor(true)
                .slot(FixtureSlot::Weapon),
        );
    if is_npc {
        let mask = if killed { Category::empty() } else { Category::FEET };
        builder = builder.fixture(
            FixtureDef::rectangle(hw, hh)
                .category(Category::INTERACTABLE_OBJECT)
                .mask(mask)
                .sensor(true)
                .slot(FixtureSlot::Interactable),
        );
    }
    builder
}

fn interactable_object_body(half_extent: f32, position: Vec2) -> BodyBuilder {
    BodyBuilder::new(BodyKind::Dynamic)
        .position(position)
        .fixed_rotation(true)
        .fixture(
            FixtureDef::rectangle(half_extent, half_extent)
                .category(Category::INTERACTABLE_OBJECT)
                .mask(Category::TERRAIN | Category::FEET)
                .sensor(true)
                .slot(FixtureSlot::Interactable),
        )
        .fixture(
            FixtureDef::rectangle(half_extent, half_extent)
                .category(Category::INTERACTABLE_OBJECT)
                .mask(Category::TERRAIN),
        )
}

fn projectile_body(velocity: Vec2, position: Vec2) -> BodyBuilder {
    BodyBuilder::new(BodyKind::Kinematic)
        .position(position)
        .gravity_scale(0.0)
        .bullet(true)
        .velocity(velocity)
        .fixture(
            FixtureDef::circle(PROJECTILE_RADIUS)
                .category(Category::PROJECTILE)
                .mask(Category::CHARACTER_BODY | Category::WALL | Category::GROUND)
                .sensor(true),
        )
}

fn body_definition(world: &World, entity: Entity, kind: ActorKind, position: Vec2) -> Option<BodyBuilder> {
    match kind {
        ActorKind::Character => {
            let profile = world.get::<CharacterProfile>(entity)?;
            let killed = world.get::<Character>(entity).is_some_and(|c| c.killed);
            let is_npc = world.get::<NpcProfile>(entity).is_some();
            Some(character_body(profile, is_npc, killed, position))
        }
        ActorKind::Item => Some(interactable_object_body(ITEM_HALF_EXTENT, position)),
        ActorKind::Chest => Some(interactable_object_body(CHEST_HALF_EXTENT, position)),
        ActorKind::Projectile => {
            let projectile = world.get::<Projectile>(entity)?;
            Some(projectile_body(projectile.velocity, position))
        }
    }
}

/// Creates the body and fixtures for the actor's kind at `position` (pixels).
/// Returns false without touching anything when already shown.
pub fn show_on_map(world: &mut World, entity: Entity, position: Vec2) -> bool {
    let Some(actor) = world.get::<DynamicActor>(entity) else {
        return false;
    };
    if actor.is_shown() {
        return false;
    }
    let Some(builder) = body_definition(world, entity, actor.kind, position) else {
        log::warn!("[map] actor {entity:?} is missing the data needed to build its body");
        return false;
    };
    let built = builder.build(&mut world.resource_mut::<PhysicsWorld>(), Some(entity));
    if let Some(mut actor) = world.get_mut::<DynamicActor>(entity) {
        actor.attach(built);
    }
    if let Some(mut transform) = world.get_mut::<Transform>(entity) {
        transform.translation = position;
    }
    if let Some(mut character) = world.get_mut::<Character>(entity) {
        character.reset_contacts();
    }
    world.resource_mut::<EventBus>().push(GameEvent::ActorShown { entity });
    true
}

/// Destroys the body and scrubs references other actors hold to this one.
/// The entity itself survives.
pub fn remove_from_map(world: &mut World, entity: Entity) -> bool {
    let body = {
        let Some(mut actor) = world.get_mut::<DynamicActor>(entity) else {
            return false;
        };
        if !actor.is_shown() {
            return false;
        }
        actor.detach()
    };
    if let Some(body) = body {
        world.resource_mut::<PhysicsWorld>().remove_body(body);
    }
    scrub_references(world, entity);
    world.resource_mut::<EventBus>().push(GameEvent::ActorRemoved { entity });
    true
}

fn scrub_references(world: &mut World, entity: Entity) {
    let mut characters = world.query::<(Entity, &mut Character)>();
    for (other, mut character) in characters.iter_mut(world) {
        if other == entity {
            character.reset_contacts();
        } else {
            character.forget(entity);
        }
    }
    let mut brains = world.query::<&mut NpcBrain>();
    for mut brain in brains.iter_mut(world) {
        if brain.locked_on_target == Some(entity) {
            brain.locked_on_target = None;
        }
    }
}

pub fn position_of(world: &World, entity: Entity) -> Option<Vec2> {
    world.get::<Transform>(entity).map(|t| t.translation)
}

pub fn is_shown(world: &World, entity: Entity) -> bool {
    world.get::<DynamicActor>(entity).is_some_and(DynamicActor::is_shown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicsConfig;

    fn test_world() -> World {
        let mut world = World::new();
        world.insert_resource(PhysicsWorld::new(&PhysicsConfig::default()));
        world.insert_resource(EventBus::default());
        world
    }

    #[test]
    fn show_is_idempotent_and_remove_frees_the_body() {
        let mut world = test_world();
        let profile = CharacterProfile { body_width: 20.0, body_height: 40.0, attack_range: 10.0, ..Default::default() };
        let entity = world
            .spawn((
                DynamicActor::new(ActorKind::Character, None),
                profile,
                Character::default(),
                Transform::default(),
            ))
            .id();

        assert!(show_on_map(&mut world, entity, Vec2::new(30.0, 40.0)));
        let first_body = world.get::<DynamicActor>(entity).and_then(DynamicActor::body);
        assert!(!show_on_map(&mut world, entity, Vec2::new(90.0, 40.0)));
        assert_eq!(world.get::<DynamicActor>(entity).and_then(DynamicActor::body), first_body);
        assert_eq!(world.resource::<PhysicsWorld>().body_count(), 1);
        assert!(world.get::<DynamicActor>(entity).and_then(|a| a.fixture(FixtureSlot::Interactable)).is_none());

        assert!(remove_from_map(&mut world, entity));
        assert!(!remove_from_map(&mut world, entity));
        assert_eq!(world.resource::<PhysicsWorld>().body_count(), 0);
        assert!(world.get_entity(entity).is_ok());
        assert!(!is_shown(&world, entity));
    }

    #[test]
    fn killed_npc_body_ignores_interaction() {
        let mut world = test_world();
        let entity = world
            .spawn((
                DynamicActor::new(ActorKind::Character, None),
                CharacterProfile { body_width: 10.0, body_height: 10.0, ..Default::default() },
                NpcProfile::default(),
                Character { killed: true, ..Character::default() },
                Transform::default(),
            ))
            .id();
        assert!(show_on_map(&mut world, entity, Vec2::ZERO));
        let actor = world.get::<DynamicActor>(entity).cloned().expect("actor");
        let physics = world.resource::<PhysicsWorld>();
        let feet = actor.fixture(FixtureSlot::Feet).expect("feet fixture");
        let (_, feet_mask) = physics.filter_bits(feet).expect("feet bits");
        assert!(!feet_mask.contains(Category::INTERACTABLE_OBJECT));
        let interactable = actor.fixture(FixtureSlot::Interactable).expect("interactable fixture");
        assert_eq!(physics.filter_bits(interactable).map(|(_, mask)| mask), Some(Category::empty()));
    }
}
