use crate::actor::{ActorKind, DynamicActor, Projectile, Transform, Velocity};
use crate::callbacks::{DeferredAction, DeferredCallbacks};
use crate::character::{derived_stats, Character, CharacterProfile, ResourcePool};
use crate::events::{EventBus, GameEvent};
use crate::map::{self, GameMap};
use crate::physics::{FixtureSlot, PhysicsWorld};
use crate::time::SimClock;
use bevy_ecs::prelude::*;
use glam::Vec2;
use rapier2d::prelude::{ColliderHandle, RigidBodyHandle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SkillKind {
    #[default]
    ForwardSlash,
    BackDash,
    MagicalMissile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SkillProfile {
    pub kind: SkillKind,
    pub name: String,
    pub desc: String,
    pub texture_res_dir: String,
    pub delta_health: i32,
    pub delta_stamina: i32,
    pub delta_magicka: i32,
    pub frames_duration: u64,
    pub hotkey: String,
    pub physical_damage: i32,
    pub magical_damage: i32,
}

impl SkillProfile {
    pub fn icon_path(&self) -> String {
        format!("{}/icon.png", self.texture_res_dir)
    }

    fn deltas(&self) -> [(ResourcePool, i32); 3] {
        [
            (ResourcePool::Health, self.delta_health),
            (ResourcePool::Stamina, self.delta_stamina),
            (ResourcePool::Magicka, self.delta_magicka),
        ]
    }
}

pub const BACK_DASH_VELOCITY: Vec2 = Vec2::new(3.8, 0.6);
pub const BACK_DASH_DAMPING: f32 = 4.0;
pub const FORWARD_SLASH_SPEED: f32 = 5.0;
pub const FORWARD_SLASH_DAMPING: f32 = 2.5;
pub const MISSILE_SPEED: f32 = 6.0;
pub const MISSILE_LIFETIME: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SkillId(u64);

#[derive(Resource, Debug, Default)]
pub struct SkillIdAllocator {
    next: u64,
}

impl SkillIdAllocator {
    pub fn allocate(&mut self) -> SkillId {
        self.next += 1;
        SkillId(self.next)
    }
}

/// Physics state captured at activation so the revert can restore it.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SkillOverride {
    body: RigidBodyHandle,
    previous_damping: f32,
    body_sensor: Option<(ColliderHandle, bool)>,
    invincible: bool,
    projectile: Option<Entity>,
}

/// A live skill instance bound to its user. One-shot: `has_activated` guards
/// re-entry.
#[derive(Debug, Clone)]
pub struct Skill {
    pub id: SkillId,
    pub key: String,
    pub profile: SkillProfile,
    pub user: Entity,
    has_activated: bool,
    overrides: Option<SkillOverride>,
}

impl Skill {
    pub fn has_activated(&self) -> bool {
        self.has_activated
    }
}

/// Skills a character knows, keyed by content id.
#[derive(Component, Debug, Clone, Default)]
pub struct SkillBook {
    skills: BTreeMap<String, SkillProfile>,
}

impl SkillBook {
    pub fn learn(&mut self, key: impl Into<String>, profile: SkillProfile) {
        self.skills.insert(key.into(), profile);
    }

    pub fn get(&self, key: &str) -> Option<&SkillProfile> {
        self.skills.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SkillProfile)> {
        self.skills.iter()
    }
}

#[derive(Component, Debug, Clone, Default)]
pub struct ActiveSkills {
    skills: BTreeMap<SkillId, Skill>,
}

impl ActiveSkills {
    pub fn get(&self, id: SkillId) -> Option<&Skill> {
        self.skills.get(&id)
    }

    pub fn contains(&self, id: SkillId) -> bool {
        self.skills.contains_key(&id)
    }

    pub fn has_kind(&self, kind: SkillKind) -> bool {
        self.skills.values().any(|skill| skill.profile.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    fn insert(&mut self, skill: Skill) {
        self.skills.insert(skill.id, skill);
    }

    fn remove(&mut self, id: SkillId) -> Option<Skill> {
        self.skills.remove(&id)
    }
}

/// Pure precondition check for `profile` against `user`'s current state.
pub fn can_activate(world: &World, user: Entity, profile: &SkillProfile) -> bool {
    let (Some(character), Some(stats)) = (world.get::<Character>(user), world.get::<CharacterProfile>(user)) else {
        return false;
    };
    if character.killed {
        return false;
    }
    match profile.kind {
        SkillKind::BackDash => !character.weapon_sheathed && !character.jumping,
        SkillKind::ForwardSlash => {
            !character.weapon_sheathed && stats.can_afford(ResourcePool::Stamina, profile.delta_stamina)
        }
        SkillKind::MagicalMissile => stats.can_afford(ResourcePool::Magicka, profile.delta_magicka),
    }
}

/// Validates, registers and activates a known skill. Returns the new
/// instance id, or `None` when the skill is unknown, its preconditions fail,
/// or an instance of the same kind is still live.
pub fn use_skill(world: &mut World, user: Entity, key: &str) -> Option<SkillId> {
    let Some(profile) = world.get::<SkillBook>(user).and_then(|book| book.get(key)).cloned() else {
        log::warn!("[skill] {user:?} does not know skill '{key}'");
        return None;
    };
    if !can_activate(world, user, &profile) {
        log::debug!("[skill] '{key}' cannot be activated by {user:?}");
        return None;
    }
    if world.get::<ActiveSkills>(user).is_some_and(|active| active.has_kind(profile.kind)) {
        log::debug!("[skill] '{key}' is already active on {user:?}");
        return None;
    }
    let id = world.resource_mut::<SkillIdAllocator>().allocate();
    let skill = Skill { id, key: key.to_string(), profile, user, has_activated: false, overrides: None };
    match world.get_mut::<ActiveSkills>(user) {
        Some(mut active) => active.insert(skill),
        None => {
            let mut active = ActiveSkills::default();
            active.insert(skill);
            world.entity_mut(user).insert(active);
        }
    }
    activate_skill(world, user, id).then_some(id)
}

/// Runs the skill's effect once. Later calls for the same instance are no-ops.
pub fn activate_skill(world: &mut World, user: Entity, id: SkillId) -> bool {
    let (kind, key, deltas, frames, damage) = {
        let Some(mut active) = world.get_mut::<ActiveSkills>(user) else {
            return false;
        };
        let Some(skill) = active.skills.get_mut(&id) else {
            return false;
        };
        if skill.has_activated {
            return false;
        }
        skill.has_activated = true;
        let damage = skill.profile.physical_damage + skill.profile.magical_damage;
        (skill.profile.kind, skill.key.clone(), skill.profile.deltas(), skill.profile.frames_duration, damage)
    };

    if let Some(mut profile) = world.get_mut::<CharacterProfile>(user) {
        for (pool, delta) in deltas {
            profile.apply_delta_unclamped(pool, delta);
        }
    }

    let overrides = apply_effect(world, user, kind, damage);
    if let Some(mut active) = world.get_mut::<ActiveSkills>(user) {
        if let Some(skill) = active.skills.get_mut(&id) {
            skill.overrides = overrides;
        }
    }

    let clock = *world.resource::<SimClock>();
    world.resource_mut::<DeferredCallbacks>().run_after_frames(
        &clock,
        user,
        frames,
        DeferredAction::RevertSkill { skill: id },
    );
    world.resource_mut::<EventBus>().push(GameEvent::SkillActivated { user, skill: key });
    true
}

fn apply_effect(world: &mut World, user: Entity, kind: SkillKind, damage: i32) -> Option<SkillOverride> {
    let actor = world.get::<DynamicActor>(user)?;
    let body = actor.body()?;
    let body_fixture = actor.fixture(FixtureSlot::Body);
    let facing_right = world.get::<Character>(user).is_some_and(|c| c.facing_right);
    let direction = if facing_right { 1.0 } else { -1.0 };

    let mut physics = world.resource_mut::<PhysicsWorld>();
    let previous_damping = physics.linear_damping(body)?;
    let mut overrides =
        SkillOverride { body, previous_damping, body_sensor: None, invincible: false, projectile: None };
    match kind {
        SkillKind::BackDash => {
            physics.set_linvel(body, Vec2::new(-direction * BACK_DASH_VELOCITY.x, BACK_DASH_VELOCITY.y));
            physics.set_linear_damping(body, BACK_DASH_DAMPING);
        }
        SkillKind::ForwardSlash => {
            physics.set_linvel(body, Vec2::new(direction * FORWARD_SLASH_SPEED, 0.0));
            physics.set_linear_damping(body, FORWARD_SLASH_DAMPING);
            if let Some(fixture) = body_fixture {
                let was_sensor = physics.is_sensor(fixture).unwrap_or(false);
                physics.set_sensor(fixture, true);
                overrides.body_sensor = Some((fixture, was_sensor));
            }
            overrides.invincible = true;
            drop(physics);
            if let Some(mut character) = world.get_mut::<Character>(user) {
                character.invincible = true;
            }
        }
        SkillKind::MagicalMissile => {
            drop(physics);
            overrides.projectile = spawn_missile(world, user, direction, damage);
        }
    }
    Some(overrides)
}

fn spawn_missile(world: &mut World, user: Entity, direction: f32, damage: i32) -> Option<Entity> {
    let origin = world.get::<Transform>(user)?.translation;
    let (half_width, _) = world.get::<CharacterProfile>(user)?.body_half_extents();
    let power = damage.max(derived_stats(world, user).map(|s| s.magical_damage).unwrap_or(0));
    let velocity = Vec2::new(direction * MISSILE_SPEED, 0.0);
    let projectile = world
        .spawn((
            DynamicActor::new(ActorKind::Projectile, Some("magical_missile".to_string())),
            Projectile { owner: user, damage: power, velocity, remaining_lifetime: MISSILE_LIFETIME, spent: false },
            Transform::default(),
            Velocity(velocity),
        ))
        .id();
    let spawn_at = origin + Vec2::new(direction * (half_width + 8.0), 0.0);
    map::show_dynamic_actor(world, projectile, spawn_at);
    Some(projectile)
}

/// Deferred revert. Skipped when the user is gone; physics parameters are
/// only restored when the user still owns the exact body captured at
/// activation.
pub fn revert_skill(world: &mut World, user: Entity, id: SkillId) -> bool {
    if world.get_entity(user).is_err() {
        log::debug!("[skill] revert skipped, user {user:?} no longer exists");
        return false;
    }
    let Some(skill) = world.get_mut::<ActiveSkills>(user).and_then(|mut active| active.remove(id)) else {
        return false;
    };

    if let Some(overrides) = skill.overrides {
        let alive = world.get::<Character>(user).is_some_and(|c| !c.killed);
        let same_body = world
            .get::<DynamicActor>(user)
            .is_some_and(|actor| actor.is_shown() && actor.body() == Some(overrides.body));
        if alive && same_body {
            let mut physics = world.resource_mut::<PhysicsWorld>();
            physics.set_linear_damping(overrides.body, overrides.previous_damping);
            if let Some((fixture, was_sensor)) = overrides.body_sensor {
                physics.set_sensor(fixture, was_sensor);
            }
        }
        if overrides.invincible {
            if let Some(mut character) = world.get_mut::<Character>(user) {
                character.invincible = false;
            }
        }
        if let Some(projectile) = overrides.projectile {
            let unspent = world.get::<Projectile>(projectile).is_some_and(|p| !p.spent);
            if unspent && world.resource::<GameMap>().contains(projectile) {
                map::remove_dynamic_actor(world, projectile);
            }
        }
    }
    world.resource_mut::<EventBus>().push(GameEvent::SkillReverted { user, skill: skill.key });
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icon_path_uses_texture_dir() {
        let profile = SkillProfile { texture_res_dir: "Texture/skill/back_dash".into(), ..Default::default() };
        assert_eq!(profile.icon_path(), "Texture/skill/back_dash/icon.png");
    }

    #[test]
    fn profile_imports_kind_and_defaults() {
        let profile: SkillProfile =
            serde_json::from_str(r#"{ "kind": "back_dash", "frames_duration": 10 }"#).expect("parse skill");
        assert_eq!(profile.kind, SkillKind::BackDash);
        assert_eq!(profile.frames_duration, 10);
        assert_eq!(profile.delta_stamina, 0);
        assert!(profile.name.is_empty());
    }

    #[test]
    fn allocator_hands_out_unique_ids() {
        let mut ids = SkillIdAllocator::default();
        assert_ne!(ids.allocate(), ids.allocate());
    }
}
