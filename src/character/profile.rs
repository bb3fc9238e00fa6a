use bevy_ecs::component::Component;
use serde::{Deserialize, Serialize};

pub const LEVEL_CAP: u32 = 100;

/// Authored character data. Missing numbers import as zero and missing
/// strings as empty.
#[derive(Component, Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CharacterProfile {
    pub texture_res_path: String,
    pub sprite_offset_x: f32,
    pub sprite_offset_y: f32,
    pub sprite_scale_x: f32,
    pub sprite_scale_y: f32,
    pub frame_width: u32,
    pub frame_height: u32,

    pub name: String,
    pub level: u32,
    pub exp: u32,

    pub full_health: i32,
    pub full_stamina: i32,
    pub full_magicka: i32,
    pub health: i32,
    pub stamina: i32,
    pub magicka: i32,

    pub strength: i32,
    pub dexterity: i32,
    pub intelligence: i32,
    pub luck: i32,

    pub body_width: f32,
    pub body_height: f32,
    pub move_speed: f32,
    pub jump_height: f32,

    pub attack_force: f32,
    pub attack_time: f32,
    pub attack_range: f32,

    pub base_melee_damage: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourcePool {
    Health,
    Stamina,
    Magicka,
}

impl CharacterProfile {
    /// Pulls every pool back into `0..=full`.
    pub fn clamp_pools(&mut self) {
        self.full_health = self.full_health.max(0);
        self.full_stamina = self.full_stamina.max(0);
        self.full_magicka = self.full_magicka.max(0);
        self.health = self.health.clamp(0, self.full_health);
        self.stamina = self.stamina.clamp(0, self.full_stamina);
        self.magicka = self.magicka.clamp(0, self.full_magicka);
    }

    pub fn pool(&self, pool: ResourcePool) -> (i32, i32) {
        match pool {
            ResourcePool::Health => (self.health, self.full_health),
            ResourcePool::Stamina => (self.stamina, self.full_stamina),
            ResourcePool::Magicka => (self.magicka, self.full_magicka),
        }
    }

    /// Whether `current + delta` stays non-negative for the given pool.
    pub fn can_afford(&self, pool: ResourcePool, delta: i32) -> bool {
        let (current, _) = self.pool(pool);
        current + delta >= 0
    }

    /// Adds `delta` without clamping; skill activation relies on callers having
    /// checked affordability first.
    pub fn apply_delta_unclamped(&mut self, pool: ResourcePool, delta: i32) {
        match pool {
            ResourcePool::Health => self.health += delta,
            ResourcePool::Stamina => self.stamina += delta,
            ResourcePool::Magicka => self.magicka += delta,
        }
    }

    pub fn is_depleted(&self) -> bool {
        self.health <= 0
    }

    pub fn body_half_extents(&self) -> (f32, f32) {
        ((self.body_width * 0.5).max(1.0), (self.body_height * 0.5).max(1.0))
    }
}

/// Experience needed per level. Falls back to a linear curve when no table
/// was imported or the level lies past its end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ExpPointTable {
    pub next_level_exp: Vec<u32>,
}

impl ExpPointTable {
    pub fn next_level_exp(&self, current_level: u32) -> u32 {
        let level = current_level.max(1);
        self.next_level_exp.get(level as usize - 1).copied().unwrap_or(level * 100).max(1)
    }

    /// Adds exp and levels up while the requirement is met. Returns levels gained.
    pub fn gain_exp(&self, profile: &mut CharacterProfile, amount: u32) -> u32 {
        profile.exp = profile.exp.saturating_add(amount);
        let mut gained = 0;
        while profile.level < LEVEL_CAP {
            let needed = self.next_level_exp(profile.level);
            if profile.exp < needed {
                break;
            }
            profile.exp -= needed;
            profile.level += 1;
            gained += 1;
        }
        gained
    }
}
