use anyhow::{Context, Result};
use bevy_ecs::prelude::Resource;
use glam::Vec2;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct PhysicsConfig {
    #[serde(default = "PhysicsConfig::default_gravity")]
    pub gravity: [f32; 2],
    #[serde(default = "PhysicsConfig::default_pixels_per_meter")]
    pub pixels_per_meter: f32,
    #[serde(default = "PhysicsConfig::default_allow_sleeping")]
    pub allow_sleeping: bool,
    #[serde(default = "PhysicsConfig::default_continuous_physics")]
    pub continuous_physics: bool,
    #[serde(default)]
    pub default_linear_damping: f32,
}

#[derive(Resource, Debug, Clone, Deserialize)]
pub struct NpcConfig {
    #[serde(default = "NpcConfig::default_perception_range")]
    pub perception_range: f32,
    #[serde(default = "NpcConfig::default_follow_distance")]
    pub follow_distance: f32,
    #[serde(default = "NpcConfig::default_stuck_check_interval")]
    pub stuck_check_interval: f32,
    #[serde(default = "NpcConfig::default_stuck_threshold")]
    pub stuck_threshold: f32,
    #[serde(default = "NpcConfig::default_min_move")]
    pub min_move: f32,
    #[serde(default = "NpcConfig::default_max_move")]
    pub max_move: f32,
    #[serde(default = "NpcConfig::default_min_wait")]
    pub min_wait: f32,
    #[serde(default = "NpcConfig::default_max_wait")]
    pub max_wait: f32,
}

#[derive(Resource, Debug, Clone, Deserialize)]
pub struct CombatConfig {
    #[serde(default = "CombatConfig::default_corpse_linger_frames")]
    pub corpse_linger_frames: u64,
    #[serde(default = "CombatConfig::default_exp_per_victim_level")]
    pub exp_per_victim_level: u32,
    #[serde(default = "CombatConfig::default_knockback_scale")]
    pub knockback_scale: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "NotificationConfig::default_max_labels")]
    pub max_labels: usize,
    #[serde(default = "NotificationConfig::default_label_lifetime")]
    pub label_lifetime: f32,
    #[serde(default = "NotificationConfig::default_damage_label_lifetime")]
    pub damage_label_lifetime: f32,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SimConfig {
    #[serde(default)]
    pub physics: PhysicsConfig,
    #[serde(default)]
    pub npc: NpcConfig,
    #[serde(default)]
    pub combat: CombatConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct SimOverrides {
    pub seed: Option<u64>,
    pub gravity: Option<Vec2>,
}

impl PhysicsConfig {
    fn default_gravity() -> [f32; 2] {
        [0.0, -9.8]
    }

    const fn default_pixels_per_meter() -> f32 {
        100.0
    }

    const fn default_allow_sleeping() -> bool {
        true
    }

    const fn default_continuous_physics() -> bool {
        true
    }

    pub fn gravity_vec(&self) -> Vec2 {
        Vec2::new(self.gravity[0], self.gravity[1])
    }
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Self::default_gravity(),
            pixels_per_meter: Self::default_pixels_per_meter(),
            allow_sleeping: Self::default_allow_sleeping(),
            continuous_physics: Self::default_continuous_physics(),
            default_linear_damping: 0.0,
        }
    }
}

impl NpcConfig {
    const fn default_perception_range() -> f32 {
        200.0
    }

    const fn default_follow_distance() -> f32 {
        60.0
    }

    const fn default_stuck_check_interval() -> f32 {
        0.5
    }

    const fn default_stuck_threshold() -> f32 {
        2.0
    }

    const fn default_min_move() -> f32 {
        1.0
    }

    const fn default_max_move() -> f32 {
        3.0
    }

    const fn default_min_wait() -> f32 {
        2.0
    }

    const fn default_max_wait() -> f32 {
        5.0
    }
}

impl Default for NpcConfig {
    fn default() -> Self {
        Self {
            perception_range: Self::default_perception_range(),
            follow_distance: Self::default_follow_distance(),
            stuck_check_interval: Self::default_stuck_check_interval(),
            stuck_threshold: Self::default_stuck_threshold(),
            min_move: Self::default_min_move(),
            max_move: Self::default_max_move(),
            min_wait: Self::default_min_wait(),
            max_wait: Self::default_max_wait(),
        }
    }
}

impl CombatConfig {
    const fn default_corpse_linger_frames() -> u64 {
        60
    }

    const fn default_exp_per_victim_level() -> u32 {
        10
    }

    const fn default_knockback_scale() -> f32 {
        1.0
    }
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            corpse_linger_frames: Self::default_corpse_linger_frames(),
            exp_per_victim_level: Self::default_exp_per_victim_level(),
            knockback_scale: Self::default_knockback_scale(),
        }
    }
}

impl NotificationConfig {
    const fn default_max_labels() -> usize {
        10
    }

    const fn default_label_lifetime() -> f32 {
        5.0
    }

    const fn default_damage_label_lifetime() -> f32 {
        1.5
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            max_labels: Self::default_max_labels(),
            label_lifetime: Self::default_label_lifetime(),
            damage_label_lifetime: Self::default_damage_label_lifetime(),
        }
    }
}

impl SimConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::warn!("Config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &SimOverrides) {
        if let Some(seed) = overrides.seed {
            self.seed = Some(seed);
        }
        if let Some(gravity) = overrides.gravity {
            self.physics.gravity = [gravity.x, gravity.y];
        }
    }
}

impl SimOverrides {
    pub fn is_empty(&self) -> bool {
        self.seed.is_none() && self.gravity.is_none()
    }
}
