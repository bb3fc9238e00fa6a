use bevy_ecs::prelude::{Component, Entity};
use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An NPC's friendliness toward the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    #[default]
    Ally,
    Enemy,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DroppedItemData {
    /// Percent chance in `0..=100`.
    pub chance: u32,
    pub min_amount: u32,
    pub max_amount: u32,
}

#[derive(Component, Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NpcProfile {
    pub dropped_items: BTreeMap<String, DroppedItemData>,
    pub dialogue_tree: String,
    pub disposition: Disposition,
    pub is_respawnable: bool,
    pub is_recruitable: bool,
    pub is_unsheathed: bool,
    pub is_tradable: bool,
    pub should_sandbox: bool,
}

impl NpcProfile {
    pub fn has_dialogue(&self) -> bool {
        !self.dialogue_tree.is_empty()
    }

    /// Rolls every dropped-item entry once. Returns `(item_id, amount)` pairs.
    pub fn roll_drops<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<(String, u32)> {
        let mut drops = Vec::new();
        for (item_id, data) in &self.dropped_items {
            if data.chance == 0 || rng.gen_range(0..100) >= data.chance {
                continue;
            }
            let (lo, hi) = (data.min_amount.min(data.max_amount), data.min_amount.max(data.max_amount));
            let amount = rng.gen_range(lo..=hi);
            if amount > 0 {
                drops.push((item_id.clone(), amount));
            }
        }
        drops
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NpcState {
    #[default]
    Idle,
    WanderRandomly,
    MoveToTarget,
    Combat,
    Dead,
}

#[derive(Debug, Clone, Copy, Default)]
struct WanderState {
    moving_right: bool,
    move_duration: f32,
    move_timer: f32,
    wait_duration: f32,
    wait_timer: f32,
}

#[derive(Debug, Clone, Copy, Default)]
struct StuckState {
    timer: f32,
    last_stopped_position: Vec2,
}

#[derive(Component, Debug, Clone, Default)]
pub struct NpcBrain {
    pub state: NpcState,
    pub locked_on_target: Option<Entity>,
    wander: WanderState,
    stuck: StuckState,
}

impl NpcBrain {
    pub fn is_dead(&self) -> bool {
        self.state == NpcState::Dead
    }

    /// Walk for a random duration, then idle for a random duration, then pick
    /// a new direction. Returns the horizontal intent for this frame.
    pub fn move_randomly<R: Rng + ?Sized>(
        &mut self,
        delta: f32,
        rng: &mut R,
        (min_move, max_move): (f32, f32),
        (min_wait, max_wait): (f32, f32),
    ) -> f32 {
        let wander = &mut self.wander;
        if wander.move_timer <= wander.move_duration {
            wander.move_timer += delta;
            return if wander.moving_right { 1.0 } else { -1.0 };
        }
        if wander.wait_timer <= wander.wait_duration {
            wander.wait_timer += delta;
            return 0.0;
        }
        wander.moving_right = rng.gen_bool(0.5);
        wander.move_duration = sample_range(rng, min_move, max_move);
        wander.wait_duration = sample_range(rng, min_wait, max_wait);
        wander.move_timer = 0.0;
        wander.wait_timer = 0.0;
        0.0
    }

    pub fn reverse_direction(&mut self) {
        self.wander.moving_right = !self.wander.moving_right;
    }

    pub fn is_moving_right(&self) -> bool {
        self.wander.moving_right
    }

    /// Samples the position every `check_interval` seconds; reports a jump when
    /// the actor tried to walk but barely moved since the last sample.
    pub fn jump_if_stuck(
        &mut self,
        delta: f32,
        check_interval: f32,
        position: Vec2,
        horizontal_intent: f32,
        threshold: f32,
    ) -> bool {
        let stuck = &mut self.stuck;
        stuck.timer += delta;
        if stuck.timer < check_interval {
            return false;
        }
        stuck.timer = 0.0;
        let displacement = position.distance(stuck.last_stopped_position);
        stuck.last_stopped_position = position;
        horizontal_intent != 0.0 && displacement < threshold
    }
}

fn sample_range<R: Rng + ?Sized>(rng: &mut R, min: f32, max: f32) -> f32 {
    let (lo, hi) = (min.min(max), min.max(max));
    if hi - lo <= f32::EPSILON {
        return lo;
    }
    rng.gen_range(lo..hi)
}
