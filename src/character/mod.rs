pub mod equipment;
pub mod npc;
pub mod profile;

pub use equipment::{
    DerivedStats, Equipment, EquipmentBonuses, EquipmentSlot, EquippedItem, Inventory, ItemProfile, ItemType,
};
pub use npc::{Disposition, DroppedItemData, NpcBrain, NpcProfile, NpcState};
pub use profile::{CharacterProfile, ExpPointTable, ResourcePool, LEVEL_CAP};

use crate::actor::DynamicActor;
use crate::content::ContentLibrary;
use crate::physics::PhysicsWorld;
use bevy_ecs::prelude::*;
use glam::Vec2;
use rapier2d::prelude::RigidBodyHandle;
use smallvec::SmallVec;

/// Who drives a character's `MovementIntent`.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    PlayerInput,
    Autonomy,
}

/// Per-frame intent, consumed after the physics step. `jump` is one-shot.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct MovementIntent {
    pub horizontal: f32,
    pub jump: bool,
    pub crouch: bool,
    pub face_right: Option<bool>,
}

#[derive(Component, Debug, Clone)]
pub struct Character {
    pub facing_right: bool,
    pub weapon_sheathed: bool,
    pub crouching: bool,
    pub jumping: bool,
    pub attacking: bool,
    pub invincible: bool,
    pub killed: bool,
    pub ground_contacts: u32,
    pub interactable_target: Option<Entity>,
    pub in_range_targets: SmallVec<[Entity; 4]>,
}

impl Default for Character {
    fn default() -> Self {
        Self {
            facing_right: true,
            weapon_sheathed: true,
            crouching: false,
            jumping: false,
            attacking: false,
            invincible: false,
            killed: false,
            ground_contacts: 0,
            interactable_target: None,
            in_range_targets: SmallVec::new(),
        }
    }
}

impl Character {
    /// Jumping, or falling with no walkable surface under the feet.
    pub fn is_airborne(&self) -> bool {
        self.jumping || self.ground_contacts == 0
    }

    pub fn add_in_range_target(&mut self, target: Entity) {
        if !self.in_range_targets.contains(&target) {
            self.in_range_targets.push(target);
        }
    }

    pub fn remove_in_range_target(&mut self, target: Entity) {
        self.in_range_targets.retain(|e| *e != target);
    }

    /// Drops every reference this character holds to `other`.
    pub fn forget(&mut self, other: Entity) {
        self.remove_in_range_target(other);
        if self.interactable_target == Some(other) {
            self.interactable_target = None;
        }
    }

    pub fn reset_contacts(&mut self) {
        self.ground_contacts = 0;
        self.interactable_target = None;
        self.in_range_targets.clear();
    }

    pub fn land(&mut self) {
        self.ground_contacts += 1;
        self.jumping = false;
    }

    pub fn leave_ground(&mut self) {
        self.ground_contacts = self.ground_contacts.saturating_sub(1);
    }
}

// Speeds are in meters per second; positions elsewhere are pixels.

pub(crate) fn apply_move(
    character: &mut Character,
    physics: &mut PhysicsWorld,
    body: RigidBodyHandle,
    move_speed: f32,
    direction: f32,
) -> bool {
    if character.killed || character.crouching || direction == 0.0 {
        return false;
    }
    character.facing_right = direction > 0.0;
    let vy = physics.linvel(body).map(|v| v.y).unwrap_or(0.0);
    physics.set_linvel(body, Vec2::new(direction.signum() * move_speed, vy))
}

pub(crate) fn apply_jump(
    character: &mut Character,
    physics: &mut PhysicsWorld,
    body: RigidBodyHandle,
    jump_height: f32,
) -> bool {
    if character.killed || character.crouching || character.is_airborne() {
        return false;
    }
    let vx = physics.linvel(body).map(|v| v.x).unwrap_or(0.0);
    if !physics.set_linvel(body, Vec2::new(vx, jump_height)) {
        return false;
    }
    character.jumping = true;
    true
}

pub fn derived_stats(world: &World, entity: Entity) -> Option<DerivedStats> {
    let profile = world.get::<CharacterProfile>(entity)?;
    Some(DerivedStats::compute(profile, world.get::<Equipment>(entity)))
}

fn character_body(world: &World, entity: Entity) -> Option<RigidBodyHandle> {
    world.get::<DynamicActor>(entity).and_then(DynamicActor::body)
}

pub fn move_character(world: &mut World, entity: Entity, direction: f32) -> bool {
    let (Some(stats), Some(body)) = (derived_stats(world, entity), character_body(world, entity)) else {
        return false;
    };
    world.resource_scope(|world, mut physics: Mut<PhysicsWorld>| {
        let Some(mut character) = world.get_mut::<Character>(entity) else {
            return false;
        };
        apply_move(&mut character, &mut physics, body, stats.move_speed, direction)
    })
}

pub fn jump(world: &mut World, entity: Entity) -> bool {
    let (Some(stats), Some(body)) = (derived_stats(world, entity), character_body(world, entity)) else {
        return false;
    };
    world.resource_scope(|world, mut physics: Mut<PhysicsWorld>| {
        let Some(mut character) = world.get_mut::<Character>(entity) else {
            return false;
        };
        apply_jump(&mut character, &mut physics, body, stats.jump_height)
    })
}

pub fn crouch(world: &mut World, entity: Entity, crouching: bool) -> bool {
    {
        let Some(mut character) = world.get_mut::<Character>(entity) else {
            return false;
        };
        if character.killed {
            return false;
        }
        character.crouching = crouching;
    }
    if let Some(mut intent) = world.get_mut::<MovementIntent>(entity) {
        intent.crouch = crouching;
    }
    true
}

pub fn sheathe_weapon(world: &mut World, entity: Entity, sheathed: bool) -> bool {
    let Some(mut character) = world.get_mut::<Character>(entity) else {
        return false;
    };
    if character.killed || character.weapon_sheathed == sheathed {
        return false;
    }
    character.weapon_sheathed = sheathed;
    true
}

/// Moves one `item_id` from the inventory into its equipment slot. A
/// previously equipped item goes back to the inventory.
pub fn equip(world: &mut World, entity: Entity, item_id: &str) -> bool {
    let profile = match world.resource::<ContentLibrary>().item(item_id) {
        Ok(profile) => profile.clone(),
        Err(err) => {
            log::warn!("[equipment] {err}");
            return false;
        }
    };
    let Some(slot) = profile.slot.filter(|_| profile.is_equipment()) else {
        log::warn!("[equipment] '{item_id}' cannot be equipped");
        return false;
    };
    if !world.get_mut::<Inventory>(entity).is_some_and(|mut inventory| inventory.remove(item_id, 1)) {
        return false;
    }
    let previous = world
        .get_mut::<Equipment>(entity)
        .and_then(|mut equipment| equipment.equip(slot, EquippedItem { item_id: item_id.to_string(), profile }));
    if let (Some(previous), Some(mut inventory)) = (previous, world.get_mut::<Inventory>(entity)) {
        inventory.add(&previous.item_id, 1);
    }
    true
}

pub fn unequip(world: &mut World, entity: Entity, slot: EquipmentSlot) -> bool {
    let Some(removed) = world.get_mut::<Equipment>(entity).and_then(|mut equipment| equipment.unequip(slot)) else {
        return false;
    };
    if let Some(mut inventory) = world.get_mut::<Inventory>(entity) {
        inventory.add(&removed.item_id, 1);
    }
    true
}

pub fn is_alive(world: &World, entity: Entity) -> bool {
    world.get::<Character>(entity).is_some_and(|c| !c.killed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forget_scrubs_targets() {
        let mut world = World::new();
        let other = world.spawn_empty().id();
        let mut character = Character::default();
        character.add_in_range_target(other);
        character.add_in_range_target(other);
        character.interactable_target = Some(other);
        assert_eq!(character.in_range_targets.len(), 1);
        character.forget(other);
        assert!(character.in_range_targets.is_empty());
        assert!(character.interactable_target.is_none());
    }

    #[test]
    fn landing_clears_jump_and_leaving_saturates() {
        let mut character = Character { jumping: true, ..Character::default() };
        character.land();
        assert!(!character.is_airborne());
        character.leave_ground();
        character.leave_ground();
        assert_eq!(character.ground_contacts, 0);
        assert!(character.is_airborne(), "no contacts means falling");
    }
}
