use super::profile::CharacterProfile;
use bevy_ecs::prelude::Component;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Equipment,
    Consumable,
    #[default]
    Misc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentSlot {
    Weapon,
    Head,
    Armor,
    Gauntlets,
    Boots,
    Cape,
    Ring,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EquipmentBonuses {
    pub physical_damage: i32,
    pub magical_damage: i32,
    pub defense: i32,
    pub strength: i32,
    pub dexterity: i32,
    pub intelligence: i32,
    pub luck: i32,
    pub move_speed: f32,
    pub jump_height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ItemProfile {
    pub item_type: ItemType,
    pub texture_res_dir: String,
    pub name: String,
    pub desc: String,
    pub slot: Option<EquipmentSlot>,
    pub bonuses: EquipmentBonuses,
}

impl ItemProfile {
    pub fn icon_path(&self) -> String {
        format!("{}/icon.png", self.texture_res_dir)
    }

    pub fn is_equipment(&self) -> bool {
        self.item_type == ItemType::Equipment && self.slot.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquippedItem {
    pub item_id: String,
    pub profile: ItemProfile,
}

#[derive(Component, Debug, Clone, Default)]
pub struct Equipment {
    slots: BTreeMap<EquipmentSlot, EquippedItem>,
}

impl Equipment {
    pub fn get(&self, slot: EquipmentSlot) -> Option<&EquippedItem> {
        self.slots.get(&slot)
    }

    /// Places the item in its slot and hands back whatever was there.
    pub fn equip(&mut self, slot: EquipmentSlot, item: EquippedItem) -> Option<EquippedItem> {
        self.slots.insert(slot, item)
    }

    pub fn unequip(&mut self, slot: EquipmentSlot) -> Option<EquippedItem> {
        self.slots.remove(&slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EquipmentSlot, &EquippedItem)> {
        self.slots.iter()
    }

    pub fn total_bonuses(&self) -> EquipmentBonuses {
        self.slots.values().fold(EquipmentBonuses::default(), |mut acc, item| {
            let b = &item.profile.bonuses;
            acc.physical_damage += b.physical_damage;
            acc.magical_damage += b.magical_damage;
            acc.defense += b.defense;
            acc.strength += b.strength;
            acc.dexterity += b.dexterity;
            acc.intelligence += b.intelligence;
            acc.luck += b.luck;
            acc.move_speed += b.move_speed;
            acc.jump_height += b.jump_height;
            acc
        })
    }
}

#[derive(Component, Debug, Clone, Default)]
pub struct Inventory {
    items: HashMap<String, u32>,
}

impl Inventory {
    pub fn add(&mut self, item_id: &str, amount: u32) {
        if amount == 0 {
            return;
        }
        *self.items.entry(item_id.to_string()).or_default() += amount;
    }

    pub fn remove(&mut self, item_id: &str, amount: u32) -> bool {
        let Some(count) = self.items.get_mut(item_id) else {
            return false;
        };
        if *count < amount {
            return false;
        }
        *count -= amount;
        if *count == 0 {
            self.items.remove(item_id);
        }
        true
    }

    pub fn count(&self, item_id: &str) -> u32 {
        self.items.get(item_id).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Base profile plus equipment bonuses, computed on demand so the two never
/// drift apart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedStats {
    pub strength: i32,
    pub dexterity: i32,
    pub intelligence: i32,
    pub luck: i32,
    pub move_speed: f32,
    pub jump_height: f32,
    pub physical_damage: i32,
    pub magical_damage: i32,
    pub defense: i32,
}

impl DerivedStats {
    pub fn compute(profile: &CharacterProfile, equipment: Option<&Equipment>) -> Self {
        let bonuses = equipment.map(Equipment::total_bonuses).unwrap_or_default();
        let strength = profile.strength + bonuses.strength;
        let intelligence = profile.intelligence + bonuses.intelligence;
        Self {
            strength,
            dexterity: profile.dexterity + bonuses.dexterity,
            intelligence,
            luck: profile.luck + bonuses.luck,
            move_speed: (profile.move_speed + bonuses.move_speed).max(0.0),
            jump_height: (profile.jump_height + bonuses.jump_height).max(0.0),
            physical_damage: profile.base_melee_damage + bonuses.physical_damage + strength / 5,
            magical_damage: bonuses.magical_damage + intelligence / 5,
            defense: bonuses.defense.max(0),
        }
    }
}
