use crate::actor::{position_of, ActorKind, Chest, ContentId, DynamicActor, ItemDrop};
use crate::character::{is_alive, Character, Disposition, Inventory, NpcProfile};
use crate::events::{EventBus, GameEvent};
use crate::map;
use crate::notifications;
use crate::party::{self, PartyMembership};
use crate::spawn::{self, SpawnRegistry};
use bevy_ecs::prelude::*;
use glam::Vec2;

/// Dialogue in progress. While set, NPC autonomy is frozen.
#[derive(Resource, Debug, Clone, Default, PartialEq)]
pub struct ActiveDialogue {
    pub user: Option<Entity>,
    pub npc: Option<Entity>,
    pub tree: String,
}

impl ActiveDialogue {
    pub fn is_active(&self) -> bool {
        self.npc.is_some()
    }
}

const CHEST_DROP_HEIGHT: f32 = 20.0;

/// Whether touching the target is enough to trigger its interaction.
pub fn will_interact_on_contact(kind: ActorKind) -> bool {
    match kind {
        ActorKind::Character | ActorKind::Chest | ActorKind::Item | ActorKind::Projectile => false,
    }
}

/// Interacts with whatever the user's feet are currently touching.
pub fn interact(world: &mut World, user: Entity) -> bool {
    let Some(target) = world.get::<Character>(user).and_then(|c| c.interactable_target) else {
        return false;
    };
    on_interact(world, user, target)
}

pub fn on_interact(world: &mut World, user: Entity, target: Entity) -> bool {
    if user == target || !is_alive(world, user) {
        return false;
    }
    match world.get::<DynamicActor>(target).map(|actor| actor.kind) {
        Some(ActorKind::Character) => interact_with_npc(world, user, target),
        Some(ActorKind::Chest) => open_chest(world, user, target),
        Some(ActorKind::Item) => pick_up_item(world, user, target),
        Some(ActorKind::Projectile) | None => false,
    }
}

fn interact_with_npc(world: &mut World, user: Entity, npc: Entity) -> bool {
    let Some(profile) = world.get::<NpcProfile>(npc).cloned() else {
        return false;
    };
    if !is_alive(world, npc) {
        return false;
    }
    let in_party = world.get::<PartyMembership>(npc).is_some();
    if profile.disposition == Disposition::Enemy && !in_party {
        return false;
    }
    if profile.has_dialogue() {
        begin_dialogue(world, user, npc, &profile.dialogue_tree)
    } else if profile.is_tradable {
        begin_trade(world, npc)
    } else if profile.is_recruitable && !in_party {
        party::recruit(world, user, npc)
    } else {
        false
    }
}

pub fn begin_dialogue(world: &mut World, user: Entity, npc: Entity, tree: &str) -> bool {
    if world.resource::<ActiveDialogue>().is_active() {
        log::debug!("[dialogue] already talking, ignoring {npc:?}");
        return false;
    }
    world.resource_mut::<SpawnRegistry>().set_npcs_allowed_to_act(false);
    *world.resource_mut::<ActiveDialogue>() = ActiveDialogue { user: Some(user), npc: Some(npc), tree: tree.to_string() };
    log::info!("[dialogue] {user:?} talks to {npc:?} ({tree})");
    world.resource_mut::<EventBus>().push(GameEvent::DialogueBegan { npc, tree: tree.to_string() });
    true
}

pub fn end_dialogue(world: &mut World) -> bool {
    if !world.resource::<ActiveDialogue>().is_active() {
        return false;
    }
    *world.resource_mut::<ActiveDialogue>() = ActiveDialogue::default();
    world.resource_mut::<SpawnRegistry>().set_npcs_allowed_to_act(true);
    world.resource_mut::<EventBus>().push(GameEvent::DialogueEnded);
    true
}

pub fn begin_trade(world: &mut World, npc: Entity) -> bool {
    let tradable = world.get::<NpcProfile>(npc).is_some_and(|p| p.is_tradable);
    if !tradable {
        return false;
    }
    world.resource_mut::<EventBus>().push(GameEvent::TradeBegan { npc });
    true
}

/// Executes a verb picked from a dialogue tree.
pub fn run_dialogue_command(world: &mut World, user: Entity, npc: Entity, command: &str) -> bool {
    match command.trim() {
        "recruit" => party::recruit(world, user, npc),
        "dismiss" => party::dismiss(world, user, npc, true),
        "wait" => party::ask_member_to_wait(world, user, npc),
        "follow" => party::ask_member_to_follow(world, user, npc),
        "trade" => begin_trade(world, npc),
        "end" => end_dialogue(world),
        other => {
            log::warn!("[dialogue] unknown command '{other}'");
            false
        }
    }
}

fn open_chest(world: &mut World, user: Entity, chest: Entity) -> bool {
    let items = {
        let Some(mut state) = world.get_mut::<Chest>(chest) else {
            return false;
        };
        if state.opened {
            return false;
        }
        state.opened = true;
        state.items.clone()
    };
    let origin = position_of(world, chest).unwrap_or_default();
    for item_id in &items {
        if let Err(err) = spawn::spawn_item(world, item_id, 1, origin + Vec2::new(0.0, CHEST_DROP_HEIGHT)) {
            log::warn!("[interaction] chest {chest:?}: {err}");
        }
    }
    log::debug!("[interaction] {user:?} opened {chest:?} ({} items)", items.len());
    world.resource_mut::<EventBus>().push(GameEvent::ChestOpened { chest });
    true
}

fn pick_up_item(world: &mut World, user: Entity, item: Entity) -> bool {
    let Some(drop) = world.get::<ItemDrop>(item).cloned() else {
        return false;
    };
    let Some(item_id) = world.get::<ContentId>(item).map(|id| id.0.clone()) else {
        return false;
    };
    {
        let Some(mut inventory) = world.get_mut::<Inventory>(user) else {
            return false;
        };
        inventory.add(&item_id, drop.amount);
    }
    map::remove_dynamic_actor(world, item);
    notifications::notify(world, format!("Picked up {} x{}", drop.profile.name, drop.amount));
    world.resource_mut::<EventBus>().push(GameEvent::ItemPickedUp { user, item: item_id });
    true
}
