use glam::Vec2;
use vigil_sim::actor::ContentId;
use vigil_sim::character::Inventory;
use vigil_sim::config::SimConfig;
use vigil_sim::content::ContentLibrary;
use vigil_sim::events::GameEvent;
use vigil_sim::map::{MapDefinition, RectDef};
use vigil_sim::GameWorld;

const TEST_DT: f32 = 1.0 / 60.0;

#[test]
fn standing_on_a_chest_opens_it_once() {
    let (mut game, player) = spawn_player_world();
    let chest = game.spawn_chest(vec!["iron_sword".to_string()], Vec2::new(0.0, 30.0));
    for _ in 0..60 {
        game.update(TEST_DT);
    }
    assert_eq!(game.character(player).expect("character").interactable_target, Some(chest));
    let actors_before = game.map().actor_count();
    game.drain_events();

    assert!(game.interact(player));
    assert_eq!(game.map().actor_count(), actors_before + 1, "the chest spilled its item");
    assert!(game.drain_events().contains(&GameEvent::ChestOpened { chest }));
    assert!(!game.interact(player), "an opened chest stays empty");
}

#[test]
fn picking_up_an_item_moves_it_into_the_inventory() {
    let (mut game, player) = spawn_player_world();
    let sword = game.spawn_item("iron_sword", 1, Vec2::new(0.0, 20.0)).expect("known item");
    assert!(game.map().contains(sword));
    game.drain_events();

    assert!(game.interact_with(player, sword));
    assert!(!game.exists(sword));
    assert_eq!(game.world.get::<Inventory>(player).expect("inventory").count("iron_sword"), 1);
    let events = game.drain_events();
    assert!(events.contains(&GameEvent::Notification { message: "Picked up Iron Sword x1".to_string() }));
    assert!(events.contains(&GameEvent::ItemPickedUp { user: player, item: "iron_sword".to_string() }));
}

#[test]
fn talking_to_a_recruitable_npc_recruits_it() {
    let (mut game, player) = spawn_player_world();
    let ally = game.spawn_npc("ally_01", Vec2::new(60.0, 45.0)).expect("known npc").expect("spawned");
    let goblin = game.spawn_npc("goblin_01", Vec2::new(-60.0, 45.0)).expect("known npc").expect("spawned");

    assert!(!game.interact_with(player, goblin), "enemies do not talk");
    assert!(game.interact_with(player, ally));
    assert_eq!(game.leader_of(ally), Some(player));
    assert!(!game.active_dialogue().is_active());
}

#[test]
fn dialogue_commands_drive_the_party() {
    let (mut game, player) = spawn_player_world();
    let ally = game.spawn_npc("ally_01", Vec2::new(60.0, 45.0)).expect("known npc").expect("spawned");

    assert!(game.run_dialogue_command(player, ally, "recruit"));
    assert!(game.run_dialogue_command(player, ally, "wait"));
    assert!(game.has_waiting_member(player, "ally_01"));
    assert!(game.run_dialogue_command(player, ally, "follow"));
    assert!(game.run_dialogue_command(player, ally, "dismiss"));
    assert_eq!(game.leader_of(ally), None);
    assert!(!game.run_dialogue_command(player, ally, "dance"));
    assert!(!game.run_dialogue_command(player, ally, "trade"), "ally_01 is not a trader");
}

#[test]
fn a_second_dialogue_cannot_start_while_one_is_active() {
    let (mut game, player) = spawn_player_world();
    let elder = game.spawn_npc("elder_01", Vec2::new(60.0, 45.0)).expect("known npc").expect("spawned");

    assert!(game.interact_with(player, elder));
    assert_eq!(game.active_dialogue().tree, "village_elder");
    assert!(!game.interact_with(player, elder));
    assert!(game.end_dialogue());
    assert!(!game.end_dialogue());
    let id = game.world.get::<ContentId>(elder).expect("content id");
    assert_eq!(id.as_str(), "elder_01");
}

fn spawn_player_world() -> (GameWorld, bevy_ecs::prelude::Entity) {
    let content =
        ContentLibrary::from_json_str(include_str!("../fixtures/content.json")).expect("content bundle parses");
    let mut game = GameWorld::new(&SimConfig::default(), content);
    game.load_map(&MapDefinition {
        id: "camp".to_string(),
        ground: vec![RectDef { x: 0.0, y: 0.0, width: 2000.0, height: 20.0 }],
        ..MapDefinition::default()
    });
    let player = game.spawn_player("hero", Vec2::new(0.0, 45.0)).expect("known player");
    (game, player)
}
