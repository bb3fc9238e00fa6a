use bevy_ecs::prelude::Entity;
use glam::Vec2;
use vigil_sim::actor::ContentId;
use vigil_sim::ai::find_new_locked_on_target_from_party;
use vigil_sim::character::NpcBrain;
use vigil_sim::config::SimConfig;
use vigil_sim::content::ContentLibrary;
use vigil_sim::events::GameEvent;
use vigil_sim::map::{MapDefinition, NpcSpawn, PointDef, RectDef};
use vigil_sim::GameWorld;

const TEST_DT: f32 = 1.0 / 60.0;

#[test]
fn killed_spawn_once_npc_stays_gone_across_reloads() {
    let mut game = spawn_world(&goblin_map(150.0));
    let goblin = find_on_map(&game, "goblin_01").expect("goblin spawned");

    assert!(game.kill(goblin, None));
    game.load_map(&goblin_map(150.0));
    assert!(find_on_map(&game, "goblin_01").is_none());
    game.load_map(&goblin_map(150.0));
    assert!(find_on_map(&game, "goblin_01").is_none());

    game.reset_spawn_registry();
    game.load_map(&goblin_map(150.0));
    assert!(find_on_map(&game, "goblin_01").is_some());
}

#[test]
fn respawnable_npc_returns_after_death() {
    let map = MapDefinition {
        npcs: vec![NpcSpawn { content_id: "elder_01".to_string(), x: 300.0, y: 45.0 }],
        ..goblin_map(150.0)
    };
    let mut game = spawn_world(&map);
    let elder = find_on_map(&game, "elder_01").expect("elder spawned");

    assert!(game.kill(elder, None));
    assert!(game.is_npc_allowed_to_spawn("elder_01"));
    game.load_map(&map);
    assert!(find_on_map(&game, "elder_01").is_some());
}

#[test]
fn enemy_hunts_and_hits_the_player() {
    let mut game = spawn_world(&goblin_map(150.0));
    let player = game.player().expect("player spawned");
    let goblin = find_on_map(&game, "goblin_01").expect("goblin spawned");

    for _ in 0..30 {
        game.update(TEST_DT);
    }
    let brain = game.world.get::<NpcBrain>(goblin).expect("brain");
    assert_eq!(brain.locked_on_target, Some(player));
    assert!(game.position(goblin).expect("goblin").x < 150.0);

    let mut hits = 0;
    for _ in 0..240 {
        game.update(TEST_DT);
        hits += game
            .drain_events()
            .iter()
            .filter(|event| matches!(event, GameEvent::DamageDealt { source: Some(s), target, .. } if *s == goblin && *target == player))
            .count();
    }
    assert!(hits > 0, "goblin never landed a hit");
    assert!(game.profile(player).expect("player").health < 100);
}

#[test]
fn enemy_ignores_players_outside_perception() {
    let mut game = spawn_world(&goblin_map(900.0));
    let goblin = find_on_map(&game, "goblin_01").expect("goblin spawned");

    for _ in 0..60 {
        game.update(TEST_DT);
    }
    assert!(game.world.get::<NpcBrain>(goblin).expect("brain").locked_on_target.is_none());
    assert!((game.position(goblin).expect("goblin").x - 900.0).abs() < 1.0);
}

#[test]
fn dialogue_freezes_every_npc_until_it_ends() {
    let map = MapDefinition {
        npcs: vec![
            NpcSpawn { content_id: "goblin_01".to_string(), x: 150.0, y: 45.0 },
            NpcSpawn { content_id: "elder_01".to_string(), x: -40.0, y: 45.0 },
        ],
        ..goblin_map(150.0)
    };
    let mut game = spawn_world(&map);
    let player = game.player().expect("player spawned");
    let goblin = find_on_map(&game, "goblin_01").expect("goblin spawned");
    let elder = find_on_map(&game, "elder_01").expect("elder spawned");

    assert!(game.interact_with(player, elder));
    assert!(game.active_dialogue().is_active());
    assert!(!game.npcs_allowed_to_act());
    for _ in 0..60 {
        game.update(TEST_DT);
    }
    assert!((game.position(goblin).expect("goblin").x - 150.0).abs() < 1.0, "goblin moved during dialogue");
    assert!(game.world.get::<NpcBrain>(goblin).expect("brain").locked_on_target.is_none());

    assert!(game.run_dialogue_command(player, elder, "end"));
    assert!(game.npcs_allowed_to_act());
    for _ in 0..30 {
        game.update(TEST_DT);
    }
    assert!(game.position(goblin).expect("goblin").x < 149.0);
}

#[test]
fn despawning_the_speaker_ends_the_dialogue() {
    let map = MapDefinition {
        npcs: vec![NpcSpawn { content_id: "elder_01".to_string(), x: -40.0, y: 45.0 }],
        ..goblin_map(150.0)
    };
    let mut game = spawn_world(&map);
    let player = game.player().expect("player spawned");
    let elder = find_on_map(&game, "elder_01").expect("elder spawned");

    assert!(game.interact_with(player, elder));
    assert!(game.despawn(elder));
    assert!(!game.active_dialogue().is_active());
    assert!(game.npcs_allowed_to_act());
    assert!(game.drain_events().iter().any(|event| matches!(event, GameEvent::DialogueEnded)));
}

#[test]
fn leaving_the_map_mid_dialogue_unfreezes_npcs() {
    let map = MapDefinition {
        npcs: vec![NpcSpawn { content_id: "elder_01".to_string(), x: -40.0, y: 45.0 }],
        ..goblin_map(150.0)
    };
    let mut game = spawn_world(&map);
    let player = game.player().expect("player spawned");
    let elder = find_on_map(&game, "elder_01").expect("elder spawned");
    assert!(game.interact_with(player, elder));

    game.load_map(&goblin_map(150.0));
    assert!(!game.exists(elder));
    assert!(!game.active_dialogue().is_active());
    assert!(game.npcs_allowed_to_act());
}

#[test]
fn sandboxing_npc_wanders_on_its_own() {
    let map = MapDefinition {
        npcs: vec![NpcSpawn { content_id: "elder_01".to_string(), x: 300.0, y: 45.0 }],
        ..goblin_map(150.0)
    };
    let mut game = spawn_world(&map);
    let elder = find_on_map(&game, "elder_01").expect("elder spawned");

    let mut moved = false;
    for _ in 0..600 {
        game.update(TEST_DT);
        let x = game.position(elder).expect("elder").x;
        moved |= (x - 300.0).abs() > 5.0;
    }
    assert!(moved, "elder never left its spawn point");
}

#[test]
fn hunter_switches_to_the_leader_when_its_member_dies() {
    let mut game = spawn_world(&party_map());
    let player = game.player().expect("player spawned");
    let ally = find_on_map(&game, "ally_01").expect("ally spawned");
    let goblin = find_on_map(&game, "goblin_01").expect("goblin spawned");
    assert!(game.recruit(player, ally));
    lock_on(&mut game, goblin, ally);

    assert!(game.kill(ally, Some(goblin)));
    assert_eq!(locked_on(&game, goblin), Some(player));
}

#[test]
fn hunter_switches_to_a_member_when_the_leader_dies() {
    let mut game = spawn_world(&party_map());
    let player = game.player().expect("player spawned");
    let ally = find_on_map(&game, "ally_01").expect("ally spawned");
    let goblin = find_on_map(&game, "goblin_01").expect("goblin spawned");
    assert!(game.recruit(player, ally));
    lock_on(&mut game, goblin, player);

    assert!(game.kill(player, Some(goblin)));
    assert_eq!(locked_on(&game, goblin), Some(ally));
}

#[test]
fn hunter_without_a_party_to_pick_from_loses_its_target() {
    let mut game = spawn_world(&party_map());
    let ally = find_on_map(&game, "ally_01").expect("ally spawned");
    let goblin = find_on_map(&game, "goblin_01").expect("goblin spawned");
    lock_on(&mut game, goblin, ally);

    assert!(game.kill(ally, Some(goblin)));
    assert_eq!(locked_on(&game, goblin), None);
}

#[test]
fn retargeting_keeps_a_live_current_target() {
    let mut game = spawn_world(&party_map());
    let player = game.player().expect("player spawned");
    let ally = find_on_map(&game, "ally_01").expect("ally spawned");
    let goblin = find_on_map(&game, "goblin_01").expect("goblin spawned");
    assert!(game.recruit(player, ally));
    lock_on(&mut game, goblin, player);

    let kept = find_new_locked_on_target_from_party(&mut game.world, goblin, ally);
    assert_eq!(kept, Some(player));
    assert_eq!(locked_on(&game, goblin), Some(player));
}

fn party_map() -> MapDefinition {
    MapDefinition {
        npcs: vec![
            NpcSpawn { content_id: "ally_01".to_string(), x: 120.0, y: 45.0 },
            NpcSpawn { content_id: "goblin_01".to_string(), x: 200.0, y: 45.0 },
        ],
        ..goblin_map(200.0)
    }
}

fn lock_on(game: &mut GameWorld, hunter: Entity, target: Entity) {
    game.world.get_mut::<NpcBrain>(hunter).expect("brain").locked_on_target = Some(target);
}

fn locked_on(game: &GameWorld, hunter: Entity) -> Option<Entity> {
    game.world.get::<NpcBrain>(hunter).expect("brain").locked_on_target
}

fn find_on_map(game: &GameWorld, content_id: &str) -> Option<Entity> {
    game.map()
        .actors()
        .find(|entity| game.world.get::<ContentId>(*entity).is_some_and(|id| id.as_str() == content_id))
}

fn goblin_map(goblin_x: f32) -> MapDefinition {
    MapDefinition {
        id: "forest_01".to_string(),
        ground: vec![RectDef { x: 0.0, y: 0.0, width: 4000.0, height: 20.0 }],
        npcs: vec![NpcSpawn { content_id: "goblin_01".to_string(), x: goblin_x, y: 45.0 }],
        player_spawn: Some(PointDef { x: 0.0, y: 45.0 }),
        ..MapDefinition::default()
    }
}

fn spawn_world(map: &MapDefinition) -> GameWorld {
    let content =
        ContentLibrary::from_json_str(include_str!("../fixtures/content.json")).expect("content bundle parses");
    let mut game = GameWorld::new(&SimConfig { seed: Some(5), ..SimConfig::default() }, content);
    game.spawn_player("hero", Vec2::new(0.0, 45.0)).expect("known player");
    game.load_map(map);
    game
}
