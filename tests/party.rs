use glam::Vec2;
use vigil_sim::config::SimConfig;
use vigil_sim::content::ContentLibrary;
use vigil_sim::map::{MapDefinition, NpcSpawn, PointDef, RectDef};
use vigil_sim::GameWorld;

const TEST_DT: f32 = 1.0 / 60.0;

#[test]
fn waiting_record_is_cleared_by_follow() {
    let (mut game, player) = spawn_forest();
    let ally = game.get_map_npc("ally_01");
    assert!(game.recruit(player, ally));

    assert!(game.ask_member_to_wait(player, ally));
    assert!(game.has_waiting_member(player, "ally_01"));
    let location = game.waiting_member_location(player, "ally_01").expect("waiting record");
    assert_eq!(location.map_id, "forest_01");
    assert_eq!((location.x, location.y), (120.0, 45.0));
    assert!(!game.ask_member_to_wait(player, ally), "a member waits only once");

    assert!(game.ask_member_to_follow(player, ally));
    assert!(!game.has_waiting_member(player, "ally_01"));
    assert!(game.waiting_member_location(player, "ally_01").is_none());
    assert!(!game.ask_member_to_follow(player, ally));
}

#[test]
fn recruit_then_dismiss_moves_ownership_between_map_and_party() {
    let (mut game, player) = spawn_forest();
    let ally = game.get_map_npc("ally_01");

    assert!(game.recruit(player, ally));
    assert!(!game.map().contains(ally));
    assert!(game.is_shown(ally));
    assert_eq!(game.leader_of(ally), Some(player));
    assert_eq!(game.members(player), vec![ally]);
    assert_eq!(game.leader_and_members(player), vec![player, ally]);
    assert!(!game.members(player).contains(&player));
    assert!(!game.recruit(player, ally), "already a member");
    assert!(!game.recruit(player, player));

    assert!(game.dismiss(player, ally, true));
    assert!(game.map().contains(ally));
    assert!(game.is_shown(ally));
    assert_eq!(game.leader_of(ally), None);
    assert!(game.members(player).is_empty());
    assert!(!game.dismiss(player, ally, true), "no longer a member");
}

#[test]
fn recruiting_for_a_despawned_leader_is_rejected() {
    let (mut game, player) = spawn_forest();
    let ally = game.get_map_npc("ally_01");
    assert!(game.despawn(player));

    assert!(!game.recruit(player, ally));
    assert!(game.map().contains(ally), "the ally stays on the map");
    assert_eq!(game.leader_of(ally), None);
}

#[test]
fn dismissing_off_map_releases_the_member() {
    let (mut game, player) = spawn_forest();
    let ally = game.get_map_npc("ally_01");
    assert!(game.recruit(player, ally));

    assert!(game.dismiss(player, ally, false));
    assert!(!game.exists(ally));
}

#[test]
fn recruiting_a_spawn_once_npc_keeps_it_off_the_map() {
    let (mut game, player) = spawn_forest();
    let ally = game.get_map_npc("ally_01");
    assert!(game.recruit(player, ally));
    assert!(!game.is_npc_allowed_to_spawn("ally_01"));

    game.load_map(&forest_map());
    assert!(game.exists(ally), "members travel with the leader");
    assert!(game.is_shown(ally));
    assert_eq!(game.members(player), vec![ally]);
    let map_allies = game.map().actors().filter(|e| game.content_id(*e) == "ally_01").count();
    assert_eq!(map_allies, 0);
}

#[test]
fn waiting_members_only_appear_on_their_map() {
    let (mut game, player) = spawn_forest();
    let ally = game.get_map_npc("ally_01");
    assert!(game.recruit(player, ally));
    assert!(game.ask_member_to_wait(player, ally));

    game.load_map(&MapDefinition { id: "town_01".to_string(), ..forest_map() });
    assert!(game.exists(ally));
    assert!(!game.is_shown(ally));

    game.load_map(&forest_map());
    assert!(game.is_shown(ally));
    let position = game.position(ally).expect("ally position");
    assert_eq!(position, Vec2::new(120.0, 45.0));
}

#[test]
fn dead_member_leaves_the_party() {
    let (mut game, player) = spawn_forest();
    let ally = game.get_map_npc("ally_01");
    assert!(game.recruit(player, ally));

    assert!(game.kill(ally, None));
    assert_eq!(game.leader_of(ally), None);
    assert!(game.members(player).is_empty());
    assert!(game.map().contains(ally), "the corpse is handed back to the map");
}

#[test]
fn follower_walks_toward_a_distant_leader() {
    let (mut game, player) = spawn_forest();
    let ally = game.get_map_npc("ally_01");
    assert!(game.recruit(player, ally));
    let start = game.position(ally).expect("ally position");

    // Leader sits at x=0, ally at x=120: beyond the follow distance.
    for _ in 0..60 {
        game.update(TEST_DT);
    }
    let end = game.position(ally).expect("ally position");
    assert!(end.x < start.x - 10.0, "ally moved from {start:?} to {end:?}");
}

trait MapLookup {
    fn get_map_npc(&self, content_id: &str) -> bevy_ecs::prelude::Entity;
    fn content_id(&self, entity: bevy_ecs::prelude::Entity) -> String;
}

impl MapLookup for GameWorld {
    fn get_map_npc(&self, content_id: &str) -> bevy_ecs::prelude::Entity {
        let found = self.map().actors().find(|entity| self.content_id(*entity) == content_id);
        found.unwrap_or_else(|| panic!("{content_id} is on the map"))
    }

    fn content_id(&self, entity: bevy_ecs::prelude::Entity) -> String {
        self.world.get::<vigil_sim::actor::ContentId>(entity).map(|id| id.0.clone()).unwrap_or_default()
    }
}

fn forest_map() -> MapDefinition {
    MapDefinition {
        id: "forest_01".to_string(),
        ground: vec![RectDef { x: 0.0, y: 0.0, width: 2000.0, height: 20.0 }],
        npcs: vec![NpcSpawn { content_id: "ally_01".to_string(), x: 120.0, y: 45.0 }],
        player_spawn: Some(PointDef { x: 0.0, y: 45.0 }),
        ..MapDefinition::default()
    }
}

fn spawn_forest() -> (GameWorld, bevy_ecs::prelude::Entity) {
    let content =
        ContentLibrary::from_json_str(include_str!("../fixtures/content.json")).expect("content bundle parses");
    let mut game = GameWorld::new(&SimConfig { seed: Some(11), ..SimConfig::default() }, content);
    let player = game.spawn_player("hero", Vec2::new(0.0, 45.0)).expect("known player");
    game.load_map(&forest_map());
    (game, player)
}
