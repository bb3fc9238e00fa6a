use glam::Vec2;
use vigil_sim::config::SimConfig;
use vigil_sim::content::ContentLibrary;
use vigil_sim::map::{MapDefinition, NpcSpawn, PointDef, RectDef};
use vigil_sim::GameWorld;

const TEST_DT: f32 = 1.0 / 120.0;
const TEST_STEPS: usize = 480;

#[test]
fn seeded_worlds_stay_in_lockstep() {
    let mut world_a = spawn_wandering_world(9);
    let mut world_b = spawn_wandering_world(9);

    run_fixed_steps(&mut world_a, TEST_STEPS, TEST_DT);
    run_fixed_steps(&mut world_b, TEST_STEPS, TEST_DT);

    let actors_a: Vec<_> = world_a.map().actors().collect();
    let actors_b: Vec<_> = world_b.map().actors().collect();
    assert_eq!(actors_a, actors_b);
    for (a, b) in actors_a.iter().zip(&actors_b) {
        assert_vec2_near(
            world_a.position(*a).expect("actor in world A"),
            world_b.position(*b).expect("actor in world B"),
            1e-5,
        );
    }
    assert_eq!(world_a.drain_events(), world_b.drain_events());
}

fn spawn_wandering_world(seed: u64) -> GameWorld {
    let content =
        ContentLibrary::from_json_str(include_str!("../fixtures/content.json")).expect("content bundle parses");
    let config = SimConfig { seed: Some(seed), ..SimConfig::default() };
    let mut game = GameWorld::new(&config, content);
    game.spawn_player("hero", Vec2::new(0.0, 45.0)).expect("known player");
    game.load_map(&MapDefinition {
        id: "meadow".to_string(),
        ground: vec![RectDef { x: 0.0, y: 0.0, width: 4000.0, height: 20.0 }],
        platforms: vec![RectDef { x: 400.0, y: 80.0, width: 100.0, height: 10.0 }],
        npcs: vec![
            NpcSpawn { content_id: "elder_01".to_string(), x: 300.0, y: 45.0 },
            NpcSpawn { content_id: "goblin_01".to_string(), x: 160.0, y: 45.0 },
        ],
        player_spawn: Some(PointDef { x: 0.0, y: 45.0 }),
        ..MapDefinition::default()
    });
    game
}

fn run_fixed_steps(game: &mut GameWorld, steps: usize, dt: f32) {
    for _ in 0..steps {
        game.update(dt);
    }
}

fn assert_vec2_near(a: Vec2, b: Vec2, epsilon: f32) {
    assert!(
        (a - b).length() <= epsilon,
        "vectors differed: left={:?}, right={:?}, epsilon={}",
        a,
        b,
        epsilon
    );
}
