use std::path::Path;

use vigil_sim::config::SimConfig;
use vigil_sim::harness::{load_fixture, run_fixture, FixtureAction, ScenarioFixture};

#[test]
fn forest_fixture_runs_to_completion() {
    let fixture = load_forest();
    assert!(fixture.content.is_some(), "bundle resolved relative to the fixture");

    let output = run_fixture(&fixture, &SimConfig::default()).expect("fixture runs");
    assert_eq!(output.frames, 240);
    assert!(output.events.iter().any(|e| e == "MapLoaded id=forest_01"));
    assert_eq!(output.events.iter().filter(|e| e.starts_with("CharacterKilled")).count(), 1);
    assert!(output.events.iter().any(|e| e.starts_with("Recruited")));

    let hero = output.characters.iter().find(|c| c.content_id == "hero").expect("hero summary");
    assert!(hero.shown);
    assert!(!hero.killed);
    assert!(hero.position[0] > 0.0, "hero walked right");
    assert!(output.characters.iter().any(|c| c.content_id == "ally_01" && c.shown));
    // The goblin corpse lingers for 60 frames and is then despawned.
    assert!(output.characters.iter().all(|c| c.content_id != "goblin_01"));
}

#[test]
fn same_seed_gives_identical_runs() {
    let fixture = load_forest();
    let a = run_fixture(&fixture, &SimConfig::default()).expect("first run");
    let b = run_fixture(&fixture, &SimConfig::default()).expect("second run");
    assert_eq!(a, b);
}

#[test]
fn fixture_actions_parse_from_tagged_json() {
    let fixture: ScenarioFixture = serde_json::from_str(
        r#"{ "actions": [
               { "frame": 1, "action": "use_skill", "skill": "back_dash" },
               { "frame": 2, "action": "dismiss", "target": "ally_01" },
               { "frame": 3, "action": "reload_map" }
           ] }"#,
    )
    .expect("fixture parses");
    assert_eq!(fixture.steps, 120);
    assert_eq!(fixture.actions[0].action, FixtureAction::UseSkill { target: None, skill: "back_dash".into() });
    assert_eq!(fixture.actions[1].action, FixtureAction::Dismiss { target: "ally_01".into(), add_to_map: true });
    assert_eq!(fixture.actions[2].action, FixtureAction::ReloadMap);
}

#[test]
fn unknown_player_is_an_error() {
    let mut fixture = load_forest();
    fixture.player = Some("nobody".to_string());
    let err = run_fixture(&fixture, &SimConfig::default()).expect_err("unknown player fails");
    assert!(format!("{err:#}").contains("nobody"));
}

fn load_forest() -> ScenarioFixture {
    load_fixture(Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/forest_01.json")).expect("fixture loads")
}
