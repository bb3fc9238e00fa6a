use std::fs;
use std::path::Path;

use vigil_sim::character::{Disposition, EquipmentSlot, ItemType};
use vigil_sim::content::{ContentError, ContentLibrary};
use vigil_sim::skill::SkillKind;

#[test]
fn directory_layout_loads_every_record_kind() {
    let dir = tempfile::tempdir().expect("temp dir");
    write(dir.path(), "characters/hero.json", r#"{ "profile": { "name": "Hero", "full_health": 100, "health": 100 } }"#);
    write(
        dir.path(),
        "npcs/goblin_01.json",
        r#"{ "profile": { "name": "Goblin" }, "npc": { "disposition": "enemy", "is_respawnable": false } }"#,
    );
    write(dir.path(), "skills/back_dash.json", r#"{ "kind": "back_dash", "frames_duration": 10 }"#);
    write(dir.path(), "items/iron_sword.json", r#"{ "item_type": "equipment", "slot": "weapon" }"#);
    write(dir.path(), "items/notes.txt", "not a record");
    write(dir.path(), "exp_table.json", r#"{ "next_level_exp": [10, 30] }"#);

    let library = ContentLibrary::load_dir(dir.path()).expect("content loads");
    assert_eq!(library.character("hero").expect("hero").profile.full_health, 100);
    assert_eq!(library.npc("goblin_01").expect("goblin").npc.disposition, Disposition::Enemy);
    assert_eq!(library.skill("back_dash").expect("skill").kind, SkillKind::BackDash);
    let sword = library.item("iron_sword").expect("sword");
    assert_eq!(sword.item_type, ItemType::Equipment);
    assert_eq!(sword.slot, Some(EquipmentSlot::Weapon));
    assert_eq!(library.items.len(), 1, "non-JSON files are skipped");
    assert_eq!(library.exp_table.next_level_exp, vec![10, 30]);
}

#[test]
fn missing_subdirectories_yield_empty_tables() {
    let dir = tempfile::tempdir().expect("temp dir");
    write(dir.path(), "skills/back_dash.json", r#"{ "kind": "back_dash" }"#);

    let library = ContentLibrary::load_dir(dir.path()).expect("content loads");
    assert!(library.characters.is_empty());
    assert!(library.npcs.is_empty());
    assert_eq!(library.skills.len(), 1);
    assert_eq!(library.character("hero").err(), Some(ContentError::UnknownCharacter("hero".into())));
}

#[test]
fn malformed_record_reports_its_path() {
    let dir = tempfile::tempdir().expect("temp dir");
    write(dir.path(), "npcs/broken.json", "{ \"profile\": ");

    let err = ContentLibrary::load_dir(dir.path()).expect_err("broken record fails");
    assert!(format!("{err:#}").contains("broken.json"), "unexpected error: {err:#}");
}

#[test]
fn bundled_fixture_content_is_complete() {
    let library = ContentLibrary::load_bundle(Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/content.json"))
        .expect("bundle loads");
    let hero = library.character("hero").expect("hero");
    for skill in &hero.skills {
        assert!(library.skill(skill).is_ok(), "hero skill '{skill}' is defined");
    }
    for npc in library.npcs.values() {
        for item in npc.npc.dropped_items.keys() {
            assert!(library.item(item).is_ok(), "dropped item '{item}' is defined");
        }
    }
}

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create content dir");
    }
    fs::write(path, contents).expect("write content file");
}
