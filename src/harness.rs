use std::fs::File;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use bevy_ecs::prelude::Entity;
use serde::{Deserialize, Serialize};

use crate::actor::{ContentId, DynamicActor, Transform};
use crate::character::{Character, CharacterProfile, MovementIntent};
use crate::config::SimConfig;
use crate::content::ContentLibrary;
use crate::map::MapDefinition;
use crate::world::GameWorld;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioFixture {
    #[serde(default)]
    pub content: Option<ContentLibrary>,
    /// Single-file bundle for `ContentLibrary::load_bundle`, relative to the
    /// fixture file. Ignored when `content` is inline.
    #[serde(default)]
    pub content_bundle: Option<String>,
    /// Directory layout for `ContentLibrary::load_dir`, relative to the
    /// fixture file. Used when neither `content` nor `content_bundle` is set.
    #[serde(default)]
    pub content_dir: Option<String>,
    #[serde(default)]
    pub map: MapDefinition,
    #[serde(default)]
    pub player: Option<String>,
    #[serde(default = "default_steps")]
    pub steps: usize,
    #[serde(default = "default_dt")]
    pub dt: f32,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub actions: Vec<ScheduledAction>,
}

fn default_steps() -> usize {
    120
}

fn default_dt() -> f32 {
    1.0 / 60.0
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduledAction {
    /// Applied right before the update that advances to this frame.
    pub frame: u64,
    #[serde(flatten)]
    pub action: FixtureAction,
}

/// `target` names a content id; an absent target means the player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FixtureAction {
    Move {
        #[serde(default)]
        target: Option<String>,
        direction: f32,
    },
    Jump {
        #[serde(default)]
        target: Option<String>,
    },
    Attack {
        #[serde(default)]
        target: Option<String>,
    },
    UseSkill {
        #[serde(default)]
        target: Option<String>,
        skill: String,
    },
    Damage {
        #[serde(default)]
        target: Option<String>,
        amount: i32,
    },
    Recruit {
        target: String,
    },
    Dismiss {
        target: String,
        #[serde(default = "default_true")]
        add_to_map: bool,
    },
    Wait {
        target: String,
    },
    Follow {
        target: String,
    },
    Interact {
        #[serde(default)]
        target: Option<String>,
    },
    ReloadMap,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HarnessOutput {
    pub frames: u64,
    pub events: Vec<String>,
    pub characters: Vec<CharacterSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CharacterSummary {
    pub content_id: String,
    pub health: i32,
    pub level: u32,
    pub shown: bool,
    pub killed: bool,
    pub position: [f32; 2],
}

pub fn load_fixture<P: AsRef<Path>>(path: P) -> Result<ScenarioFixture> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening fixture '{}'", path.display()))?;
    let mut fixture: ScenarioFixture = serde_json::from_reader(file).with_context(|| "parsing fixture JSON")?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    if fixture.content.is_none() {
        if let Some(bundle) = &fixture.content_bundle {
            fixture.content = Some(ContentLibrary::load_bundle(base.join(bundle))?);
        } else if let Some(dir) = &fixture.content_dir {
            fixture.content = Some(ContentLibrary::load_dir(base.join(dir))?);
        }
    }
    Ok(fixture)
}

fn resolve(game: &mut GameWorld, target: Option<&str>) -> Option<Entity> {
    let Some(content_id) = target else {
        return game.player();
    };
    let mut query = game.world.query::<(Entity, &ContentId, &DynamicActor)>();
    let mut candidates: Vec<(Entity, bool)> = query
        .iter(&game.world)
        .filter(|(_, id, _)| id.as_str() == content_id)
        .map(|(entity, _, actor)| (entity, actor.is_shown()))
        .collect();
    // Prefer the shown instance, then the lowest entity for determinism.
    candidates.sort_by_key(|(entity, shown)| (!*shown, entity.index()));
    candidates.first().map(|(entity, _)| *entity)
}

fn apply_action(game: &mut GameWorld, fixture: &ScenarioFixture, action: &FixtureAction) -> Result<bool> {
    let player = game.player();
    let leader = || player.ok_or_else(|| anyhow!("party actions need a player"));
    let applied = match action {
        FixtureAction::Move { target, direction } => {
            let Some(entity) = resolve(game, target.as_deref()) else {
                return Ok(false);
            };
            let intent = game.world.get::<MovementIntent>(entity).copied().unwrap_or_default();
            game.set_intent(entity, MovementIntent { horizontal: *direction, ..intent })
        }
        FixtureAction::Jump { target } => match resolve(game, target.as_deref()) {
            Some(entity) => game.jump(entity),
            None => false,
        },
        FixtureAction::Attack { target } => match resolve(game, target.as_deref()) {
            Some(entity) => game.attack(entity),
            None => false,
        },
        FixtureAction::UseSkill { target, skill } => match resolve(game, target.as_deref()) {
            Some(entity) => game.use_skill(entity, skill).is_some(),
            None => false,
        },
        FixtureAction::Damage { target, amount } => match resolve(game, target.as_deref()) {
            Some(entity) => game.receive_damage(entity, None, *amount),
            None => false,
        },
        FixtureAction::Recruit { target } => {
            let leader = leader()?;
            match resolve(game, Some(target)) {
                Some(entity) => game.recruit(leader, entity),
                None => false,
            }
        }
        FixtureAction::Dismiss { target, add_to_map } => {
            let leader = leader()?;
            match game.get_member(leader, target) {
                Some(entity) => game.dismiss(leader, entity, *add_to_map),
                None => false,
            }
        }
        FixtureAction::Wait { target } => {
            let leader = leader()?;
            match game.get_member(leader, target) {
                Some(entity) => game.ask_member_to_wait(leader, entity),
                None => false,
            }
        }
        FixtureAction::Follow { target } => {
            let leader = leader()?;
            match game.get_member(leader, target) {
                Some(entity) => game.ask_member_to_follow(leader, entity),
                None => false,
            }
        }
        FixtureAction::Interact { target } => {
            let user = leader()?;
            match target {
                Some(id) => match resolve(game, Some(id)) {
                    Some(entity) => game.interact_with(user, entity),
                    None => false,
                },
                None => game.interact(user),
            }
        }
        FixtureAction::ReloadMap => {
            game.load_map(&fixture.map);
            true
        }
    };
    Ok(applied)
}

fn collect_characters(game: &mut GameWorld) -> Vec<CharacterSummary> {
    let mut query =
        game.world.query::<(Entity, &ContentId, &CharacterProfile, &Character, &DynamicActor, &Transform)>();
    let mut rows: Vec<(u32, CharacterSummary)> = query
        .iter(&game.world)
        .map(|(entity, id, profile, character, actor, transform)| {
            let position = transform.translation;
            (
                entity.index(),
                CharacterSummary {
                    content_id: id.0.clone(),
                    health: profile.health,
                    level: profile.level,
                    shown: actor.is_shown(),
                    killed: character.killed,
                    position: [position.x, position.y],
                },
            )
        })
        .collect();
    rows.sort_by_key(|(index, _)| *index);
    rows.into_iter().map(|(_, summary)| summary).collect()
}

pub fn run_fixture(fixture: &ScenarioFixture, config: &SimConfig) -> Result<HarnessOutput> {
    let mut config = config.clone();
    if fixture.seed.is_some() {
        config.seed = fixture.seed;
    }
    let content = fixture.content.clone().unwrap_or_default();
    let mut game = GameWorld::new(&config, content);
    if let Some(player) = &fixture.player {
        let spawn = fixture.map.player_spawn.map(|p| p.to_vec2()).unwrap_or_default();
        game.spawn_player(player, spawn).with_context(|| format!("spawning player '{player}'"))?;
    }
    game.load_map(&fixture.map);

    let mut events = Vec::new();
    for step in 0..fixture.steps {
        let next_frame = step as u64 + 1;
        for scheduled in fixture.actions.iter().filter(|a| a.frame == next_frame) {
            if !apply_action(&mut game, fixture, &scheduled.action)? {
                log::warn!("[harness] frame {next_frame}: {:?} had no effect", scheduled.action);
            }
        }
        game.update(fixture.dt);
        events.extend(game.drain_events().iter().map(ToString::to_string));
    }

    Ok(HarnessOutput { frames: game.frame(), events, characters: collect_characters(&mut game) })
}
