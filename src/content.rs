use crate::character::{CharacterProfile, ExpPointTable, ItemProfile, NpcProfile};
use crate::skill::SkillProfile;
use anyhow::{Context, Result};
use bevy_ecs::prelude::Resource;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContentError {
    #[error("unknown character '{0}'")]
    UnknownCharacter(String),
    #[error("unknown npc '{0}'")]
    UnknownNpc(String),
    #[error("unknown skill '{0}'")]
    UnknownSkill(String),
    #[error("unknown item '{0}'")]
    UnknownItem(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CharacterDefinition {
    pub profile: CharacterProfile,
    pub skills: Vec<String>,
    pub equipment: Vec<String>,
    pub inventory: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NpcDefinition {
    #[serde(flatten)]
    pub character: CharacterDefinition,
    pub npc: NpcProfile,
}

/// Every authored record the simulation consumes, keyed by content id.
#[derive(Resource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentLibrary {
    pub characters: HashMap<String, CharacterDefinition>,
    pub npcs: HashMap<String, NpcDefinition>,
    pub skills: HashMap<String, SkillProfile>,
    pub items: HashMap<String, ItemProfile>,
    pub exp_table: ExpPointTable,
}

impl ContentLibrary {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse content bundle")
    }

    pub fn load_bundle(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).with_context(|| format!("Failed to read content bundle {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("Invalid content bundle {}", path.display()))
    }

    /// Loads `characters/`, `npcs/`, `skills/` and `items/` subdirectories,
    /// one JSON record per file with the file stem as content id, plus an
    /// optional `exp_table.json`.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut library = ContentLibrary {
            characters: load_records(&dir.join("characters"))?,
            npcs: load_records(&dir.join("npcs"))?,
            skills: load_records(&dir.join("skills"))?,
            items: load_records(&dir.join("items"))?,
            exp_table: ExpPointTable::default(),
        };
        let exp_path = dir.join("exp_table.json");
        if exp_path.is_file() {
            library.exp_table = read_record(&exp_path)?;
        }
        log::info!(
            "[content] loaded {} characters, {} npcs, {} skills, {} items from {}",
            library.characters.len(),
            library.npcs.len(),
            library.skills.len(),
            library.items.len(),
            dir.display()
        );
        Ok(library)
    }

    pub fn character(&self, id: &str) -> Result<&CharacterDefinition, ContentError> {
        self.characters.get(id).ok_or_else(|| ContentError::UnknownCharacter(id.to_string()))
    }

    pub fn npc(&self, id: &str) -> Result<&NpcDefinition, ContentError> {
        self.npcs.get(id).ok_or_else(|| ContentError::UnknownNpc(id.to_string()))
    }

    pub fn skill(&self, id: &str) -> Result<&SkillProfile, ContentError> {
        self.skills.get(id).ok_or_else(|| ContentError::UnknownSkill(id.to_string()))
    }

    pub fn item(&self, id: &str) -> Result<&ItemProfile, ContentError> {
        self.items.get(id).ok_or_else(|| ContentError::UnknownItem(id.to_string()))
    }

    pub fn with_character(mut self, id: impl Into<String>, definition: CharacterDefinition) -> Self {
        self.characters.insert(id.into(), definition);
        self
    }

    pub fn with_npc(mut self, id: impl Into<String>, definition: NpcDefinition) -> Self {
        self.npcs.insert(id.into(), definition);
        self
    }

    pub fn with_skill(mut self, id: impl Into<String>, profile: SkillProfile) -> Self {
        self.skills.insert(id.into(), profile);
        self
    }

    pub fn with_item(mut self, id: impl Into<String>, profile: ItemProfile) -> Self {
        self.items.insert(id.into(), profile);
        self
    }
}

fn read_record<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn load_records<T: DeserializeOwned>(dir: &Path) -> Result<HashMap<String, T>> {
    let mut records = HashMap::new();
    if !dir.is_dir() {
        return Ok(records);
    }
    let entries = fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))?;
    for entry in entries {
        let path = entry.with_context(|| format!("Failed to read entry in {}", dir.display()))?.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            log::warn!("[content] skipping non UTF-8 file name {}", path.display());
            continue;
        };
        records.insert(stem.to_string(), read_record(&path)?);
    }
    Ok(records)
}
