use bevy_ecs::prelude::{Entity, Resource};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    ActorShown { entity: Entity },
    ActorRemoved { entity: Entity },
    ActorDespawned { entity: Entity },
    ContactBegan { a: Entity, b: Entity },
    ContactEnded { a: Entity, b: Entity },
    DamageDealt { source: Option<Entity>, target: Entity, amount: i32, remaining: i32 },
    CharacterKilled { entity: Entity, killer: Option<Entity> },
    SkillActivated { user: Entity, skill: String },
    SkillReverted { user: Entity, skill: String },
    Recruited { leader: Entity, member: Entity },
    Dismissed { leader: Entity, member: Entity },
    DialogueBegan { npc: Entity, tree: String },
    DialogueEnded,
    TradeBegan { npc: Entity },
    ChestOpened { chest: Entity },
    ItemPickedUp { user: Entity, item: String },
    LeveledUp { entity: Entity, level: u32 },
    MapLoaded { id: String },
    Notification { message: String },
}

impl GameEvent {
    fn ordered_pair(a: Entity, b: Entity) -> (Entity, Entity) {
        let (first, second) = if a.index() <= b.index() { (a, b) } else { (b, a) };
        (first, second)
    }

    pub fn contact_began(a: Entity, b: Entity) -> Self {
        let (a, b) = Self::ordered_pair(a, b);
        GameEvent::ContactBegan { a, b }
    }

    pub fn contact_ended(a: Entity, b: Entity) -> Self {
        let (a, b) = Self::ordered_pair(a, b);
        GameEvent::ContactEnded { a, b }
    }
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameEvent::ActorShown { entity } => write!(f, "ActorShown entity={}", entity.index()),
            GameEvent::ActorRemoved { entity } => write!(f, "ActorRemoved entity={}", entity.index()),
            GameEvent::ActorDespawned { entity } => write!(f, "ActorDespawned entity={}", entity.index()),
            GameEvent::ContactBegan { a, b } => write!(f, "ContactBegan a={} b={}", a.index(), b.index()),
            GameEvent::ContactEnded { a, b } => write!(f, "ContactEnded a={} b={}", a.index(), b.index()),
            GameEvent::DamageDealt { source, target, amount, remaining } => {
                let source = source.map(|s| s.index().to_string()).unwrap_or_else(|| "-".to_string());
                write!(f, "DamageDealt source={source} target={} amount={amount} remaining={remaining}", target.index())
            }
            GameEvent::CharacterKilled { entity, killer } => {
                let killer = killer.map(|k| k.index().to_string()).unwrap_or_else(|| "-".to_string());
                write!(f, "CharacterKilled entity={} killer={killer}", entity.index())
            }
            GameEvent::SkillActivated { user, skill } => {
                write!(f, "SkillActivated user={} skill={skill}", user.index())
            }
            GameEvent::SkillReverted { user, skill } => {
                write!(f, "SkillReverted user={} skill={skill}", user.index())
            }
            GameEvent::Recruited { leader, member } => {
                write!(f, "Recruited leader={} member={}", leader.index(), member.index())
            }
            GameEvent::Dismissed { leader, member } => {
                write!(f, "Dismissed leader={} member={}", leader.index(), member.index())
            }
            GameEvent::DialogueBegan { npc, tree } => write!(f, "DialogueBegan npc={} tree={tree}", npc.index()),
            GameEvent::DialogueEnded => write!(f, "DialogueEnded"),
            GameEvent::TradeBegan { npc } => write!(f, "TradeBegan npc={}", npc.index()),
            GameEvent::ChestOpened { chest } => write!(f, "ChestOpened chest={}", chest.index()),
            GameEvent::ItemPickedUp { user, item } => write!(f, "ItemPickedUp user={} item={item}", user.index()),
            GameEvent::LeveledUp { entity, level } => write!(f, "LeveledUp entity={} level={level}", entity.index()),
            GameEvent::MapLoaded { id } => write!(f, "MapLoaded id={id}"),
            GameEvent::Notification { message } => write!(f, "Notification {message}"),
        }
    }
}

#[derive(Default, Resource)]
pub struct EventBus {
    events: Vec<GameEvent>,
}

impl EventBus {
    pub fn push(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    pub fn drain(&mut self) -> Vec<GameEvent> {
        self.events.drain(..).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GameEvent> {
        self.events.iter()
    }
}
