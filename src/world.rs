use crate::actor::{self, position_of, DynamicActor};
use crate::ai::sys_npc_act;
use crate::callbacks::DeferredCallbacks;
use crate::character::{self, Character, CharacterProfile, EquipmentSlot, MovementIntent};
use crate::combat;
use crate::commands::{self, CommandQueue};
use crate::config::SimConfig;
use crate::content::{ContentError, ContentLibrary};
use crate::events::{EventBus, GameEvent};
use crate::interaction::{self, ActiveDialogue};
use crate::map::{self, GameMap, MapDefinition};
use crate::notifications::{self, FloatingDamageQueues, FloatingDamages, Notifications, TimedLabelQueue};
use crate::party::{self, WaitingLocation};
use crate::physics::PhysicsWorld;
use crate::skill::{self, ActiveSkills, SkillId, SkillIdAllocator};
use crate::spawn::{self, SpawnRegistry};
use crate::systems::{
    sys_apply_movement_intents, sys_process_contacts, sys_step_physics, sys_sync_transforms, sys_tick_projectiles,
};
use crate::time::SimClock;
use bevy_ecs::prelude::*;
use bevy_ecs::schedule::ExecutorKind;
use glam::Vec2;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Seeded randomness for wander episodes and drop rolls.
#[derive(Resource)]
pub struct SimRng(pub StdRng);

impl SimRng {
    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self(StdRng::seed_from_u64(seed)),
            None => Self(StdRng::from_entropy()),
        }
    }
}

/// The simulation facade: owns the ECS world, the frame schedule and the
/// player. Every operation returns a plain `bool`/`Option` for the expected
/// no-op paths and logs the reason.
pub struct GameWorld {
    pub world: World,
    schedule: Schedule,
    player: Option<Entity>,
}

impl GameWorld {
    pub fn new(config: &SimConfig, content: ContentLibrary) -> Self {
        let mut world = World::new();
        world.insert_resource(PhysicsWorld::new(&config.physics));
        world.insert_resource(config.npc.clone());
        world.insert_resource(config.combat.clone());
        world.insert_resource(content);
        world.insert_resource(SimClock::new());
        world.insert_resource(DeferredCallbacks::default());
        world.insert_resource(SpawnRegistry::default());
        world.insert_resource(GameMap::default());
        world.insert_resource(CommandQueue::default());
        world.insert_resource(EventBus::default());
        world.insert_resource(SkillIdAllocator::default());
        world.insert_resource(ActiveDialogue::default());
        world.insert_resource(SimRng::new(config.seed));
        let labels = &config.notifications;
        world.insert_resource(Notifications(Box::new(TimedLabelQueue::new(labels.max_labels, labels.label_lifetime))));
        world.insert_resource(FloatingDamages(Box::new(FloatingDamageQueues::new(
            labels.max_labels,
            labels.damage_label_lifetime,
        ))));

        let mut schedule = Schedule::default();
        schedule.set_executor_kind(ExecutorKind::SingleThreaded);
        schedule.add_systems(
            (
                sys_step_physics,
                sys_sync_transforms,
                sys_process_contacts,
                sys_apply_movement_intents,
                sys_tick_projectiles,
                sys_npc_act,
            )
                .chain(),
        );

        Self { world, schedule, player: None }
    }

    pub fn update(&mut self, delta: f32) {
        self.world.resource_mut::<SimClock>().tick(delta);
        self.schedule.run(&mut self.world);
        commands::apply_queued(&mut self.world);
        commands::run_due_callbacks(&mut self.world);
        notifications::update_sinks(&mut self.world, delta);
    }

    pub fn frame(&self) -> u64 {
        self.world.resource::<SimClock>().frame()
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.world.resource_mut::<EventBus>().drain()
    }

    pub fn content(&self) -> &ContentLibrary {
        self.world.resource::<ContentLibrary>()
    }

    // ---------- Spawning & map ----------

    /// Spawns the player and shows it at `position`. Replaces any previous player.
    pub fn spawn_player(&mut self, content_id: &str, position: Vec2) -> Result<Entity, ContentError> {
        if let Some(previous) = self.player.take() {
            map::despawn_actor(&mut self.world, previous);
        }
        let player = spawn::spawn_player(&mut self.world, content_id)?;
        actor::show_on_map(&mut self.world, player, position);
        self.player = Some(player);
        Ok(player)
    }

    pub fn player(&self) -> Option<Entity> {
        self.player
    }

    pub fn spawn_npc(&mut self, content_id: &str, position: Vec2) -> Result<Option<Entity>, ContentError> {
        spawn::spawn_npc(&mut self.world, content_id, position)
    }

    pub fn spawn_item(&mut self, item_id: &str, amount: u32, position: Vec2) -> Result<Entity, ContentError> {
        spawn::spawn_item(&mut self.world, item_id, amount, position)
    }

    pub fn spawn_chest(&mut self, items: Vec<String>, position: Vec2) -> Entity {
        spawn::spawn_chest(&mut self.world, items, position)
    }

    pub fn load_map(&mut self, definition: &MapDefinition) {
        map::load_map(&mut self.world, definition);
    }

    pub fn map(&self) -> &GameMap {
        self.world.resource::<GameMap>()
    }

    pub fn show_on_map(&mut self, entity: Entity, position: Vec2) -> bool {
        actor::show_on_map(&mut self.world, entity, position)
    }

    pub fn remove_from_map(&mut self, entity: Entity) -> bool {
        actor::remove_from_map(&mut self.world, entity)
    }

    pub fn show_dynamic_actor(&mut self, entity: Entity, position: Vec2) -> bool {
        map::show_dynamic_actor(&mut self.world, entity, position)
    }

    pub fn remove_dynamic_actor(&mut self, entity: Entity) -> bool {
        map::remove_dynamic_actor(&mut self.world, entity)
    }

    pub fn despawn(&mut self, entity: Entity) -> bool {
        if self.player == Some(entity) {
            self.player = None;
        }
        map::despawn_actor(&mut self.world, entity)
    }

    pub fn exists(&self, entity: Entity) -> bool {
        self.world.get_entity(entity).is_ok()
    }

    // ---------- Character ----------

    pub fn set_intent(&mut self, entity: Entity, intent: MovementIntent) -> bool {
        match self.world.get_mut::<MovementIntent>(entity) {
            Some(mut current) => {
                *current = intent;
                true
            }
            None => false,
        }
    }

    pub fn move_character(&mut self, entity: Entity, direction: f32) -> bool {
        character::move_character(&mut self.world, entity, direction)
    }

    pub fn jump(&mut self, entity: Entity) -> bool {
        character::jump(&mut self.world, entity)
    }

    pub fn crouch(&mut self, entity: Entity, crouching: bool) -> bool {
        character::crouch(&mut self.world, entity, crouching)
    }

    pub fn sheathe_weapon(&mut self, entity: Entity, sheathed: bool) -> bool {
        character::sheathe_weapon(&mut self.world, entity, sheathed)
    }

    pub fn attack(&mut self, entity: Entity) -> bool {
        combat::attack(&mut self.world, entity)
    }

    pub fn equip(&mut self, entity: Entity, item_id: &str) -> bool {
        character::equip(&mut self.world, entity, item_id)
    }

    pub fn unequip(&mut self, entity: Entity, slot: EquipmentSlot) -> bool {
        character::unequip(&mut self.world, entity, slot)
    }

    pub fn character(&self, entity: Entity) -> Option<&Character> {
        self.world.get::<Character>(entity)
    }

    pub fn profile(&self, entity: Entity) -> Option<&CharacterProfile> {
        self.world.get::<CharacterProfile>(entity)
    }

    pub fn profile_mut(&mut self, entity: Entity) -> Option<Mut<'_, CharacterProfile>> {
        self.world.get_mut::<CharacterProfile>(entity)
    }

    pub fn position(&self, entity: Entity) -> Option<Vec2> {
        position_of(&self.world, entity)
    }

    pub fn is_shown(&self, entity: Entity) -> bool {
        actor::is_shown(&self.world, entity)
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        character::is_alive(&self.world, entity)
    }

    pub fn linear_damping(&self, entity: Entity) -> Option<f32> {
        let body = self.world.get::<DynamicActor>(entity)?.body()?;
        self.world.resource::<PhysicsWorld>().linear_damping(body)
    }

    pub fn velocity(&self, entity: Entity) -> Option<Vec2> {
        let body = self.world.get::<DynamicActor>(entity)?.body()?;
        self.world.resource::<PhysicsWorld>().linvel(body)
    }

    // ---------- Skills ----------

    pub fn use_skill(&mut self, user: Entity, skill_key: &str) -> Option<SkillId> {
        skill::use_skill(&mut self.world, user, skill_key)
    }

    pub fn activate_skill(&mut self, user: Entity, id: SkillId) -> bool {
        skill::activate_skill(&mut self.world, user, id)
    }

    pub fn active_skill_count(&self, user: Entity) -> usize {
        self.world.get::<ActiveSkills>(user).map(ActiveSkills::len).unwrap_or(0)
    }

    pub fn is_skill_active(&self, user: Entity, id: SkillId) -> bool {
        self.world.get::<ActiveSkills>(user).is_some_and(|active| active.contains(id))
    }

    pub fn pending_callbacks(&self, owner: Entity) -> usize {
        self.world.resource::<DeferredCallbacks>().pending_for(owner)
    }

    // ---------- Combat ----------

    pub fn receive_damage(&mut self, target: Entity, source: Option<Entity>, amount: i32) -> bool {
        combat::receive_damage(&mut self.world, target, source, amount)
    }

    pub fn inflict_damage(&mut self, attacker: Entity, target: Entity, power: i32) -> bool {
        combat::inflict_damage(&mut self.world, attacker, target, power)
    }

    pub fn kill(&mut self, target: Entity, killer: Option<Entity>) -> bool {
        combat::kill(&mut self.world, target, killer)
    }

    pub fn set_invincible(&mut self, entity: Entity, invincible: bool) -> bool {
        match self.world.get_mut::<Character>(entity) {
            Some(mut character) => {
                character.invincible = invincible;
                true
            }
            None => false,
        }
    }

    // ---------- Party ----------

    pub fn recruit(&mut self, leader: Entity, target: Entity) -> bool {
        party::recruit(&mut self.world, leader, target)
    }

    pub fn dismiss(&mut self, leader: Entity, target: Entity, add_to_map: bool) -> bool {
        party::dismiss(&mut self.world, leader, target, add_to_map)
    }

    pub fn ask_member_to_wait(&mut self, leader: Entity, target: Entity) -> bool {
        party::ask_member_to_wait(&mut self.world, leader, target)
    }

    pub fn ask_member_to_follow(&mut self, leader: Entity, target: Entity) -> bool {
        party::ask_member_to_follow(&mut self.world, leader, target)
    }

    pub fn has_waiting_member(&self, leader: Entity, content_id: &str) -> bool {
        party::has_waiting_member(&self.world, leader, content_id)
    }

    pub fn waiting_member_location(&self, leader: Entity, content_id: &str) -> Option<WaitingLocation> {
        party::waiting_member_location(&self.world, leader, content_id)
    }

    pub fn members(&self, leader: Entity) -> Vec<Entity> {
        party::members(&self.world, leader)
    }

    pub fn leader_and_members(&self, leader: Entity) -> Vec<Entity> {
        party::leader_and_members(&self.world, leader)
    }

    pub fn get_member(&self, leader: Entity, content_id: &str) -> Option<Entity> {
        party::get_member(&self.world, leader, content_id)
    }

    pub fn has_member(&self, leader: Entity, content_id: &str) -> bool {
        party::has_member(&self.world, leader, content_id)
    }

    pub fn leader_of(&self, member: Entity) -> Option<Entity> {
        party::leader_of(&self.world, member)
    }

    // ---------- Interaction ----------

    pub fn interact(&mut self, user: Entity) -> bool {
        interaction::interact(&mut self.world, user)
    }

    pub fn interact_with(&mut self, user: Entity, target: Entity) -> bool {
        interaction::on_interact(&mut self.world, user, target)
    }

    pub fn end_dialogue(&mut self) -> bool {
        interaction::end_dialogue(&mut self.world)
    }

    pub fn run_dialogue_command(&mut self, user: Entity, npc: Entity, command: &str) -> bool {
        interaction::run_dialogue_command(&mut self.world, user, npc, command)
    }

    pub fn active_dialogue(&self) -> &ActiveDialogue {
        self.world.resource::<ActiveDialogue>()
    }

    // ---------- Spawn registry ----------

    pub fn is_npc_allowed_to_spawn(&self, content_id: &str) -> bool {
        self.world.resource::<SpawnRegistry>().is_npc_allowed_to_spawn(content_id)
    }

    pub fn set_npc_allowed_to_spawn(&mut self, content_id: &str, allowed: bool) {
        self.world.resource_mut::<SpawnRegistry>().set_npc_allowed_to_spawn(content_id, allowed);
    }

    pub fn npcs_allowed_to_act(&self) -> bool {
        self.world.resource::<SpawnRegistry>().npcs_allowed_to_act()
    }

    pub fn set_npcs_allowed_to_act(&mut self, allowed: bool) {
        self.world.resource_mut::<SpawnRegistry>().set_npcs_allowed_to_act(allowed);
    }

    /// New game: clears spawn suppression and unfreezes NPCs.
    pub fn reset_spawn_registry(&mut self) {
        self.world.resource_mut::<SpawnRegistry>().reset();
    }
}
