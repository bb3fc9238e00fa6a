pub mod builder;
pub mod category;

pub use builder::{BodyBuilder, BodyKind, BuiltBody, FixtureDef, FixtureShape};
pub use category::Category;

use crate::config::PhysicsConfig;
use bevy_ecs::prelude::*;
use glam::Vec2;
use rapier2d::geometry::{CollisionEvent, CollisionEventFlags};
use rapier2d::pipeline::EventHandler;
use rapier2d::prelude::{
    CCDSolver, Collider, ColliderHandle, ColliderSet, ContactPair, DefaultBroadPhase, ImpulseJointSet,
    IntegrationParameters, IslandManager, MultibodyJointSet, NarrowPhase, PhysicsPipeline, QueryPipeline, Real,
    RigidBody, RigidBodyHandle, RigidBodySet, Vector,
};
use std::collections::HashMap;
use std::sync::Mutex;

/// Named fixture slot on an actor's body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixtureSlot {
    Body,
    Feet,
    Weapon,
    Interactable,
}

impl FixtureSlot {
    const ALL: [FixtureSlot; 4] = [FixtureSlot::Body, FixtureSlot::Feet, FixtureSlot::Weapon, FixtureSlot::Interactable];

    fn code(self) -> u128 {
        match self {
            FixtureSlot::Body => 0,
            FixtureSlot::Feet => 1,
            FixtureSlot::Weapon => 2,
            FixtureSlot::Interactable => 3,
        }
    }

    fn from_code(code: u128) -> FixtureSlot {
        Self::ALL.get(code as usize).copied().unwrap_or(FixtureSlot::Body)
    }
}

const OWNER_FLAG: u128 = 1 << 72;

/// Packs the owning actor handle and fixture slot into collider user data.
pub fn encode_user_data(owner: Option<Entity>, slot: FixtureSlot) -> u128 {
    let mut data = slot.code() << 64;
    if let Some(owner) = owner {
        data |= OWNER_FLAG | owner.to_bits() as u128;
    }
    data
}

pub fn decode_user_data(data: u128) -> (Option<Entity>, FixtureSlot) {
    let slot = FixtureSlot::from_code((data >> 64) & 0xff);
    if data & OWNER_FLAG == 0 {
        return (None, slot);
    }
    (Entity::try_from_bits(data as u64).ok(), slot)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactPhase {
    Began,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixtureRef {
    pub actor: Option<Entity>,
    pub slot: FixtureSlot,
    pub category: Category,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactEvent {
    pub phase: ContactPhase,
    pub a: FixtureRef,
    pub b: FixtureRef,
}

impl ContactEvent {
    /// Returns `(mine, other)` when one side carries `category`.
    pub fn split(&self, category: Category) -> Option<(FixtureRef, FixtureRef)> {
        if self.a.category.intersects(category) {
            Some((self.a, self.b))
        } else if self.b.category.intersects(category) {
            Some((self.b, self.a))
        } else {
            None
        }
    }
}

struct ContactEventCollector {
    collision_events: Mutex<Vec<CollisionEvent>>,
}

impl ContactEventCollector {
    fn new() -> Self {
        Self { collision_events: Mutex::new(Vec::new()) }
    }

    fn drain(&self) -> Vec<CollisionEvent> {
        if let Ok(mut events) = self.collision_events.lock() {
            std::mem::take(&mut *events)
        } else {
            Vec::new()
        }
    }
}

impl EventHandler for ContactEventCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        if let Ok(mut events) = self.collision_events.lock() {
            events.push(event);
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

#[derive(Resource)]
pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    collider_owners: HashMap<ColliderHandle, Entity>,
    event_collector: ContactEventCollector,
    pixels_per_meter: f32,
    allow_sleeping: bool,
    continuous_physics: bool,
    default_linear_damping: f32,
}

impl PhysicsWorld {
    pub fn new(config: &PhysicsConfig) -> Self {
        let gravity = config.gravity_vec();
        Self {
            pipeline: PhysicsPipeline::new(),
            gravity: Vector::new(gravity.x, gravity.y),
            integration_parameters: IntegrationParameters::default(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            collider_owners: HashMap::new(),
            event_collector: ContactEventCollector::new(),
            pixels_per_meter: config.pixels_per_meter.max(f32::EPSILON),
            allow_sleeping: config.allow_sleeping,
            continuous_physics: config.continuous_physics,
            default_linear_damping: config.default_linear_damping,
        }
    }

    pub fn pixels_per_meter(&self) -> f32 {
        self.pixels_per_meter
    }

    pub fn allow_sleeping(&self) -> bool {
        self.allow_sleeping
    }

    pub fn continuous_physics(&self) -> bool {
        self.continuous_physics
    }

    pub fn default_linear_damping(&self) -> f32 {
        self.default_linear_damping
    }

    pub fn to_meters(&self, pixels: Vec2) -> Vector<Real> {
        Vector::new(pixels.x / self.pixels_per_meter, pixels.y / self.pixels_per_meter)
    }

    pub fn to_pixels(&self, meters: &Vector<Real>) -> Vec2 {
        Vec2::new(meters.x * self.pixels_per_meter, meters.y * self.pixels_per_meter)
    }

    pub(crate) fn insert_body(&mut self, body: RigidBody) -> RigidBodyHandle {
        self.bodies.insert(body)
    }

    pub(crate) fn insert_collider(
        &mut self,
        collider: Collider,
        parent: RigidBodyHandle,
        owner: Option<Entity>,
    ) -> ColliderHandle {
        let handle = self.colliders.insert_with_parent(collider, parent, &mut self.bodies);
        if let Some(owner) = owner {
            self.collider_owners.insert(handle, owner);
        }
        handle
    }

    pub fn remove_body(&mut self, handle: RigidBodyHandle) -> bool {
        let collider_handles: Vec<ColliderHandle> = self
            .bodies
            .get(handle)
            .map(|body| body.colliders().iter().copied().collect())
            .unwrap_or_default();
        for collider in collider_handles {
            self.collider_owners.remove(&collider);
        }
        self.bodies
            .remove(
                handle,
                &mut self.island_manager,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .is_some()
    }

    pub fn step(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        self.integration_parameters.dt = dt;
        let hooks = ();
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &hooks,
            &self.event_collector,
        );
        self.query_pipeline.update(&self.colliders);
    }

    fn resolve_fixture(&self, handle: ColliderHandle) -> FixtureRef {
        let Some(collider) = self.colliders.get(handle) else {
            return FixtureRef { actor: None, slot: FixtureSlot::Body, category: Category::empty() };
        };
        let (decoded, slot) = decode_user_data(collider.user_data);
        let registered = self.collider_owners.get(&handle).copied();
        let actor = match (decoded, registered) {
            (Some(decoded), Some(registered)) if decoded == registered => Some(decoded),
            _ => None,
        };
        let category = Category::from_bits_truncate(collider.collision_groups().memberships.bits());
        FixtureRef { actor, slot, category }
    }

    pub fn drain_contacts(&mut self) -> Vec<ContactEvent> {
        let mut out = Vec::new();
        for event in self.event_collector.drain() {
            let (phase, a, b) = match event {
                CollisionEvent::Started(a, b, _) => (ContactPhase::Began, a, b),
                // A removed collider no longer resolves; the surviving side still sees the end.
                CollisionEvent::Stopped(a, b, flags) => {
                    if flags.contains(CollisionEventFlags::REMOVED) {
                        log::trace!("[physics] contact ended by collider removal");
                    }
                    (ContactPhase::Ended, a, b)
                }
            };
            out.push(ContactEvent { phase, a: self.resolve_fixture(a), b: self.resolve_fixture(b) });
        }
        out
    }

    pub fn owner_of(&self, collider: ColliderHandle) -> Option<Entity> {
        self.collider_owners.get(&collider).copied()
    }

    pub fn body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle)
    }

    pub fn body_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle)
    }

    pub fn collider(&self, handle: ColliderHandle) -> Option<&Collider> {
        self.colliders.get(handle)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn body_position_px(&self, handle: RigidBodyHandle) -> Option<Vec2> {
        self.bodies.get(handle).map(|body| self.to_pixels(body.translation()))
    }

    pub fn linvel(&self, handle: RigidBodyHandle) -> Option<Vec2> {
        self.bodies.get(handle).map(|body| {
            let v = body.linvel();
            Vec2::new(v.x, v.y)
        })
    }

    pub fn set_linvel(&mut self, handle: RigidBodyHandle, velocity: Vec2) -> bool {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_linvel(Vector::new(velocity.x, velocity.y), true);
            return true;
        }
        false
    }

    pub fn apply_impulse(&mut self, handle: RigidBodyHandle, impulse: Vec2) -> bool {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.apply_impulse(Vector::new(impulse.x, impulse.y), true);
            return true;
        }
        false
    }

    pub fn linear_damping(&self, handle: RigidBodyHandle) -> Option<f32> {
        self.bodies.get(handle).map(|body| body.linear_damping())
    }

    pub fn set_linear_damping(&mut self, handle: RigidBodyHandle, damping: f32) -> bool {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.set_linear_damping(damping);
            return true;
        }
        false
    }

    pub fn is_sensor(&self, handle: ColliderHandle) -> Option<bool> {
        self.colliders.get(handle).map(|collider| collider.is_sensor())
    }

    pub fn set_sensor(&mut self, handle: ColliderHandle, sensor: bool) -> bool {
        if let Some(collider) = self.colliders.get_mut(handle) {
            collider.set_sensor(sensor);
            return true;
        }
        false
    }

    pub fn filter_bits(&self, handle: ColliderHandle) -> Option<(Category, Category)> {
        self.colliders.get(handle).map(|collider| {
            let groups = collider.collision_groups();
            (
                Category::from_bits_truncate(groups.memberships.bits()),
                Category::from_bits_truncate(groups.filter.bits()),
            )
        })
    }

    pub fn set_collision_mask(&mut self, handle: ColliderHandle, mask: Category) -> bool {
        let Some((category, _)) = self.filter_bits(handle) else {
            return false;
        };
        if let Some(collider) = self.colliders.get_mut(handle) {
            collider.set_collision_groups(category.interaction_groups(mask));
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_data_round_trips_owner_and_slot() {
        let mut world = World::new();
        let entity = world.spawn_empty().id();
        let data = encode_user_data(Some(entity), FixtureSlot::Weapon);
        assert_eq!(decode_user_data(data), (Some(entity), FixtureSlot::Weapon));
        assert_eq!(decode_user_data(encode_user_data(None, FixtureSlot::Feet)), (None, FixtureSlot::Feet));
    }

    #[test]
    fn removed_body_stops_resolving() {
        let mut physics = PhysicsWorld::new(&PhysicsConfig::default());
        let mut world = World::new();
        let owner = world.spawn_empty().id();
        let built = BodyBuilder::new(BodyKind::Dynamic)
            .position(Vec2::new(100.0, 100.0))
            .fixture(FixtureDef::rectangle(8.0, 8.0).category(Category::CHARACTER_BODY).mask(Category::GROUND))
            .build(&mut physics, Some(owner));
        let (_, collider) = built.fixtures[0];
        assert_eq!(physics.owner_of(collider), Some(owner));
        assert!(physics.remove_body(built.body));
        assert_eq!(physics.owner_of(collider), None);
        assert!(physics.body(built.body).is_none());
        assert!(!physics.set_linear_damping(built.body, 3.0));
    }
}
