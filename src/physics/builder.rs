use super::{encode_user_data, Category, FixtureSlot, PhysicsWorld};
use bevy_ecs::prelude::Entity;
use glam::Vec2;
use rapier2d::geometry::ActiveCollisionTypes;
use rapier2d::pipeline::ActiveEvents;
use rapier2d::prelude::{ColliderBuilder, ColliderHandle, Point, RigidBodyBuilder, RigidBodyHandle, RigidBodyType, Vector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Static,
    Dynamic,
    Kinematic,
}

impl BodyKind {
    fn rigid_body_type(self) -> RigidBodyType {
        match self {
            BodyKind::Static => RigidBodyType::Fixed,
            BodyKind::Dynamic => RigidBodyType::Dynamic,
            BodyKind::Kinematic => RigidBodyType::KinematicVelocityBased,
        }
    }
}

/// Fixture geometry in pixels; converted to meters at build time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixtureShape {
    Rectangle { half_width: f32, half_height: f32 },
    Circle { radius: f32 },
    Segment { a: Vec2, b: Vec2 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FixtureDef {
    shape: FixtureShape,
    offset: Vec2,
    category: Category,
    mask: Category,
    sensor: bool,
    friction: f32,
    slot: FixtureSlot,
}

impl FixtureDef {
    fn new(shape: FixtureShape) -> Self {
        Self {
            shape,
            offset: Vec2::ZERO,
            category: Category::empty(),
            mask: Category::empty(),
            sensor: false,
            friction: 0.6,
            slot: FixtureSlot::Body,
        }
    }

    pub fn rectangle(half_width: f32, half_height: f32) -> Self {
        Self::new(FixtureShape::Rectangle { half_width, half_height })
    }

    pub fn circle(radius: f32) -> Self {
        Self::new(FixtureShape::Circle { radius })
    }

    pub fn segment(a: Vec2, b: Vec2) -> Self {
        Self::new(FixtureShape::Segment { a, b })
    }

    pub fn offset(mut self, offset: Vec2) -> Self {
        self.offset = offset;
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn mask(mut self, mask: Category) -> Self {
        self.mask = mask;
        self
    }

    pub fn sensor(mut self, sensor: bool) -> Self {
        self.sensor = sensor;
        self
    }

    pub fn friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn slot(mut self, slot: FixtureSlot) -> Self {
        self.slot = slot;
        self
    }

    pub fn shape(&self) -> FixtureShape {
        self.shape
    }
}

pub struct BuiltBody {
    pub body: RigidBodyHandle,
    pub fixtures: Vec<(FixtureSlot, ColliderHandle)>,
}

/// Declarative body + fixture description. Nothing touches the physics world
/// until `build`, which consumes the builder.
#[derive(Debug, Clone)]
pub struct BodyBuilder {
    kind: BodyKind,
    position: Vec2,
    fixed_rotation: bool,
    linear_damping: Option<f32>,
    gravity_scale: f32,
    bullet: bool,
    initial_velocity: Vec2,
    fixtures: Vec<FixtureDef>,
}

impl BodyBuilder {
    pub fn new(kind: BodyKind) -> Self {
        Self {
            kind,
            position: Vec2::ZERO,
            fixed_rotation: false,
            linear_damping: None,
            gravity_scale: 1.0,
            bullet: false,
            initial_velocity: Vec2::ZERO,
            fixtures: Vec::new(),
        }
    }

    pub fn position(mut self, pixels: Vec2) -> Self {
        self.position = pixels;
        self
    }

    pub fn fixed_rotation(mut self, fixed: bool) -> Self {
        self.fixed_rotation = fixed;
        self
    }

    pub fn linear_damping(mut self, damping: f32) -> Self {
        self.linear_damping = Some(damping);
        self
    }

    pub fn gravity_scale(mut self, scale: f32) -> Self {
        self.gravity_scale = scale;
        self
    }

    pub fn bullet(mut self, bullet: bool) -> Self {
        self.bullet = bullet;
        self
    }

    /// Initial linear velocity in meters per second.
    pub fn velocity(mut self, velocity: Vec2) -> Self {
        self.initial_velocity = velocity;
        self
    }

    pub fn fixture(mut self, def: FixtureDef) -> Self {
        self.fixtures.push(def);
        self
    }

    pub fn fixture_count(&self) -> usize {
        self.fixtures.len()
    }

    pub fn build(self, physics: &mut PhysicsWorld, owner: Option<Entity>) -> BuiltBody {
        let ppm = physics.pixels_per_meter();
        let mut body_builder = RigidBodyBuilder::new(self.kind.rigid_body_type())
            .translation(physics.to_meters(self.position))
            .linvel(Vector::new(self.initial_velocity.x, self.initial_velocity.y))
            .linear_damping(self.linear_damping.unwrap_or(physics.default_linear_damping()))
            .gravity_scale(self.gravity_scale)
            .can_sleep(physics.allow_sleeping())
            .ccd_enabled(self.bullet || (physics.continuous_physics() && self.kind == BodyKind::Dynamic));
        if self.fixed_rotation {
            body_builder = body_builder.lock_rotations();
        }
        let body = physics.insert_body(body_builder.build());

        // Kinematic projectiles must also see fixed terrain.
        let collision_types = if self.kind == BodyKind::Kinematic {
            ActiveCollisionTypes::all()
        } else {
            ActiveCollisionTypes::default()
        };
        let mut fixtures = Vec::with_capacity(self.fixtures.len());
        for def in self.fixtures {
            let collider_builder = match def.shape {
                FixtureShape::Rectangle { half_width, half_height } => {
                    ColliderBuilder::cuboid(half_width / ppm, half_height / ppm)
                }
                FixtureShape::Circle { radius } => ColliderBuilder::ball(radius / ppm),
                FixtureShape::Segment { a, b } => {
                    ColliderBuilder::segment(Point::new(a.x / ppm, a.y / ppm), Point::new(b.x / ppm, b.y / ppm))
                }
            };
            let collider = collider_builder
                .translation(physics.to_meters(def.offset))
                .sensor(def.sensor)
                .friction(def.friction)
                .collision_groups(def.category.interaction_groups(def.mask))
                .active_events(ActiveEvents::COLLISION_EVENTS)
                .active_collision_types(collision_types)
                .user_data(encode_user_data(owner, def.slot))
                .build();
            let handle = physics.insert_collider(collider, body, owner);
            fixtures.push((def.slot, handle));
        }
        BuiltBody { body, fixtures }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicsConfig;

    #[test]
    fn builder_is_declarative_until_build() {
        let mut physics = PhysicsWorld::new(&PhysicsConfig::default());
        let builder = BodyBuilder::new(BodyKind::Dynamic)
            .position(Vec2::new(50.0, 200.0))
            .fixed_rotation(true)
            .fixture(FixtureDef::rectangle(10.0, 20.0).category(Category::CHARACTER_BODY).mask(Category::TERRAIN))
            .fixture(
                FixtureDef::rectangle(8.0, 2.0)
                    .offset(Vec2::new(0.0, -20.0))
                    .category(Category::FEET)
                    .mask(Category::GROUND)
                    .sensor(true)
                    .slot(FixtureSlot::Feet),
            );
        assert_eq!(builder.fixture_count(), 2);
        assert_eq!(physics.body_count(), 0);

        let built = builder.build(&mut physics, None);
        assert_eq!(physics.body_count(), 1);
        let position = physics.body_position_px(built.body).expect("body exists");
        assert!((position - Vec2::new(50.0, 200.0)).length() < 1e-3);
        let (slot, feet) = built.fixtures[1];
        assert_eq!(slot, FixtureSlot::Feet);
        assert_eq!(physics.is_sensor(feet), Some(true));
        assert_eq!(physics.filter_bits(feet), Some((Category::FEET, Category::GROUND)));
    }
}
