use bevy_ecs::prelude::Resource;

/// Frame-stepped simulation clock. Advanced once per `GameWorld::update`.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct SimClock {
    frame: u64,
    elapsed: f64,
    pub delta: f32,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self, delta: f32) {
        self.frame += 1;
        self.delta = delta.max(0.0);
        self.elapsed += self.delta as f64;
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn delta_seconds(&self) -> f32 {
        self.delta
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed
    }
}
