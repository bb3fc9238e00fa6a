use crate::events::{EventBus, GameEvent};
use bevy_ecs::prelude::*;
use std::collections::{HashMap, VecDeque};

/// One-way "show a short-lived message" collaborator.
pub trait NotificationSink: Send + Sync {
    fn show(&mut self, message: &str);

    fn update(&mut self, _delta: f32) {}
}

/// Per-character floating damage numbers.
pub trait DamageSink: Send + Sync {
    fn show_damage(&mut self, target: Entity, amount: i32);

    fn update(&mut self, _delta: f32) {}
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimedLabel {
    pub text: String,
    pub remaining: f32,
}

/// Bounded queue of labels that expire after a fixed lifetime; the oldest
/// label is evicted first when full.
#[derive(Debug, Clone)]
pub struct TimedLabelQueue {
    labels: VecDeque<TimedLabel>,
    max_labels: usize,
    lifetime: f32,
}

impl TimedLabelQueue {
    pub fn new(max_labels: usize, lifetime: f32) -> Self {
        Self { labels: VecDeque::new(), max_labels: max_labels.max(1), lifetime }
    }

    pub fn push(&mut self, text: impl Into<String>) {
        if self.labels.len() >= self.max_labels {
            self.labels.pop_front();
        }
        self.labels.push_back(TimedLabel { text: text.into(), remaining: self.lifetime });
    }

    pub fn tick(&mut self, delta: f32) {
        for label in &mut self.labels {
            label.remaining -= delta;
        }
        self.labels.retain(|label| label.remaining > 0.0);
    }

    pub fn labels(&self) -> impl Iterator<Item = &TimedLabel> {
        self.labels.iter()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl NotificationSink for TimedLabelQueue {
    fn show(&mut self, message: &str) {
        self.push(message);
    }

    fn update(&mut self, delta: f32) {
        self.tick(delta);
    }
}

/// A `TimedLabelQueue` per damaged character.
#[derive(Debug, Clone)]
pub struct FloatingDamageQueues {
    queues: HashMap<Entity, TimedLabelQueue>,
    max_labels: usize,
    lifetime: f32,
}

impl FloatingDamageQueues {
    pub fn new(max_labels: usize, lifetime: f32) -> Self {
        Self { queues: HashMap::new(), max_labels, lifetime }
    }

    pub fn labels_for(&self, target: Entity) -> Vec<String> {
        self.queues.get(&target).map(|q| q.labels().map(|l| l.text.clone()).collect()).unwrap_or_default()
    }
}

impl DamageSink for FloatingDamageQueues {
    fn show_damage(&mut self, target: Entity, amount: i32) {
        let (max_labels, lifetime) = (self.max_labels, self.lifetime);
        self.queues.entry(target).or_insert_with(|| TimedLabelQueue::new(max_labels, lifetime)).push(amount.to_string());
    }

    fn update(&mut self, delta: f32) {
        for queue in self.queues.values_mut() {
            queue.tick(delta);
        }
        self.queues.retain(|_, queue| !queue.is_empty());
    }
}

#[derive(Resource)]
pub struct Notifications(pub Box<dyn NotificationSink>);

#[derive(Resource)]
pub struct FloatingDamages(pub Box<dyn DamageSink>);

/// Posts to the notification sink and mirrors the message on the event bus.
pub fn notify(world: &mut World, message: impl Into<String>) {
    let message = message.into();
    if let Some(mut sink) = world.get_resource_mut::<Notifications>() {
        sink.0.show(&message);
    }
    world.resource_mut::<EventBus>().push(GameEvent::Notification { message });
}

pub fn show_damage(world: &mut World, target: Entity, amount: i32) {
    if let Some(mut sink) = world.get_resource_mut::<FloatingDamages>() {
        sink.0.show_damage(target, amount);
    }
}

pub fn update_sinks(world: &mut World, delta: f32) {
    if let Some(mut sink) = world.get_resource_mut::<Notifications>() {
        sink.0.update(delta);
    }
    if let Some(mut sink) = world.get_resource_mut::<FloatingDamages>() {
        sink.0.update(delta);
    }
}
