use crate::skill::SkillId;
use crate::time::SimClock;
use bevy_ecs::prelude::{Entity, Resource};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Deadline {
    /// Absolute frame number.
    Frame(u64),
    /// Absolute elapsed seconds.
    Seconds(f64),
}

impl Deadline {
    fn is_due(&self, clock: &SimClock) -> bool {
        match *self {
            Deadline::Frame(frame) => clock.frame() >= frame,
            Deadline::Seconds(at) => clock.elapsed_seconds() >= at,
        }
    }
}

/// Work that runs against its owner on a later tick.
#[derive(Debug, Clone, PartialEq)]
pub enum DeferredAction {
    RevertSkill { skill: SkillId },
    MeleeHit,
    RemoveFromMap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeferredEntry {
    pub seq: u64,
    pub owner: Entity,
    pub deadline: Deadline,
    registered_frame: u64,
    pub action: DeferredAction,
}

/// Timer table keyed by owner. Entries never outlive their owner: despawning
/// an actor calls `cancel_owner`, and every action re-checks liveness anyway.
#[derive(Resource, Debug, Default)]
pub struct DeferredCallbacks {
    entries: Vec<DeferredEntry>,
    next_seq: u64,
}

impl DeferredCallbacks {
    fn push(&mut self, owner: Entity, deadline: Deadline, registered_frame: u64, action: DeferredAction) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(DeferredEntry { seq, owner, deadline, registered_frame, action });
        seq
    }

    pub fn run_after_frames(&mut self, clock: &SimClock, owner: Entity, frames: u64, action: DeferredAction) -> u64 {
        let frame = clock.frame();
        self.push(owner, Deadline::Frame(frame + frames.max(1)), frame, action)
    }

    pub fn run_after_seconds(&mut self, clock: &SimClock, owner: Entity, seconds: f32, action: DeferredAction) -> u64 {
        let at = clock.elapsed_seconds() + seconds.max(0.0) as f64;
        self.push(owner, Deadline::Seconds(at), clock.frame(), action)
    }

    pub fn cancel_owner(&mut self, owner: Entity) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.owner != owner);
        before - self.entries.len()
    }

    pub fn cancel(&mut self, seq: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.seq != seq);
        before != self.entries.len()
    }

    /// Removes and returns due entries in registration order. Entries
    /// registered during the current frame wait for a later one.
    pub fn drain_due(&mut self, clock: &SimClock) -> Vec<DeferredEntry> {
        let mut due = Vec::new();
        let mut pending = Vec::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            if entry.registered_frame < clock.frame() && entry.deadline.is_due(clock) {
                due.push(entry);
            } else {
                pending.push(entry);
            }
        }
        self.entries = pending;
        due
    }

    pub fn pending_for(&self, owner: Entity) -> usize {
        self.entries.iter().filter(|entry| entry.owner == owner).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_ecs::world::World;

    #[test]
    fn frame_deadlines_fire_in_registration_order() {
        let mut world = World::new();
        let a = world.spawn_empty().id();
        let b = world.spawn_empty().id();
        let mut clock = SimClock::new();
        let mut callbacks = DeferredCallbacks::default();
        callbacks.run_after_frames(&clock, a, 2, DeferredAction::MeleeHit);
        callbacks.run_after_frames(&clock, b, 2, DeferredAction::RemoveFromMap);

        clock.tick(1.0 / 60.0);
        assert!(callbacks.drain_due(&clock).is_empty());
        clock.tick(1.0 / 60.0);
        let due = callbacks.drain_due(&clock);
        assert_eq!(due.iter().map(|e| e.owner).collect::<Vec<_>>(), vec![a, b]);
        assert!(callbacks.is_empty());
    }

    #[test]
    fn zero_delay_still_waits_for_the_next_tick() {
        let mut world = World::new();
        let owner = world.spawn_empty().id();
        let mut clock = SimClock::new();
        clock.tick(0.1);
        let mut callbacks = DeferredCallbacks::default();
        callbacks.run_after_seconds(&clock, owner, 0.0, DeferredAction::MeleeHit);
        assert!(callbacks.drain_due(&clock).is_empty());
        clock.tick(0.1);
        assert_eq!(callbacks.drain_due(&clock).len(), 1);
    }

    #[test]
    fn cancel_owner_drops_only_that_owner() {
        let mut world = World::new();
        let a = world.spawn_empty().id();
        let b = world.spawn_empty().id();
        let clock = SimClock::new();
        let mut callbacks = DeferredCallbacks::default();
        callbacks.run_after_frames(&clock, a, 5, DeferredAction::MeleeHit);
        callbacks.run_after_frames(&clock, a, 9, DeferredAction::RemoveFromMap);
        let keep = callbacks.run_after_frames(&clock, b, 5, DeferredAction::MeleeHit);
        assert_eq!(callbacks.cancel_owner(a), 2);
        assert_eq!(callbacks.pending_for(b), 1);
        assert!(callbacks.cancel(keep));
        assert!(callbacks.is_empty());
    }
}
