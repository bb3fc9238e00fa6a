pub mod actor;
pub mod ai;
pub mod callbacks;
pub mod character;
pub mod cli;
pub mod combat;
pub mod commands;
pub mod config;
pub mod content;
pub mod events;
pub mod harness;
pub mod interaction;
pub mod map;
pub mod notifications;
pub mod party;
pub mod physics;
pub mod skill;
pub mod spawn;
pub mod systems;
pub mod time;
pub mod world;

pub use world::{GameWorld, SimRng};
