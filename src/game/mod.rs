//! Game simulation modules

pub mod bot;
pub mod combat;
pub mod map;
pub mod physics;
pub mod scheduler;
pub mod snapshot;
pub mod world;

pub use scheduler::{TickScheduler, WorldHandle};
pub use world::{Entity, World};

use std::collections::BTreeMap;

use serde::Deserialize;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::store::skills::BotStats;

/// Directional keys held by a player; missing flags read as released
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InputState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

/// Commands delivered to the tick task
#[derive(Debug)]
pub enum WorldCommand {
    Join {
        session_id: Uuid,
    },
    Leave {
        session_id: Uuid,
    },
    Input {
        session_id: Uuid,
        input: InputState,
    },
    Throw {
        session_id: Uuid,
        angle: f32,
    },
    BotStats {
        reply: oneshot::Sender<BTreeMap<String, BotStats>>,
    },
}
