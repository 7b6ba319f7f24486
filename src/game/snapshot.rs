//! Snapshot building

use crate::ws::protocol::{PlayerSnapshot, ServerMsg, SnowballSnapshot};

use super::World;

/// Builds the per-tick broadcast payloads
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// Entity snapshot: id, position and bot flag only
    pub fn players(world: &World) -> ServerMsg {
        let players = world
            .entities()
            .iter()
            .map(|e| PlayerSnapshot {
                id: e.id.clone(),
                x: e.x,
                y: e.y,
                is_bot: e.is_bot,
            })
            .collect();
        ServerMsg::Players { players }
    }

    pub fn snowballs(world: &World) -> ServerMsg {
        let snowballs = world
            .snowballs()
            .iter()
            .map(|b| SnowballSnapshot {
                x: b.x,
                y: b.y,
                angle: b.angle,
                time_left: b.time_left,
                player_id: b.owner_id.clone(),
            })
            .collect();
        ServerMsg::Snowballs { snowballs }
    }
}
