//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};

use crate::game::map::{MapGrid, Tile};
use crate::game::InputState;

/// Messages sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Held direction keys, replaces the previous state
    Inputs(InputState),

    /// Throw a snowball from the player's position
    Snowball {
        /// Direction in radians
        angle: f32,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Sent once on connect, before the map
    Welcome {
        /// Entity id assigned to this session
        id: String,
        server_time: u64,
    },

    /// Every entity, sent each tick
    Players { players: Vec<PlayerSnapshot> },

    /// Every snowball in flight, sent each tick
    Snowballs { snowballs: Vec<SnowballSnapshot> },
}

/// Entity state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub is_bot: bool,
}

/// Snowball state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnowballSnapshot {
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    /// Remaining lifetime in milliseconds
    pub time_left: f32,
    /// Thrower's entity id
    pub player_id: String,
}

/// The `map` message borrows the grids so it can be serialized once at startup
#[derive(Serialize)]
struct MapMsg<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    ground: &'a [Vec<Tile>],
    decal: &'a [Vec<Option<Tile>>],
}

/// Serialize the `map` message for a grid
pub fn map_message(map: &MapGrid) -> Result<String, serde_json::Error> {
    serde_json::to_string(&MapMsg {
        kind: "map",
        ground: &map.ground,
        decal: &map.decal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn inputs_with_missing_flags_default_to_released() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"inputs","up":true}"#).unwrap();
        match msg {
            ClientMsg::Inputs(input) => {
                assert!(input.up);
                assert!(!input.down && !input.left && !input.right);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn snowball_carries_angle() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"snowball","angle":1.5}"#).unwrap();
        assert!(matches!(msg, ClientMsg::Snowball { angle } if angle == 1.5));
    }

    #[test]
    fn unknown_messages_are_rejected() {
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"fly"}"#).is_err());
    }

    #[test]
    fn snapshots_use_client_field_names() {
        let msg = ServerMsg::Snowballs {
            snowballs: vec![SnowballSnapshot {
                x: 1.0,
                y: 2.0,
                angle: 0.5,
                time_left: 900.0,
                player_id: "bot_1".into(),
            }],
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "snowballs",
                "snowballs": [{"x": 1.0, "y": 2.0, "angle": 0.5, "timeLeft": 900.0, "playerId": "bot_1"}]
            })
        );

        let players = ServerMsg::Players {
            players: vec![PlayerSnapshot {
                id: "bot_0".into(),
                x: 3.0,
                y: 4.0,
                is_bot: true,
            }],
        };
        let value = serde_json::to_value(&players).unwrap();
        assert_eq!(value["players"][0]["isBot"], Value::Bool(true));
    }

    #[test]
    fn map_message_keeps_empty_decal_cells_as_null() {
        let mut map = MapGrid::open(2, 32.0);
        map.decal[0][1] = Some(Tile { id: 4, gid: 5 });
        let value: Value = serde_json::from_str(&map_message(&map).unwrap()).unwrap();
        assert_eq!(value["type"], "map");
        assert_eq!(value["decal"][0][0], Value::Null);
        assert_eq!(value["decal"][0][1]["id"], 4);
        assert_eq!(value["ground"].as_array().unwrap().len(), 2);
    }
}
