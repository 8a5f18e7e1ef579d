//! Datagram protocol between players and the server.
//!
//! Every datagram carries exactly one bincode encoded [`Packet`]. Requests that act
//! on behalf of a player carry the token handed out by `Join`.

use crate::dog::{BagItem, Direction, DogId};
use crate::geom::{Position, Velocity};
use crate::map::{Building, Map, Office, Road};
use crate::session::LootId;
use serde::{Deserialize, Serialize};

/// Largest payload a single UDP datagram can carry.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    // Requests
    ListMaps,
    GetMap {
        map_id: String,
    },
    Join {
        map_id: String,
        user_name: String,
    },
    ListPlayers {
        token: String,
    },
    GetState {
        token: String,
    },
    /// `None` stops the dog.
    Move {
        token: String,
        direction: Option<Direction>,
    },
    Tick {
        delta_ms: u64,
    },
    Records {
        start: Option<usize>,
        max_items: Option<usize>,
    },

    // Responses
    Maps {
        maps: Vec<MapSummary>,
    },
    MapInfo {
        map: MapView,
    },
    Joined {
        token: String,
        player_id: DogId,
    },
    Players {
        players: Vec<PlayerView>,
    },
    State {
        players: Vec<DogView>,
        lost_objects: Vec<LootView>,
    },
    Ack,
    RecordList {
        records: Vec<RecordView>,
    },
    Error {
        code: ErrorCode,
        message: String,
    },
}

impl Packet {
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }

    pub fn is_request(&self) -> bool {
        matches!(
            self,
            Packet::ListMaps
                | Packet::GetMap { .. }
                | Packet::Join { .. }
                | Packet::ListPlayers { .. }
                | Packet::GetState { .. }
                | Packet::Move { .. }
                | Packet::Tick { .. }
                | Packet::Records { .. }
        )
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Packet::Error {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    MapNotFound,
    InvalidArgument,
    UnknownToken,
    InvalidToken,
    BadRequest,
    Internal,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MapSummary {
    pub id: String,
    pub name: String,
}

/// Full static description of a map as clients see it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MapView {
    pub id: String,
    pub name: String,
    pub roads: Vec<Road>,
    pub buildings: Vec<Building>,
    pub offices: Vec<Office>,
    pub loot_values: Vec<u32>,
    pub dog_speed: f64,
    pub bag_capacity: usize,
}

impl From<&Map> for MapView {
    fn from(map: &Map) -> Self {
        Self {
            id: map.id().to_string(),
            name: map.name().to_string(),
            roads: map.roads().to_vec(),
            buildings: map.buildings().to_vec(),
            offices: map.offices().to_vec(),
            loot_values: map.loot_values().to_vec(),
            dog_speed: map.dog_speed(),
            bag_capacity: map.bag_capacity(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerView {
    pub id: DogId,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DogView {
    pub id: DogId,
    pub position: Position,
    pub velocity: Velocity,
    pub direction: Direction,
    pub bag: Vec<BagItem>,
    pub score: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LootView {
    pub id: LootId,
    pub item_type: usize,
    pub position: Position,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RecordView {
    pub name: String,
    pub score: u32,
    /// Play time in seconds.
    pub play_time: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Point;
    use crate::map::MapId;

    #[test]
    fn test_move_packet_carries_stop() {
        let packet = Packet::Move {
            token: "ab".repeat(16),
            direction: None,
        };
        let decoded = Packet::decode(&packet.encode().unwrap()).unwrap();
        match decoded {
            Packet::Move { token, direction } => {
                assert_eq!(token.len(), 32);
                assert_eq!(direction, None);
            }
            _ => panic!("Unexpected packet type"),
        }
    }

    #[test]
    fn test_state_packet_serialization() {
        let packet = Packet::State {
            players: vec![DogView {
                id: 3,
                position: Position::new(1.5, 0.25),
                velocity: Velocity::new(0.0, -1.0),
                direction: Direction::North,
                bag: vec![BagItem { id: 9, item_type: 1 }],
                score: 40,
            }],
            lost_objects: vec![LootView {
                id: 9,
                item_type: 1,
                position: Position::new(4.0, 0.0),
            }],
        };
        let bytes = packet.encode().unwrap();
        assert!(bytes.len() < MAX_DATAGRAM_SIZE);
        assert_eq!(Packet::decode(&bytes).unwrap(), packet);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(Packet::decode(&[0xff, 0xff, 0xff, 0xff, 0x01]).is_err());
    }

    #[test]
    fn test_request_classification() {
        assert!(Packet::ListMaps.is_request());
        assert!(Packet::Tick { delta_ms: 10 }.is_request());
        assert!(!Packet::Ack.is_request());
        assert!(!Packet::error(ErrorCode::BadRequest, "nope").is_request());
    }

    #[test]
    fn test_map_view_from_map() {
        let mut map = Map::new(MapId::new("map1"), "Map 1");
        map.add_road(Road::horizontal(Point::new(0, 0), 40));
        map.add_loot_value(10);
        map.set_bag_capacity(5);

        let view = MapView::from(&map);

        assert_eq!(view.id, "map1");
        assert_eq!(view.roads.len(), 1);
        assert_eq!(view.loot_values, vec![10]);
        assert_eq!(view.bag_capacity, 5);
    }
}
