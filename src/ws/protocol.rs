//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use std::collections::BTreeMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest accepted identity string (character, class, team, mode, weapon)
pub const MAX_IDENTITY_LEN: usize = 32;
/// Longest accepted chat message, after trimming
pub const MAX_CHAT_LEN: usize = 256;
/// Largest base damage a client may declare for a shot
pub const MAX_DECLARED_DAMAGE: f32 = 100.0;

/// Verbose `{x, y, z}` vector used by older clients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegacyVec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<LegacyVec3> for Vec3 {
    fn from(v: LegacyVec3) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Enter the game with a chosen identity
    Join {
        character: String,
        combat_class: String,
        team: String,
        game_mode: String,
        /// Initial view rotation
        #[serde(default)]
        rotation: [f32; 3],
    },

    /// Compact movement update
    Move {
        /// Position, 2 decimal places
        p: [f32; 3],
        /// Rotation in radians, 3 decimal places
        r: [f32; 3],
        /// Client timestamp, echoed to other clients
        t: u64,
    },

    /// Verbose movement update from older clients
    Movement {
        position: LegacyVec3,
        rotation: LegacyVec3,
        #[serde(default)]
        timestamp: Option<u64>,
    },

    /// Fire a weapon
    Shoot {
        position: [f32; 3],
        direction: [f32; 3],
        weapon: String,
        damage: f32,
        t: u64,
    },

    /// Keep-alive, refreshes activity only
    Heartbeat,

    /// Direct damage report (legacy path, no hit test)
    Damage { target_id: Uuid, damage: f32 },

    /// Ask to come back after dying
    Respawn,

    /// Weapon reloaded, relayed for remote animation
    Reload { weapon: String },

    /// Chat line
    Chat { message: String },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

impl ClientMsg {
    /// Reject messages a well-behaved client would never send
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            ClientMsg::Join {
                character,
                combat_class,
                team,
                game_mode,
                rotation,
            } => {
                check_identity("character", character)?;
                check_identity("combat_class", combat_class)?;
                check_identity("team", team)?;
                check_identity("game_mode", game_mode)?;
                check_finite("rotation", rotation)
            }
            ClientMsg::Move { p, r, .. } => {
                check_finite("p", p)?;
                check_finite("r", r)
            }
            ClientMsg::Movement {
                position, rotation, ..
            } => {
                check_finite("position", &[position.x, position.y, position.z])?;
                check_finite("rotation", &[rotation.x, rotation.y, rotation.z])
            }
            ClientMsg::Shoot {
                position,
                direction,
                weapon,
                damage,
                ..
            } => {
                check_finite("position", position)?;
                check_finite("direction", direction)?;
                if Vec3::from(*direction).length_squared() <= f32::EPSILON {
                    return Err(ProtocolError::ZeroDirection);
                }
                check_identity("weapon", weapon)?;
                check_damage(*damage)
            }
            ClientMsg::Damage { damage, .. } => check_damage(*damage),
            ClientMsg::Reload { weapon } => check_identity("weapon", weapon),
            ClientMsg::Chat { message } => {
                let len = message.trim().chars().count();
                if len == 0 || len > MAX_CHAT_LEN {
                    return Err(ProtocolError::BadChat(len));
                }
                Ok(())
            }
            ClientMsg::Heartbeat | ClientMsg::Respawn | ClientMsg::Ping { .. } => Ok(()),
        }
    }

    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMsg::Join { .. } => "join",
            ClientMsg::Move { .. } => "move",
            ClientMsg::Movement { .. } => "movement",
            ClientMsg::Shoot { .. } => "shoot",
            ClientMsg::Heartbeat => "heartbeat",
            ClientMsg::Damage { .. } => "damage",
            ClientMsg::Respawn => "respawn",
            ClientMsg::Reload { .. } => "reload",
            ClientMsg::Chat { .. } => "chat",
            ClientMsg::Ping { .. } => "ping",
        }
    }
}

fn check_identity(field: &'static str, value: &str) -> Result<(), ProtocolError> {
    let len = value.chars().count();
    if value.trim().is_empty() || len > MAX_IDENTITY_LEN {
        return Err(ProtocolError::BadIdentity { field, len });
    }
    Ok(())
}

fn check_finite(field: &'static str, values: &[f32]) -> Result<(), ProtocolError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(ProtocolError::NonFinite(field))
    }
}

fn check_damage(damage: f32) -> Result<(), ProtocolError> {
    if damage.is_finite() && damage > 0.0 && damage <= MAX_DECLARED_DAMAGE {
        Ok(())
    } else {
        Err(ProtocolError::BadDamage(damage))
    }
}

/// Reasons an inbound message is dropped before reaching the session
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ProtocolError {
    #[error("non-finite value in {0}")]
    NonFinite(&'static str),

    #[error("shot direction has zero length")]
    ZeroDirection,

    #[error("declared damage {0} outside (0, {max}]", max = MAX_DECLARED_DAMAGE)]
    BadDamage(f32),

    #[error("{field} must be 1..={max} characters, got {len}", max = MAX_IDENTITY_LEN)]
    BadIdentity { field: &'static str, len: usize },

    #[error("chat message must be 1..={max} characters, got {0}", max = MAX_CHAT_LEN)]
    BadChat(usize),
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome { id: Uuid, server_time: u64 },

    /// Someone connected but has not joined yet
    PlayerConnected { id: Uuid },

    /// Private reply to a join: where you spawned and who is here
    JoinAccepted {
        position: [f32; 3],
        rotation: [f32; 3],
        health: u32,
        players: Vec<PlayerView>,
    },

    /// Identity of a joined player, sent to everyone else
    PlayerJoined { player: PlayerView },

    /// Compact movement relay
    PlayerMoved {
        id: Uuid,
        p: [f32; 3],
        r: [f32; 3],
        /// Original client timestamp
        t: u64,
    },

    /// Shot fired, for remote muzzle flash and tracers
    PlayerShot {
        id: Uuid,
        position: [f32; 3],
        direction: [f32; 3],
        weapon: String,
        t: u64,
    },

    /// Weapon reloaded by a remote player
    PlayerReloaded { id: Uuid, weapon: String },

    /// You were hit
    PlayerHit {
        attacker_id: Uuid,
        damage: u32,
        health: u32,
        headshot: bool,
    },

    /// Your shot landed
    HitConfirmed {
        target_id: Uuid,
        damage: u32,
        headshot: bool,
        killed: bool,
    },

    /// Public health change
    HealthUpdate { id: Uuid, health: u32 },

    /// Kill feed entry
    PlayerKilled {
        victim_id: Uuid,
        victim_name: String,
        killer_id: Uuid,
        killer_name: String,
        victim_deaths: u32,
        killer_kills: u32,
    },

    /// A dead player is back
    PlayerRespawned {
        id: Uuid,
        position: [f32; 3],
        rotation: [f32; 3],
        health: u32,
    },

    /// Player removed from the session
    PlayerLeft { id: Uuid, reason: String },

    /// Chat line tagged with the sender's display identity
    Chat {
        id: Uuid,
        name: String,
        message: String,
        t: u64,
    },

    /// Periodic scoreboard view (no positions)
    WorldSnapshot {
        player_count: usize,
        players: Vec<ScoreEntry>,
    },

    /// Team totals after a counted kill
    TeamScore { scores: BTreeMap<String, u32> },

    /// Team match decided (`team` is `None` on a tie at the time limit)
    MatchWon {
        team: Option<String>,
        scores: BTreeMap<String, u32>,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// Presentation-relevant view of a player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: Uuid,
    pub character: String,
    pub combat_class: String,
    pub team: String,
    pub game_mode: String,
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub health: u32,
    pub alive: bool,
}

/// One row of the world snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub id: Uuid,
    pub character: String,
    pub combat_class: String,
    pub team: String,
    pub kills: u32,
    pub deaths: u32,
    pub alive: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_and_legacy_movement_both_parse() {
        let compact: ClientMsg =
            serde_json::from_str(r#"{"type":"move","p":[1.5,40,2],"r":[0,0.25,0],"t":99}"#)
                .unwrap();
        assert!(matches!(compact, ClientMsg::Move { t: 99, .. }));

        let legacy: ClientMsg = serde_json::from_str(
            r#"{"type":"movement","position":{"x":1,"y":2,"z":3},"rotation":{"x":0,"y":0,"z":0}}"#,
        )
        .unwrap();
        match legacy {
            ClientMsg::Movement {
                position,
                timestamp,
                ..
            } => {
                assert_eq!(Vec3::from(position), Vec3::new(1.0, 2.0, 3.0));
                assert_eq!(timestamp, None);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn unit_variants_parse_from_bare_tag() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"heartbeat"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::Heartbeat));
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"respawn"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::Respawn));
    }

    #[test]
    fn join_rotation_defaults_to_zero() {
        let msg: ClientMsg = serde_json::from_str(
            r#"{"type":"join","character":"Vex","combat_class":"assault","team":"red","game_mode":"tdm"}"#,
        )
        .unwrap();
        match msg {
            ClientMsg::Join { rotation, .. } => assert_eq!(rotation, [0.0; 3]),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn server_messages_are_type_tagged() {
        let json = serde_json::to_value(ServerMsg::HealthUpdate {
            id: Uuid::nil(),
            health: 42,
        })
        .unwrap();
        assert_eq!(json["type"], "health_update");
        assert_eq!(json["health"], 42);
    }

    #[test]
    fn zero_direction_shot_is_rejected() {
        let msg = ClientMsg::Shoot {
            position: [0.0; 3],
            direction: [0.0; 3],
            weapon: "rifle".into(),
            damage: 20.0,
            t: 0,
        };
        assert_eq!(msg.validate(), Err(ProtocolError::ZeroDirection));
    }

    #[test]
    fn declared_damage_is_bounded() {
        let too_much = ClientMsg::Damage {
            target_id: Uuid::nil(),
            damage: 500.0,
        };
        assert!(matches!(too_much.validate(), Err(ProtocolError::BadDamage(_))));

        let negative = ClientMsg::Damage {
            target_id: Uuid::nil(),
            damage: -1.0,
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn non_finite_movement_is_rejected() {
        let msg = ClientMsg::Move {
            p: [f32::NAN, 0.0, 0.0],
            r: [0.0; 3],
            t: 0,
        };
        assert_eq!(msg.validate(), Err(ProtocolError::NonFinite("p")));
    }

    #[test]
    fn identity_and_chat_lengths_are_checked() {
        let join = ClientMsg::Join {
            character: "x".repeat(MAX_IDENTITY_LEN + 1),
            combat_class: "medic".into(),
            team: "blue".into(),
            game_mode: "tdm".into(),
            rotation: [0.0; 3],
        };
        assert!(matches!(
            join.validate(),
            Err(ProtocolError::BadIdentity { field: "character", .. })
        ));

        let blank = ClientMsg::Chat {
            message: "   ".into(),
        };
        assert_eq!(blank.validate(), Err(ProtocolError::BadChat(0)));

        let ok = ClientMsg::Chat {
            message: "gg".into(),
        };
        assert!(ok.validate().is_ok());
    }
}
