//! Authoritative player table

use std::collections::HashMap;

use glam::Vec3;
use rand::Rng;
use uuid::Uuid;

use crate::sync::compress::{POSITION_PRECISION, ROTATION_PRECISION};
use crate::sync::quantize;
use crate::util::time::elapsed_ms;
use crate::ws::protocol::{PlayerView, ScoreEntry};

use super::spawn::{self, SpawnPoint};

/// Full health for a fresh or respawned player
pub const MAX_HEALTH: u32 = 100;

/// Player state in the session (authoritative)
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub id: Uuid,

    // Identity, chosen by the client at join time
    pub character: String,
    pub combat_class: String,
    pub team: String,
    pub game_mode: String,
    pub joined: bool,

    // Pose
    pub position: Vec3,
    pub rotation: Vec3,

    // Combat
    pub health: u32,
    pub alive: bool,

    // Stats (mutated only by the lifecycle module)
    pub kills: u32,
    pub deaths: u32,

    // Activity
    pub connected_at: u64,
    pub last_update_at: u64,
}

impl PlayerState {
    /// Bare placeholder for a connection that has not joined yet
    pub fn placeholder(id: Uuid, now: u64) -> Self {
        Self {
            id,
            character: String::new(),
            combat_class: String::new(),
            team: String::new(),
            game_mode: String::new(),
            joined: false,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            health: MAX_HEALTH,
            alive: true,
            kills: 0,
            deaths: 0,
            connected_at: now,
            last_update_at: now,
        }
    }

    /// Name shown in chat and the kill feed
    pub fn display_name(&self) -> String {
        if self.joined {
            self.character.clone()
        } else {
            let id = self.id.simple().to_string();
            format!("Player_{}", &id[..8])
        }
    }

    /// Alive and joined: can act and can be targeted
    pub fn is_active(&self) -> bool {
        self.joined && self.alive
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id,
            character: self.character.clone(),
            combat_class: self.combat_class.clone(),
            team: self.team.clone(),
            game_mode: self.game_mode.clone(),
            position: quantize(self.position, POSITION_PRECISION),
            rotation: quantize(self.rotation, ROTATION_PRECISION),
            health: self.health,
            alive: self.alive,
        }
    }

    pub fn score_entry(&self) -> ScoreEntry {
        ScoreEntry {
            id: self.id,
            character: self.character.clone(),
            combat_class: self.combat_class.clone(),
            team: self.team.clone(),
            kills: self.kills,
            deaths: self.deaths,
            alive: self.alive,
        }
    }
}

/// Identity selection carried by a join message
#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub character: String,
    pub combat_class: String,
    pub team: String,
    pub game_mode: String,
    pub rotation: Vec3,
}

/// Why a store operation was refused
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum StoreError {
    #[error("player {0} is already registered")]
    AlreadyRegistered(Uuid),

    #[error("unknown player {0}")]
    UnknownPlayer(Uuid),

    #[error("player {0} has not joined")]
    NotInGame(Uuid),

    #[error("player {0} is dead")]
    PlayerDead(Uuid),

    #[error("movement of {distance:.1} units exceeds the per-update limit")]
    ImplausibleMove { distance: f32 },
}

/// In-memory table of every connected player.
///
/// Owned by the session task; iteration follows registration order.
#[derive(Debug, Default)]
pub struct PlayerStore {
    players: HashMap<Uuid, PlayerState>,
    order: Vec<Uuid>,
    /// Max distance per accepted movement (0 = unlimited)
    max_move_delta: f32,
}

impl PlayerStore {
    pub fn new(max_move_delta: f32) -> Self {
        Self {
            players: HashMap::new(),
            order: Vec::new(),
            max_move_delta,
        }
    }

    /// Create a placeholder for a new connection
    pub fn register(&mut self, id: Uuid, now: u64) -> Result<&PlayerState, StoreError> {
        if self.players.contains_key(&id) {
            return Err(StoreError::AlreadyRegistered(id));
        }
        self.order.push(id);
        Ok(self
            .players
            .entry(id)
            .or_insert_with(|| PlayerState::placeholder(id, now)))
    }

    /// Apply a join: identity, initial rotation and a fresh spawn position
    pub fn join<R: Rng + ?Sized>(
        &mut self,
        id: Uuid,
        request: JoinRequest,
        rng: &mut R,
        now: u64,
    ) -> Result<SpawnPoint, StoreError> {
        let player = self
            .players
            .get_mut(&id)
            .ok_or(StoreError::UnknownPlayer(id))?;

        let spawn = spawn::resolve(&request.game_mode, &request.team, rng);

        let first_join = !player.joined;
        player.character = request.character;
        player.combat_class = request.combat_class;
        player.team = request.team;
        player.game_mode = request.game_mode;
        player.rotation = request.rotation;
        player.position = spawn.position;
        player.joined = true;
        player.last_update_at = now;

        if first_join {
            player.health = MAX_HEALTH;
            player.alive = true;
        }

        Ok(spawn)
    }

    /// Overwrite the pose of a living, joined player
    pub fn apply_movement(
        &mut self,
        id: Uuid,
        position: Vec3,
        rotation: Vec3,
        now: u64,
    ) -> Result<(), StoreError> {
        let player = self
            .players
            .get_mut(&id)
            .ok_or(StoreError::UnknownPlayer(id))?;

        if !player.joined {
            return Err(StoreError::NotInGame(id));
        }
        if !player.alive {
            return Err(StoreError::PlayerDead(id));
        }

        let distance = player.position.distance(position);
        if self.max_move_delta > 0.0 && distance > self.max_move_delta {
            return Err(StoreError::ImplausibleMove { distance });
        }

        player.position = position;
        player.rotation = rotation;
        player.last_update_at = now;
        Ok(())
    }

    /// Heartbeat: refresh activity only
    pub fn touch(&mut self, id: Uuid, now: u64) -> Result<(), StoreError> {
        let player = self
            .players
            .get_mut(&id)
            .ok_or(StoreError::UnknownPlayer(id))?;
        player.last_update_at = now;
        Ok(())
    }

    pub fn remove(&mut self, id: Uuid) -> Option<PlayerState> {
        let removed = self.players.remove(&id)?;
        self.order.retain(|other| *other != id);
        Some(removed)
    }

    /// Remove and return every player idle for longer than `timeout_ms`
    pub fn sweep_inactive(&mut self, timeout_ms: u64, now: u64) -> Vec<PlayerState> {
        let stale: Vec<Uuid> = self
            .iter()
            .filter(|p| elapsed_ms(p.last_update_at, now) > timeout_ms)
            .map(|p| p.id)
            .collect();

        stale.into_iter().filter_map(|id| self.remove(id)).collect()
    }

    pub fn get(&self, id: &Uuid) -> Option<&PlayerState> {
        self.players.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &Uuid) -> Option<&mut PlayerState> {
        self.players.get_mut(id)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.players.contains_key(id)
    }

    /// All players in registration order
    pub fn iter(&self) -> impl Iterator<Item = &PlayerState> {
        self.order.iter().filter_map(|id| self.players.get(id))
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
