//! Session state and the authoritative message loop

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::sync::compress::{POSITION_PRECISION, ROTATION_PRECISION};
use crate::sync::quantize;
use crate::util::time::{elapsed_ms, unix_millis};
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::combat::{CombatSystem, HitResult, ShotEvent};
use super::lag::LagCompensator;
use super::lifecycle::{self, KillEvent, LifecycleError};
use super::player::{JoinRequest, PlayerStore, StoreError};
use super::scoreboard::{KillListener, TeamScoreboard};
use super::snapshot::SnapshotBuilder;
use super::{InputEvent, PlayerInput};

/// Who an outbound message is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    All,
    Only(Uuid),
    AllExcept(Uuid),
}

impl Recipient {
    pub fn includes(&self, id: Uuid) -> bool {
        match self {
            Recipient::All => true,
            Recipient::Only(target) => *target == id,
            Recipient::AllExcept(excluded) => *excluded != id,
        }
    }
}

/// A server message with its audience
#[derive(Debug, Clone)]
pub struct Outbound {
    pub to: Recipient,
    pub msg: ServerMsg,
}

/// Handle to the running session
#[derive(Clone)]
pub struct SessionHandle {
    pub input_tx: mpsc::Sender<PlayerInput>,
    pub outbound_tx: broadcast::Sender<Outbound>,
    pub player_count: Arc<AtomicUsize>,
}

impl SessionHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    /// Receive every outbound message from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Outbound> {
        self.outbound_tx.subscribe()
    }
}

/// The authoritative game session.
///
/// Owns all player state. Every input and every periodic job runs to
/// completion on this task, so nothing here needs a lock.
pub struct GameSession {
    config: SessionConfig,
    store: PlayerStore,
    rng: ChaCha8Rng,
    lag: LagCompensator,
    listeners: Vec<Box<dyn KillListener>>,
    snapshot_builder: SnapshotBuilder,
    input_rx: mpsc::Receiver<PlayerInput>,
    outbound_tx: broadcast::Sender<Outbound>,
    player_count: Arc<AtomicUsize>,
}

impl GameSession {
    /// Create a new session
    pub fn new(config: SessionConfig) -> (Self, SessionHandle) {
        let (input_tx, input_rx) = mpsc::channel(1024);
        let (outbound_tx, _) = broadcast::channel(1024);
        let player_count = Arc::new(AtomicUsize::new(0));

        let handle = SessionHandle {
            input_tx,
            outbound_tx: outbound_tx.clone(),
            player_count: player_count.clone(),
        };

        let rng = match config.rng_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let scoreboard = TeamScoreboard::new(config.team_score_limit, config.team_time_limit_secs);

        let session = Self {
            store: PlayerStore::new(config.max_move_delta),
            rng,
            lag: LagCompensator::new(),
            listeners: vec![Box::new(scoreboard)],
            snapshot_builder: SnapshotBuilder::new(),
            input_rx,
            outbound_tx,
            player_count,
            config,
        };

        (session, handle)
    }

    /// Register an extra kill observer
    pub fn add_listener(&mut self, listener: Box<dyn KillListener>) {
        self.listeners.push(listener);
    }

    pub fn store(&self) -> &PlayerStore {
        &self.store
    }

    /// Run the session loop until every input sender is gone
    pub async fn run(mut self) {
        info!(
            sweep_ms = self.config.sweep_interval_ms,
            snapshot_ms = self.config.snapshot_interval_ms,
            lag_compensation = self.config.lag_compensation_enabled,
            "Session started"
        );

        let mut sweep_interval = interval(Duration::from_millis(self.config.sweep_interval_ms));
        sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut snapshot_interval =
            interval(Duration::from_millis(self.config.snapshot_interval_ms));
        snapshot_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                maybe_input = self.input_rx.recv() => match maybe_input {
                    Some(input) => self.handle_input(input),
                    None => break,
                },
                _ = sweep_interval.tick() => self.sweep(unix_millis()),
                _ = snapshot_interval.tick() => self.broadcast_snapshot(unix_millis()),
            }
        }

        info!("Session input closed, stopping");
    }

    /// Apply one input to the session
    pub fn handle_input(&mut self, input: PlayerInput) {
        let PlayerInput {
            player_id,
            event,
            received_at: now,
        } = input;

        match event {
            InputEvent::Connect => self.handle_connect(player_id, now),
            InputEvent::Disconnect => self.handle_disconnect(player_id),
            InputEvent::Message(msg) => self.handle_message(player_id, msg, now),
        }
    }

    fn handle_message(&mut self, id: Uuid, msg: ClientMsg, now: u64) {
        trace!(player_id = %id, kind = msg.kind(), "Client message");
        if let Err(e) = msg.validate() {
            warn!(player_id = %id, kind = msg.kind(), error = %e, "Invalid message dropped");
            return;
        }
        match msg {
            ClientMsg::Join {
                character,
                combat_class,
                team,
                game_mode,
                rotation,
            } => {
                let request = JoinRequest {
                    character,
                    combat_class,
                    team,
                    game_mode,
                    rotation: Vec3::from(rotation),
                };
                self.handle_join(id, request, now);
            }
            ClientMsg::Move { p, r, t } => {
                self.handle_movement(id, Vec3::from(p), Vec3::from(r), t, now);
            }
            ClientMsg::Movement {
                position,
                rotation,
                timestamp,
            } => {
                let t = timestamp.unwrap_or(now);
                self.handle_movement(id, position.into(), rotation.into(), t, now);
            }
            ClientMsg::Shoot {
                position,
                direction,
                weapon,
                damage,
                t,
            } => {
                let shot = ShotEvent::new(
                    id,
                    Vec3::from(position),
                    Vec3::from(direction),
                    weapon,
                    damage,
                    t,
                );
                self.handle_shoot(shot, now);
            }
            ClientMsg::Heartbeat => {
                if let Err(e) = self.store.touch(id, now) {
                    debug!(player_id = %id, error = %e, "Heartbeat ignored");
                }
            }
            ClientMsg::Damage { target_id, damage } => {
                self.handle_legacy_damage(id, target_id, damage, now);
            }
            ClientMsg::Respawn => self.handle_respawn(id, now),
            ClientMsg::Reload { weapon } => self.handle_reload(id, weapon),
            ClientMsg::Chat { message } => self.handle_chat(id, message, now),
            ClientMsg::Ping { t } => self.send_to(id, ServerMsg::Pong { t }),
        }
    }

    /// New connection: create the placeholder and announce it
    fn handle_connect(&mut self, id: Uuid, now: u64) {
        match self.store.register(id, now) {
            Ok(_) => {
                self.sync_player_count();
                self.broadcast_except(id, ServerMsg::PlayerConnected { id });
                info!(player_id = %id, players = self.store.len(), "Player connected");
            }
            Err(e) => debug!(player_id = %id, error = %e, "Duplicate connect ignored"),
        }
    }

    fn handle_disconnect(&mut self, id: Uuid) {
        if self.store.remove(id).is_some() {
            self.lag.forget(&id);
            self.sync_player_count();
            self.broadcast(ServerMsg::PlayerLeft {
                id,
                reason: "disconnected".to_string(),
            });
            info!(player_id = %id, players = self.store.len(), "Player disconnected");
        }
    }

    fn handle_join(&mut self, id: Uuid, request: JoinRequest, now: u64) {
        let spawn = match self.store.join(id, request, &mut self.rng, now) {
            Ok(spawn) => spawn,
            Err(e) => {
                debug!(player_id = %id, error = %e, "Join ignored");
                return;
            }
        };

        let Some(player) = self.store.get(&id) else {
            return;
        };
        let view = player.view();
        let rotation = player.rotation;

        self.lag.forget(&id);
        self.lag.record(id, now, spawn.position, rotation);

        let others = self
            .store
            .iter()
            .filter(|p| p.joined && p.id != id)
            .map(|p| p.view())
            .collect();

        info!(
            player_id = %id,
            character = %view.character,
            team = %view.team,
            game_mode = %view.game_mode,
            spawn = spawn.name,
            "Player joined"
        );

        self.send_to(
            id,
            ServerMsg::JoinAccepted {
                position: view.position,
                rotation: view.rotation,
                health: view.health,
                players: others,
            },
        );
        self.broadcast_except(id, ServerMsg::PlayerJoined { player: view });
    }

    fn handle_movement(&mut self, id: Uuid, position: Vec3, rotation: Vec3, t: u64, now: u64) {
        match self.store.apply_movement(id, position, rotation, now) {
            Ok(()) => {
                self.lag.record(id, now, position, rotation);
                self.broadcast_except(
                    id,
                    ServerMsg::PlayerMoved {
                        id,
                        p: quantize(position, POSITION_PRECISION),
                        r: quantize(rotation, ROTATION_PRECISION),
                        t,
                    },
                );
            }
            Err(StoreError::ImplausibleMove { distance }) => {
                warn!(player_id = %id, distance, "Rejected implausible movement");
            }
            Err(e) => debug!(player_id = %id, error = %e, "Movement ignored"),
        }
    }

    fn handle_shoot(&mut self, shot: ShotEvent, now: u64) {
        let shooter_id = shot.shooter_id;
        match self.store.get(&shooter_id) {
            Some(p) if p.is_active() => {}
            Some(_) => {
                warn!(player_id = %shooter_id, "Shot from dead or unjoined player ignored");
                return;
            }
            None => {
                debug!(player_id = %shooter_id, "Shot from unknown player ignored");
                return;
            }
        }

        self.broadcast_except(
            shooter_id,
            ServerMsg::PlayerShot {
                id: shooter_id,
                position: quantize(shot.origin, POSITION_PRECISION),
                direction: quantize(shot.direction, ROTATION_PRECISION),
                weapon: shot.weapon.clone(),
                t: shot.client_time,
            },
        );

        let compensate = self.config.lag_compensation_enabled;
        let rewind_to = now.saturating_sub(self.config.lag_rewind_ms);
        let lag = &self.lag;
        let target_id = CombatSystem::find_target(&self.store, &shot, |p| {
            if compensate {
                lag.position_at(&p.id, rewind_to).unwrap_or(p.position)
            } else {
                p.position
            }
        })
        .map(|p| p.id);

        let Some(target_id) = target_id else {
            debug!(player_id = %shooter_id, weapon = %shot.weapon, "Shot missed");
            return;
        };

        let roll = CombatSystem::roll_damage(shot.base_damage, &mut self.rng);
        self.deliver_damage(shooter_id, target_id, roll.amount, roll.headshot, now);
    }

    fn handle_legacy_damage(&mut self, attacker_id: Uuid, target_id: Uuid, damage: f32, now: u64) {
        if !self.config.legacy_damage_enabled {
            debug!(player_id = %attacker_id, "Legacy damage disabled, ignoring");
            return;
        }
        let amount = damage.round().max(0.0) as u32;
        self.deliver_damage(attacker_id, target_id, amount, false, now);
    }

    /// Apply damage through the lifecycle and notify everyone involved
    fn deliver_damage(
        &mut self,
        attacker_id: Uuid,
        target_id: Uuid,
        amount: u32,
        headshot: bool,
        now: u64,
    ) {
        let outcome = match lifecycle::apply_damage(&mut self.store, attacker_id, target_id, amount)
        {
            Ok(outcome) => outcome,
            Err(e @ (LifecycleError::Unknown(_) | LifecycleError::NotInGame(_))) => {
                debug!(attacker = %attacker_id, target = %target_id, error = %e, "Damage ignored");
                return;
            }
            Err(e) => {
                warn!(attacker = %attacker_id, target = %target_id, error = %e, "Damage rejected");
                return;
            }
        };

        let hit = HitResult {
            shooter_id: attacker_id,
            target_id,
            damage: amount,
            headshot,
            target_health: outcome.target_health,
            target_killed: outcome.kill.is_some(),
        };

        debug!(
            attacker = %hit.shooter_id,
            target = %hit.target_id,
            damage = hit.damage,
            headshot = hit.headshot,
            health = hit.target_health,
            "Hit registered"
        );

        self.send_to(
            hit.target_id,
            ServerMsg::PlayerHit {
                attacker_id: hit.shooter_id,
                damage: hit.damage,
                health: hit.target_health,
                headshot: hit.headshot,
            },
        );
        self.send_to(
            hit.shooter_id,
            ServerMsg::HitConfirmed {
                target_id: hit.target_id,
                damage: hit.damage,
                headshot: hit.headshot,
                killed: hit.target_killed,
            },
        );
        self.broadcast(ServerMsg::HealthUpdate {
            id: hit.target_id,
            health: hit.target_health,
        });

        if let Some(kill) = outcome.kill {
            self.handle_kill(kill, now);
        }
    }

    fn handle_kill(&mut self, kill: KillEvent, now: u64) {
        info!(
            killer = %kill.killer_id,
            victim = %kill.victim_id,
            killer_kills = kill.killer_kills,
            victim_deaths = kill.victim_deaths,
            "Player killed"
        );

        self.broadcast(ServerMsg::PlayerKilled {
            victim_id: kill.victim_id,
            victim_name: kill.victim_name.clone(),
            killer_id: kill.killer_id,
            killer_name: kill.killer_name.clone(),
            victim_deaths: kill.victim_deaths,
            killer_kills: kill.killer_kills,
        });

        let messages: Vec<ServerMsg> = self
            .listeners
            .iter_mut()
            .flat_map(|l| l.on_kill(&kill, now))
            .collect();
        for msg in messages {
            self.broadcast(msg);
        }
    }

    fn handle_respawn(&mut self, id: Uuid, now: u64) {
        match lifecycle::respawn(&mut self.store, id, &mut self.rng, now) {
            Ok(back) => {
                self.lag.forget(&id);
                self.lag.record(id, now, back.spawn.position, back.rotation);
                info!(player_id = %id, spawn = back.spawn.name, "Player respawned");
                self.broadcast(ServerMsg::PlayerRespawned {
                    id,
                    position: quantize(back.spawn.position, POSITION_PRECISION),
                    rotation: quantize(back.rotation, ROTATION_PRECISION),
                    health: back.health,
                });
            }
            Err(LifecycleError::AlreadyAlive(_)) => {
                info!(player_id = %id, "Respawn requested while alive, ignoring");
            }
            Err(e) => debug!(player_id = %id, error = %e, "Respawn ignored"),
        }
    }

    fn handle_reload(&mut self, id: Uuid, weapon: String) {
        if self.store.get(&id).is_some_and(|p| p.is_active()) {
            self.broadcast_except(id, ServerMsg::PlayerReloaded { id, weapon });
        } else {
            debug!(player_id = %id, "Reload ignored");
        }
    }

    fn handle_chat(&mut self, id: Uuid, message: String, now: u64) {
        let Some(player) = self.store.get(&id) else {
            debug!(player_id = %id, "Chat from unknown player ignored");
            return;
        };
        let name = player.display_name();
        self.broadcast(ServerMsg::Chat {
            id,
            name,
            message: message.trim().to_string(),
            t: now,
        });
    }

    /// Evict players idle past the timeout and announce their departure
    pub fn sweep(&mut self, now: u64) {
        let removed = self
            .store
            .sweep_inactive(self.config.inactivity_timeout_ms, now);
        if removed.is_empty() {
            return;
        }

        for player in &removed {
            self.lag.forget(&player.id);
            info!(
                player_id = %player.id,
                idle_ms = elapsed_ms(player.last_update_at, now),
                "Player timed out"
            );
            self.broadcast(ServerMsg::PlayerLeft {
                id: player.id,
                reason: "timeout".to_string(),
            });
        }
        self.sync_player_count();
    }

    /// Broadcast the scoreboard snapshot and run time-based listener checks
    pub fn broadcast_snapshot(&mut self, now: u64) {
        let snapshot = self.snapshot_builder.build(&self.store);
        self.broadcast(snapshot);

        let stats = self.snapshot_builder.stats();
        debug!(
            players = self.store.len(),
            bytes = stats.last_bytes,
            total = stats.total_snapshots,
            "Snapshot sent"
        );

        let messages: Vec<ServerMsg> = self
            .listeners
            .iter_mut()
            .flat_map(|l| l.tick(now))
            .collect();
        for msg in messages {
            self.broadcast(msg);
        }
    }

    fn sync_player_count(&self) {
        self.player_count.store(self.store.len(), Ordering::Relaxed);
    }

    fn publish(&self, to: Recipient, msg: ServerMsg) {
        // No receivers just means nobody is connected
        let _ = self.outbound_tx.send(Outbound { to, msg });
    }

    fn send_to(&self, id: Uuid, msg: ServerMsg) {
        self.publish(Recipient::Only(id), msg);
    }

    fn broadcast(&self, msg: ServerMsg) {
        self.publish(Recipient::All, msg);
    }

    fn broadcast_except(&self, id: Uuid, msg: ServerMsg) {
        self.publish(Recipient::AllExcept(id), msg);
    }
}
