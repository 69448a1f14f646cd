//! Per-player alive/dead lifecycle and kill bookkeeping
//!
//! `Alive -> Dead` only happens here, when damage takes health to zero.
//! `Dead -> Alive` only happens on the dead player's own respawn request.
//! Kill and death counters are not touched anywhere else.

use glam::Vec3;
use rand::Rng;
use uuid::Uuid;

use super::combat::CombatSystem;
use super::player::{PlayerStore, MAX_HEALTH};
use super::spawn::{self, SpawnPoint};

/// Outcome of one damage application
#[derive(Debug, Clone)]
pub struct DamageOutcome {
    pub target_health: u32,
    pub kill: Option<KillEvent>,
}

/// Everything listeners need to know about a kill
#[derive(Debug, Clone, PartialEq)]
pub struct KillEvent {
    pub killer_id: Uuid,
    pub killer_name: String,
    pub killer_team: String,
    pub killer_kills: u32,
    pub victim_id: Uuid,
    pub victim_name: String,
    pub victim_team: String,
    pub victim_deaths: u32,
    pub game_mode: String,
}

/// Result of a successful respawn
#[derive(Debug, Clone)]
pub struct Respawned {
    pub spawn: SpawnPoint,
    pub rotation: Vec3,
    pub health: u32,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LifecycleError {
    #[error("unknown player {0}")]
    Unknown(Uuid),

    #[error("player {0} has not joined")]
    NotInGame(Uuid),

    #[error("player cannot damage themselves")]
    SelfDamage,

    #[error("attacker {0} is dead")]
    AttackerDead(Uuid),

    #[error("target {0} is already dead")]
    TargetDead(Uuid),

    #[error("player {0} is already alive")]
    AlreadyAlive(Uuid),
}

/// Apply `amount` damage from `attacker` to `target`.
///
/// Both must be joined and alive. Reaching zero health kills the target and
/// credits the attacker, exactly once.
pub fn apply_damage(
    store: &mut PlayerStore,
    attacker_id: Uuid,
    target_id: Uuid,
    amount: u32,
) -> Result<DamageOutcome, LifecycleError> {
    if attacker_id == target_id {
        return Err(LifecycleError::SelfDamage);
    }

    let attacker = store
        .get(&attacker_id)
        .ok_or(LifecycleError::Unknown(attacker_id))?;
    if !attacker.joined {
        return Err(LifecycleError::NotInGame(attacker_id));
    }
    if !attacker.alive {
        return Err(LifecycleError::AttackerDead(attacker_id));
    }

    let target = store
        .get_mut(&target_id)
        .ok_or(LifecycleError::Unknown(target_id))?;
    if !target.joined {
        return Err(LifecycleError::NotInGame(target_id));
    }
    if !target.alive {
        return Err(LifecycleError::TargetDead(target_id));
    }

    let (health, killed) = CombatSystem::apply_damage(target.health, amount);
    target.health = health;

    if !killed {
        return Ok(DamageOutcome {
            target_health: health,
            kill: None,
        });
    }

    target.alive = false;
    target.deaths += 1;
    let victim_name = target.display_name();
    let victim_team = target.team.clone();
    let victim_deaths = target.deaths;

    let attacker = store
        .get_mut(&attacker_id)
        .ok_or(LifecycleError::Unknown(attacker_id))?;
    attacker.kills += 1;

    Ok(DamageOutcome {
        target_health: 0,
        kill: Some(KillEvent {
            killer_id: attacker_id,
            killer_name: attacker.display_name(),
            killer_team: attacker.team.clone(),
            killer_kills: attacker.kills,
            victim_id: target_id,
            victim_name,
            victim_team,
            victim_deaths,
            game_mode: attacker.game_mode.clone(),
        }),
    })
}

/// Bring a dead player back at a fresh spawn for their mode and team
pub fn respawn<R: Rng + ?Sized>(
    store: &mut PlayerStore,
    id: Uuid,
    rng: &mut R,
    now: u64,
) -> Result<Respawned, LifecycleError> {
    let player = store.get_mut(&id).ok_or(LifecycleError::Unknown(id))?;
    if !player.joined {
        return Err(LifecycleError::NotInGame(id));
    }
    if player.alive {
        return Err(LifecycleError::AlreadyAlive(id));
    }

    let spawn = spawn::resolve(&player.game_mode, &player.team, rng);
    player.health = MAX_HEALTH;
    player.alive = true;
    player.position = spawn.position;
    player.last_update_at = now;

    Ok(Respawned {
        spawn,
        rotation: player.rotation,
        health: player.health,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::player::JoinRequest;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn setup() -> (PlayerStore, Uuid, Uuid, ChaCha8Rng) {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut store = PlayerStore::new(0.0);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        for (id, name, team) in [(a, "Alpha", "red"), (b, "Bravo", "blue")] {
            store.register(id, 0).unwrap();
            store
                .join(
                    id,
                    JoinRequest {
                        character: name.into(),
                        combat_class: "assault".into(),
                        team: team.into(),
                        game_mode: "tdm".into(),
                        rotation: Vec3::ZERO,
                    },
                    &mut rng,
                    0,
                )
                .unwrap();
        }
        (store, a, b, rng)
    }

    #[test]
    fn non_lethal_damage_only_lowers_health() {
        let (mut store, a, b, _) = setup();
        let out = apply_damage(&mut store, b, a, 35).unwrap();
        assert_eq!(out.target_health, 65);
        assert!(out.kill.is_none());
        assert_eq!(store.get(&a).unwrap().deaths, 0);
        assert_eq!(store.get(&b).unwrap().kills, 0);
    }

    #[test]
    fn lethal_damage_kills_exactly_once() {
        let (mut store, a, b, _) = setup();
        apply_damage(&mut store, b, a, 60).unwrap();
        let out = apply_damage(&mut store, b, a, 60).unwrap();

        let kill = out.kill.unwrap();
        assert_eq!(kill.victim_name, "Alpha");
        assert_eq!(kill.killer_name, "Bravo");
        assert_eq!(kill.victim_deaths, 1);
        assert_eq!(kill.killer_kills, 1);

        let victim = store.get(&a).unwrap();
        assert_eq!(victim.health, 0);
        assert!(!victim.alive);

        // Further damage to a corpse is refused and credits nothing
        assert_eq!(
            apply_damage(&mut store, b, a, 10).unwrap_err(),
            LifecycleError::TargetDead(a)
        );
        assert_eq!(store.get(&a).unwrap().deaths, 1);
        assert_eq!(store.get(&b).unwrap().kills, 1);
    }

    #[test]
    fn dead_attacker_and_self_damage_are_refused() {
        let (mut store, a, b, _) = setup();
        assert_eq!(
            apply_damage(&mut store, a, a, 10).unwrap_err(),
            LifecycleError::SelfDamage
        );
        apply_damage(&mut store, b, a, 100).unwrap();
        assert_eq!(
            apply_damage(&mut store, a, b, 10).unwrap_err(),
            LifecycleError::AttackerDead(a)
        );
        assert_eq!(store.get(&b).unwrap().health, 100);
    }

    #[test]
    fn respawn_resets_dead_player() {
        let (mut store, a, b, mut rng) = setup();
        apply_damage(&mut store, b, a, 100).unwrap();
        store.get_mut(&a).unwrap().position = Vec3::new(9.0, 9.0, 9.0);

        let back = respawn(&mut store, a, &mut rng, 77).unwrap();
        let p = store.get(&a).unwrap();
        assert!(p.alive);
        assert_eq!(p.health, MAX_HEALTH);
        assert_eq!(p.position, Vec3::new(-450.0, 40.0, 0.0));
        assert_eq!(back.spawn.position, p.position);
        assert_eq!(p.last_update_at, 77);
        assert_eq!(p.deaths, 1);
    }

    #[test]
    fn respawn_while_alive_changes_nothing() {
        let (mut store, a, b, mut rng) = setup();
        apply_damage(&mut store, b, a, 20).unwrap();
        let before = store.get(&a).unwrap().clone();

        assert_eq!(
            respawn(&mut store, a, &mut rng, 5).unwrap_err(),
            LifecycleError::AlreadyAlive(a)
        );
        let after = store.get(&a).unwrap();
        assert_eq!(after.health, before.health);
        assert_eq!(after.position, before.position);
        assert_eq!(after.last_update_at, before.last_update_at);
    }
}
