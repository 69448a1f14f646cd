//! Combat system - ray hit detection and damage rolls

use glam::Vec3;
use rand::Rng;
use uuid::Uuid;

use super::player::{PlayerState, PlayerStore};

/// Targets further than this from the muzzle are never hit
pub const MAX_RANGE: f32 = 5000.0;
/// Perpendicular distance from the ray that still counts as a hit
pub const HIT_RADIUS: f32 = 40.0;
/// Base damage is scaled by a uniform draw from this range
pub const DAMAGE_SPREAD: (f32, f32) = (0.8, 1.2);
/// Probability of a headshot roll
pub const HEADSHOT_CHANCE: f64 = 0.15;
/// Damage multiplier for a headshot roll
pub const HEADSHOT_MULTIPLIER: f32 = 1.5;

/// A shot as received from the client, already validated
#[derive(Debug, Clone)]
pub struct ShotEvent {
    pub shooter_id: Uuid,
    pub origin: Vec3,
    /// Unit length
    pub direction: Vec3,
    pub weapon: String,
    pub base_damage: f32,
    pub client_time: u64,
}

impl ShotEvent {
    /// Build from wire values, normalizing the direction
    pub fn new(
        shooter_id: Uuid,
        origin: Vec3,
        direction: Vec3,
        weapon: String,
        base_damage: f32,
        client_time: u64,
    ) -> Self {
        Self {
            shooter_id,
            origin,
            direction: direction.normalize_or_zero(),
            weapon,
            base_damage,
            client_time,
        }
    }
}

/// Final damage after spread and headshot roll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageRoll {
    pub amount: u32,
    pub headshot: bool,
}

/// Combat system for hit tests and damage
pub struct CombatSystem;

impl CombatSystem {
    /// Closest-point-to-ray test.
    ///
    /// Returns the perpendicular miss distance when `target` is in front of
    /// the origin and within range, `None` otherwise.
    pub fn ray_miss_distance(origin: Vec3, direction: Vec3, target: Vec3) -> Option<f32> {
        let to_target = target - origin;
        if to_target.length() > MAX_RANGE {
            return None;
        }

        let projection = to_target.dot(direction);
        if projection < 0.0 {
            return None;
        }

        let closest = origin + direction * projection;
        Some(target.distance(closest))
    }

    /// Whether `target` is struck by the ray
    pub fn ray_hits(origin: Vec3, direction: Vec3, target: Vec3) -> bool {
        Self::ray_miss_distance(origin, direction, target).is_some_and(|d| d <= HIT_RADIUS)
    }

    /// First eligible player struck by the shot, in store order.
    ///
    /// `position_of` supplies the pose to test against, which lets the caller
    /// substitute rewound positions.
    pub fn find_target<'a, F>(
        store: &'a PlayerStore,
        shot: &ShotEvent,
        position_of: F,
    ) -> Option<&'a PlayerState>
    where
        F: Fn(&PlayerState) -> Vec3,
    {
        store
            .iter()
            .filter(|p| p.id != shot.shooter_id && p.is_active())
            .find(|p| Self::ray_hits(shot.origin, shot.direction, position_of(*p)))
    }

    /// Roll final damage: spread first, then an independent headshot chance
    pub fn roll_damage<R: Rng + ?Sized>(base_damage: f32, rng: &mut R) -> DamageRoll {
        // Also catches NaN
        if !(base_damage > 0.0) || !base_damage.is_finite() {
            return DamageRoll {
                amount: 0,
                headshot: false,
            };
        }

        let (low, high) = DAMAGE_SPREAD;
        let mut amount = base_damage * rng.gen_range(low..=high);

        let headshot = rng.gen_bool(HEADSHOT_CHANCE);
        if headshot {
            amount *= HEADSHOT_MULTIPLIER;
        }

        let floor = base_damage * low;
        let ceiling = base_damage * high * HEADSHOT_MULTIPLIER;
        DamageRoll {
            amount: amount.clamp(floor, ceiling).round().max(0.0) as u32,
            headshot,
        }
    }

    /// Apply damage to health, returns (new_health, is_dead)
    pub fn apply_damage(current_health: u32, damage: u32) -> (u32, bool) {
        let new_health = current_health.saturating_sub(damage);
        (new_health, new_health == 0)
    }
}

/// Hit result from combat resolution
#[derive(Debug, Clone)]
pub struct HitResult {
    pub shooter_id: Uuid,
    pub target_id: Uuid,
    pub damage: u32,
    pub headshot: bool,
    pub target_health: u32,
    pub target_killed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn active_player(store: &mut PlayerStore, position: Vec3) -> Uuid {
        let id = Uuid::new_v4();
        store.register(id, 0).unwrap();
        let p = store.get_mut(&id).unwrap();
        p.joined = true;
        p.position = position;
        id
    }

    fn shot_from(shooter: Uuid, origin: Vec3, toward: Vec3) -> ShotEvent {
        ShotEvent::new(shooter, origin, toward - origin, "rifle".into(), 35.0, 0)
    }

    #[test]
    fn ray_through_target_hits() {
        let origin = Vec3::new(0.0, 40.0, -100.0);
        let dir = Vec3::Z;
        assert!(CombatSystem::ray_hits(origin, dir, Vec3::new(0.0, 40.0, 0.0)));
        // 39.9 units off the line, still inside the hitbox
        assert!(CombatSystem::ray_hits(origin, dir, Vec3::new(39.9, 40.0, 0.0)));
    }

    #[test]
    fn closest_approach_beyond_radius_misses() {
        let origin = Vec3::new(0.0, 40.0, -100.0);
        assert!(!CombatSystem::ray_hits(origin, Vec3::Z, Vec3::new(40.5, 40.0, 0.0)));
        assert!(!CombatSystem::ray_hits(origin, Vec3::Z, Vec3::new(0.0, 120.0, 300.0)));
    }

    #[test]
    fn targets_behind_or_out_of_range_are_ignored() {
        let origin = Vec3::ZERO;
        assert!(!CombatSystem::ray_hits(origin, Vec3::Z, Vec3::new(0.0, 0.0, -10.0)));
        assert!(!CombatSystem::ray_hits(origin, Vec3::Z, Vec3::new(0.0, 0.0, 5_001.0)));
        assert!(CombatSystem::ray_hits(origin, Vec3::Z, Vec3::new(0.0, 0.0, 4_999.0)));
    }

    #[test]
    fn shooter_and_dead_players_are_not_targets() {
        let mut store = PlayerStore::new(0.0);
        let shooter = active_player(&mut store, Vec3::new(0.0, 40.0, -100.0));
        let dead = active_player(&mut store, Vec3::new(0.0, 40.0, -50.0));
        store.get_mut(&dead).unwrap().alive = false;
        let alive = active_player(&mut store, Vec3::new(0.0, 40.0, 0.0));

        let shot = shot_from(shooter, Vec3::new(0.0, 40.0, -100.0), Vec3::new(0.0, 40.0, 0.0));
        let target = CombatSystem::find_target(&store, &shot, |p| p.position).unwrap();
        assert_eq!(target.id, alive);
    }

    #[test]
    fn placeholders_are_not_targets() {
        let mut store = PlayerStore::new(0.0);
        let shooter = active_player(&mut store, Vec3::ZERO);
        store.register(Uuid::new_v4(), 0).unwrap();
        let shot = ShotEvent::new(shooter, Vec3::new(0.0, 0.0, -50.0), Vec3::Z, "rifle".into(), 10.0, 0);
        assert!(CombatSystem::find_target(&store, &shot, |p| p.position).is_none());
    }

    #[test]
    fn first_in_enumeration_order_wins() {
        let mut store = PlayerStore::new(0.0);
        let shooter = active_player(&mut store, Vec3::ZERO);
        let far = active_player(&mut store, Vec3::new(0.0, 0.0, 500.0));
        let _near = active_player(&mut store, Vec3::new(0.0, 0.0, 100.0));

        let shot = ShotEvent::new(shooter, Vec3::ZERO, Vec3::Z, "rifle".into(), 10.0, 0);
        let target = CombatSystem::find_target(&store, &shot, |p| p.position).unwrap();
        assert_eq!(target.id, far);
    }

    #[test]
    fn position_override_is_used_for_testing() {
        let mut store = PlayerStore::new(0.0);
        let shooter = active_player(&mut store, Vec3::ZERO);
        active_player(&mut store, Vec3::new(0.0, 0.0, 100.0));
        let shot = ShotEvent::new(shooter, Vec3::ZERO, Vec3::Z, "rifle".into(), 10.0, 0);
        let moved_away = |_: &PlayerState| Vec3::new(500.0, 0.0, 100.0);
        assert!(CombatSystem::find_target(&store, &shot, moved_away).is_none());
    }

    #[test]
    fn damage_rolls_stay_in_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut saw_headshot = false;
        let mut saw_body = false;
        for _ in 0..2_000 {
            let roll = CombatSystem::roll_damage(35.0, &mut rng);
            assert!((28..=63).contains(&roll.amount), "amount = {}", roll.amount);
            saw_headshot |= roll.headshot;
            saw_body |= !roll.headshot;
        }
        assert!(saw_headshot && saw_body);
    }

    #[test]
    fn unusable_base_damage_rolls_zero() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for base in [-10.0, 0.0, f32::NAN, f32::INFINITY] {
            let roll = CombatSystem::roll_damage(base, &mut rng);
            assert_eq!(roll.amount, 0, "base = {base}");
            assert!(!roll.headshot);
        }
    }

    #[test]
    fn health_is_floored_at_zero() {
        assert_eq!(CombatSystem::apply_damage(30, 63), (0, true));
        assert_eq!(CombatSystem::apply_damage(100, 35), (65, false));
    }
}
