//! Per-player pose history for rewind-based hit validation
//!
//! Poses are stamped with server receive time. The session only consults the
//! history when lag compensation is switched on; otherwise it is recorded but
//! hit tests use current positions.

use std::collections::HashMap;

use glam::Vec3;
use uuid::Uuid;

use crate::sync::{InterpolationBuffer, Pose};

/// How much history is kept per player
pub const LAG_HISTORY_MS: u64 = 1_000;
/// Upper bound on samples per player regardless of update rate
pub const MAX_SAMPLES: usize = 64;
/// Silence longer than this between updates means the player stood still,
/// since a moving client sends every ~100 ms
pub const STILL_GAP_MS: u64 = 250;
/// How long before a post-silence update the previous pose is held (about one client frame)
pub const HOLD_LEAD_MS: u64 = 20;

#[derive(Debug, Default)]
pub struct LagCompensator {
    history: HashMap<Uuid, InterpolationBuffer>,
}

impl LagCompensator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an authoritative pose at server time `now`.
    ///
    /// After a silent gap the previous pose is held until just before `now`,
    /// so rewinds into the gap land where the player was standing.
    pub fn record(&mut self, id: Uuid, now: u64, position: Vec3, rotation: Vec3) {
        let buffer = self
            .history
            .entry(id)
            .or_insert_with(|| InterpolationBuffer::new(MAX_SAMPLES, 0));
        if let Some(last) = buffer.latest().copied() {
            if now.saturating_sub(last.t) > STILL_GAP_MS {
                buffer.push(now - HOLD_LEAD_MS, last.pose);
            }
        }
        buffer.push(now, Pose::new(position, rotation));
        buffer.prune_before(now.saturating_sub(LAG_HISTORY_MS));
    }

    /// Where `id` was at server time `at`, if any history exists
    pub fn pose_at(&self, id: &Uuid, at: u64) -> Option<Pose> {
        self.history.get(id)?.sample_at(at)
    }

    pub fn position_at(&self, id: &Uuid, at: u64) -> Option<Vec3> {
        self.pose_at(id, at).map(|p| p.position)
    }

    /// Forget a player's history (disconnect or teleport)
    pub fn forget(&mut self, id: &Uuid) {
        self.history.remove(id);
    }

    pub fn tracked(&self) -> usize {
        self.history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewinds_between_recorded_poses() {
        let id = Uuid::new_v4();
        let mut lag = LagCompensator::new();
        lag.record(id, 1_000, Vec3::ZERO, Vec3::ZERO);
        lag.record(id, 1_100, Vec3::new(10.0, 0.0, 0.0), Vec3::ZERO);

        let pos = lag.position_at(&id, 1_050).unwrap();
        assert!((pos.x - 5.0).abs() < 1e-4);
    }

    #[test]
    fn unknown_player_has_no_history() {
        let lag = LagCompensator::new();
        assert!(lag.position_at(&Uuid::new_v4(), 0).is_none());
    }

    #[test]
    fn history_is_bounded_in_time() {
        let id = Uuid::new_v4();
        let mut lag = LagCompensator::new();
        for t in (0..=5_000).step_by(100) {
            lag.record(id, t, Vec3::new(t as f32, 0.0, 0.0), Vec3::ZERO);
        }
        // Nothing brackets t=0 any more, so the newest pose is used
        let pos = lag.position_at(&id, 0).unwrap();
        assert_eq!(pos.x, 5_000.0);
        // Inside the window still interpolates
        let pos = lag.position_at(&id, 4_550).unwrap();
        assert!((pos.x - 4_550.0).abs() < 1e-2);
    }

    #[test]
    fn standing_still_then_moving_rewinds_to_standing_spot() {
        let id = Uuid::new_v4();
        let mut lag = LagCompensator::new();
        lag.record(id, 2_000, Vec3::ZERO, Vec3::ZERO);
        lag.record(id, 4_950, Vec3::new(200.0, 0.0, 0.0), Vec3::ZERO);

        let pos = lag.position_at(&id, 4_900).unwrap();
        assert_eq!(pos.x, 0.0);
        assert_eq!(lag.position_at(&id, 4_950).unwrap().x, 200.0);
    }

    #[test]
    fn old_pose_survives_pruning_while_still_valid() {
        let id = Uuid::new_v4();
        let mut lag = LagCompensator::new();
        lag.record(id, 1_000, Vec3::ZERO, Vec3::ZERO);
        lag.record(id, 3_000, Vec3::new(50.0, 0.0, 0.0), Vec3::ZERO);
        lag.record(id, 3_100, Vec3::new(60.0, 0.0, 0.0), Vec3::ZERO);

        // Cutoff is 2100; the pose from 1000 still holds there and is kept
        let pos = lag.position_at(&id, 2_500).unwrap();
        assert_eq!(pos.x, 0.0);
    }

    #[test]
    fn forget_drops_history() {
        let id = Uuid::new_v4();
        let mut lag = LagCompensator::new();
        lag.record(id, 0, Vec3::ZERO, Vec3::ZERO);
        lag.forget(&id);
        assert_eq!(lag.tracked(), 0);
    }
}
