//! Movement send gate and quantization
//!
//! A client offers its local pose every frame; only offers that moved far
//! enough, and that respect the minimum send interval, become wire messages.

use glam::Vec3;

use super::{angle_delta, quantize, Pose};
use crate::ws::protocol::ClientMsg;

/// Decimal places kept for positions on the wire
pub const POSITION_PRECISION: u32 = 2;
/// Decimal places kept for rotations on the wire
pub const ROTATION_PRECISION: u32 = 3;

/// Thresholds for the movement gate
#[derive(Debug, Clone)]
pub struct CompressorConfig {
    /// Minimum positional change (world units) worth sending
    pub position_threshold: f32,
    /// Minimum change on any rotation axis (radians) worth sending
    pub rotation_threshold: f32,
    /// Minimum time between two sends
    pub min_interval_ms: u64,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            position_threshold: 0.1,
            rotation_threshold: 0.05,
            min_interval_ms: 100,
        }
    }
}

/// Decides which local poses are sent and encodes them compactly
#[derive(Debug)]
pub struct MovementCompressor {
    config: CompressorConfig,
    last_sent: Option<Pose>,
    last_sent_at: Option<u64>,
}

impl MovementCompressor {
    pub fn new(config: CompressorConfig) -> Self {
        Self {
            config,
            last_sent: None,
            last_sent_at: None,
        }
    }

    /// Offer the current local pose; returns the message to send, if any
    pub fn offer(&mut self, now_ms: u64, position: Vec3, rotation: Vec3) -> Option<ClientMsg> {
        let pose = Pose::new(position, rotation);

        if let (Some(last), Some(at)) = (self.last_sent, self.last_sent_at) {
            if now_ms.saturating_sub(at) < self.config.min_interval_ms {
                return None;
            }
            if !self.changed_enough(&last, &pose) {
                return None;
            }
        }

        self.last_sent = Some(pose);
        self.last_sent_at = Some(now_ms);
        Some(encode_compact(&pose, now_ms))
    }

    fn changed_enough(&self, last: &Pose, pose: &Pose) -> bool {
        let moved = last.position.distance(pose.position);
        let turned = [
            angle_delta(last.rotation.x, pose.rotation.x),
            angle_delta(last.rotation.y, pose.rotation.y),
            angle_delta(last.rotation.z, pose.rotation.z),
        ]
        .into_iter()
        .fold(0.0f32, |acc, d| acc.max(d.abs()));

        moved > self.config.position_threshold || turned > self.config.rotation_threshold
    }

    /// Forget the last sent pose, so the next offer always goes out (after respawn)
    pub fn reset(&mut self) {
        self.last_sent = None;
        self.last_sent_at = None;
    }
}

impl Default for MovementCompressor {
    fn default() -> Self {
        Self::new(CompressorConfig::default())
    }
}

/// Encode a pose as the compact `move` message
pub fn encode_compact(pose: &Pose, t: u64) -> ClientMsg {
    ClientMsg::Move {
        p: quantize(pose.position, POSITION_PRECISION),
        r: quantize(pose.rotation, ROTATION_PRECISION),
        t,
    }
}
