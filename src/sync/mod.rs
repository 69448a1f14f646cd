//! Client reconciliation primitives
//!
//! These are the client-side halves of the movement protocol: the send gate
//! and quantizer that keep movement traffic small, and the jitter buffer that
//! turns irregular remote updates into smooth motion. The server reuses the
//! quantizer when it re-broadcasts movement and the interpolation helpers for
//! its lag-compensation history.

pub mod compress;
pub mod interpolation;

use std::f32::consts::{PI, TAU};

use glam::Vec3;

pub use compress::{CompressorConfig, MovementCompressor};
pub use interpolation::{InterpolationBuffer, PoseSample};

/// Position and Euler rotation of one entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Vec3,
}

impl Pose {
    pub fn new(position: Vec3, rotation: Vec3) -> Self {
        Self { position, rotation }
    }

    /// Blend towards `to`; positions lerp, angles take the short way round
    pub fn lerp(&self, to: &Pose, t: f32) -> Pose {
        Pose {
            position: self.position.lerp(to.position, t),
            rotation: lerp_euler(self.rotation, to.rotation, t),
        }
    }
}

/// Signed difference `to - from`, wrapped into [-π, π]
pub fn angle_delta(from: f32, to: f32) -> f32 {
    let d = (to - from).rem_euclid(TAU);
    if d > PI {
        d - TAU
    } else {
        d
    }
}

/// Shortest-path angular interpolation
pub fn lerp_angle(from: f32, to: f32, t: f32) -> f32 {
    let a = from + angle_delta(from, to) * t;
    // Keep the result in (-π, π]
    let wrapped = (a + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

fn lerp_euler(from: Vec3, to: Vec3, t: f32) -> Vec3 {
    Vec3::new(
        lerp_angle(from.x, to.x, t),
        lerp_angle(from.y, to.y, t),
        lerp_angle(from.z, to.z, t),
    )
}

/// Round to a fixed number of decimal places
pub fn round_to(value: f32, places: u32) -> f32 {
    let scale = 10f32.powi(places as i32);
    (value * scale).round() / scale
}

/// Quantize a vector for the compact wire form
pub fn quantize(v: Vec3, places: u32) -> [f32; 3] {
    [
        round_to(v.x, places),
        round_to(v.y, places),
        round_to(v.z, places),
    ]
}
