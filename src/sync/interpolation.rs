//! Jitter buffer for remote entities
//!
//! Remote movement arrives irregularly and possibly out of order. The buffer
//! keeps the most recent timestamped samples sorted by time and renders a
//! fixed delay behind "now", so there is usually a sample on both sides of
//! the render time to blend between.

use std::collections::VecDeque;

use super::Pose;

/// Samples kept per remote entity
pub const DEFAULT_CAPACITY: usize = 10;
/// How far behind the newest data the renderer runs
pub const DEFAULT_RENDER_DELAY_MS: u64 = 100;

/// A pose stamped with the time it was valid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSample {
    pub t: u64,
    pub pose: Pose,
}

#[derive(Debug, Clone)]
pub struct InterpolationBuffer {
    samples: VecDeque<PoseSample>,
    capacity: usize,
    render_delay_ms: u64,
}

impl InterpolationBuffer {
    pub fn new(capacity: usize, render_delay_ms: u64) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            render_delay_ms,
        }
    }

    /// Insert a sample in timestamp order.
    ///
    /// A sample with a timestamp already present replaces it. When full, the
    /// oldest sample is evicted; a sample older than everything in a full
    /// buffer is dropped instead.
    pub fn push(&mut self, t: u64, pose: Pose) {
        let idx = self.samples.partition_point(|s| s.t < t);

        if let Some(existing) = self.samples.get_mut(idx) {
            if existing.t == t {
                existing.pose = pose;
                return;
            }
        }

        if self.samples.len() >= self.capacity {
            if idx == 0 {
                return;
            }
            self.samples.pop_front();
            self.samples.insert(idx - 1, PoseSample { t, pose });
        } else {
            self.samples.insert(idx, PoseSample { t, pose });
        }
    }

    /// Pose to render at wall-clock `now_ms`
    pub fn sample(&self, now_ms: u64) -> Option<Pose> {
        self.sample_at(now_ms.saturating_sub(self.render_delay_ms))
    }

    /// Pose at an exact time, blending between the two bracketing samples.
    /// Falls back to the newest sample when no bracketing pair exists.
    pub fn sample_at(&self, target_t: u64) -> Option<Pose> {
        let latest = self.samples.back()?;

        let idx = self.samples.partition_point(|s| s.t <= target_t);
        if idx == 0 || idx >= self.samples.len() {
            return Some(latest.pose);
        }

        let from = &self.samples[idx - 1];
        let to = &self.samples[idx];
        let span = (to.t - from.t) as f32;
        let alpha = (target_t - from.t) as f32 / span;
        Some(from.pose.lerp(&to.pose, alpha))
    }

    /// Drop samples that can no longer affect a query at or after `cutoff_t`.
    ///
    /// The newest sample at or before the cutoff is kept, since it still
    /// brackets queries just after it.
    pub fn prune_before(&mut self, cutoff_t: u64) {
        while self.samples.len() > 1 && self.samples[1].t <= cutoff_t {
            self.samples.pop_front();
        }
    }

    pub fn latest(&self) -> Option<&PoseSample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl Default for InterpolationBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_RENDER_DELAY_MS)
    }
}
