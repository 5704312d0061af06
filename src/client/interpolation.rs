//! Remote avatar snapshot interpolation
//!
//! Remote avatars are rendered `delay` seconds in the past, between the two buffered
//! snapshots that bracket the render time. Nothing is ever extrapolated: once the render time
//! passes the newest snapshot, the newest snapshot is shown as-is.
//!
//! The server only replicates poses that changed, so an avatar that stood still for a while
//! resumes with a snapshot far newer than the one before it. Such a gap is closed with a hold
//! copy of the resting pose one interval earlier, so motion starts on time instead of being
//! smeared back across the whole idle period.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::movement::{angles::lerp_yaw, Pose, Vec3};

/// Denominators below this collapse the interpolation factor to zero.
const MIN_SPAN: f64 = 1.0e-6;
/// Gaps longer than this many snapshot intervals get a hold copy of the resting pose
const HOLD_GAP_INTERVALS: f64 = 1.5;

/// One authoritative pose with the server time it was produced at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplicatedSnapshot {
    pub position: Vec3,
    pub yaw: f32,
    /// Server simulation clock (seconds)
    pub timestamp: f64,
}

impl ReplicatedSnapshot {
    pub fn new(position: Vec3, yaw: f32, timestamp: f64) -> Self {
        Self {
            position,
            yaw,
            timestamp,
        }
    }

    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.yaw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationSettings {
    /// Maximum buffered snapshots per avatar
    pub capacity: usize,
    /// How far behind the server clock remotes are rendered (seconds)
    pub delay: f64,
    /// Expected gap between replicated snapshots (seconds); 0 disables hold insertion
    pub snapshot_interval: f64,
}

impl Default for InterpolationSettings {
    fn default() -> Self {
        Self {
            capacity: 32,
            delay: 0.1,
            snapshot_interval: 0.05,
        }
    }
}

/// Bounded, time-ordered snapshot history for one remote avatar.
#[derive(Debug, Clone)]
pub struct SnapshotRingBuffer {
    snapshots: VecDeque<ReplicatedSnapshot>,
    capacity: usize,
    /// Expected snapshot spacing; 0 when unknown
    hold_interval: f64,
}

impl SnapshotRingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self::with_hold_interval(capacity, 0.0)
    }

    /// Buffer that closes gaps longer than 1.5 `interval`s with a hold of the resting pose.
    pub fn with_hold_interval(capacity: usize, interval: f64) -> Self {
        let capacity = capacity.max(2);
        Self {
            snapshots: VecDeque::with_capacity(capacity),
            capacity,
            hold_interval: if interval.is_finite() { interval.max(0.0) } else { 0.0 },
        }
    }

    /// Append a snapshot in receive order. Returns false if it is older than the newest
    /// buffered one.
    pub fn push(&mut self, snapshot: ReplicatedSnapshot) -> bool {
        if !snapshot.timestamp.is_finite() {
            return false;
        }
        if let Some(newest) = self.snapshots.back().copied() {
            if snapshot.timestamp < newest.timestamp {
                return false;
            }
            if self.hold_interval > 0.0
                && snapshot.timestamp - newest.timestamp > HOLD_GAP_INTERVALS * self.hold_interval
            {
                self.enqueue(ReplicatedSnapshot {
                    timestamp: snapshot.timestamp - self.hold_interval,
                    ..newest
                });
            }
        }

        self.enqueue(snapshot);
        true
    }

    fn enqueue(&mut self, snapshot: ReplicatedSnapshot) {
        if self.snapshots.len() == self.capacity {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(snapshot);
    }

    /// Drop snapshots the render cursor has moved past, keeping the newest one at or before
    /// `render_time` as the left anchor.
    pub fn trim(&mut self, render_time: f64) {
        while self.snapshots.len() >= 2 && self.snapshots[1].timestamp <= render_time {
            self.snapshots.pop_front();
        }
    }

    /// Interpolated pose at `render_time`, or `None` when empty.
    pub fn sample(&self, render_time: f64) -> Option<Pose> {
        let first = self.snapshots.front()?;
        if self.snapshots.len() == 1 || render_time <= first.timestamp {
            return Some(first.pose());
        }

        let newest = self.snapshots.back()?;
        if render_time >= newest.timestamp {
            return Some(newest.pose());
        }

        // First snapshot strictly after render_time; its predecessor is the left anchor
        let right = self
            .snapshots
            .iter()
            .position(|s| s.timestamp > render_time)?;
        let a = &self.snapshots[right - 1];
        let b = &self.snapshots[right];

        let span = b.timestamp - a.timestamp;
        let t = if span.abs() < MIN_SPAN {
            0.0
        } else {
            ((render_time - a.timestamp) / span).clamp(0.0, 1.0)
        };
        let t = t as f32;

        Some(Pose::new(
            a.position.lerp(&b.position, t),
            lerp_yaw(a.yaw, b.yaw, t),
        ))
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn newest(&self) -> Option<&ReplicatedSnapshot> {
        self.snapshots.back()
    }

    pub fn oldest(&self) -> Option<&ReplicatedSnapshot> {
        self.snapshots.front()
    }
}

/// A non-local avatar rendered from its snapshot history.
#[derive(Debug, Clone)]
pub struct RemoteAvatar {
    buffer: SnapshotRingBuffer,
    delay: f64,
    /// Shown while the buffer is empty
    last_known: Pose,
}

impl RemoteAvatar {
    /// Start tracking an avatar last seen at `pose`.
    pub fn new(pose: Pose, settings: &InterpolationSettings) -> Self {
        Self {
            buffer: SnapshotRingBuffer::with_hold_interval(
                settings.capacity,
                settings.snapshot_interval,
            ),
            delay: settings.delay.max(0.0),
            last_known: pose,
        }
    }

    pub fn push(&mut self, snapshot: ReplicatedSnapshot) -> bool {
        self.buffer.push(snapshot)
    }

    /// Pose to draw when the server clock reads `server_now`.
    pub fn render(&mut self, server_now: f64) -> Pose {
        let render_time = server_now - self.delay;
        self.buffer.trim(render_time);
        if let Some(pose) = self.buffer.sample(render_time) {
            self.last_known = pose;
        }
        self.last_known
    }

    pub fn buffer(&self) -> &SnapshotRingBuffer {
        &self.buffer
    }
}
