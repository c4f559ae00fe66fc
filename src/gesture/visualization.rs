//! Gesture visualisation feed
//!
//! Each executed primitive is mirrored as a [`GesturePath`] for an external
//! renderer. The feed is best effort: nobody listening, or a lagging
//! listener, never affects the gesture itself.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::domain::core::Point;
use crate::lock;

const FEED_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    Scroll,
    Zoom,
    TapDown,
    Drag,
    TapUp,
}

/// One animated or instantaneous gesture trace
#[derive(Debug, Clone, PartialEq)]
pub struct GesturePath {
    pub id: u64,
    pub kind: GestureKind,
    pub points: Vec<Point>,
    pub started_at: Instant,
    pub duration: Duration,
}

impl GesturePath {
    pub fn is_finished(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started_at) >= self.duration
    }

    /// Interpolated position along the polyline at `now`
    pub fn position_at(&self, now: Instant) -> Option<Point> {
        let first = *self.points.first()?;
        if self.points.len() == 1 || self.duration.is_zero() {
            return self.points.last().copied();
        }

        let elapsed = now.saturating_duration_since(self.started_at);
        let progress = (elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0);
        let segments = (self.points.len() - 1) as f32;
        let scaled = progress * segments;
        let index = (scaled.floor() as usize).min(self.points.len() - 2);
        let from = self.points.get(index).copied().unwrap_or(first);
        let to = self.points.get(index + 1).copied().unwrap_or(from);
        Some(from.lerp(to, scaled - index as f32))
    }
}

pub struct GestureVisualizer {
    feed: broadcast::Sender<GesturePath>,
    active: Mutex<Vec<GesturePath>>,
    next_id: AtomicU64,
}

impl Default for GestureVisualizer {
    fn default() -> Self {
        Self::new()
    }
}

impl GestureVisualizer {
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            feed,
            active: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GesturePath> {
        self.feed.subscribe()
    }

    /// Records and publishes a path
    pub fn emit(&self, kind: GestureKind, points: Vec<Point>, duration: Duration) {
        let path = GesturePath {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            kind,
            points,
            started_at: Instant::now(),
            duration,
        };

        let now = path.started_at;
        let mut active = lock(&self.active);
        active.retain(|p| !p.is_finished(now));
        active.push(path.clone());
        drop(active);

        // No receivers is the normal case when no renderer is attached
        let _ = self.feed.send(path);
    }

    /// Paths still animating at `now`; finished ones are dropped
    pub fn active_paths(&self, now: Instant) -> Vec<GesturePath> {
        let mut active = lock(&self.active);
        active.retain(|p| !p.is_finished(now));
        active.clone()
    }
}
