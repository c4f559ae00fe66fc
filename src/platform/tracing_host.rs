//! Dry-run host
//!
//! Logs every gesture and pointer event instead of executing it. With
//! simulated timing each call resolves only after the gesture would have
//! finished on a real device, which keeps repeat cadences realistic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::gesture::backend::{
    BackendError, GestureDescription, PointerEvent, PointerInjector, StrokeDispatcher,
};

#[derive(Debug, Default)]
pub struct TracingHost {
    simulate_timing: bool,
    gestures: AtomicU64,
    pointer_events: AtomicU64,
}

/// Number of calls a [`TracingHost`] served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostSummary {
    pub gestures: u64,
    pub pointer_events: u64,
}

impl TracingHost {
    pub fn new(simulate_timing: bool) -> Self {
        Self {
            simulate_timing,
            ..Self::default()
        }
    }

    pub fn summary(&self) -> HostSummary {
        HostSummary {
            gestures: self.gestures.load(Ordering::Relaxed),
            pointer_events: self.pointer_events.load(Ordering::Relaxed),
        }
    }
}

/// Time from the start of `gesture` until its last stroke ends
pub fn gesture_length(gesture: &GestureDescription) -> Duration {
    gesture
        .strokes
        .iter()
        .map(|stroke| stroke.start_offset + stroke.duration)
        .max()
        .unwrap_or_default()
}

#[async_trait]
impl StrokeDispatcher for TracingHost {
    async fn dispatch(&self, gesture: GestureDescription) -> Result<(), BackendError> {
        let id = self.gestures.fetch_add(1, Ordering::Relaxed) + 1;
        let length = gesture_length(&gesture);
        for (index, stroke) in gesture.strokes.iter().enumerate() {
            info!(
                gesture = id,
                stroke = index,
                path = ?stroke.path,
                offset_ms = stroke.start_offset.as_millis() as u64,
                duration_ms = stroke.duration.as_millis() as u64,
                will_continue = stroke.will_continue,
                continues = stroke.continues_previous,
                "stroke"
            );
        }
        if self.simulate_timing {
            tokio::time::sleep(length).await;
        }
        Ok(())
    }

    async fn cancel(&self) -> Result<(), BackendError> {
        info!("stroke cancelled");
        Ok(())
    }
}

#[async_trait]
impl PointerInjector for TracingHost {
    async fn inject(&self, event: PointerEvent) -> Result<(), BackendError> {
        self.pointer_events.fetch_add(1, Ordering::Relaxed);
        info!(
            action = ?event.action,
            pointers = ?event.pointers,
            time_ms = event.event_time.as_millis() as u64,
            "pointer event"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::core::Point;
    use crate::gesture::backend::{PointerAction, Stroke};

    fn swipe() -> GestureDescription {
        GestureDescription {
            strokes: vec![
                Stroke {
                    path: vec![Point::new(0.0, 0.0), Point::new(0.0, 50.0)],
                    start_offset: Duration::ZERO,
                    duration: Duration::from_millis(200),
                    will_continue: true,
                    continues_previous: false,
                },
                Stroke {
                    path: vec![Point::new(0.0, 50.0), Point::new(0.0, 50.0)],
                    start_offset: Duration::from_millis(200),
                    duration: Duration::from_millis(150),
                    will_continue: false,
                    continues_previous: true,
                },
            ],
        }
    }

    #[test]
    fn length_covers_last_stroke() {
        assert_eq!(gesture_length(&swipe()), Duration::from_millis(350));
        assert_eq!(gesture_length(&GestureDescription::default()), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_dispatch_takes_gesture_time() {
        let host = TracingHost::new(true);
        let started = tokio::time::Instant::now();
        host.dispatch(swipe()).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(350));
        host.inject(PointerEvent {
            action: PointerAction::Down,
            pointers: vec![Point::new(1.0, 1.0)],
            event_time: Duration::ZERO,
        })
        .await
        .unwrap();
        assert_eq!(
            host.summary(),
            HostSummary {
                gestures: 1,
                pointer_events: 1
            }
        );
    }
}
