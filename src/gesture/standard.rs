//! Standard strategy: OS gesture dispatch
//!
//! Every primitive becomes a [`GestureDescription`]. Tap sessions are chains
//! of continued strokes: the press leaves the contact down, each drag
//! continues it, and the end stroke finally lets go.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::core::{Direction, Point};
use crate::gesture::backend::{
    BackendError, DRAG_STEP_DURATION, FingerPath, GestureBackend, GestureDescription,
    StrokeDispatcher, Stroke, StrokeTiming, TAP_PRESS_DURATION,
};
use crate::lock;

pub struct StandardBackend {
    dispatcher: Arc<dyn StrokeDispatcher>,
    /// Position of the pressed contact while a tap session is open
    pressed_at: Mutex<Option<Point>>,
}

impl StandardBackend {
    pub fn new(dispatcher: Arc<dyn StrokeDispatcher>) -> Self {
        Self {
            dispatcher,
            pressed_at: Mutex::new(None),
        }
    }

    /// Strokes of one finger swipe, plus the resting stroke for `Fixed`
    fn swipe_strokes(path: FingerPath, timing: StrokeTiming) -> Vec<Stroke> {
        let hold = timing.hold_at_end();
        let mut strokes = vec![Stroke {
            path: vec![path.start, path.end],
            start_offset: Duration::ZERO,
            duration: timing.duration,
            will_continue: !hold.is_zero(),
            continues_previous: false,
        }];
        if !hold.is_zero() {
            strokes.push(Stroke {
                path: vec![path.end, path.end],
                start_offset: timing.duration,
                duration: hold,
                will_continue: false,
                continues_previous: true,
            });
        }
        strokes
    }

    fn single(stroke: Stroke) -> GestureDescription {
        GestureDescription {
            strokes: vec![stroke],
        }
    }
}

#[async_trait]
impl GestureBackend for StandardBackend {
    async fn perform_scroll(
        &self,
        direction: Direction,
        start: Point,
        end: Point,
        timing: StrokeTiming,
    ) -> Result<(), BackendError> {
        debug!(?direction, ?start, ?end, "dispatching scroll stroke");
        let strokes = Self::swipe_strokes(FingerPath::new(start, end), timing);
        self.dispatcher
            .dispatch(GestureDescription { strokes })
            .await
    }

    async fn perform_zoom(
        &self,
        is_zoom_in: bool,
        fingers: [FingerPath; 2],
        timing: StrokeTiming,
    ) -> Result<(), BackendError> {
        debug!(is_zoom_in, "dispatching pinch strokes");
        let strokes = fingers
            .iter()
            .flat_map(|finger| Self::swipe_strokes(*finger, timing))
            .collect();
        self.dispatcher
            .dispatch(GestureDescription { strokes })
            .await
    }

    async fn start_tap(&self, point: Point) -> Result<(), BackendError> {
        let press = Stroke {
            path: vec![point],
            start_offset: Duration::ZERO,
            duration: TAP_PRESS_DURATION,
            will_continue: true,
            continues_previous: false,
        };
        self.dispatcher.dispatch(Self::single(press)).await?;
        *lock(&self.pressed_at) = Some(point);
        Ok(())
    }

    async fn drag_tap(&self, from: Point, to: Point) -> Result<(), BackendError> {
        if lock(&self.pressed_at).is_none() {
            return Err(BackendError::NoSession);
        }
        let step = Stroke {
            path: vec![from, to],
            start_offset: Duration::ZERO,
            duration: DRAG_STEP_DURATION,
            will_continue: true,
            continues_previous: true,
        };
        self.dispatcher.dispatch(Self::single(step)).await?;
        *lock(&self.pressed_at) = Some(to);
        Ok(())
    }

    async fn end_tap(&self, point: Point) -> Result<(), BackendError> {
        let Some(last) = *lock(&self.pressed_at) else {
            return Err(BackendError::NoSession);
        };
        let release = Stroke {
            path: vec![last, point],
            start_offset: Duration::ZERO,
            duration: DRAG_STEP_DURATION,
            will_continue: false,
            continues_previous: true,
        };
        let result = self.dispatcher.dispatch(Self::single(release)).await;
        *lock(&self.pressed_at) = None;
        result
    }

    async fn cancel_tap(&self) -> Result<(), BackendError> {
        lock(&self.pressed_at).take();
        self.dispatcher.cancel().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GestureStyle;
    use crate::platform::recording::{HostCall, RecordingHost};

    fn backend() -> (Arc<RecordingHost>, StandardBackend) {
        let host = Arc::new(RecordingHost::new());
        let backend = StandardBackend::new(host.clone());
        (host, backend)
    }

    #[tokio::test]
    async fn fixed_scroll_adds_resting_stroke() {
        let (host, backend) = backend();
        let timing = StrokeTiming::new(Duration::from_millis(300), GestureStyle::Fixed);
        backend
            .perform_scroll(
                Direction::Up,
                Point::new(100.0, 500.0),
                Point::new(100.0, 200.0),
                timing,
            )
            .await
            .unwrap();

        let gestures = host.dispatched();
        assert_eq!(gestures.len(), 1);
        let strokes = &gestures[0].strokes;
        assert_eq!(strokes.len(), 2);
        assert!(strokes[0].will_continue);
        assert_eq!(strokes[1].start_offset, Duration::from_millis(300));
        assert!(strokes[1].continues_previous);
        assert!(!strokes[1].will_continue);
    }

    #[tokio::test]
    async fn inertia_zoom_has_two_concurrent_strokes() {
        let (host, backend) = backend();
        let timing = StrokeTiming::new(Duration::from_millis(200), GestureStyle::Inertia);
        let fingers = [
            FingerPath::new(Point::new(90.0, 100.0), Point::new(50.0, 100.0)),
            FingerPath::new(Point::new(110.0, 100.0), Point::new(150.0, 100.0)),
        ];
        backend.perform_zoom(true, fingers, timing).await.unwrap();

        let strokes = &host.dispatched()[0].strokes;
        assert_eq!(strokes.len(), 2);
        assert!(strokes.iter().all(|s| s.start_offset.is_zero() && !s.will_continue));
    }

    #[tokio::test]
    async fn tap_session_is_a_chain_of_continued_strokes() {
        let (host, backend) = backend();
        let a = Point::new(10.0, 10.0);
        let b = Point::new(20.0, 10.0);
        backend.start_tap(a).await.unwrap();
        backend.drag_tap(a, b).await.unwrap();
        backend.end_tap(b).await.unwrap();

        let gestures = host.dispatched();
        assert_eq!(gestures.len(), 3);
        assert!(gestures[0].strokes[0].will_continue);
        assert!(!gestures[0].strokes[0].continues_previous);
        assert_eq!(gestures[1].strokes[0].path, vec![a, b]);
        assert!(gestures[1].strokes[0].continues_previous);
        assert!(!gestures[2].strokes[0].will_continue);
    }

    #[tokio::test]
    async fn drag_without_session_fails() {
        let (_host, backend) = backend();
        let p = Point::new(1.0, 1.0);
        assert_eq!(backend.drag_tap(p, p).await, Err(BackendError::NoSession));
        assert_eq!(backend.end_tap(p).await, Err(BackendError::NoSession));
    }

    #[tokio::test]
    async fn cancel_clears_session() {
        let (host, backend) = backend();
        let p = Point::new(5.0, 5.0);
        backend.start_tap(p).await.unwrap();
        backend.cancel_tap().await.unwrap();
        assert_eq!(host.calls().last(), Some(&HostCall::CancelStroke));
        assert_eq!(backend.end_tap(p).await, Err(BackendError::NoSession));
    }
}
