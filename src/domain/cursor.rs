//! Free cursor state and movement physics
//!
//! Everything here is pure: the state manager in `app::cursor_state` owns
//! the current [`CursorState`] and feeds these functions with a settings
//! snapshot and the current screen dimensions.

use crate::domain::core::{Direction, Point, ScreenDimensions};

/// Pixels per second at speed 1, before squaring and density scaling
pub const DEFAULT_SPEED_MULTIPLIER: f32 = 60.0;
/// Target frame interval of the movement loop (about 60 frames per second)
pub const FRAME_INTERVAL_MS: u64 = 16;
/// Time over which acceleration ramps from 1x to its ceiling
pub const ACCELERATION_RAMP_MS: f32 = 1000.0;
/// Acceleration ceiling at level 1
pub const MIN_ACCELERATION: f32 = 1.5;
/// Acceleration ceiling at level 5
pub const MAX_ACCELERATION: f32 = 4.0;

/// The free cursor; `Option<CursorState>` absent means hidden
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorState {
    pub position: Point,
    /// Directional keys scroll instead of move (toggle schemes only)
    pub in_scroll_mode: bool,
    /// Sticky "button down"; a released action key keeps the touch pressed
    pub is_hold_active: bool,
}

impl CursorState {
    /// A fresh cursor centered on the screen
    pub fn centered(screen: ScreenDimensions) -> Self {
        Self {
            position: screen.center(),
            in_scroll_mode: false,
            is_hold_active: false,
        }
    }
}

/// Edges a movement step pushed against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdgeContact {
    pub horizontal: Option<Direction>,
    pub vertical: Option<Direction>,
}

impl EdgeContact {
    pub fn is_empty(&self) -> bool {
        self.horizontal.is_none() && self.vertical.is_none()
    }

    /// Edges as directions, horizontal first
    pub fn directions(&self) -> Vec<Direction> {
        self.horizontal.into_iter().chain(self.vertical).collect()
    }
}

/// Speed curve parameters taken from one settings snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorPhysics {
    /// Configured speed, 1-5
    pub speed: u8,
    /// Configured acceleration level, 1-5
    pub acceleration: u8,
    /// Hold time before acceleration starts
    pub acceleration_threshold_ms: u64,
    pub screen: ScreenDimensions,
}

impl CursorPhysics {
    /// Distance in pixels covered in one frame after holding for `time_held_ms`
    pub fn calculate_frame_speed(&self, time_held_ms: u64) -> f32 {
        let speed = self.speed.clamp(1, 5) as f32;
        let base = DEFAULT_SPEED_MULTIPLIER * speed * speed;

        let multiplier = if time_held_ms > self.acceleration_threshold_ms {
            let level = self.acceleration.clamp(1, 5) as f32;
            let ceiling =
                MIN_ACCELERATION + (MAX_ACCELERATION - MIN_ACCELERATION) * (level - 1.0) / 4.0;
            let progress = ((time_held_ms - self.acceleration_threshold_ms) as f32
                / ACCELERATION_RAMP_MS)
                .min(1.0);
            1.0 + (ceiling - 1.0) * progress
        } else {
            1.0
        };

        let per_frame = base * multiplier * FRAME_INTERVAL_MS as f32 / 1000.0;
        per_frame * self.screen.scale_factor()
    }

    /// Signed per-frame delta for a single direction
    pub fn calculate_movement(&self, direction: Direction, time_held_ms: u64) -> (f32, f32) {
        let (ux, uy) = direction.unit_vector();
        let speed = self.calculate_frame_speed(time_held_ms);
        (ux * speed, uy * speed)
    }

    /// Per-frame delta for several held directions
    ///
    /// The unit vectors are summed and normalised, so two perpendicular keys
    /// move exactly as fast as one. Opposite keys cancel out.
    pub fn combined_movement(&self, directions: &[Direction], time_held_ms: u64) -> (f32, f32) {
        let (sx, sy) = directions.iter().fold((0.0f32, 0.0f32), |(ax, ay), dir| {
            let (ux, uy) = dir.unit_vector();
            (ax + ux, ay + uy)
        });

        let length = sx.hypot(sy);
        if length < f32::EPSILON {
            return (0.0, 0.0);
        }

        let speed = self.calculate_frame_speed(time_held_ms);
        (sx / length * speed, sy / length * speed)
    }
}

/// Moves `position` by `delta`, wrapping or clamping at the screen edges
///
/// With `wrap` a position leaving one edge reappears at the opposite edge.
/// Without it the position is clamped to `[0, width] x [0, height]` and the
/// edges that stopped the movement are reported.
pub fn apply_movement(
    position: Point,
    delta: (f32, f32),
    screen: ScreenDimensions,
    wrap: bool,
) -> (Point, EdgeContact) {
    let width = screen.width() as f32;
    let height = screen.height() as f32;
    let mut x = position.x + delta.0;
    let mut y = position.y + delta.1;
    let mut contact = EdgeContact::default();

    if wrap {
        if x > width {
            x = 0.0;
        } else if x < 0.0 {
            x = width;
        }
        if y > height {
            y = 0.0;
        } else if y < 0.0 {
            y = height;
        }
        return (Point::new(x, y), contact);
    }

    if x >= width && delta.0 > 0.0 {
        contact.horizontal = Some(Direction::Right);
    } else if x <= 0.0 && delta.0 < 0.0 {
        contact.horizontal = Some(Direction::Left);
    }
    if y >= height && delta.1 > 0.0 {
        contact.vertical = Some(Direction::Down);
    } else if y <= 0.0 && delta.1 < 0.0 {
        contact.vertical = Some(Direction::Up);
    }

    x = x.clamp(0.0, width);
    y = y.clamp(0.0, height);
    (Point::new(x, y), contact)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn physics(speed: u8, acceleration: u8) -> CursorPhysics {
        CursorPhysics {
            speed,
            acceleration,
            acceleration_threshold_ms: 300,
            screen: ScreenDimensions::new(1000, 1000),
        }
    }

    #[test]
    fn base_speed_is_quadratic() {
        let p1 = physics(1, 1).calculate_frame_speed(0);
        let p3 = physics(3, 1).calculate_frame_speed(0);
        assert!((p1 - 0.96).abs() < 1e-4, "{p1}");
        assert!((p3 - 9.0 * p1).abs() < 1e-3, "{p3}");
    }

    #[test]
    fn no_acceleration_before_threshold() {
        let p = physics(2, 5);
        assert_eq!(p.calculate_frame_speed(0), p.calculate_frame_speed(300));
    }

    #[test]
    fn acceleration_ramps_to_level_ceiling() {
        let base = physics(2, 1).calculate_frame_speed(0);

        let low = physics(2, 1).calculate_frame_speed(300 + 1000);
        assert!((low / base - MIN_ACCELERATION).abs() < 1e-3);

        let high = physics(2, 5).calculate_frame_speed(300 + 5000);
        assert!((high / base - MAX_ACCELERATION).abs() < 1e-3);

        let halfway = physics(2, 5).calculate_frame_speed(300 + 500);
        let expected = 1.0 + (MAX_ACCELERATION - 1.0) * 0.5;
        assert!((halfway / base - expected).abs() < 1e-3);
    }

    #[test]
    fn speed_scales_with_screen_density() {
        let small = CursorPhysics {
            screen: ScreenDimensions::new(500, 500),
            ..physics(3, 1)
        };
        let large = CursorPhysics {
            screen: ScreenDimensions::new(2000, 2000),
            ..physics(3, 1)
        };
        let ratio = large.calculate_frame_speed(0) / small.calculate_frame_speed(0);
        assert!((ratio - 4.0).abs() < 1e-3);
    }

    #[test]
    fn single_direction_movement() {
        let p = physics(2, 1);
        let speed = p.calculate_frame_speed(0);
        assert_eq!(p.calculate_movement(Direction::Left, 0), (-speed, 0.0));
        assert_eq!(p.calculate_movement(Direction::Down, 0), (0.0, speed));
    }

    #[test]
    fn diagonal_movement_is_normalised() {
        let p = physics(4, 3);
        for held in [0u64, 250, 900, 4000] {
            let (sx, sy) = p.calculate_movement(Direction::Up, held);
            let (dx, dy) = p.combined_movement(&[Direction::Up, Direction::Right], held);
            let single = sx.hypot(sy);
            let diagonal = dx.hypot(dy);
            assert!((single - diagonal).abs() < 1e-3, "{single} vs {diagonal}");
            assert!(dx > 0.0 && dy < 0.0);
        }
    }

    #[test]
    fn opposite_directions_cancel() {
        let p = physics(3, 1);
        assert_eq!(
            p.combined_movement(&[Direction::Left, Direction::Right], 0),
            (0.0, 0.0)
        );
        assert_eq!(p.combined_movement(&[], 0), (0.0, 0.0));
    }

    #[test]
    fn wrap_reappears_at_opposite_edge() {
        let screen = ScreenDimensions::new(800, 600);
        let (point, contact) = apply_movement(Point::new(800.0, 300.0), (1.0, 0.0), screen, true);
        assert_eq!(point, Point::new(0.0, 300.0));
        assert!(contact.is_empty());

        let (point, _) = apply_movement(Point::new(10.0, 0.0), (0.0, -1.0), screen, true);
        assert_eq!(point, Point::new(10.0, 600.0));
    }

    #[test]
    fn clamp_reports_edge_contact() {
        let screen = ScreenDimensions::new(800, 600);
        let (point, contact) = apply_movement(Point::new(800.0, 300.0), (1.0, 0.0), screen, false);
        assert_eq!(point, Point::new(800.0, 300.0));
        assert_eq!(contact.horizontal, Some(Direction::Right));
        assert_eq!(contact.vertical, None);

        let (point, contact) = apply_movement(Point::new(2.0, 3.0), (-5.0, -5.0), screen, false);
        assert_eq!(point, Point::new(0.0, 0.0));
        assert_eq!(contact.directions(), vec![Direction::Left, Direction::Up]);
    }

    #[test]
    fn interior_movement_has_no_contact() {
        let screen = ScreenDimensions::new(800, 600);
        let (point, contact) = apply_movement(Point::new(100.0, 100.0), (5.0, -5.0), screen, false);
        assert_eq!(point, Point::new(105.0, 95.0));
        assert!(contact.is_empty());
    }
}
