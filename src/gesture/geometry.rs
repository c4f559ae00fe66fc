//! Scroll vectors and pinch finger paths

use crate::domain::core::{Direction, Point, ScreenDimensions};
use crate::gesture::backend::FingerPath;

/// Finger offset from the pinch center at the "closed" end, as a fraction
/// of the smaller screen dimension
pub const ZOOM_NEAR_FRACTION: f32 = 0.05;
/// Finger offset from the pinch center at the "open" end
pub const ZOOM_FAR_FRACTION: f32 = 0.25;
/// Scroll distance of edge auto-scroll, as a fraction of the smaller dimension
pub const EDGE_SCROLL_FRACTION: f32 = 0.15;

/// Direction the finger travels for a logical scroll direction
///
/// With natural scrolling the finger moves with the key; without it the
/// finger moves the other way, like a mouse wheel moving the viewport.
pub fn finger_direction(direction: Direction, natural_scrolling: bool) -> Direction {
    if natural_scrolling {
        direction
    } else {
        direction.opposite()
    }
}

/// Start and end of a scroll swipe from `origin`
///
/// The swipe covers `fraction` of the smaller screen dimension; both ends
/// are clamped to the screen.
pub fn scroll_vector(
    direction: Direction,
    origin: Point,
    screen: ScreenDimensions,
    fraction: f32,
    natural_scrolling: bool,
) -> (Point, Point) {
    let distance = screen.min_dimension() * fraction;
    let (ux, uy) = finger_direction(direction, natural_scrolling).unit_vector();
    let start = screen.clamp(origin);
    let end = screen.clamp(Point::new(start.x + ux * distance, start.y + uy * distance));
    (start, end)
}

/// Two symmetric horizontal finger paths around `center`
///
/// Zoom in spreads the fingers from the near offset to the far offset; zoom
/// out pinches them from far to near.
pub fn pinch_paths(is_zoom_in: bool, center: Point, screen: ScreenDimensions) -> [FingerPath; 2] {
    let near = screen.min_dimension() * ZOOM_NEAR_FRACTION;
    let far = screen.min_dimension() * ZOOM_FAR_FRACTION;
    let (from, to) = if is_zoom_in { (near, far) } else { (far, near) };
    let center = screen.clamp(center);

    let at = |offset: f32| screen.clamp(Point::new(center.x + offset, center.y));
    [
        FingerPath::new(at(-from), at(-to)),
        FingerPath::new(at(from), at(to)),
    ]
}
