//! Axis-aligned rectangles, sides and cardinal directions.
//!
//! The world uses screen coordinates: `x` grows to the right, `y` grows
//! downward, so gravity is a positive `y` acceleration and "top" is the
//! smaller `y`.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Rect
// ---------------------------------------------------------------------------

/// An axis-aligned rectangle with real-valued position and size.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub fn left(&self) -> f64 {
        self.x
    }

    #[inline]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    #[inline]
    pub fn top(&self) -> f64 {
        self.y
    }

    #[inline]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// Zero or negative extent on either axis.
    pub fn is_degenerate(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    /// Interiors intersect. Rectangles that merely share an edge do not
    /// overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.left() < other.right()
            && other.left() < self.right()
            && self.top() < other.bottom()
            && other.top() < self.bottom()
    }

    /// Horizontal extents intersect by more than `eps`.
    pub fn overlaps_x(&self, other: &Rect, eps: f64) -> bool {
        self.left() < other.right() - eps && other.left() < self.right() - eps
    }

    /// Vertical extents intersect by more than `eps`.
    pub fn overlaps_y(&self, other: &Rect, eps: f64) -> bool {
        self.top() < other.bottom() - eps && other.top() < self.bottom() - eps
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.left().max(other.left());
        let right = self.right().min(other.right());
        let top = self.top().max(other.top());
        let bottom = self.bottom().min(other.bottom());
        (left < right && top < bottom).then(|| Rect::new(left, top, right - left, bottom - top))
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Grow by `margin` on every side.
    pub fn expanded(&self, margin: f64) -> Rect {
        Rect::new(
            self.x - margin,
            self.y - margin,
            self.width + 2.0 * margin,
            self.height + 2.0 * margin,
        )
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        let left = self.left().min(other.left());
        let top = self.top().min(other.top());
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(left, top, right - left, bottom - top)
    }
}

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// One of the four faces of a rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
    Top,
    Bottom,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
            Side::Top => Side::Bottom,
            Side::Bottom => Side::Top,
        }
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Cardinal direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    /// Direction of the dominant axis of `(dx, dy)`; horizontal wins ties
    /// only when strictly larger. `None` for a zero vector.
    pub fn dominant(dx: f64, dy: f64) -> Option<Direction> {
        if dx.abs() > dy.abs() {
            Some(if dx > 0.0 { Direction::Right } else { Direction::Left })
        } else if dy != 0.0 {
            Some(if dy > 0.0 { Direction::Down } else { Direction::Up })
        } else {
            None
        }
    }

    /// Unit step for this direction.
    pub fn unit(self) -> (f64, f64) {
        match self {
            Direction::Left => (-1.0, 0.0),
            Direction::Right => (1.0, 0.0),
            Direction::Up => (0.0, -1.0),
            Direction::Down => (0.0, 1.0),
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::Left | Direction::Right)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_edge_is_not_overlap() {
        let a = Rect::new(0.0, 0.0, 32.0, 32.0);
        let b = Rect::new(32.0, 0.0, 32.0, 32.0);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&b.translated(-0.5, 0.0)));
    }

    #[test]
    fn degenerate_detection() {
        assert!(Rect::new(0.0, 0.0, 0.0, 5.0).is_degenerate());
        assert!(Rect::new(0.0, 0.0, 5.0, -1.0).is_degenerate());
        assert!(Rect::new(0.0, 0.0, f64::NAN, 1.0).is_degenerate());
        assert!(!Rect::new(0.0, 0.0, 1.0, 1.0).is_degenerate());
    }

    #[test]
    fn intersection_and_union() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);
        assert_eq!(a.intersection(&b), Some(Rect::new(5.0, 5.0, 5.0, 5.0)));
        assert_eq!(a.union(&b), Rect::new(0.0, 0.0, 15.0, 15.0));
        assert_eq!(a.intersection(&a.translated(10.0, 0.0)), None);
    }

    #[test]
    fn dominant_direction() {
        assert_eq!(Direction::dominant(3.0, 1.0), Some(Direction::Right));
        assert_eq!(Direction::dominant(-3.0, 1.0), Some(Direction::Left));
        assert_eq!(Direction::dominant(0.0, -2.0), Some(Direction::Up));
        assert_eq!(Direction::dominant(2.0, 2.0), Some(Direction::Down));
        assert_eq!(Direction::dominant(0.0, 0.0), None);
    }
}
