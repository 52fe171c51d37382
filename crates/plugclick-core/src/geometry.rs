#![forbid(unsafe_code)]

//! Geometric primitives.

/// A point in host pixel coordinates (client or screen space).
///
/// Coordinates are signed: pointer positions outside the viewport (for
/// example while a button is held and the pointer leaves the window) are
/// reported with negative values by most hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    /// Create a new point.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Absolute per-axis displacement from `other`.
    #[inline]
    #[must_use]
    pub const fn axis_distance(self, other: Point) -> (u32, u32) {
        (
            self.x.abs_diff(other.x),
            self.y.abs_diff(other.y),
        )
    }

    /// Chebyshev distance: the larger of the two per-axis displacements.
    #[inline]
    #[must_use]
    pub const fn chebyshev_distance(self, other: Point) -> u32 {
        let (dx, dy) = self.axis_distance(other);
        if dx > dy { dx } else { dy }
    }

    /// Whether `other` lies within `threshold` of `self` on both axes.
    ///
    /// The bound is inclusive: a displacement of exactly `threshold` is
    /// still "within".
    #[inline]
    #[must_use]
    pub const fn within(self, other: Point, threshold: u32) -> bool {
        self.chebyshev_distance(other) <= threshold
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}
