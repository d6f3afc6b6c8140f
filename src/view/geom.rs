//! Positions and bounding boxes of the render model.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Point3) -> f64 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Axis-aligned box spanned by a set of points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lo: Point3,
    pub hi: Point3,
}

/// Below this extent an axis is considered flat and padded by one unit on each side.
const MIN_EXTENT: f64 = 0.000001;

impl Bounds {
    /// Bounds of `points`. Flat axes are widened by ±1; no points at all
    /// gives the unit box `[-1, 1]³`.
    pub fn of(points: impl IntoIterator<Item = Point3>) -> Self {
        let mut points = points.into_iter().peekable();
        if points.peek().is_none() {
            return Self {
                lo: Point3::new(-1.0, -1.0, -1.0),
                hi: Point3::new(1.0, 1.0, 1.0),
            };
        }

        let mut lo = Point3::new(f64::MAX, f64::MAX, f64::MAX);
        let mut hi = Point3::new(-f64::MAX, -f64::MAX, -f64::MAX);
        for p in points {
            lo.x = lo.x.min(p.x);
            lo.y = lo.y.min(p.y);
            lo.z = lo.z.min(p.z);
            hi.x = hi.x.max(p.x);
            hi.y = hi.y.max(p.y);
            hi.z = hi.z.max(p.z);
        }

        for (l, h) in [(&mut lo.x, &mut hi.x), (&mut lo.y, &mut hi.y), (&mut lo.z, &mut hi.z)] {
            if *h - *l < MIN_EXTENT {
                *h += 1.0;
                *l -= 1.0;
            }
        }
        Self { lo, hi }
    }

    pub fn width(&self) -> f64 {
        self.hi.x - self.lo.x
    }

    pub fn height(&self) -> f64 {
        self.hi.y - self.lo.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_bounds_are_unit_box() {
        let b = Bounds::of(Vec::new());
        assert_eq!(b.lo, Point3::new(-1.0, -1.0, -1.0));
        assert_eq!(b.hi, Point3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_flat_axis_is_padded() {
        let b = Bounds::of(vec![Point3::new(0.0, 2.0, 0.0), Point3::new(4.0, 2.0, 0.0)]);
        assert_eq!(b.width(), 4.0);
        assert_eq!(b.lo.y, 1.0);
        assert_eq!(b.hi.y, 3.0);
        assert_eq!(b.lo.z, -1.0);
    }

    #[test]
    fn test_distance() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(3.0, 4.0, 0.0);
        assert_eq!(a.distance(&b), 5.0);
    }
}
