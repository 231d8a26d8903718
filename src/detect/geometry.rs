//! Polygon measurements on integer contours.

use imageproc::point::Point;

use crate::detect::result::BoundingBox;

/// Absolute shoelace area of a closed polygon.
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    moments(points).m00
}

/// Closed perimeter length.
pub fn perimeter(points: &[Point<i32>]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| {
            let dx = f64::from(b.x - a.x);
            let dy = f64::from(b.y - a.y);
            (dx * dx + dy * dy).sqrt()
        })
        .sum()
}

/// Zeroth and first order polygon moments.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Moments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
}

/// Green's-theorem moments of the polygon interior, orientation-independent.
pub fn moments(points: &[Point<i32>]) -> Moments {
    if points.len() < 3 {
        return Moments::default();
    }
    let mut m = Moments::default();
    for (a, b) in points.iter().zip(points.iter().cycle().skip(1)) {
        let (xa, ya) = (f64::from(a.x), f64::from(a.y));
        let (xb, yb) = (f64::from(b.x), f64::from(b.y));
        let cross = xa * yb - xb * ya;
        m.m00 += cross;
        m.m10 += cross * (xa + xb);
        m.m01 += cross * (ya + yb);
    }
    m.m00 /= 2.0;
    m.m10 /= 6.0;
    m.m01 /= 6.0;
    if m.m00 < 0.0 {
        m.m00 = -m.m00;
        m.m10 = -m.m10;
        m.m01 = -m.m01;
    }
    m
}

/// Area-weighted centroid, truncated to pixel coordinates. `None` for
/// zero-area polygons.
pub fn centroid(points: &[Point<i32>]) -> Option<Point<i32>> {
    let m = moments(points);
    if m.m00 == 0.0 {
        return None;
    }
    Some(Point::new((m.m10 / m.m00) as i32, (m.m01 / m.m00) as i32))
}

/// Leftmost, rightmost, topmost and bottommost contour points. Ties resolve to
/// the first point in contour order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtremePoints {
    pub left: Point<i32>,
    pub right: Point<i32>,
    pub top: Point<i32>,
    pub bottom: Point<i32>,
}

impl ExtremePoints {
    pub fn as_array(&self) -> [Point<i32>; 4] {
        [self.left, self.right, self.top, self.bottom]
    }
}

pub fn extreme_points(points: &[Point<i32>]) -> Option<ExtremePoints> {
    let first = *points.first()?;
    let mut ext = ExtremePoints {
        left: first,
        right: first,
        top: first,
        bottom: first,
    };
    for &p in &points[1..] {
        if p.x < ext.left.x {
            ext.left = p;
        }
        if p.x > ext.right.x {
            ext.right = p;
        }
        if p.y < ext.top.y {
            ext.top = p;
        }
        if p.y > ext.bottom.y {
            ext.bottom = p;
        }
    }
    Some(ext)
}

pub fn convex_hull(points: &[Point<i32>]) -> Vec<Point<i32>> {
    if points.len() < 3 {
        return points.to_vec();
    }
    imageproc::geometry::convex_hull(points.to_vec())
}

/// Inclusive pixel bounds, as `(x, y, width, height)`.
pub fn bounding_box(points: &[Point<i32>]) -> Option<BoundingBox> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some(BoundingBox {
        x: min_x.max(0) as u32,
        y: min_y.max(0) as u32,
        width: (max_x - min_x + 1) as u32,
        height: (max_y - min_y + 1) as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(raw: &[(i32, i32)]) -> Vec<Point<i32>> {
        raw.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn square_measurements() {
        let square = pts(&[(0, 0), (10, 0), (10, 10), (0, 10)]);
        assert_eq!(polygon_area(&square), 100.0);
        assert_eq!(perimeter(&square), 40.0);
        assert_eq!(centroid(&square), Some(Point::new(5, 5)));
    }

    #[test]
    fn orientation_does_not_change_moments() {
        let cw = pts(&[(2, 2), (8, 2), (8, 6), (2, 6)]);
        let ccw: Vec<_> = cw.iter().rev().copied().collect();
        assert_eq!(moments(&cw), moments(&ccw));
        assert_eq!(centroid(&ccw), Some(Point::new(5, 4)));
    }

    #[test]
    fn degenerate_polygons_have_no_centroid() {
        assert_eq!(centroid(&pts(&[(0, 0), (5, 0), (10, 0)])), None);
        assert_eq!(centroid(&pts(&[(0, 0)])), None);
        assert_eq!(polygon_area(&[]), 0.0);
    }

    #[test]
    fn extreme_points_take_first_tie() {
        let poly = pts(&[(3, 0), (6, 0), (9, 4), (6, 8), (0, 8), (0, 4)]);
        let ext = extreme_points(&poly).unwrap();
        assert_eq!(ext.left, Point::new(0, 8));
        assert_eq!(ext.right, Point::new(9, 4));
        assert_eq!(ext.top, Point::new(3, 0));
        assert_eq!(ext.bottom, Point::new(6, 8));
        assert!(extreme_points(&[]).is_none());
    }

    #[test]
    fn hull_drops_concave_vertex() {
        let arrow = pts(&[(0, 0), (10, 0), (5, 3), (10, 10), (0, 10)]);
        let hull = convex_hull(&arrow);
        assert_eq!(hull.len(), 4);
        assert!(!hull.contains(&Point::new(5, 3)));
        assert_eq!(polygon_area(&hull), 100.0);
    }

    #[test]
    fn bounding_box_is_inclusive() {
        let poly = pts(&[(4, 5), (9, 5), (9, 7), (4, 7)]);
        assert_eq!(
            bounding_box(&poly),
            Some(BoundingBox {
                x: 4,
                y: 5,
                width: 6,
                height: 3
            })
        );
    }
}
