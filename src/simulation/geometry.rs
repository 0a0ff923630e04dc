//! Geometry calculations for sight lines and building footprints.
//!
//! Contains helper functions for:
//! - Euclidean ground distance between two points
//! - Point-in-polygon tests (ray casting, arbitrary simple polygons)
//! - Parametric crossing spans of a segment against a polygon, used to find
//!   where along a sight line a building is traversed

use super::types::Point;

/// Euclidean distance between two ground points in meters.
pub fn distance(a: &Point, b: &Point) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    (dx * dx + dy * dy).sqrt()
}

/// Ray-casting point-in-polygon test.
///
/// Casts a horizontal ray from the point and counts edge crossings; an odd
/// count means the point is inside. Works for non-convex polygons. Points
/// exactly on an edge may land on either side; callers treating boundary
/// contact as blocking should also test the edges explicitly.
///
/// Degenerate polygons (fewer than 3 vertices) contain nothing.
pub fn point_in_polygon(point: &Point, polygon: &[Point]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let pi = &polygon[i];
        let pj = &polygon[j];
        if (pi.y > point.y) != (pj.y > point.y) {
            let x_at_y = pi.x + (point.y - pi.y) * (pj.x - pi.x) / (pj.y - pi.y);
            if point.x < x_at_y {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Span of the segment `a`→`b` that touches the polygon, as parameters on
/// the segment (`0.0` at `a`, `1.0` at `b`).
///
/// Collects every crossing parameter: edge intersections, endpoints that lie
/// inside the polygon, and collinear edge overlaps. Returns the enclosing
/// `(entry, exit)` interval, or `None` when segment and polygon are disjoint.
/// For non-convex footprints the interval may cover short stretches outside
/// the polygon; that is a conservative over-estimate of the traversed span.
///
/// A degenerate segment (`a == b`) yields the full `(0.0, 1.0)` span when the
/// point sits inside the polygon.
pub fn crossing_span(a: &Point, b: &Point, polygon: &[Point]) -> Option<(f64, f64)> {
    if polygon.len() < 3 {
        return None;
    }
    if a.x == b.x && a.y == b.y {
        return if point_in_polygon(a, polygon) {
            Some((0.0, 1.0))
        } else {
            None
        };
    }

    let mut params: Vec<f64> = Vec::new();
    if point_in_polygon(a, polygon) {
        params.push(0.0);
    }
    if point_in_polygon(b, polygon) {
        params.push(1.0);
    }
    for i in 0..polygon.len() {
        let c = &polygon[i];
        let d = &polygon[(i + 1) % polygon.len()];
        edge_crossing_params(a, b, c, d, &mut params);
    }

    if params.is_empty() {
        return None;
    }
    let mut entry = f64::INFINITY;
    let mut exit = f64::NEG_INFINITY;
    for t in params {
        entry = entry.min(t);
        exit = exit.max(t);
    }
    Some((entry, exit))
}

/// Cross product of 2D vectors (z component of the 3D cross).
fn cross(vx: f64, vy: f64, wx: f64, wy: f64) -> f64 {
    vx * wy - vy * wx
}

/// Push every parameter t on segment `a`→`b` where it meets edge `c`→`d`.
///
/// Proper crossings contribute one parameter; a collinear overlap contributes
/// the clamped ends of the overlapping stretch. Parallel disjoint edges
/// contribute nothing.
fn edge_crossing_params(a: &Point, b: &Point, c: &Point, d: &Point, params: &mut Vec<f64>) {
    let rx = b.x - a.x;
    let ry = b.y - a.y;
    let sx = d.x - c.x;
    let sy = d.y - c.y;
    let qpx = c.x - a.x;
    let qpy = c.y - a.y;

    let denom = cross(rx, ry, sx, sy);
    if denom != 0.0 {
        let t = cross(qpx, qpy, sx, sy) / denom;
        let u = cross(qpx, qpy, rx, ry) / denom;
        if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
            params.push(t);
        }
        return;
    }

    // Parallel edges: only collinear ones can overlap the segment.
    if cross(qpx, qpy, rx, ry) != 0.0 {
        return;
    }
    let rr = rx * rx + ry * ry;
    let t0 = (qpx * rx + qpy * ry) / rr;
    let t1 = ((d.x - a.x) * rx + (d.y - a.y) * ry) / rr;
    let lo = t0.min(t1).max(0.0);
    let hi = t0.max(t1).min(1.0);
    if lo <= hi {
        params.push(lo);
        params.push(hi);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point {
        Point { x, y }
    }

    fn square() -> Vec<Point> {
        vec![p(10.0, 10.0), p(20.0, 10.0), p(20.0, 20.0), p(10.0, 20.0)]
    }

    #[test]
    fn distance_basic() {
        assert!((distance(&p(0.0, 0.0), &p(3.0, 4.0)) - 5.0).abs() < 1e-12);
        assert_eq!(distance(&p(7.0, 7.0), &p(7.0, 7.0)), 0.0);
    }

    #[test]
    fn point_in_polygon_square() {
        let poly = square();
        assert!(point_in_polygon(&p(15.0, 15.0), &poly));
        assert!(!point_in_polygon(&p(9.0, 15.0), &poly));
        assert!(!point_in_polygon(&p(25.0, 25.0), &poly));
    }

    #[test]
    fn point_in_polygon_concave_notch() {
        // L-shape: the notch at the top right is outside.
        let poly = vec![
            p(0.0, 0.0),
            p(10.0, 0.0),
            p(10.0, 4.0),
            p(4.0, 4.0),
            p(4.0, 10.0),
            p(0.0, 10.0),
        ];
        assert!(point_in_polygon(&p(2.0, 8.0), &poly));
        assert!(point_in_polygon(&p(8.0, 2.0), &poly));
        assert!(!point_in_polygon(&p(8.0, 8.0), &poly));
    }

    #[test]
    fn crossing_span_through_square() {
        let poly = square();
        let (entry, exit) = crossing_span(&p(0.0, 15.0), &p(30.0, 15.0), &poly).unwrap();
        assert!((entry - 10.0 / 30.0).abs() < 1e-12);
        assert!((exit - 20.0 / 30.0).abs() < 1e-12);
    }

    #[test]
    fn crossing_span_endpoint_inside() {
        let poly = square();
        let (entry, exit) = crossing_span(&p(15.0, 15.0), &p(35.0, 15.0), &poly).unwrap();
        assert_eq!(entry, 0.0);
        assert!((exit - 0.25).abs() < 1e-12);
    }

    #[test]
    fn crossing_span_disjoint() {
        let poly = square();
        assert!(crossing_span(&p(0.0, 0.0), &p(5.0, 5.0), &poly).is_none());
        assert!(crossing_span(&p(0.0, 30.0), &p(30.0, 30.0), &poly).is_none());
    }

    #[test]
    fn crossing_span_degenerate_segment() {
        let poly = square();
        assert_eq!(
            crossing_span(&p(15.0, 15.0), &p(15.0, 15.0), &poly),
            Some((0.0, 1.0))
        );
        assert!(crossing_span(&p(0.0, 0.0), &p(0.0, 0.0), &poly).is_none());
    }

    #[test]
    fn crossing_span_collinear_edge_overlap() {
        let poly = square();
        // Runs along the bottom edge y=10 from x=0 to x=40.
        let (entry, exit) = crossing_span(&p(0.0, 10.0), &p(40.0, 10.0), &poly).unwrap();
        assert!((entry - 0.25).abs() < 1e-12);
        assert!((exit - 0.5).abs() < 1e-12);
    }

    #[test]
    fn crossing_span_vertex_touch_is_zero_length() {
        let poly = square();
        // Diagonal grazing exactly the corner (10,10).
        let (entry, exit) = crossing_span(&p(0.0, 20.0), &p(20.0, 0.0), &poly).unwrap();
        assert!((entry - 0.5).abs() < 1e-12);
        assert!((exit - 0.5).abs() < 1e-12);
    }
}
