//! Segment / cell geometry used by the time map.
//!
//! Everything here works in grid space, where cell `(cx, cy)` covers
//! `[cx, cx + 1) x [cy, cy + 1)`.

use nalgebra::Vector2;

/// Intersections closer than this (in cells) are treated as one point.
const SAME_POINT_EPSILON: f32 = 1e-5;

/// Slack for intersections computed a rounding error outside their edge.
const EDGE_TOLERANCE: f32 = 1e-4;

/// Axis aligned rectangle, bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: Vector2<f32>,
    pub max: Vector2<f32>,
}

impl Rect {
    pub fn new(min: Vector2<f32>, max: Vector2<f32>) -> Self {
        Self { min, max }
    }

    /// The unit square of grid cell `(cx, cy)`.
    pub fn cell(cx: usize, cy: usize) -> Self {
        let min = Vector2::new(cx as f32, cy as f32);
        Self::new(min, min + Vector2::new(1.0, 1.0))
    }

    pub fn contains(&self, p: &Vector2<f32>) -> bool {
        self.contains_within(p, 0.0)
    }

    /// Containment test with the rectangle grown by `tolerance` on every side.
    pub fn contains_within(&self, p: &Vector2<f32>, tolerance: f32) -> bool {
        self.min.x - tolerance <= p.x
            && p.x <= self.max.x + tolerance
            && self.min.y - tolerance <= p.y
            && p.y <= self.max.y + tolerance
    }

    /// Nearest point of the rectangle.
    pub fn clamp(&self, p: &Vector2<f32>) -> Vector2<f32> {
        p.sup(&self.min).inf(&self.max)
    }

    /// The four edges as `(start, end)` pairs.
    pub fn edges(&self) -> [(Vector2<f32>, Vector2<f32>); 4] {
        let (a, c) = (self.min, self.max);
        let b = Vector2::new(c.x, a.y);
        let d = Vector2::new(a.x, c.y);
        [(a, b), (b, c), (c, d), (d, a)]
    }
}

/// Intersection point of segments `p1-p2` and `q1-q2`.
///
/// Solves the 2x2 system by determinants; parallel (or degenerate) segments
/// have no intersection.
pub fn segment_intersection(
    p1: &Vector2<f32>,
    p2: &Vector2<f32>,
    q1: &Vector2<f32>,
    q2: &Vector2<f32>,
) -> Option<Vector2<f32>> {
    let r = p2 - p1;
    let s = q2 - q1;

    let delta = r.x * s.y - r.y * s.x;
    if delta.abs() < f32::EPSILON {
        return None;
    }

    let w = q1 - p1;
    let t = (w.x * s.y - w.y * s.x) / delta;
    let u = (w.x * r.y - w.y * r.x) / delta;

    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(p1 + r * t)
    } else {
        None
    }
}

/// Portion of segment `a-b` inside `rect`, if it has non-zero length.
///
/// Endpoints inside the rectangle are taken as they are; the rest comes from
/// intersecting the segment with the rectangle edges, stopping at the second
/// distinct point found.
pub fn clip_segment(
    a: &Vector2<f32>,
    b: &Vector2<f32>,
    rect: &Rect,
) -> Option<(Vector2<f32>, Vector2<f32>)> {
    let a_in = rect.contains(a);
    let b_in = rect.contains(b);
    if a_in && b_in {
        return Some((*a, *b));
    }

    let mut found: Vec<Vector2<f32>> = Vec::with_capacity(2);
    if a_in {
        push_distinct(&mut found, *a);
    }
    if b_in {
        push_distinct(&mut found, *b);
    }

    for (e1, e2) in rect.edges() {
        if found.len() == 2 {
            break;
        }
        if let Some(p) = segment_intersection(a, b, &e1, &e2) {
            if rect.contains_within(&p, EDGE_TOLERANCE) {
                push_distinct(&mut found, rect.clamp(&p));
            }
        }
    }

    match found.as_slice() {
        [p, q] => Some((*p, *q)),
        _ => None,
    }
}

fn push_distinct(found: &mut Vec<Vector2<f32>>, p: Vector2<f32>) {
    if found.iter().all(|q| (q - p).norm() > SAME_POINT_EPSILON) {
        found.push(p);
    }
}
