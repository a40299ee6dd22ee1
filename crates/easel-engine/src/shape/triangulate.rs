//! Ear clipping for simple polygons.

use crate::coords::EPSILON;

const EPS: f64 = EPSILON as f64;

/// Splits the polygon `points` into triangles, returned as index triples
/// into `points`.
///
/// The polygon is projected onto the first coordinate plane in which it has
/// a non-zero area. A trailing vertex that repeats the first is ignored.
/// Self-intersecting input stops clipping early and leaves the remainder
/// unfilled.
pub fn triangulate(points: &[[f32; 3]]) -> Vec<[usize; 3]> {
    let mut out = Vec::new();
    if points.len() < 3 {
        return out;
    }

    let (mut d1, mut d2) = (0, 1);
    let mut area = signed_area(points, d1, d2);
    if area == 0.0 {
        if has_spread(points, 0) {
            d2 = 2;
        } else if has_spread(points, 1) {
            d1 = 1;
            d2 = 2;
        } else {
            return out;
        }
        area += signed_area(points, d1, d2);
    }

    let mut n = points.len();
    let (first, last) = (points[0], points[n - 1]);
    if (0..3).all(|k| (first[k] - last[k]).abs() < EPSILON) {
        n -= 1;
    }

    let mut order: Vec<usize> = if area > 0.0 { (0..n).collect() } else { (0..n).rev().collect() };

    let project = |i: usize| -> (f64, f64) {
        let p = points[i];
        (-10.0 * p[d1] as f64, 10.0 * p[d2] as f64)
    };

    let mut vc = order.len();
    let mut count = 2 * vc;
    let mut v = vc - 1;
    while vc > 2 {
        if count == 0 {
            log::trace!("triangulate: giving up with {vc} vertices left");
            break;
        }
        count -= 1;

        let u = if v >= vc { 0 } else { v };
        v = if u + 1 >= vc { 0 } else { u + 1 };
        let w = if v + 1 >= vc { 0 } else { v + 1 };

        let a = project(order[u]);
        let b = project(order[v]);
        let c = project(order[w]);

        if EPS > (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0) {
            continue;
        }

        let blocked = (0..vc)
            .filter(|&p| p != u && p != v && p != w)
            .any(|p| inside(a, b, c, project(order[p])));
        if blocked {
            continue;
        }

        out.push([order[u], order[v], order[w]]);
        order.remove(v);
        vc -= 1;
        count = 2 * vc;
    }
    out
}

fn signed_area(points: &[[f32; 3]], d1: usize, d2: usize) -> f32 {
    let mut area = 0.0;
    let mut p = points.len() - 1;
    for q in 0..points.len() {
        area += points[q][d1] * points[p][d2] - points[p][d1] * points[q][d2];
        p = q;
    }
    area
}

fn has_spread(points: &[[f32; 3]], axis: usize) -> bool {
    let v0 = points[0][axis];
    points.iter().any(|p| p[axis] != v0)
}

/// Whether `p` lies in triangle `abc`, edges included.
fn inside(a: (f64, f64), b: (f64, f64), c: (f64, f64), p: (f64, f64)) -> bool {
    let (ax, ay) = (c.0 - b.0, c.1 - b.1);
    let (bx, by) = (a.0 - c.0, a.1 - c.1);
    let (cx, cy) = (b.0 - a.0, b.1 - a.1);
    let (apx, apy) = (p.0 - a.0, p.1 - a.1);
    let (bpx, bpy) = (p.0 - b.0, p.1 - b.1);
    let (cpx, cpy) = (p.0 - c.0, p.1 - c.1);

    let a_cross_bp = ax * bpy - ay * bpx;
    let c_cross_ap = cx * apy - cy * apx;
    let b_cross_cp = bx * cpy - by * cpx;
    a_cross_bp >= 0.0 && b_cross_cp >= 0.0 && c_cross_ap >= 0.0
}
