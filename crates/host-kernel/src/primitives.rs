//! Faceted primitive builders for tests and demos.
//!
//! Faces are listed counter-clockwise seen from outside the body.

use std::f64::consts::PI;

use nalgebra::{Point3, Vector3};
use section_types::{AxisDirection, BodySnapshot};

/// Axis-aligned box between two corners.
pub fn make_box(min: [f64; 3], max: [f64; 3]) -> BodySnapshot {
    let vertices = (0..8u32)
        .map(|i| {
            Point3::new(
                if i & 1 == 0 { min[0] } else { max[0] },
                if i & 2 == 0 { min[1] } else { max[1] },
                if i & 4 == 0 { min[2] } else { max[2] },
            )
        })
        .collect();
    let faces = vec![
        vec![0, 2, 3, 1],
        vec![4, 5, 7, 6],
        vec![0, 1, 5, 4],
        vec![2, 6, 7, 3],
        vec![0, 4, 6, 2],
        vec![1, 3, 7, 5],
    ];
    BodySnapshot::new(vertices, faces)
}

/// Unit vectors (u, v, w) with w along `direction`, right-handed.
fn frame(direction: AxisDirection) -> (Vector3<f64>, Vector3<f64>, Vector3<f64>) {
    let (u, v) = direction.plane_components();
    let mut eu = Vector3::zeros();
    let mut ev = Vector3::zeros();
    eu[u] = 1.0;
    ev[v] = 1.0;
    (eu, ev, direction.unit())
}

fn ring(
    direction: AxisDirection,
    center: Point3<f64>,
    radius: f64,
    segments: usize,
) -> impl Iterator<Item = Point3<f64>> {
    let (eu, ev, _) = frame(direction);
    (0..segments).map(move |k| {
        let theta = 2.0 * PI * k as f64 / segments as f64;
        center + eu * (radius * theta.cos()) + ev * (radius * theta.sin())
    })
}

/// Prism approximating a cylinder along `direction`, with its base centred
/// at `base`. Every vertex lies exactly on the radius.
pub fn make_cylinder(
    direction: AxisDirection,
    base: [f64; 3],
    radius: f64,
    length: f64,
    segments: usize,
) -> BodySnapshot {
    let n = segments.max(3);
    let base = Point3::from(base);
    let top = base + direction.unit() * length;
    let mut vertices: Vec<Point3<f64>> = ring(direction, base, radius, n).collect();
    vertices.extend(ring(direction, top, radius, n));

    let n32 = n as u32;
    let mut faces = Vec::with_capacity(n + 2);
    for k in 0..n32 {
        let k1 = (k + 1) % n32;
        faces.push(vec![k, k1, n32 + k1, n32 + k]);
    }
    faces.push((0..n32).rev().collect());
    faces.push((n32..2 * n32).collect());
    BodySnapshot::new(vertices, faces)
}

/// Hollow cylinder: outer wall, inner wall and two annular caps.
pub fn make_tube(
    direction: AxisDirection,
    base: [f64; 3],
    outer_radius: f64,
    inner_radius: f64,
    length: f64,
    segments: usize,
) -> BodySnapshot {
    let n = segments.max(3);
    let base = Point3::from(base);
    let top = base + direction.unit() * length;
    let mut vertices: Vec<Point3<f64>> = ring(direction, base, outer_radius, n).collect();
    vertices.extend(ring(direction, top, outer_radius, n));
    vertices.extend(ring(direction, base, inner_radius, n));
    vertices.extend(ring(direction, top, inner_radius, n));

    let n32 = n as u32;
    let (ob, ot, ib, it) = (0, n32, 2 * n32, 3 * n32);
    let mut faces = Vec::with_capacity(4 * n);
    for k in 0..n32 {
        let k1 = (k + 1) % n32;
        faces.push(vec![ob + k, ob + k1, ot + k1, ot + k]);
        faces.push(vec![ib + k1, ib + k, it + k, it + k1]);
        faces.push(vec![ob + k, ib + k, ib + k1, ob + k1]);
        faces.push(vec![ot + k, ot + k1, it + k1, it + k]);
    }
    BodySnapshot::new(vertices, faces)
}

/// Square pyramid with its base centred at `base` and apex `height` along
/// `direction`.
pub fn make_pyramid(
    direction: AxisDirection,
    base: [f64; 3],
    half_width: f64,
    height: f64,
) -> BodySnapshot {
    let (eu, ev, ew) = frame(direction);
    let c = Point3::from(base);
    let h = half_width;
    let vertices = vec![
        c - eu * h - ev * h,
        c + eu * h - ev * h,
        c + eu * h + ev * h,
        c - eu * h + ev * h,
        c + ew * height,
    ];
    let faces = vec![
        vec![3, 2, 1, 0],
        vec![0, 1, 4],
        vec![1, 2, 4],
        vec![2, 3, 4],
        vec![3, 0, 4],
    ];
    BodySnapshot::new(vertices, faces)
}

/// Open surface: the XY polyline `path` extruded along Z from `z0` to `z1`.
pub fn make_surface_strip(path: &[[f64; 2]], z0: f64, z1: f64) -> BodySnapshot {
    let n = path.len() as u32;
    let mut vertices: Vec<Point3<f64>> = path.iter().map(|p| Point3::new(p[0], p[1], z0)).collect();
    vertices.extend(path.iter().map(|p| Point3::new(p[0], p[1], z1)));
    let faces = (0..n.saturating_sub(1))
        .map(|k| vec![k, k + 1, n + k + 1, n + k])
        .collect();
    BodySnapshot::new(vertices, faces)
}

/// A body with a single vertex and no faces. Its extent is one point.
pub fn make_point_body(at: [f64; 3]) -> BodySnapshot {
    BodySnapshot::new(vec![Point3::from(at)], Vec::new())
}
