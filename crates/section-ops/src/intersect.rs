//! Plane / faceted-body intersection.
//!
//! Sections one body with the infinite plane normal to an axis at a given
//! offset. Faces crossing the plane contribute segments; faces lying in the
//! plane contribute their region boundary. Segment endpoints are welded and
//! chained into loops, which are then classified and canonicalised.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use nalgebra::{Point2, Point3, Vector2, Vector3};
use section_types::{Axis, BodyId, BodyKind, BodySnapshot, ProfileSet, Tolerance};
use tracing::trace;

use crate::loops::{chain_edges, classify_loops, remove_collinear};
use crate::types::IntersectionFailureKind;

/// Merges points closer than the weld tolerance into shared nodes.
struct Welder {
    cell: f64,
    tolerance: f64,
    nodes: Vec<Point2<f64>>,
    grid: HashMap<(i64, i64), Vec<usize>>,
}

impl Welder {
    fn new(tolerance: f64) -> Self {
        Self {
            cell: tolerance.max(1e-12),
            tolerance,
            nodes: Vec::new(),
            grid: HashMap::new(),
        }
    }

    fn cell_of(&self, p: &Point2<f64>) -> (i64, i64) {
        (
            (p.x / self.cell).floor() as i64,
            (p.y / self.cell).floor() as i64,
        )
    }

    fn weld(&mut self, p: Point2<f64>) -> usize {
        let (cx, cy) = self.cell_of(&p);
        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(ids) = self.grid.get(&(cx + dx, cy + dy)) {
                    if let Some(&id) = ids
                        .iter()
                        .find(|&&id| (self.nodes[id] - p).norm() <= self.tolerance)
                    {
                        return id;
                    }
                }
            }
        }
        let id = self.nodes.len();
        self.nodes.push(p);
        self.grid.entry((cx, cy)).or_default().push(id);
        id
    }
}

fn undirected(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

fn newell_normal(points: &[Point3<f64>]) -> Vector3<f64> {
    let n = points.len();
    let mut normal = Vector3::zeros();
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        normal.x += (a.y - b.y) * (a.z + b.z);
        normal.y += (a.z - b.z) * (a.x + b.x);
        normal.z += (a.x - b.x) * (a.y + b.y);
    }
    normal
}

/// Points where a face boundary crosses the plane, in pairing order.
///
/// Vertices on the plane count as above it, so a face touching the plane
/// at a vertex yields a zero-length segment rather than none.
fn face_crossings(
    points: &[Point3<f64>],
    distances: &[f64],
    on_plane: &[bool],
    axis: &Axis,
    tolerance: f64,
) -> Vec<Point2<f64>> {
    let n = points.len();
    let above = |i: usize| distances[i] >= -tolerance;
    let mut crossings = Vec::new();
    for i in 0..n {
        let j = (i + 1) % n;
        if above(i) == above(j) {
            continue;
        }
        let p = if on_plane[i] {
            points[i]
        } else if on_plane[j] {
            points[j]
        } else {
            let t = distances[i] / (distances[i] - distances[j]);
            points[i] + (points[j] - points[i]) * t
        };
        crossings.push(axis.project(&p));
    }

    if crossings.len() > 2 {
        // Non-convex face: order crossings along the face/plane line.
        let direction = newell_normal(points).cross(&axis.direction.unit());
        let (u, v) = axis.direction.plane_components();
        let line = Vector2::new(direction[u], direction[v]);
        crossings.sort_by(|a, b| a.coords.dot(&line).total_cmp(&b.coords.dot(&line)));
    }
    crossings
}

/// Intersect one body with the plane normal to `axis` at `offset`.
///
/// Returns an empty set when the body does not reach the plane. Open chains
/// are only valid for surface bodies.
pub fn intersect_body(
    snapshot: &BodySnapshot,
    body: BodyId,
    kind: BodyKind,
    axis: &Axis,
    offset: f64,
    tolerance: &Tolerance,
) -> Result<ProfileSet, IntersectionFailureKind> {
    snapshot
        .check()
        .map_err(|reason| IntersectionFailureKind::InvalidGeometry { reason })?;
    if !offset.is_finite() {
        return Err(IntersectionFailureKind::InvalidGeometry {
            reason: format!("section offset {offset} is not finite"),
        });
    }
    let bounds = snapshot.bounds();
    if bounds.is_empty() || !bounds.axis_extent(axis).contains(offset, tolerance.linear) {
        return Ok(ProfileSet::empty(body));
    }

    let lift = |p: &Point2<f64>| -> [f64; 3] {
        let q = axis.lift(p, offset);
        [q.x, q.y, q.z]
    };

    // Without a face lying in the plane or strictly crossing it, the plane
    // only touches the body, whichever side the body is on.
    let mut cuts = false;
    let mut contact: Option<Point3<f64>> = None;
    for face in &snapshot.faces {
        let (mut above, mut below, mut on) = (false, false, 0);
        for &i in face {
            let p = snapshot.vertices[i as usize];
            let d = axis.coordinate(&p) - offset;
            if d > tolerance.linear {
                above = true;
            } else if d < -tolerance.linear {
                below = true;
            } else {
                on += 1;
                contact.get_or_insert(p);
            }
        }
        if (above && below) || on == face.len() {
            cuts = true;
            break;
        }
    }
    if !cuts {
        return match contact {
            Some(p) => Err(IntersectionFailureKind::DegenerateTangency {
                at: [p.x, p.y, p.z],
            }),
            None => Ok(ProfileSet::empty(body)),
        };
    }

    let mut welder = Welder::new(tolerance.weld);
    let mut edges: BTreeSet<(usize, usize)> = BTreeSet::new();
    let mut coplanar: BTreeMap<(usize, usize), usize> = BTreeMap::new();
    let mut touch: Option<Point2<f64>> = None;

    for face in &snapshot.faces {
        let points: Vec<Point3<f64>> = face
            .iter()
            .map(|&i| snapshot.vertices[i as usize])
            .collect();
        let distances: Vec<f64> = points
            .iter()
            .map(|p| axis.coordinate(p) - offset)
            .collect();
        let on_plane: Vec<bool> = distances
            .iter()
            .map(|d| d.abs() <= tolerance.linear)
            .collect();

        if on_plane.iter().all(|&on| on) {
            let n = points.len();
            for i in 0..n {
                let a = welder.weld(axis.project(&points[i]));
                let b = welder.weld(axis.project(&points[(i + 1) % n]));
                if a != b {
                    *coplanar.entry(undirected(a, b)).or_insert(0) += 1;
                }
            }
            continue;
        }

        let crossings = face_crossings(&points, &distances, &on_plane, axis, tolerance.linear);
        for pair in crossings.chunks_exact(2) {
            let a = welder.weld(pair[0]);
            let b = welder.weld(pair[1]);
            if a == b {
                touch.get_or_insert(pair[0]);
            } else {
                edges.insert(undirected(a, b));
            }
        }
    }

    // Edges shared by two coplanar faces are interior to the coplanar region.
    edges.extend(
        coplanar
            .into_iter()
            .filter(|(_, count)| count % 2 == 1)
            .map(|(edge, _)| edge),
    );

    if edges.is_empty() {
        return match touch {
            Some(p) => Err(IntersectionFailureKind::DegenerateTangency { at: lift(&p) }),
            None => Ok(ProfileSet::empty(body)),
        };
    }

    let mut degree = vec![0usize; welder.nodes.len()];
    for &(a, b) in &edges {
        degree[a] += 1;
        degree[b] += 1;
    }
    if let Some(node) = degree.iter().position(|&d| d > 2) {
        return Err(IntersectionFailureKind::NonManifoldJunction {
            at: lift(&welder.nodes[node]),
        });
    }

    let edge_list: Vec<(usize, usize)> = edges.into_iter().collect();
    let mut raw = Vec::new();
    for chain in chain_edges(welder.nodes.len(), &edge_list) {
        let at = lift(&welder.nodes[chain.nodes[0]]);
        if !chain.closed && kind == BodyKind::Solid {
            return Err(IntersectionFailureKind::OpenSolidSection { at });
        }
        let mut points: Vec<Point2<f64>> =
            chain.nodes.iter().map(|&n| welder.nodes[n]).collect();
        remove_collinear(&mut points, chain.closed, tolerance.linear);
        if chain.closed && section_types::signed_area(&points).abs() <= tolerance.area {
            return Err(IntersectionFailureKind::DegenerateTangency { at });
        }
        raw.push((points, chain.closed));
    }

    let loops = classify_loops(raw);
    trace!(%body, offset, loops = loops.len(), "sectioned body");
    Ok(ProfileSet { body, loops })
}
