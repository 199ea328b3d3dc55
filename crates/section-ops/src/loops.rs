//! Segment chaining and loop classification for planar sections.
//!
//! Input is a set of undirected edges between welded nodes where every node
//! has degree one or two. Output loops are deterministic: outer boundaries
//! wind counter-clockwise, holes clockwise, and each loop starts at its
//! lexicographically smallest vertex.

use std::cmp::Ordering;

use nalgebra::Point2;
use section_types::{point_in_polygon, signed_area, LoopOrientation, ProfileLoop};

/// A walk over welded nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    pub nodes: Vec<usize>,
    pub closed: bool,
}

/// Chain edges into maximal walks.
///
/// Open chains are walked first, each starting from its lowest degree-1
/// node; remaining edges form cycles. Assumes no node has degree above two.
pub fn chain_edges(node_count: usize, edges: &[(usize, usize)]) -> Vec<Chain> {
    let mut incident: Vec<Vec<usize>> = vec![Vec::new(); node_count];
    for (e, &(a, b)) in edges.iter().enumerate() {
        incident[a].push(e);
        incident[b].push(e);
    }
    let mut used = vec![false; edges.len()];

    let walk = |start: usize, used: &mut Vec<bool>| -> Vec<usize> {
        let mut nodes = vec![start];
        let mut current = start;
        while let Some(&e) = incident[current].iter().find(|&&e| !used[e]) {
            used[e] = true;
            let (a, b) = edges[e];
            current = if a == current { b } else { a };
            nodes.push(current);
        }
        nodes
    };

    let mut chains = Vec::new();
    for node in 0..node_count {
        if incident[node].len() == 1 && !used[incident[node][0]] {
            chains.push(Chain {
                nodes: walk(node, &mut used),
                closed: false,
            });
        }
    }
    for e in 0..edges.len() {
        if used[e] {
            continue;
        }
        let mut nodes = walk(edges[e].0, &mut used);
        if nodes.len() > 1 && nodes.first() == nodes.last() {
            nodes.pop();
        }
        chains.push(Chain {
            nodes,
            closed: true,
        });
    }
    chains
}

/// Remove vertices lying on the segment between their neighbours.
pub fn remove_collinear(points: &mut Vec<Point2<f64>>, closed: bool, tolerance: f64) {
    let min_len = if closed { 3 } else { 2 };
    loop {
        let n = points.len();
        if n <= min_len {
            return;
        }
        let candidates = if closed { 0..n } else { 1..n - 1 };
        let redundant = candidates.into_iter().find(|&i| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            is_between(&prev, &points[i], &next, tolerance)
        });
        match redundant {
            Some(i) => {
                points.remove(i);
            }
            None => return,
        }
    }
}

fn is_between(a: &Point2<f64>, p: &Point2<f64>, b: &Point2<f64>, tolerance: f64) -> bool {
    let ab = b - a;
    let len = ab.norm();
    if len <= tolerance {
        return false;
    }
    let ap = p - a;
    let distance = (ab.x * ap.y - ab.y * ap.x).abs() / len;
    let along = ap.dot(&ab);
    distance <= tolerance && along > 0.0 && along < len * len
}

fn lex(a: &Point2<f64>, b: &Point2<f64>) -> Ordering {
    a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y))
}

fn smallest_index(points: &[Point2<f64>]) -> usize {
    points
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| lex(a, b))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Assign orientations by nesting depth, fix winding and canonicalise order.
///
/// A closed loop inside an even number of other closed loops is an outer
/// boundary; inside an odd number, a hole.
pub fn classify_loops(raw: Vec<(Vec<Point2<f64>>, bool)>) -> Vec<ProfileLoop> {
    let depths: Vec<usize> = raw
        .iter()
        .enumerate()
        .map(|(i, (points, closed))| {
            if !closed || points.is_empty() {
                return 0;
            }
            raw.iter()
                .enumerate()
                .filter(|(j, (other, other_closed))| {
                    *j != i && *other_closed && point_in_polygon(other, &points[0])
                })
                .count()
        })
        .collect();

    let mut loops: Vec<ProfileLoop> = raw
        .into_iter()
        .zip(depths)
        .filter(|((points, _), _)| !points.is_empty())
        .map(|((mut points, closed), depth)| {
            let orientation = match (closed, depth % 2) {
                (false, _) => LoopOrientation::Open,
                (true, 0) => LoopOrientation::Outer,
                (true, _) => LoopOrientation::Hole,
            };
            canonicalise(&mut points, orientation);
            ProfileLoop {
                points,
                closed,
                orientation,
            }
        })
        .collect();

    loops.sort_by(|a, b| lex(&a.points[0], &b.points[0]));
    loops
}

/// Fix winding for closed loops and choose a deterministic start vertex.
///
/// Closed loops start at their smallest vertex; open chains run from the
/// smaller endpoint. Either way `points[0]` is the loop's sort key.
fn canonicalise(points: &mut Vec<Point2<f64>>, orientation: LoopOrientation) {
    match orientation {
        LoopOrientation::Open => {
            if let (Some(first), Some(last)) = (points.first(), points.last()) {
                if lex(last, first) == Ordering::Less {
                    points.reverse();
                }
            }
        }
        LoopOrientation::Outer | LoopOrientation::Hole => {
            let area = signed_area(points);
            let wants_ccw = orientation == LoopOrientation::Outer;
            if (area > 0.0) != wants_ccw {
                points.reverse();
            }
            let start = smallest_index(points);
            points.rotate_left(start);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point2<f64> {
        Point2::new(x, y)
    }

    fn square(x0: f64, y0: f64, size: f64) -> Vec<Point2<f64>> {
        vec![
            p(x0, y0),
            p(x0 + size, y0),
            p(x0 + size, y0 + size),
            p(x0, y0 + size),
        ]
    }

    #[test]
    fn chains_open_before_closed() {
        // triangle 0-1-2 and a path 3-4-5
        let edges = [(0, 1), (1, 2), (2, 0), (4, 5), (3, 4)];
        let chains = chain_edges(6, &edges);
        assert_eq!(chains.len(), 2);
        assert_eq!(
            chains[0],
            Chain {
                nodes: vec![3, 4, 5],
                closed: false
            }
        );
        assert!(chains[1].closed);
        assert_eq!(chains[1].nodes.len(), 3);
    }

    #[test]
    fn collinear_points_removed() {
        let mut pts = vec![p(0.0, 0.0), p(1.0, 0.0), p(2.0, 0.0), p(2.0, 2.0), p(0.0, 2.0)];
        remove_collinear(&mut pts, true, 1e-9);
        assert_eq!(pts.len(), 4);
        assert!(!pts.contains(&p(1.0, 0.0)));

        let mut open = vec![p(0.0, 0.0), p(1.0, 1.0), p(2.0, 2.0)];
        remove_collinear(&mut open, false, 1e-9);
        assert_eq!(open, vec![p(0.0, 0.0), p(2.0, 2.0)]);
    }

    #[test]
    fn nested_squares_alternate_orientation() {
        let mut outer = square(0.0, 0.0, 10.0);
        outer.reverse();
        let raw = vec![
            (square(2.0, 2.0, 6.0), true),
            (outer, true),
            (square(4.0, 4.0, 2.0), true),
        ];
        let loops = classify_loops(raw);
        assert_eq!(loops.len(), 3);
        assert_eq!(loops[0].orientation, LoopOrientation::Outer);
        assert_eq!(loops[0].points[0], p(0.0, 0.0));
        assert!(loops[0].signed_area() > 0.0);
        assert_eq!(loops[1].orientation, LoopOrientation::Hole);
        assert!(loops[1].signed_area() < 0.0);
        assert_eq!(loops[2].orientation, LoopOrientation::Outer);
        assert_eq!(loops[2].signed_area(), 4.0);
    }

    #[test]
    fn open_chain_starts_at_smaller_end() {
        let loops = classify_loops(vec![(vec![p(3.0, 0.0), p(1.0, 1.0), p(0.0, 0.0)], false)]);
        assert_eq!(loops[0].orientation, LoopOrientation::Open);
        assert_eq!(loops[0].points[0], p(0.0, 0.0));
        assert!(!loops[0].closed);
    }
}
