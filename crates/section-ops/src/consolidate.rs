use section_types::{
    BodyId, LoopCurve, LoopOrientation, ProfileLoop, ProfileSet, SketchLoop, Tolerance,
};
use serde::{Deserialize, Serialize};

use crate::types::IntersectionFailure;

/// Outcome of sectioning one body with one plane.
pub type UnitOutcome = Result<ProfileSet, IntersectionFailure>;

/// Loops contributed by one body to a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionProfile {
    pub body: BodyId,
    /// Position of the body in the selection.
    pub position: usize,
    pub loops: Vec<SketchLoop>,
}

/// Everything one section sketch will hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedSection {
    pub plane_index: usize,
    pub offset: f64,
    /// Non-empty profiles in body selection order.
    pub profiles: Vec<SectionProfile>,
    pub failures: Vec<IntersectionFailure>,
}

impl ConsolidatedSection {
    pub fn loop_count(&self) -> usize {
        self.profiles.iter().map(|p| p.loops.len()).sum()
    }

    pub fn count(&self, orientation: LoopOrientation) -> usize {
        self.profiles
            .iter()
            .flat_map(|p| &p.loops)
            .filter(|l| l.orientation == orientation)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// Convert a loop to sketch geometry, promoting circular loops to circles.
pub fn to_sketch_loop(
    profile_loop: &ProfileLoop,
    tolerance: &Tolerance,
    circle_min_points: usize,
) -> SketchLoop {
    let curve = match profile_loop.fit_circle(circle_min_points, tolerance.circle_fit) {
        Some(fit) => LoopCurve::Circle {
            center: fit.center,
            radius: fit.radius,
        },
        None => LoopCurve::Polyline {
            points: profile_loop.points.clone(),
            closed: profile_loop.closed,
        },
    };
    SketchLoop {
        curve,
        orientation: profile_loop.orientation,
    }
}

/// Group per-body outcomes for one plane into a single section.
///
/// `results` pairs each outcome with its body's selection position and may
/// arrive in any order. Empty sets and failures contribute no profile.
pub fn consolidate(
    plane_index: usize,
    offset: f64,
    mut results: Vec<(usize, UnitOutcome)>,
    tolerance: &Tolerance,
    circle_min_points: usize,
) -> ConsolidatedSection {
    results.sort_by_key(|(position, _)| *position);
    let mut profiles = Vec::new();
    let mut failures = Vec::new();
    for (position, outcome) in results {
        match outcome {
            Ok(set) if set.is_empty() => {}
            Ok(set) => profiles.push(SectionProfile {
                body: set.body,
                position,
                loops: set
                    .loops
                    .iter()
                    .map(|l| to_sketch_loop(l, tolerance, circle_min_points))
                    .collect(),
            }),
            Err(failure) => failures.push(failure),
        }
    }
    ConsolidatedSection {
        plane_index,
        offset,
        profiles,
        failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IntersectionFailureKind;
    use nalgebra::Point2;

    fn square_set(body: BodyId) -> ProfileSet {
        ProfileSet {
            body,
            loops: vec![ProfileLoop {
                points: vec![
                    Point2::new(0.0, 0.0),
                    Point2::new(1.0, 0.0),
                    Point2::new(1.0, 1.0),
                    Point2::new(0.0, 1.0),
                ],
                closed: true,
                orientation: LoopOrientation::Outer,
            }],
        }
    }

    #[test]
    fn ordered_by_position_not_arrival() {
        let (a, b, c) = (BodyId::new(), BodyId::new(), BodyId::new());
        let failure = IntersectionFailure {
            body: c,
            plane_index: 2,
            offset: 1.0,
            kind: IntersectionFailureKind::DegenerateTangency { at: [0.0; 3] },
        };
        let results = vec![
            (2, Err(failure.clone())),
            (1, Ok(square_set(b))),
            (3, Ok(ProfileSet::empty(BodyId::new()))),
            (0, Ok(square_set(a))),
        ];
        let section = consolidate(2, 1.0, results, &Tolerance::default(), 12);
        let bodies: Vec<BodyId> = section.profiles.iter().map(|p| p.body).collect();
        assert_eq!(bodies, vec![a, b]);
        assert_eq!(section.failures, vec![failure]);
        assert_eq!(section.loop_count(), 2);
        assert!(!section.profiles[0].loops[0].is_circle());
    }

    #[test]
    fn regular_polygon_becomes_circle() {
        let points = (0..16)
            .map(|k| {
                let t = std::f64::consts::TAU * k as f64 / 16.0;
                Point2::new(3.0 + 2.0 * t.cos(), -1.0 + 2.0 * t.sin())
            })
            .collect();
        let l = ProfileLoop {
            points,
            closed: true,
            orientation: LoopOrientation::Hole,
        };
        let s = to_sketch_loop(&l, &Tolerance::default(), 12);
        match s.curve {
            LoopCurve::Circle { center, radius } => {
                assert!((radius - 2.0).abs() < 1e-9);
                assert!((center - Point2::new(3.0, -1.0)).norm() < 1e-9);
            }
            other => panic!("expected circle, got {other:?}"),
        }
        assert_eq!(s.orientation, LoopOrientation::Hole);
    }
}
