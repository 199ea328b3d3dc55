use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::body::BodyId;

/// Role of a loop within a cross-section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoopOrientation {
    /// Outer boundary, wound counter-clockwise seen from the positive axis.
    Outer,
    /// Hole boundary, wound clockwise seen from the positive axis.
    Hole,
    /// Open chain (surface bodies, or sections of open shells).
    Open,
}

/// One closed or open polyline of a cross-section, in plane coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileLoop {
    pub points: Vec<Point2<f64>>,
    pub closed: bool,
    pub orientation: LoopOrientation,
}

impl ProfileLoop {
    /// Shoelace area; positive for counter-clockwise loops, zero when open.
    pub fn signed_area(&self) -> f64 {
        if !self.closed {
            return 0.0;
        }
        signed_area(&self.points)
    }

    pub fn perimeter(&self) -> f64 {
        let n = self.points.len();
        if n < 2 {
            return 0.0;
        }
        let mut length: f64 = self
            .points
            .windows(2)
            .map(|w| (w[1] - w[0]).norm())
            .sum();
        if self.closed {
            length += (self.points[0] - self.points[n - 1]).norm();
        }
        length
    }

    /// Even-odd point containment test. Always false for open loops.
    pub fn contains(&self, p: &Point2<f64>) -> bool {
        self.closed && point_in_polygon(&self.points, p)
    }

    /// Recognise loops whose vertices all lie on one circle.
    ///
    /// Requires at least `min_points` vertices and a maximum radius deviation
    /// of `relative_tolerance * radius`.
    pub fn fit_circle(&self, min_points: usize, relative_tolerance: f64) -> Option<CircleFit> {
        if !self.closed || self.points.len() < min_points.max(3) {
            return None;
        }
        let n = self.points.len() as f64;
        let sum = self
            .points
            .iter()
            .fold(nalgebra::Vector2::zeros(), |acc, p| acc + p.coords);
        let center = Point2::from(sum / n);
        let radii: Vec<f64> = self.points.iter().map(|p| (*p - center).norm()).collect();
        let radius = radii.iter().sum::<f64>() / n;
        if radius <= 0.0 {
            return None;
        }
        let deviation = radii
            .iter()
            .map(|r| (r - radius).abs())
            .fold(0.0_f64, f64::max);
        (deviation <= relative_tolerance * radius).then_some(CircleFit { center, radius })
    }
}

/// Shoelace signed area of a closed polygon.
pub fn signed_area(points: &[Point2<f64>]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        twice += a.x * b.y - b.x * a.y;
    }
    twice * 0.5
}

/// Even-odd ray casting containment test.
pub fn point_in_polygon(polygon: &[Point2<f64>], p: &Point2<f64>) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Circle recognised by [`ProfileLoop::fit_circle`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircleFit {
    pub center: Point2<f64>,
    pub radius: f64,
}

/// All loops produced by intersecting one body with one section plane.
/// An empty set means the body does not reach the plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSet {
    pub body: BodyId,
    pub loops: Vec<ProfileLoop>,
}

impl ProfileSet {
    pub fn empty(body: BodyId) -> Self {
        Self {
            body,
            loops: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    pub fn count(&self, orientation: LoopOrientation) -> usize {
        self.loops
            .iter()
            .filter(|l| l.orientation == orientation)
            .count()
    }
}

/// Curve geometry of a loop as hosted by a sketch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LoopCurve {
    Circle { center: Point2<f64>, radius: f64 },
    Polyline { points: Vec<Point2<f64>>, closed: bool },
}

/// A loop ready to be written into a host sketch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SketchLoop {
    pub curve: LoopCurve,
    pub orientation: LoopOrientation,
}

impl SketchLoop {
    pub fn is_circle(&self) -> bool {
        matches!(self.curve, LoopCurve::Circle { .. })
    }
}

/// A body-attributed, named group of loops inside a section sketch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedProfile {
    pub name: String,
    pub body: BodyId,
    pub loops: Vec<SketchLoop>,
}
