use nalgebra::{Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// One of the three canonical construction axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisDirection {
    X,
    Y,
    Z,
}

impl AxisDirection {
    pub const ALL: [AxisDirection; 3] = [AxisDirection::X, AxisDirection::Y, AxisDirection::Z];

    /// Component index of this direction in a 3D point.
    pub fn index(self) -> usize {
        match self {
            AxisDirection::X => 0,
            AxisDirection::Y => 1,
            AxisDirection::Z => 2,
        }
    }

    pub fn unit(self) -> Vector3<f64> {
        match self {
            AxisDirection::X => Vector3::x(),
            AxisDirection::Y => Vector3::y(),
            AxisDirection::Z => Vector3::z(),
        }
    }

    /// Component indices `(u, v)` of the right-handed in-plane frame seen
    /// from the positive end of the axis: X → (Y, Z), Y → (Z, X), Z → (X, Y).
    pub fn plane_components(self) -> (usize, usize) {
        match self {
            AxisDirection::X => (1, 2),
            AxisDirection::Y => (2, 0),
            AxisDirection::Z => (0, 1),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AxisDirection::X => "X",
            AxisDirection::Y => "Y",
            AxisDirection::Z => "Z",
        }
    }
}

impl std::fmt::Display for AxisDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A construction axis: canonical direction plus origin point.
/// Immutable for the lifetime of a generation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub direction: AxisDirection,
    pub origin: Point3<f64>,
}

impl Axis {
    pub fn new(direction: AxisDirection, origin: Point3<f64>) -> Self {
        Self { direction, origin }
    }

    /// Axis through the world origin.
    pub fn through_origin(direction: AxisDirection) -> Self {
        Self::new(direction, Point3::origin())
    }

    /// Coordinate of `p` along the axis, measured from the axis origin.
    pub fn coordinate(&self, p: &Point3<f64>) -> f64 {
        let i = self.direction.index();
        p[i] - self.origin[i]
    }

    /// Project `p` into the 2D frame of a section plane normal to this axis.
    pub fn project(&self, p: &Point3<f64>) -> Point2<f64> {
        let (u, v) = self.direction.plane_components();
        Point2::new(p[u], p[v])
    }

    /// Lift an in-plane point back to 3D on the plane at `offset`.
    pub fn lift(&self, p: &Point2<f64>, offset: f64) -> Point3<f64> {
        let (u, v) = self.direction.plane_components();
        let i = self.direction.index();
        let mut out = Point3::origin();
        out[u] = p.x;
        out[v] = p.y;
        out[i] = self.origin[i] + offset;
        out
    }

    pub fn is_finite(&self) -> bool {
        self.origin.iter().all(|c| c.is_finite())
    }
}

/// A closed scalar interval `[min, max]` along an axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisInterval {
    pub min: f64,
    pub max: f64,
}

impl AxisInterval {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Interval containing a single value.
    pub fn point(value: f64) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    pub fn length(&self) -> f64 {
        self.max - self.min
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) * 0.5
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn contains(&self, value: f64, slack: f64) -> bool {
        value >= self.min - slack && value <= self.max + slack
    }
}
