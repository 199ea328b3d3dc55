use serde::{Deserialize, Serialize};

/// Tolerance configuration for geometric comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerance {
    /// Signed distances smaller than this put a vertex on the section plane.
    pub linear: f64,
    /// Section points closer than this are welded into one loop vertex.
    pub weld: f64,
    /// Relative slack when deciding whether a distance step lands on the
    /// end of the interval.
    pub parametric: f64,
    /// Closed loops with an absolute area below this are degenerate.
    pub area: f64,
    /// Maximum relative radius deviation for a loop to be hosted as a circle.
    pub circle_fit: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            linear: 1e-9,
            weld: 1e-7,
            parametric: 1e-9,
            area: 1e-12,
            circle_fit: 1e-6,
        }
    }
}

impl Tolerance {
    pub fn is_zero_length(&self, length: f64) -> bool {
        length.abs() <= self.linear
    }

    /// Compare two scalars with the linear tolerance.
    pub fn same_value(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.linear
    }
}
