use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::axis::{Axis, AxisInterval};

/// Stable identity of a body owned by the host document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyId(pub Uuid);

impl BodyId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BodyId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a body is a closed solid or an open surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyKind {
    Solid,
    Surface,
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Aabb {
    pub fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<f64>>) -> Self {
        let mut bb = Self::empty();
        for p in points {
            bb.expand_to_include(p);
        }
        bb
    }

    pub fn expand_to_include(&mut self, p: &Point3<f64>) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(p[i]);
            self.max[i] = self.max[i].max(p[i]);
        }
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|i| self.min[i] > self.max[i])
    }

    pub fn is_finite(&self) -> bool {
        self.min.iter().chain(self.max.iter()).all(|c| c.is_finite())
    }

    /// Extent of the box projected onto `axis`, in axis coordinates.
    pub fn axis_extent(&self, axis: &Axis) -> AxisInterval {
        AxisInterval::new(axis.coordinate(&self.min), axis.coordinate(&self.max))
    }
}

/// Faceted boundary representation of a body at a point in time.
///
/// Faces are planar polygons given as loops of vertex indices. A closed
/// shell describes a solid; an open shell describes a surface body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BodySnapshot {
    pub vertices: Vec<Point3<f64>>,
    pub faces: Vec<Vec<u32>>,
}

impl BodySnapshot {
    pub fn new(vertices: Vec<Point3<f64>>, faces: Vec<Vec<u32>>) -> Self {
        Self { vertices, faces }
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(&self.vertices)
    }

    /// Vertex positions of one face, in loop order.
    pub fn face_points(&self, face: usize) -> impl Iterator<Item = &Point3<f64>> + '_ {
        self.faces[face]
            .iter()
            .map(move |&i| &self.vertices[i as usize])
    }

    /// Check that every coordinate is finite and every face references at
    /// least three existing vertices.
    pub fn check(&self) -> Result<(), String> {
        if let Some(i) = self
            .vertices
            .iter()
            .position(|p| p.iter().any(|c| !c.is_finite()))
        {
            return Err(format!("vertex {i} has a non-finite coordinate"));
        }
        for (f, face) in self.faces.iter().enumerate() {
            if face.len() < 3 {
                return Err(format!("face {f} has only {} vertices", face.len()));
            }
            if let Some(&bad) = face.iter().find(|&&i| i as usize >= self.vertices.len()) {
                return Err(format!("face {f} references missing vertex {bad}"));
            }
        }
        Ok(())
    }

    /// Copy of this snapshot moved by `delta`.
    pub fn translated(&self, delta: [f64; 3]) -> Self {
        Self {
            vertices: self
                .vertices
                .iter()
                .map(|p| Point3::new(p.x + delta[0], p.y + delta[1], p.z + delta[2]))
                .collect(),
            faces: self.faces.clone(),
        }
    }
}
