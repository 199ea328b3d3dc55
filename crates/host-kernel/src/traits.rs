use std::sync::Arc;

use section_types::{Aabb, Axis, BodyId, BodyKind, BodySnapshot, NamedProfile};

use crate::types::*;

/// Read-only queries on bodies owned by the host document.
///
/// Snapshots are immutable and shared, so they can be handed to worker
/// threads while the host itself stays on the coordinating thread.
pub trait BodyQuery {
    /// User-visible label of a body (e.g. "Body1").
    fn body_label(&self, body: BodyId) -> Result<String, HostError>;

    /// Whether the body is a solid or a surface.
    fn body_kind(&self, body: BodyId) -> Result<BodyKind, HostError>;

    /// Axis-aligned bounds of the body in world coordinates.
    fn body_bounds(&self, body: BodyId) -> Result<Aabb, HostError>;

    /// Current boundary representation of the body.
    fn body_snapshot(&self, body: BodyId) -> Result<Arc<BodySnapshot>, HostError>;
}

/// Mutating operations on the host document.
///
/// The host is not thread-safe for mutation; every call is made from the
/// coordinating thread, inside a transaction opened with
/// [`Document::begin_transaction`].
pub trait Document {
    /// Open an undoable transaction. Only one may be open at a time.
    fn begin_transaction(&mut self, label: &str) -> Result<(), HostError>;

    /// Commit the open transaction.
    fn commit_transaction(&mut self) -> Result<(), HostError>;

    /// Discard every change made since the open transaction began.
    fn rollback_transaction(&mut self) -> Result<(), HostError>;

    /// Create a named container for generated objects.
    fn create_container(&mut self, name: &str) -> Result<ContainerHandle, HostError>;

    /// Create a construction plane normal to `axis` at an absolute offset
    /// from the axis origin.
    fn create_plane(
        &mut self,
        container: ContainerHandle,
        axis: &Axis,
        offset: f64,
        name: &str,
    ) -> Result<PlaneHandle, HostError>;

    /// Move an existing plane to a new absolute offset.
    fn set_plane_offset(&mut self, plane: PlaneHandle, offset: f64) -> Result<(), HostError>;

    /// Suppress or unsuppress a plane.
    fn set_plane_suppressed(&mut self, plane: PlaneHandle, suppressed: bool)
        -> Result<(), HostError>;

    /// Show or hide a plane.
    fn set_plane_visible(&mut self, plane: PlaneHandle, visible: bool) -> Result<(), HostError>;

    /// Delete a plane.
    fn delete_plane(&mut self, plane: PlaneHandle) -> Result<(), HostError>;

    /// Create an empty sketch on a plane.
    fn create_sketch(
        &mut self,
        container: ContainerHandle,
        plane: PlaneHandle,
        name: &str,
    ) -> Result<SketchHandle, HostError>;

    /// Replace the profile loops hosted by a sketch.
    fn write_sketch_profiles(
        &mut self,
        sketch: SketchHandle,
        profiles: &[NamedProfile],
    ) -> Result<(), HostError>;

    /// Delete a sketch.
    fn delete_sketch(&mut self, sketch: SketchHandle) -> Result<(), HostError>;
}

/// Combined trait for callers that need both mutable document access and
/// read-only body queries on the same object.
pub trait HostBundle: Document + BodyQuery {
    fn as_query(&self) -> &dyn BodyQuery;
}

// Blanket implementation for any type that implements both traits
impl<T: Document + BodyQuery> HostBundle for T {
    fn as_query(&self) -> &dyn BodyQuery {
        self
    }
}
