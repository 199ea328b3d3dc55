//! MockHost: deterministic in-memory host document implementing
//! Document + BodyQuery.
//!
//! Transactions are savepoints of the whole document, so a rollback restores
//! exactly the pre-transaction state. Faults can be injected on any mutating
//! call to exercise rollback paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use section_types::{Aabb, Axis, BodyId, BodyKind, BodySnapshot, NamedProfile};
use tracing::debug;

use crate::traits::{BodyQuery, Document};
use crate::types::*;

/// A body registered with the mock host.
#[derive(Debug, Clone)]
pub struct MockBody {
    pub label: String,
    pub kind: BodyKind,
    pub snapshot: Arc<BodySnapshot>,
    /// Bumped every time the geometry is replaced.
    pub revision: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockContainer {
    pub name: String,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockPlane {
    pub container: ContainerHandle,
    pub axis: Axis,
    pub offset: f64,
    pub name: String,
    pub suppressed: bool,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockSketch {
    pub container: ContainerHandle,
    pub plane: PlaneHandle,
    pub name: String,
    pub profiles: Vec<NamedProfile>,
    /// Number of times the profiles were written.
    pub writes: usize,
}

/// Every object created inside the document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockDocument {
    pub containers: BTreeMap<u64, MockContainer>,
    pub planes: BTreeMap<u64, MockPlane>,
    pub sketches: BTreeMap<u64, MockSketch>,
}

impl MockDocument {
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty() && self.planes.is_empty() && self.sketches.is_empty()
    }
}

/// Mutating host operations, used to target injected faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOp {
    CreateContainer,
    CreatePlane,
    SetPlaneOffset,
    SetPlaneSuppressed,
    SetPlaneVisible,
    DeletePlane,
    CreateSketch,
    WriteSketch,
    DeleteSketch,
}

/// Deterministic test double for the host document.
pub struct MockHost {
    bodies: BTreeMap<BodyId, MockBody>,
    doc: MockDocument,
    savepoint: Option<(String, MockDocument)>,
    next_handle: u64,
    /// (operation, 1-based call number) pairs that fail when reached.
    faults: Vec<(HostOp, usize)>,
    calls: HashMap<HostOp, usize>,
    committed: usize,
    rolled_back: usize,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            bodies: BTreeMap::new(),
            doc: MockDocument::default(),
            savepoint: None,
            next_handle: 1,
            faults: Vec::new(),
            calls: HashMap::new(),
            committed: 0,
            rolled_back: 0,
        }
    }

    /// Register a body and return its identity.
    pub fn add_body(&mut self, label: &str, kind: BodyKind, snapshot: BodySnapshot) -> BodyId {
        let id = BodyId::new();
        self.bodies.insert(
            id,
            MockBody {
                label: label.to_string(),
                kind,
                snapshot: Arc::new(snapshot),
                revision: 0,
            },
        );
        id
    }

    /// Replace a body's geometry, as a user edit upstream of the engine would.
    pub fn replace_body_geometry(
        &mut self,
        body: BodyId,
        snapshot: BodySnapshot,
    ) -> Result<(), HostError> {
        let entry = self
            .bodies
            .get_mut(&body)
            .ok_or(HostError::BodyNotFound { body })?;
        entry.snapshot = Arc::new(snapshot);
        entry.revision += 1;
        Ok(())
    }

    pub fn body(&self, body: BodyId) -> Option<&MockBody> {
        self.bodies.get(&body)
    }

    /// Make the `on_call`-th call (1-based, counted from now) of `op` fail.
    pub fn inject_fault(&mut self, op: HostOp, on_call: usize) {
        let already = self.calls.get(&op).copied().unwrap_or(0);
        self.faults.push((op, already + on_call));
    }

    /// Number of times `op` has been called.
    pub fn call_count(&self, op: HostOp) -> usize {
        self.calls.get(&op).copied().unwrap_or(0)
    }

    pub fn document(&self) -> &MockDocument {
        &self.doc
    }

    pub fn in_transaction(&self) -> bool {
        self.savepoint.is_some()
    }

    pub fn committed_transactions(&self) -> usize {
        self.committed
    }

    pub fn rolled_back_transactions(&self) -> usize {
        self.rolled_back
    }

    pub fn plane(&self, plane: PlaneHandle) -> Option<&MockPlane> {
        self.doc.planes.get(&plane.0)
    }

    pub fn sketch(&self, sketch: SketchHandle) -> Option<&MockSketch> {
        self.doc.sketches.get(&sketch.0)
    }

    pub fn container(&self, container: ContainerHandle) -> Option<&MockContainer> {
        self.doc.containers.get(&container.0)
    }

    pub fn plane_named(&self, name: &str) -> Option<&MockPlane> {
        self.doc.planes.values().find(|p| p.name == name)
    }

    pub fn sketch_named(&self, name: &str) -> Option<&MockSketch> {
        self.doc.sketches.values().find(|s| s.name == name)
    }

    /// Rename a container, as a user might after generation.
    pub fn rename_container(
        &mut self,
        container: ContainerHandle,
        name: &str,
    ) -> Result<(), HostError> {
        let entry = self
            .doc
            .containers
            .get_mut(&container.0)
            .ok_or(HostError::EntityNotFound {
                kind: EntityKind::Container,
                id: container.0,
            })?;
        entry.name = name.to_string();
        Ok(())
    }

    /// Hide or show a container.
    pub fn set_container_visible(
        &mut self,
        container: ContainerHandle,
        visible: bool,
    ) -> Result<(), HostError> {
        let entry = self
            .doc
            .containers
            .get_mut(&container.0)
            .ok_or(HostError::EntityNotFound {
                kind: EntityKind::Container,
                id: container.0,
            })?;
        entry.visible = visible;
        Ok(())
    }

    fn alloc_handle(&mut self) -> u64 {
        let h = self.next_handle;
        self.next_handle += 1;
        h
    }

    /// Count a call of `op` and fail it if a fault is armed for this call.
    fn tick(&mut self, op: HostOp) -> Result<(), HostError> {
        let count = self.calls.entry(op).or_insert(0);
        *count += 1;
        let n = *count;
        if let Some(pos) = self.faults.iter().position(|&(o, at)| o == op && at == n) {
            self.faults.remove(pos);
            return Err(HostError::OperationFailed {
                operation: format!("{op:?}"),
                reason: "injected fault".to_string(),
            });
        }
        Ok(())
    }

    fn lookup_body(&self, body: BodyId) -> Result<&MockBody, HostError> {
        self.bodies.get(&body).ok_or(HostError::BodyNotFound { body })
    }

    fn require_container(&self, container: ContainerHandle) -> Result<(), HostError> {
        if self.doc.containers.contains_key(&container.0) {
            Ok(())
        } else {
            Err(HostError::EntityNotFound {
                kind: EntityKind::Container,
                id: container.0,
            })
        }
    }

    fn plane_mut(&mut self, plane: PlaneHandle) -> Result<&mut MockPlane, HostError> {
        self.doc
            .planes
            .get_mut(&plane.0)
            .ok_or(HostError::EntityNotFound {
                kind: EntityKind::Plane,
                id: plane.0,
            })
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl BodyQuery for MockHost {
    fn body_label(&self, body: BodyId) -> Result<String, HostError> {
        Ok(self.lookup_body(body)?.label.clone())
    }

    fn body_kind(&self, body: BodyId) -> Result<BodyKind, HostError> {
        Ok(self.lookup_body(body)?.kind)
    }

    fn body_bounds(&self, body: BodyId) -> Result<Aabb, HostError> {
        let bounds = self.lookup_body(body)?.snapshot.bounds();
        if bounds.is_empty() {
            return Err(HostError::OperationFailed {
                operation: "body_bounds".to_string(),
                reason: format!("body {body} has no geometry"),
            });
        }
        Ok(bounds)
    }

    fn body_snapshot(&self, body: BodyId) -> Result<Arc<BodySnapshot>, HostError> {
        Ok(Arc::clone(&self.lookup_body(body)?.snapshot))
    }
}

impl Document for MockHost {
    fn begin_transaction(&mut self, label: &str) -> Result<(), HostError> {
        if let Some((open, _)) = &self.savepoint {
            return Err(HostError::TransactionOpen {
                label: open.clone(),
            });
        }
        debug!(label, "mock host: begin transaction");
        self.savepoint = Some((label.to_string(), self.doc.clone()));
        Ok(())
    }

    fn commit_transaction(&mut self) -> Result<(), HostError> {
        let (label, _) = self.savepoint.take().ok_or(HostError::NoTransaction)?;
        debug!(label, "mock host: commit transaction");
        self.committed += 1;
        Ok(())
    }

    fn rollback_transaction(&mut self) -> Result<(), HostError> {
        let (label, saved) = self.savepoint.take().ok_or(HostError::NoTransaction)?;
        debug!(label, "mock host: rollback transaction");
        self.doc = saved;
        self.rolled_back += 1;
        Ok(())
    }

    fn create_container(&mut self, name: &str) -> Result<ContainerHandle, HostError> {
        self.tick(HostOp::CreateContainer)?;
        let h = self.alloc_handle();
        self.doc.containers.insert(
            h,
            MockContainer {
                name: name.to_string(),
                visible: true,
            },
        );
        Ok(ContainerHandle(h))
    }

    fn create_plane(
        &mut self,
        container: ContainerHandle,
        axis: &Axis,
        offset: f64,
        name: &str,
    ) -> Result<PlaneHandle, HostError> {
        self.tick(HostOp::CreatePlane)?;
        self.require_container(container)?;
        let h = self.alloc_handle();
        self.doc.planes.insert(
            h,
            MockPlane {
                container,
                axis: *axis,
                offset,
                name: name.to_string(),
                suppressed: false,
                visible: true,
            },
        );
        Ok(PlaneHandle(h))
    }

    fn set_plane_offset(&mut self, plane: PlaneHandle, offset: f64) -> Result<(), HostError> {
        self.tick(HostOp::SetPlaneOffset)?;
        self.plane_mut(plane)?.offset = offset;
        Ok(())
    }

    fn set_plane_suppressed(
        &mut self,
        plane: PlaneHandle,
        suppressed: bool,
    ) -> Result<(), HostError> {
        self.tick(HostOp::SetPlaneSuppressed)?;
        self.plane_mut(plane)?.suppressed = suppressed;
        Ok(())
    }

    fn set_plane_visible(&mut self, plane: PlaneHandle, visible: bool) -> Result<(), HostError> {
        self.tick(HostOp::SetPlaneVisible)?;
        self.plane_mut(plane)?.visible = visible;
        Ok(())
    }

    fn delete_plane(&mut self, plane: PlaneHandle) -> Result<(), HostError> {
        self.tick(HostOp::DeletePlane)?;
        self.doc
            .planes
            .remove(&plane.0)
            .map(|_| ())
            .ok_or(HostError::EntityNotFound {
                kind: EntityKind::Plane,
                id: plane.0,
            })
    }

    fn create_sketch(
        &mut self,
        container: ContainerHandle,
        plane: PlaneHandle,
        name: &str,
    ) -> Result<SketchHandle, HostError> {
        self.tick(HostOp::CreateSketch)?;
        self.require_container(container)?;
        if !self.doc.planes.contains_key(&plane.0) {
            return Err(HostError::EntityNotFound {
                kind: EntityKind::Plane,
                id: plane.0,
            });
        }
        let h = self.alloc_handle();
        self.doc.sketches.insert(
            h,
            MockSketch {
                container,
                plane,
                name: name.to_string(),
                profiles: Vec::new(),
                writes: 0,
            },
        );
        Ok(SketchHandle(h))
    }

    fn write_sketch_profiles(
        &mut self,
        sketch: SketchHandle,
        profiles: &[NamedProfile],
    ) -> Result<(), HostError> {
        self.tick(HostOp::WriteSketch)?;
        let entry = self
            .doc
            .sketches
            .get_mut(&sketch.0)
            .ok_or(HostError::EntityNotFound {
                kind: EntityKind::Sketch,
                id: sketch.0,
            })?;
        entry.profiles = profiles.to_vec();
        entry.writes += 1;
        Ok(())
    }

    fn delete_sketch(&mut self, sketch: SketchHandle) -> Result<(), HostError> {
        self.tick(HostOp::DeleteSketch)?;
        self.doc
            .sketches
            .remove(&sketch.0)
            .map(|_| ())
            .ok_or(HostError::EntityNotFound {
                kind: EntityKind::Sketch,
                id: sketch.0,
            })
    }
}
