use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use host_kernel::{ContainerHandle, HostError};
use section_ops::{IntersectionFailure, OpError, ValidationError};
use section_types::{Axis, AxisInterval, BodyId, DistributionSpec};
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// A body, plane or sketch in the dependency graph.
    pub struct NodeId;
    /// A generation run.
    pub struct RunId;
}

/// Regeneration state of a section sketch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SketchState {
    Stale,
    Regenerating,
    Current,
    Failed,
}

/// Events driving [`SketchState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SketchEvent {
    Begin,
    Complete,
    Fail,
    Invalidate,
    Cancel,
}

impl SketchState {
    /// Apply `event`, rejecting transitions the state machine does not allow.
    pub fn apply(self, event: SketchEvent) -> Result<SketchState, EngineError> {
        use SketchEvent::*;
        use SketchState::*;
        match (self, event) {
            (Stale, Begin) => Ok(Regenerating),
            (Regenerating, Complete) => Ok(Current),
            (Regenerating, Fail) => Ok(Failed),
            (Regenerating, Cancel) => Ok(Stale),
            (Stale | Current | Failed, Invalidate) => Ok(Stale),
            (from, event) => Err(EngineError::InvalidTransition { from, event }),
        }
    }
}

/// Whether a section plane takes part in regeneration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaneState {
    Active,
    Suppressed,
}

/// An edit that makes cached sections out of date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// A plane moved; only its sketch is affected.
    PlaneOffset(NodeId),
    /// A body's geometry changed; every sketch consuming it is affected.
    BodyGeometry(BodyId),
    /// A run's distribution changed; every sketch of the run is affected.
    Distribution(RunId),
    /// A plane was suppressed or unsuppressed.
    PlaneSuppression(NodeId),
}

/// Shared cancellation flag, checked by the coordinator after every unit
/// and by workers before starting one.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress reporting and cancellation for one engine call.
#[derive(Default)]
pub struct RunControl<'a> {
    pub cancel: CancellationToken,
    progress: Option<Box<dyn FnMut(usize, usize) + 'a>>,
}

impl<'a> RunControl<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Receive `(completed_units, total_units)` after every unit.
    pub fn with_progress(mut self, progress: impl FnMut(usize, usize) + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    pub(crate) fn report(&mut self, completed: usize, total: usize) {
        if let Some(progress) = self.progress.as_mut() {
            progress(completed, total);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Flags of a generation request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Create the section planes hidden.
    pub hide_planes: bool,
}

/// Everything needed to generate one series of sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Bodies in selection order.
    pub bodies: Vec<BodyId>,
    pub axis: Axis,
    pub distribution: DistributionSpec,
    #[serde(default)]
    pub options: GenerateOptions,
}

/// Unit counts and failures of one pipeline pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_units: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Ordered by plane index, then body selection position.
    pub failures: Vec<IntersectionFailure>,
    pub cancelled: bool,
}

/// One committed plane/sketch pair of a generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionRecord {
    pub index: usize,
    pub offset: f64,
    pub plane: NodeId,
    pub sketch: NodeId,
    pub plane_name: String,
    pub sketch_name: String,
}

/// Result of [`crate::Engine::generate`].
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRun {
    pub run: RunId,
    pub container: ContainerHandle,
    pub container_name: String,
    /// The full planned offset sequence.
    pub offsets: Vec<f64>,
    /// Committed sections in ascending index. Shorter than `offsets` only
    /// when the run was cancelled.
    pub sections: Vec<SectionRecord>,
    pub summary: RunSummary,
}

/// Result of a regeneration pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegenerationReport {
    /// Sketches whose content was rewritten.
    pub regenerated: Vec<NodeId>,
    /// Stale or failed sketches left alone because their plane is suppressed.
    pub skipped: Vec<NodeId>,
    pub summary: RunSummary,
}

/// Engine-side record of a generation run.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub bodies: Vec<BodyId>,
    pub axis: Axis,
    pub distribution: DistributionSpec,
    pub interval: AxisInterval,
    pub container: ContainerHandle,
    pub container_name: String,
    /// Unique body labels, parallel to `bodies`.
    pub labels: Vec<String>,
    /// Plane nodes in offset order.
    pub planes: Vec<NodeId>,
    pub hide_planes: bool,
}

/// Errors from the section engine.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("geometry kernel error: {0}")]
    GeometryKernel(#[from] HostError),

    #[error("name '{name}' is already taken")]
    NamingCollision { name: String },

    #[error("node not found: {id:?}")]
    NodeNotFound { id: NodeId },

    #[error("run not found: {id:?}")]
    RunNotFound { id: RunId },

    #[error("invalid sketch transition from {from:?} on {event:?}")]
    InvalidTransition { from: SketchState, event: SketchEvent },

    #[error("edge {from:?} -> {to:?} would create a cycle")]
    CycleDetected { from: NodeId, to: NodeId },

    #[error("plane {plane:?} already has a sketch")]
    PlaneAlreadyHasSketch { plane: NodeId },

    #[error("worker pool error: {reason}")]
    WorkerPool { reason: String },

    #[error("invalid configuration: {reason}")]
    Config { reason: String },
}

impl From<OpError> for EngineError {
    fn from(e: OpError) -> Self {
        match e {
            OpError::Validation(v) => EngineError::Validation(v),
            OpError::Host(h) => EngineError::GeometryKernel(h),
        }
    }
}
