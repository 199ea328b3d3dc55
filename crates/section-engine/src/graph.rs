//! Dependency graph of bodies, section planes and section sketches.
//!
//! Edges point from an input to the sketch that consumes it
//! (Body -> Sketch, Plane -> Sketch) and drive scoped invalidation.

use std::collections::BTreeMap;

use host_kernel::{PlaneHandle, SketchHandle};
use section_ops::IntersectionFailure;
use section_types::BodyId;
use slotmap::{SecondaryMap, SlotMap};

use crate::types::{Change, EngineError, NodeId, PlaneState, RunId, SketchEvent, SketchState};

#[derive(Debug, Clone, PartialEq)]
pub struct BodyNode {
    pub body: BodyId,
    /// Number of geometry changes seen by the engine.
    pub revision: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaneNode {
    pub run: RunId,
    /// 1-based position in the run's offset sequence.
    pub index: usize,
    pub offset: f64,
    pub state: PlaneState,
    pub handle: PlaneHandle,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SketchNode {
    pub run: RunId,
    pub plane: NodeId,
    pub index: usize,
    pub state: SketchState,
    pub handle: SketchHandle,
    pub name: String,
    /// Names of the body profiles written at the last regeneration.
    pub profile_names: Vec<String>,
    pub outer_loops: usize,
    pub hole_loops: usize,
    pub open_loops: usize,
    /// Pairs that failed at the last regeneration.
    pub failures: Vec<IntersectionFailure>,
    /// Number of times the sketch content was written.
    pub generation: u64,
}

impl SketchNode {
    pub fn loop_count(&self) -> usize {
        self.outer_loops + self.hole_loops + self.open_loops
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Body(BodyNode),
    Plane(PlaneNode),
    Sketch(SketchNode),
}

/// Arena DAG with forward and reverse adjacency.
#[derive(Debug, Default)]
pub struct SectionGraph {
    nodes: SlotMap<NodeId, Node>,
    dependents: SecondaryMap<NodeId, Vec<NodeId>>,
    dependencies: SecondaryMap<NodeId, Vec<NodeId>>,
    bodies: BTreeMap<BodyId, NodeId>,
}

impl SectionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    fn insert(&mut self, node: Node) -> NodeId {
        let id = self.nodes.insert(node);
        self.dependents.insert(id, Vec::new());
        self.dependencies.insert(id, Vec::new());
        id
    }

    /// Node for `body`, created on first use.
    pub fn ensure_body(&mut self, body: BodyId) -> NodeId {
        if let Some(&id) = self.bodies.get(&body) {
            return id;
        }
        let id = self.insert(Node::Body(BodyNode { body, revision: 0 }));
        self.bodies.insert(body, id);
        id
    }

    pub fn body_node(&self, body: BodyId) -> Option<NodeId> {
        self.bodies.get(&body).copied()
    }

    pub fn add_plane(&mut self, plane: PlaneNode) -> NodeId {
        self.insert(Node::Plane(plane))
    }

    /// Add a sketch on `sketch.plane` consuming `bodies`.
    pub fn add_sketch(
        &mut self,
        sketch: SketchNode,
        bodies: &[NodeId],
    ) -> Result<NodeId, EngineError> {
        let plane = sketch.plane;
        self.plane(plane)?;
        if self.plane_sketch(plane).is_some() {
            return Err(EngineError::PlaneAlreadyHasSketch { plane });
        }
        let id = self.insert(Node::Sketch(sketch));
        let wired = std::iter::once(plane)
            .chain(bodies.iter().copied())
            .try_for_each(|from| self.add_edge(from, id));
        if let Err(e) = wired {
            self.remove(id);
            return Err(e);
        }
        Ok(id)
    }

    /// Add a dependency edge `from -> to`.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> Result<(), EngineError> {
        for id in [from, to] {
            if !self.nodes.contains_key(id) {
                return Err(EngineError::NodeNotFound { id });
            }
        }
        if from == to || self.reaches(to, from) {
            return Err(EngineError::CycleDetected { from, to });
        }
        if let Some(out) = self.dependents.get_mut(from) {
            if !out.contains(&to) {
                out.push(to);
            }
        }
        if let Some(inc) = self.dependencies.get_mut(to) {
            if !inc.contains(&from) {
                inc.push(from);
            }
        }
        Ok(())
    }

    /// Whether `target` is reachable from `start` along dependent edges.
    fn reaches(&self, start: NodeId, target: NodeId) -> bool {
        let mut stack = vec![start];
        let mut seen = SecondaryMap::<NodeId, ()>::new();
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if seen.insert(id, ()).is_some() {
                continue;
            }
            if let Some(next) = self.dependents.get(id) {
                stack.extend(next.iter().copied());
            }
        }
        false
    }

    /// Remove a node and every edge touching it.
    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(id)?;
        for dep in self.dependents.remove(id).unwrap_or_default() {
            if let Some(inc) = self.dependencies.get_mut(dep) {
                inc.retain(|&n| n != id);
            }
        }
        for src in self.dependencies.remove(id).unwrap_or_default() {
            if let Some(out) = self.dependents.get_mut(src) {
                out.retain(|&n| n != id);
            }
        }
        if let Node::Body(b) = &node {
            self.bodies.remove(&b.body);
        }
        Some(node)
    }

    pub fn dependents(&self, id: NodeId) -> &[NodeId] {
        self.dependents.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn dependencies(&self, id: NodeId) -> &[NodeId] {
        self.dependencies.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn plane(&self, id: NodeId) -> Result<&PlaneNode, EngineError> {
        match self.nodes.get(id) {
            Some(Node::Plane(p)) => Ok(p),
            _ => Err(EngineError::NodeNotFound { id }),
        }
    }

    pub fn plane_mut(&mut self, id: NodeId) -> Result<&mut PlaneNode, EngineError> {
        match self.nodes.get_mut(id) {
            Some(Node::Plane(p)) => Ok(p),
            _ => Err(EngineError::NodeNotFound { id }),
        }
    }

    pub fn sketch(&self, id: NodeId) -> Result<&SketchNode, EngineError> {
        match self.nodes.get(id) {
            Some(Node::Sketch(s)) => Ok(s),
            _ => Err(EngineError::NodeNotFound { id }),
        }
    }

    pub fn sketch_mut(&mut self, id: NodeId) -> Result<&mut SketchNode, EngineError> {
        match self.nodes.get_mut(id) {
            Some(Node::Sketch(s)) => Ok(s),
            _ => Err(EngineError::NodeNotFound { id }),
        }
    }

    pub fn body_mut(&mut self, id: NodeId) -> Result<&mut BodyNode, EngineError> {
        match self.nodes.get_mut(id) {
            Some(Node::Body(b)) => Ok(b),
            _ => Err(EngineError::NodeNotFound { id }),
        }
    }

    /// The sketch hosted by `plane`, if any.
    pub fn plane_sketch(&self, plane: NodeId) -> Option<NodeId> {
        self.dependents(plane)
            .iter()
            .copied()
            .find(|&d| matches!(self.nodes.get(d), Some(Node::Sketch(_))))
    }

    /// Apply a state machine event to a sketch.
    pub fn transition(
        &mut self,
        sketch: NodeId,
        event: SketchEvent,
    ) -> Result<SketchState, EngineError> {
        let node = self.sketch_mut(sketch)?;
        node.state = node.state.apply(event)?;
        Ok(node.state)
    }

    /// Sketches of `run`, ordered by index.
    pub fn run_sketches(&self, run: RunId) -> Vec<NodeId> {
        let mut out: Vec<(usize, NodeId)> = self
            .nodes
            .iter()
            .filter_map(|(id, n)| match n {
                Node::Sketch(s) if s.run == run => Some((s.index, id)),
                _ => None,
            })
            .collect();
        out.sort();
        out.into_iter().map(|(_, id)| id).collect()
    }

    /// Every stale sketch, ordered by run then index.
    pub fn stale_sketches(&self) -> Vec<NodeId> {
        self.sketches_in(&[SketchState::Stale])
    }

    /// Every stale or failed sketch, ordered by run then index.
    pub fn pending_sketches(&self) -> Vec<NodeId> {
        self.sketches_in(&[SketchState::Stale, SketchState::Failed])
    }

    fn sketches_in(&self, states: &[SketchState]) -> Vec<NodeId> {
        let mut out: Vec<(RunId, usize, NodeId)> = self
            .nodes
            .iter()
            .filter_map(|(id, n)| match n {
                Node::Sketch(s) if states.contains(&s.state) => Some((s.run, s.index, id)),
                _ => None,
            })
            .collect();
        out.sort();
        out.into_iter().map(|(_, _, id)| id).collect()
    }

    /// Sketches affected by `change`, without modifying anything.
    pub fn affected(&self, change: Change) -> Result<Vec<NodeId>, EngineError> {
        let sketches = match change {
            Change::PlaneOffset(plane) | Change::PlaneSuppression(plane) => {
                self.plane(plane)?;
                self.plane_sketch(plane).into_iter().collect()
            }
            Change::BodyGeometry(body) => match self.body_node(body) {
                Some(node) => self
                    .dependents(node)
                    .iter()
                    .copied()
                    .filter(|&d| self.sketch(d).is_ok())
                    .collect(),
                None => Vec::new(),
            },
            Change::Distribution(run) => self.run_sketches(run),
        };
        Ok(sketches)
    }

    /// Mark every sketch affected by `change` stale and return them.
    pub fn invalidate(&mut self, change: Change) -> Result<Vec<NodeId>, EngineError> {
        let sketches = self.affected(change)?;
        for &sketch in &sketches {
            self.transition(sketch, SketchEvent::Invalidate)?;
        }
        Ok(sketches)
    }
}
