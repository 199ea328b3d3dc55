pub mod config;
pub mod graph;
pub mod naming;
pub mod pipeline;
pub mod regenerate;
pub mod types;

use std::collections::BTreeSet;

use host_kernel::{
    BodyQuery, ContainerHandle, HostBundle, HostError, PlaneHandle, SketchHandle,
};
use section_ops::{
    aggregate_bounds, plan_within_limits, validate_bodies, validate_spec, ConsolidatedSection,
    ValidationError,
};
use section_types::{Axis, BodyId, DistributionSpec, LoopOrientation};
use slotmap::SlotMap;
use tracing::{info, instrument, warn};

pub use config::EngineConfig;
pub use graph::{BodyNode, Node, PlaneNode, SectionGraph, SketchNode};
pub use types::*;

use crate::naming::NameRegistry;
use crate::pipeline::{run_pipeline, BodyInput, SectionJob};

/// The cross-section engine.
///
/// Plans offsets, sections bodies, writes planes and sketches into the host
/// document and keeps the dependency graph that scopes later regeneration.
/// The engine stores only identifiers and host handles; body geometry is
/// fetched from the host whenever it is needed.
pub struct Engine {
    pub config: EngineConfig,
    graph: SectionGraph,
    runs: SlotMap<RunId, RunRecord>,
    /// Container names this engine has created.
    container_names: BTreeSet<String>,
}

/// A section written to the host but not yet registered in the graph.
struct WrittenSection {
    index: usize,
    offset: f64,
    plane: PlaneHandle,
    sketch: SketchHandle,
    content: SectionContent,
}

/// What a sketch node records about its last regeneration.
pub(crate) struct SectionContent {
    pub profile_names: Vec<String>,
    pub outer_loops: usize,
    pub hole_loops: usize,
    pub open_loops: usize,
    pub failures: Vec<section_ops::IntersectionFailure>,
}

impl SectionContent {
    pub(crate) fn new(section: &ConsolidatedSection, profile_names: Vec<String>) -> Self {
        Self {
            profile_names,
            outer_loops: section.count(LoopOrientation::Outer),
            hole_loops: section.count(LoopOrientation::Hole),
            open_loops: section.count(LoopOrientation::Open),
            failures: section.failures.clone(),
        }
    }

    pub(crate) fn state(&self) -> SketchState {
        if self.failures.is_empty() {
            SketchState::Current
        } else {
            SketchState::Failed
        }
    }

    pub(crate) fn apply_to(self, node: &mut SketchNode) {
        node.profile_names = self.profile_names;
        node.outer_loops = self.outer_loops;
        node.hole_loops = self.hole_loops;
        node.open_loops = self.open_loops;
        node.failures = self.failures;
        node.generation += 1;
    }
}

/// Commit on success, roll back on failure.
pub(crate) fn finish_transaction<T>(
    host: &mut dyn HostBundle,
    result: Result<T, EngineError>,
) -> Result<T, EngineError> {
    let error = match result {
        Ok(value) => match host.commit_transaction() {
            Ok(()) => return Ok(value),
            Err(e) => EngineError::from(e),
        },
        Err(e) => e,
    };
    warn!(%error, "rolling back host transaction");
    if let Err(rollback) = host.rollback_transaction() {
        warn!(error = %rollback, "rollback failed");
    }
    Err(error)
}

fn unknown_body(body: BodyId) -> impl FnOnce(HostError) -> EngineError {
    move |e| match e {
        HostError::BodyNotFound { .. } => ValidationError::UnknownBody { body }.into(),
        other => other.into(),
    }
}

/// Fetch kind and snapshot of every body for the workers.
pub(crate) fn resolve_bodies(
    query: &dyn BodyQuery,
    bodies: &[BodyId],
) -> Result<Vec<BodyInput>, EngineError> {
    bodies
        .iter()
        .map(|&body| {
            Ok(BodyInput {
                body,
                kind: query.body_kind(body).map_err(unknown_body(body))?,
                snapshot: query.body_snapshot(body).map_err(unknown_body(body))?,
            })
        })
        .collect()
}

fn section_jobs(offsets: &[f64]) -> Vec<SectionJob> {
    offsets
        .iter()
        .enumerate()
        .map(|(i, &offset)| SectionJob {
            index: i + 1,
            offset,
        })
        .collect()
}

/// Create one plane/sketch pair and write its profiles.
fn write_section(
    host: &mut dyn HostBundle,
    container: ContainerHandle,
    axis: &Axis,
    index: usize,
    offset: f64,
    hide_planes: bool,
    section: Option<(&ConsolidatedSection, &[String])>,
) -> Result<WrittenSection, EngineError> {
    let plane = host.create_plane(container, axis, offset, &naming::plane_name(index))?;
    if hide_planes {
        host.set_plane_visible(plane, false)?;
    }
    let sketch = host.create_sketch(container, plane, &naming::sketch_name(index))?;
    let content = match section {
        Some((section, labels)) => {
            let profiles = naming::name_profiles(section, labels);
            host.write_sketch_profiles(sketch, &profiles)?;
            SectionContent::new(section, profiles.into_iter().map(|p| p.name).collect())
        }
        None => SectionContent {
            profile_names: Vec::new(),
            outer_loops: 0,
            hole_loops: 0,
            open_loops: 0,
            failures: Vec::new(),
        },
    };
    Ok(WrittenSection {
        index,
        offset,
        plane,
        sketch,
        content,
    })
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            graph: SectionGraph::new(),
            runs: SlotMap::with_key(),
            container_names: BTreeSet::new(),
        }
    }

    pub fn graph(&self) -> &SectionGraph {
        &self.graph
    }

    pub fn run(&self, id: RunId) -> Option<&RunRecord> {
        self.runs.get(id)
    }

    pub fn runs(&self) -> impl Iterator<Item = (RunId, &RunRecord)> {
        self.runs.iter()
    }

    pub fn plane(&self, id: NodeId) -> Result<&PlaneNode, EngineError> {
        self.graph.plane(id)
    }

    pub fn sketch(&self, id: NodeId) -> Result<&SketchNode, EngineError> {
        self.graph.sketch(id)
    }

    /// Offsets a generation would use, without touching the document.
    pub fn plan(
        &self,
        query: &dyn BodyQuery,
        bodies: &[BodyId],
        axis: &Axis,
        spec: &DistributionSpec,
    ) -> Result<Vec<f64>, EngineError> {
        validate_spec(spec, &self.config.limits)?;
        let interval = aggregate_bounds(query, bodies, axis)?;
        let plan = plan_within_limits(
            spec,
            &interval,
            &self.config.tolerance,
            &self.config.limits,
        )?;
        Ok(plan.to_vec())
    }

    /// Generate a full series of sections in one host transaction.
    ///
    /// All validation happens before the document is touched. A host error
    /// rolls the whole run back and leaves the engine unchanged. Cancellation
    /// keeps the sections that were complete when it was observed.
    #[instrument(skip_all, fields(bodies = request.bodies.len(), axis = %request.axis.direction))]
    pub fn generate(
        &mut self,
        host: &mut dyn HostBundle,
        request: &GenerationRequest,
        control: &mut RunControl<'_>,
    ) -> Result<GenerationRun, EngineError> {
        let GenerationRequest {
            bodies,
            axis,
            distribution,
            options,
        } = request;
        validate_bodies(bodies)?;
        validate_spec(distribution, &self.config.limits)?;
        let interval = aggregate_bounds(host.as_query(), bodies, axis)?;
        let offsets = plan_within_limits(
            distribution,
            &interval,
            &self.config.tolerance,
            &self.config.limits,
        )?
        .to_vec();
        info!(
            min = interval.min,
            max = interval.max,
            mode = distribution.mode_name(),
            sections = offsets.len(),
            "planned cross sections"
        );

        let inputs = resolve_bodies(host.as_query(), bodies)?;
        let raw_labels = bodies
            .iter()
            .map(|&b| host.body_label(b).map_err(unknown_body(b)))
            .collect::<Result<Vec<_>, _>>()?;
        let labels = naming::label_table(&raw_labels);
        let container_name = naming::container_name(axis.direction, &self.container_names);

        let mut registry = NameRegistry::new();
        registry.claim(container_name.clone())?;
        for index in 1..=offsets.len() {
            registry.claim_section(index, &labels)?;
        }

        let jobs = section_jobs(&offsets);
        host.begin_transaction("Create cross sections")?;
        let written = (|| -> Result<_, EngineError> {
            let container = host.create_container(&container_name)?;
            let mut written = Vec::new();
            let summary = run_pipeline(
                axis,
                &inputs,
                &jobs,
                &self.config,
                control,
                |_, section| {
                    written.push(write_section(
                        host,
                        container,
                        axis,
                        section.plane_index,
                        section.offset,
                        options.hide_planes,
                        Some((&section, labels.as_slice())),
                    )?);
                    Ok(())
                },
            )?;
            Ok((container, written, summary))
        })();
        let (container, written, summary) = finish_transaction(host, written)?;

        let body_nodes: Vec<NodeId> = bodies.iter().map(|&b| self.graph.ensure_body(b)).collect();
        let run = self.runs.insert(RunRecord {
            bodies: bodies.clone(),
            axis: *axis,
            distribution: *distribution,
            interval,
            container,
            container_name: container_name.clone(),
            labels,
            planes: Vec::new(),
            hide_planes: options.hide_planes,
        });
        let mut sections = Vec::with_capacity(written.len());
        for w in written {
            let record = self.register_section(run, &body_nodes, w)?;
            sections.push(record);
        }
        self.container_names.insert(container_name.clone());

        info!(
            container = %container_name,
            sections = sections.len(),
            failed = summary.failed,
            cancelled = summary.cancelled,
            "cross sections generated"
        );
        Ok(GenerationRun {
            run,
            container,
            container_name,
            offsets,
            sections,
            summary,
        })
    }

    fn register_section(
        &mut self,
        run: RunId,
        body_nodes: &[NodeId],
        written: WrittenSection,
    ) -> Result<SectionRecord, EngineError> {
        let plane_name = naming::plane_name(written.index);
        let sketch_name = naming::sketch_name(written.index);
        let plane = self.graph.add_plane(PlaneNode {
            run,
            index: written.index,
            offset: written.offset,
            state: PlaneState::Active,
            handle: written.plane,
            name: plane_name.clone(),
        });
        let mut node = SketchNode {
            run,
            plane,
            index: written.index,
            state: written.content.state(),
            handle: written.sketch,
            name: sketch_name.clone(),
            profile_names: Vec::new(),
            outer_loops: 0,
            hole_loops: 0,
            open_loops: 0,
            failures: Vec::new(),
            generation: 0,
        };
        written.content.apply_to(&mut node);
        let sketch = self.graph.add_sketch(node, body_nodes)?;
        self.runs
            .get_mut(run)
            .ok_or(EngineError::RunNotFound { id: run })?
            .planes
            .push(plane);
        Ok(SectionRecord {
            index: written.index,
            offset: written.offset,
            plane,
            sketch,
            plane_name,
            sketch_name,
        })
    }

    /// Reject `offset` for `plane` unless it lies strictly between the
    /// nearest active planes of its run.
    fn check_plane_order(&self, plane: NodeId, offset: f64) -> Result<(), EngineError> {
        let node = self.graph.plane(plane)?;
        let run = self
            .runs
            .get(node.run)
            .ok_or(EngineError::RunNotFound { id: node.run })?;
        let mut lower = f64::NEG_INFINITY;
        let mut upper = f64::INFINITY;
        let mut before = true;
        for &id in &run.planes {
            if id == plane {
                before = false;
                continue;
            }
            let other = self.graph.plane(id)?;
            if other.state != PlaneState::Active {
                continue;
            }
            if before {
                lower = other.offset;
            } else {
                upper = upper.min(other.offset);
            }
        }
        if offset <= lower || offset >= upper {
            return Err(ValidationError::OffsetOutOfOrder {
                offset,
                lower,
                upper,
            }
            .into());
        }
        Ok(())
    }

    /// Move one plane. The new offset must keep the run's active planes in
    /// strictly increasing order. Returns the sketches made stale.
    pub fn set_plane_offset(
        &mut self,
        host: &mut dyn HostBundle,
        plane: NodeId,
        offset: f64,
    ) -> Result<Vec<NodeId>, EngineError> {
        if !offset.is_finite() {
            return Err(ValidationError::InvalidOffset { offset }.into());
        }
        self.check_plane_order(plane, offset)?;

        let handle = self.graph.plane(plane)?.handle;
        host.begin_transaction("Move section plane")?;
        let result = host.set_plane_offset(handle, offset).map_err(EngineError::from);
        finish_transaction(host, result)?;

        self.graph.plane_mut(plane)?.offset = offset;
        self.graph.invalidate(Change::PlaneOffset(plane))
    }

    /// Record that a body's geometry changed. Returns the sketches made stale.
    pub fn notify_body_changed(&mut self, body: BodyId) -> Result<Vec<NodeId>, EngineError> {
        if let Some(node) = self.graph.body_node(body) {
            self.graph.body_mut(node)?.revision += 1;
        }
        self.graph.invalidate(Change::BodyGeometry(body))
    }

    /// Suppress or restore a plane. Suppressed planes are skipped by
    /// regeneration; restoring one leaves its sketch stale. A plane can only
    /// be restored while its offset still fits between the active planes.
    pub fn set_plane_suppressed(
        &mut self,
        host: &mut dyn HostBundle,
        plane: NodeId,
        suppressed: bool,
    ) -> Result<Vec<NodeId>, EngineError> {
        let node = self.graph.plane(plane)?;
        let (handle, offset) = (node.handle, node.offset);
        if !suppressed {
            self.check_plane_order(plane, offset)?;
        }
        host.begin_transaction("Suppress section plane")?;
        let result = host
            .set_plane_suppressed(handle, suppressed)
            .map_err(EngineError::from);
        finish_transaction(host, result)?;

        self.graph.plane_mut(plane)?.state = if suppressed {
            PlaneState::Suppressed
        } else {
            PlaneState::Active
        };
        self.graph.invalidate(Change::PlaneSuppression(plane))
    }

    /// Delete a plane and its sketch.
    pub fn delete_plane(&mut self, host: &mut dyn HostBundle, plane: NodeId) -> Result<(), EngineError> {
        let node = self.graph.plane(plane)?;
        let (handle, run) = (node.handle, node.run);
        let sketch = self.graph.plane_sketch(plane);
        let sketch_handle = sketch
            .map(|s| self.graph.sketch(s).map(|n| n.handle))
            .transpose()?;

        host.begin_transaction("Delete section plane")?;
        let result = (|| -> Result<(), EngineError> {
            if let Some(h) = sketch_handle {
                host.delete_sketch(h)?;
            }
            host.delete_plane(handle)?;
            Ok(())
        })();
        finish_transaction(host, result)?;

        if let Some(s) = sketch {
            self.graph.remove(s);
        }
        self.graph.remove(plane);
        if let Some(record) = self.runs.get_mut(run) {
            record.planes.retain(|&p| p != plane);
        }
        Ok(())
    }

    /// Replace a run's distribution.
    ///
    /// Existing planes are moved to the new offsets in order, missing planes
    /// are created with empty stale sketches and surplus planes are
    /// suppressed. Every sketch of the run is left stale.
    #[instrument(skip(self, host))]
    pub fn set_distribution(
        &mut self,
        host: &mut dyn HostBundle,
        run: RunId,
        spec: DistributionSpec,
    ) -> Result<Vec<NodeId>, EngineError> {
        validate_spec(&spec, &self.config.limits)?;
        let record = self
            .runs
            .get(run)
            .ok_or(EngineError::RunNotFound { id: run })?;
        let interval = aggregate_bounds(host.as_query(), &record.bodies, &record.axis)?;
        let offsets = plan_within_limits(
            &spec,
            &interval,
            &self.config.tolerance,
            &self.config.limits,
        )?
        .to_vec();

        let existing = record
            .planes
            .iter()
            .map(|&id| self.graph.plane(id).map(|p| (id, p.index, p.handle, p.state)))
            .collect::<Result<Vec<_>, _>>()?;
        let next_index = existing.iter().map(|e| e.1).max().unwrap_or(0) + 1;
        let new_indices: Vec<usize> =
            (next_index..).take(offsets.len().saturating_sub(existing.len())).collect();

        let mut registry = NameRegistry::new();
        for index in existing.iter().map(|e| e.1).chain(new_indices.iter().copied()) {
            registry.claim_section(index, &record.labels)?;
        }

        let (container, axis, hide_planes) = (record.container, record.axis, record.hide_planes);
        host.begin_transaction("Edit cross section distribution")?;
        let result = (|| -> Result<Vec<WrittenSection>, EngineError> {
            for (k, &(_, _, handle, state)) in existing.iter().enumerate() {
                match offsets.get(k) {
                    Some(&offset) => {
                        host.set_plane_offset(handle, offset)?;
                        if state == PlaneState::Suppressed {
                            host.set_plane_suppressed(handle, false)?;
                        }
                    }
                    None if state == PlaneState::Active => {
                        host.set_plane_suppressed(handle, true)?;
                    }
                    None => {}
                }
            }
            new_indices
                .iter()
                .zip(offsets.iter().skip(existing.len()))
                .map(|(&index, &offset)| {
                    write_section(host, container, &axis, index, offset, hide_planes, None)
                })
                .collect::<Result<Vec<_>, EngineError>>()
        })();
        let created = finish_transaction(host, result)?;

        for (k, &(id, ..)) in existing.iter().enumerate() {
            let node = self.graph.plane_mut(id)?;
            match offsets.get(k) {
                Some(&offset) => {
                    node.offset = offset;
                    node.state = PlaneState::Active;
                }
                None => node.state = PlaneState::Suppressed,
            }
        }
        let body_nodes: Vec<NodeId> = self
            .runs
            .get(run)
            .map(|r| r.bodies.clone())
            .unwrap_or_default()
            .into_iter()
            .map(|b| self.graph.ensure_body(b))
            .collect();
        for w in created {
            let record = self.register_section(run, &body_nodes, w)?;
            let node = self.graph.sketch_mut(record.sketch)?;
            node.state = SketchState::Stale;
            node.generation = 0;
        }
        if let Some(record) = self.runs.get_mut(run) {
            record.distribution = spec;
            record.interval = interval;
        }
        info!(sections = offsets.len(), "distribution updated");
        self.graph.invalidate(Change::Distribution(run))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
