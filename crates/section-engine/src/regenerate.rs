//! Scoped regeneration of stale section sketches.

use std::collections::BTreeMap;

use host_kernel::{HostBundle, SketchHandle};
use section_types::Axis;
use tracing::{debug, info, instrument};

use crate::graph::Node;
use crate::naming;
use crate::pipeline::{run_pipeline, BodyInput, SectionJob};
use crate::types::{
    Change, EngineError, NodeId, PlaneState, RegenerationReport, RunControl, RunId, RunSummary,
    SketchEvent, SketchState,
};
use crate::{finish_transaction, resolve_bodies, Engine, SectionContent};

/// Sketches of one run queued for regeneration.
struct Batch {
    axis: Axis,
    labels: Vec<String>,
    inputs: Vec<BodyInput>,
    sketches: Vec<NodeId>,
    handles: Vec<SketchHandle>,
    jobs: Vec<SectionJob>,
}

fn merge(total: &mut RunSummary, part: RunSummary) {
    total.total_units += part.total_units;
    total.succeeded += part.succeeded;
    total.failed += part.failed;
    total.failures.extend(part.failures);
    total.cancelled |= part.cancelled;
}

impl Engine {
    /// Regenerate everything that depends on `node`, stale or not.
    ///
    /// A sketch node regenerates itself, a plane node its sketch and a body
    /// node every sketch that consumes the body.
    pub fn regenerate(
        &mut self,
        host: &mut dyn HostBundle,
        node: NodeId,
        control: &mut RunControl<'_>,
    ) -> Result<RegenerationReport, EngineError> {
        let targets = match self.graph.node(node) {
            Some(Node::Sketch(_)) => vec![node],
            Some(Node::Plane(_)) => self.graph.plane_sketch(node).into_iter().collect(),
            Some(Node::Body(b)) => self.graph.affected(Change::BodyGeometry(b.body))?,
            None => return Err(EngineError::NodeNotFound { id: node }),
        };
        for &sketch in &targets {
            self.graph.transition(sketch, SketchEvent::Invalidate)?;
        }
        self.regenerate_sketches(host, targets, control)
    }

    /// Regenerate every stale sketch whose plane is active. Failed sketches
    /// are retried as well.
    pub fn regenerate_stale(
        &mut self,
        host: &mut dyn HostBundle,
        control: &mut RunControl<'_>,
    ) -> Result<RegenerationReport, EngineError> {
        let pending = self.graph.pending_sketches();
        self.regenerate_sketches(host, pending, control)
    }

    #[instrument(skip_all, fields(sketches = sketches.len()))]
    fn regenerate_sketches(
        &mut self,
        host: &mut dyn HostBundle,
        sketches: Vec<NodeId>,
        control: &mut RunControl<'_>,
    ) -> Result<RegenerationReport, EngineError> {
        let mut report = RegenerationReport::default();
        let mut by_run: BTreeMap<RunId, Vec<NodeId>> = BTreeMap::new();
        for id in sketches {
            let sketch = self.graph.sketch(id)?;
            if self.graph.plane(sketch.plane)?.state == PlaneState::Suppressed {
                report.skipped.push(id);
                continue;
            }
            by_run.entry(sketch.run).or_default().push(id);
        }
        if by_run.is_empty() {
            return Ok(report);
        }

        // Everything read from the host or the graph is gathered before any
        // state changes, so a failure here leaves nothing to undo.
        let mut batches = Vec::with_capacity(by_run.len());
        for (run, sketches) in by_run {
            let record = self.runs.get(run).ok_or(EngineError::RunNotFound { id: run })?;
            let inputs = resolve_bodies(host.as_query(), &record.bodies)?;
            let mut handles = Vec::with_capacity(sketches.len());
            let mut jobs = Vec::with_capacity(sketches.len());
            for &id in &sketches {
                let sketch = self.graph.sketch(id)?;
                handles.push(sketch.handle);
                jobs.push(SectionJob {
                    index: sketch.index,
                    offset: self.graph.plane(sketch.plane)?.offset,
                });
            }
            batches.push(Batch {
                axis: record.axis,
                labels: record.labels.clone(),
                inputs,
                sketches,
                handles,
                jobs,
            });
        }

        let queued: Vec<NodeId> = batches.iter().flat_map(|b| b.sketches.iter().copied()).collect();
        for &id in &queued {
            if self.graph.sketch(id)?.state == SketchState::Failed {
                self.graph.transition(id, SketchEvent::Invalidate)?;
            }
            self.graph.transition(id, SketchEvent::Begin)?;
        }
        if let Err(e) = host.begin_transaction("Regenerate cross sections") {
            for &id in &queued {
                self.graph.transition(id, SketchEvent::Cancel)?;
            }
            return Err(e.into());
        }

        let config = &self.config;
        let result = (|| -> Result<_, EngineError> {
            let mut written: Vec<(NodeId, SectionContent)> = Vec::new();
            let mut summary = RunSummary::default();
            for batch in &batches {
                let part = run_pipeline(
                    &batch.axis,
                    &batch.inputs,
                    &batch.jobs,
                    config,
                    control,
                    |slot, section| {
                        let profiles = naming::name_profiles(&section, &batch.labels);
                        host.write_sketch_profiles(batch.handles[slot], &profiles)?;
                        let names = profiles.into_iter().map(|p| p.name).collect();
                        written.push((batch.sketches[slot], SectionContent::new(&section, names)));
                        Ok(())
                    },
                )?;
                merge(&mut summary, part);
            }
            Ok((written, summary))
        })();

        let (written, summary) = match finish_transaction(host, result) {
            Ok(done) => done,
            Err(e) => {
                for &id in &queued {
                    self.graph.transition(id, SketchEvent::Cancel)?;
                }
                return Err(e);
            }
        };

        for (id, content) in written {
            let event = if content.failures.is_empty() {
                SketchEvent::Complete
            } else {
                SketchEvent::Fail
            };
            content.apply_to(self.graph.sketch_mut(id)?);
            self.graph.transition(id, event)?;
            report.regenerated.push(id);
        }
        for &id in &queued {
            if !report.regenerated.contains(&id) {
                debug!(?id, "sketch left stale after cancellation");
                self.graph.transition(id, SketchEvent::Cancel)?;
            }
        }

        info!(
            regenerated = report.regenerated.len(),
            skipped = report.skipped.len(),
            failed = summary.failed,
            cancelled = summary.cancelled,
            "regeneration finished"
        );
        report.summary = summary;
        Ok(report)
    }
}
