//! Bounded-parallel intersection with a single committing coordinator.
//!
//! Work is split into (section, body) units. Workers on a rayon pool only
//! read shared snapshots and send outcomes back over a channel; the calling
//! thread consumes them, reports progress, watches for cancellation and
//! hands complete sections to the commit callback in ascending order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

use section_ops::{
    consolidate, intersect_body, ConsolidatedSection, IntersectionFailure, UnitOutcome,
};
use section_types::{Axis, BodyId, BodyKind, BodySnapshot, Tolerance};
use tracing::{debug, instrument, warn};

use crate::config::EngineConfig;
use crate::types::{EngineError, RunControl, RunSummary};

/// A body as seen by workers.
#[derive(Debug, Clone)]
pub struct BodyInput {
    pub body: BodyId,
    pub kind: BodyKind,
    pub snapshot: Arc<BodySnapshot>,
}

/// One section to compute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionJob {
    /// 1-based plane index.
    pub index: usize,
    pub offset: f64,
}

fn run_unit(axis: &Axis, tolerance: &Tolerance, body: &BodyInput, job: &SectionJob) -> UnitOutcome {
    intersect_body(&body.snapshot, body.body, body.kind, axis, job.offset, tolerance).map_err(
        |kind| IntersectionFailure {
            body: body.body,
            plane_index: job.index,
            offset: job.offset,
            kind,
        },
    )
}

/// Buffers unit outcomes until their section is complete.
struct Collector<'a> {
    jobs: &'a [SectionJob],
    body_count: usize,
    pending: Vec<Vec<(usize, UnitOutcome)>>,
    committed: Vec<bool>,
    next: usize,
    tolerance: Tolerance,
    circle_min_points: usize,
    failures: Vec<(usize, usize, IntersectionFailure)>,
    succeeded: usize,
}

impl<'a> Collector<'a> {
    fn new(jobs: &'a [SectionJob], body_count: usize, config: &EngineConfig) -> Self {
        Self {
            jobs,
            body_count,
            pending: vec![Vec::new(); jobs.len()],
            committed: vec![false; jobs.len()],
            next: 0,
            tolerance: config.tolerance,
            circle_min_points: config.circle_min_points,
            failures: Vec::new(),
            succeeded: 0,
        }
    }

    fn push(&mut self, slot: usize, position: usize, outcome: UnitOutcome) {
        match &outcome {
            Ok(_) => self.succeeded += 1,
            Err(failure) => {
                warn!(%failure, "section unit failed");
                self.failures.push((slot, position, failure.clone()));
            }
        }
        self.pending[slot].push((position, outcome));
    }

    fn is_complete(&self, slot: usize) -> bool {
        !self.committed[slot] && self.pending[slot].len() == self.body_count
    }

    fn commit_slot<F>(&mut self, slot: usize, commit: &mut F) -> Result<(), EngineError>
    where
        F: FnMut(usize, ConsolidatedSection) -> Result<(), EngineError>,
    {
        let job = self.jobs[slot];
        let results = std::mem::take(&mut self.pending[slot]);
        let section = consolidate(
            job.index,
            job.offset,
            results,
            &self.tolerance,
            self.circle_min_points,
        );
        debug!(
            index = job.index,
            offset = job.offset,
            profiles = section.profiles.len(),
            failures = section.failures.len(),
            "section complete"
        );
        self.committed[slot] = true;
        commit(slot, section)
    }

    /// Commit the contiguous run of complete sections starting at `next`.
    fn flush_in_order<F>(&mut self, commit: &mut F) -> Result<(), EngineError>
    where
        F: FnMut(usize, ConsolidatedSection) -> Result<(), EngineError>,
    {
        while self.next < self.jobs.len() && self.is_complete(self.next) {
            self.commit_slot(self.next, commit)?;
            self.next += 1;
        }
        Ok(())
    }

    /// Commit every complete section, gaps allowed. Used on cancellation.
    fn flush_complete<F>(&mut self, commit: &mut F) -> Result<(), EngineError>
    where
        F: FnMut(usize, ConsolidatedSection) -> Result<(), EngineError>,
    {
        for slot in self.next..self.jobs.len() {
            if self.is_complete(slot) {
                self.commit_slot(slot, commit)?;
            }
        }
        Ok(())
    }

    fn summary(mut self, total_units: usize, cancelled: bool) -> RunSummary {
        self.failures.sort_by_key(|(slot, position, _)| (*slot, *position));
        RunSummary {
            total_units,
            succeeded: self.succeeded,
            failed: self.failures.len(),
            failures: self.failures.into_iter().map(|(_, _, f)| f).collect(),
            cancelled,
        }
    }
}

/// Section every body with every job's plane.
///
/// `commit(slot, section)` is called on the calling thread, once per
/// completed section, in ascending slot order. An error from `commit`
/// stops the pipeline and is returned as is.
#[instrument(skip_all, fields(bodies = bodies.len(), sections = jobs.len()))]
pub fn run_pipeline<F>(
    axis: &Axis,
    bodies: &[BodyInput],
    jobs: &[SectionJob],
    config: &EngineConfig,
    control: &mut RunControl<'_>,
    mut commit: F,
) -> Result<RunSummary, EngineError>
where
    F: FnMut(usize, ConsolidatedSection) -> Result<(), EngineError>,
{
    let total = bodies.len() * jobs.len();
    let mut collector = Collector::new(jobs, bodies.len(), config);
    let mut completed = 0;
    let mut cancelled = false;

    if config.concurrency_limit <= 1 {
        'units: for (slot, job) in jobs.iter().enumerate() {
            for (position, body) in bodies.iter().enumerate() {
                if control.is_cancelled() {
                    cancelled = true;
                    break 'units;
                }
                let outcome = run_unit(axis, &config.tolerance, body, job);
                collector.push(slot, position, outcome);
                completed += 1;
                control.report(completed, total);
                collector.flush_in_order(&mut commit)?;
            }
        }
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.concurrency_limit)
            .build()
            .map_err(|e| EngineError::WorkerPool {
                reason: e.to_string(),
            })?;
        let abort = AtomicBool::new(false);
        let cancel = control.cancel.clone();
        let tolerance = config.tolerance;

        pool.in_place_scope(|scope| -> Result<(), EngineError> {
            let (tx, rx) = mpsc::channel::<(usize, usize, UnitOutcome)>();
            for (slot, job) in jobs.iter().enumerate() {
                for (position, body) in bodies.iter().enumerate() {
                    let tx = tx.clone();
                    let cancel = cancel.clone();
                    let abort = &abort;
                    let tolerance = &tolerance;
                    scope.spawn(move |_| {
                        if cancel.is_cancelled() || abort.load(Ordering::SeqCst) {
                            return;
                        }
                        let outcome = run_unit(axis, tolerance, body, job);
                        // The coordinator may have stopped listening.
                        let _ = tx.send((slot, position, outcome));
                    });
                }
            }
            drop(tx);

            for (slot, position, outcome) in rx.iter() {
                collector.push(slot, position, outcome);
                completed += 1;
                control.report(completed, total);
                if let Err(e) = collector.flush_in_order(&mut commit) {
                    abort.store(true, Ordering::SeqCst);
                    return Err(e);
                }
                if completed < total && control.is_cancelled() {
                    cancelled = true;
                    break;
                }
            }
            Ok(())
        })?;
    }

    // Workers skip units once cancellation is observed.
    cancelled |= completed < total;
    if cancelled {
        collector.flush_complete(&mut commit)?;
        debug!(completed, total, "pipeline cancelled");
    }
    Ok(collector.summary(total, cancelled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use host_kernel::primitives::{make_box, make_pyramid};
    use section_types::AxisDirection;

    fn inputs() -> Vec<BodyInput> {
        vec![
            BodyInput {
                body: BodyId::new(),
                kind: BodyKind::Solid,
                snapshot: Arc::new(make_box([0.0; 3], [1.0, 1.0, 4.0])),
            },
            BodyInput {
                body: BodyId::new(),
                kind: BodyKind::Solid,
                snapshot: Arc::new(make_pyramid(AxisDirection::Z, [3.0, 0.0, 0.0], 1.0, 2.0)),
            },
        ]
    }

    fn jobs() -> Vec<SectionJob> {
        [0.0, 1.0, 2.0, 3.0, 4.0]
            .iter()
            .enumerate()
            .map(|(i, &offset)| SectionJob {
                index: i + 1,
                offset,
            })
            .collect()
    }

    fn run(limit: usize) -> (Vec<(usize, ConsolidatedSection)>, RunSummary, Vec<(usize, usize)>) {
        let config = EngineConfig {
            concurrency_limit: limit,
            ..EngineConfig::default()
        };
        let mut progress = Vec::new();
        let mut committed = Vec::new();
        let summary = {
            let mut control = RunControl::new().with_progress(|done, total| progress.push((done, total)));
            run_pipeline(
                &Axis::through_origin(AxisDirection::Z),
                &inputs(),
                &jobs(),
                &config,
                &mut control,
                |slot, section| {
                    committed.push((slot, section));
                    Ok(())
                },
            )
            .unwrap()
        };
        (committed, summary, progress)
    }

    #[test]
    fn sequential_and_parallel_agree_on_shape() {
        for limit in [1, 4] {
            let (committed, summary, progress) = run(limit);
            let slots: Vec<usize> = committed.iter().map(|(s, _)| *s).collect();
            assert_eq!(slots, vec![0, 1, 2, 3, 4], "limit {limit}");
            assert_eq!(summary.total_units, 10);
            // Pyramid apex at z = 2 touches the plane tangentially.
            assert_eq!(summary.failed, 1);
            assert_eq!(summary.succeeded, 9);
            assert_eq!(summary.failures[0].plane_index, 3);
            assert!(!summary.cancelled);
            assert_eq!(progress.len(), 10);
            assert_eq!(progress.last(), Some(&(10, 10)));
            // Box only reaches z = 4; pyramid reaches z = 0..2.
            assert_eq!(committed[0].1.profiles.len(), 2);
            assert_eq!(committed[2].1.profiles.len(), 1);
            assert_eq!(committed[4].1.profiles.len(), 1);
        }
    }

    #[test]
    fn commit_error_stops_pipeline() {
        let config = EngineConfig::default().sequential();
        let mut calls = 0;
        let err = run_pipeline(
            &Axis::through_origin(AxisDirection::Z),
            &inputs(),
            &jobs(),
            &config,
            &mut RunControl::new(),
            |_, _| {
                calls += 1;
                Err(EngineError::WorkerPool {
                    reason: "boom".into(),
                })
            },
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::WorkerPool { .. }));
        assert_eq!(calls, 1);
    }

    #[test]
    fn cancel_before_start_commits_nothing() {
        let config = EngineConfig::default().sequential();
        let token = crate::types::CancellationToken::new();
        token.cancel();
        let mut control = RunControl::new().with_cancel(token);
        let summary = run_pipeline(
            &Axis::through_origin(AxisDirection::Z),
            &inputs(),
            &jobs(),
            &config,
            &mut control,
            |_, _| panic!("nothing should commit"),
        )
        .unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.succeeded, 0);
    }
}
