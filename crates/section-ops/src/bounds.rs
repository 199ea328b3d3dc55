use std::collections::BTreeSet;

use host_kernel::{BodyQuery, HostError};
use section_types::{Aabb, Axis, AxisInterval, BodyId};
use tracing::debug;

use crate::types::{OpError, ValidationError};

/// Reject an empty selection or a body selected twice.
pub fn validate_bodies(bodies: &[BodyId]) -> Result<(), ValidationError> {
    if bodies.is_empty() {
        return Err(ValidationError::EmptyBodySet);
    }
    let mut seen = BTreeSet::new();
    for &body in bodies {
        if !seen.insert(body) {
            return Err(ValidationError::DuplicateBody { body });
        }
    }
    Ok(())
}

/// Union of the bodies' extents along `axis`, in axis coordinates.
///
/// A body of zero extent is valid and yields `min == max`.
pub fn aggregate_extents(
    boxes: &[(BodyId, Aabb)],
    axis: &Axis,
) -> Result<AxisInterval, ValidationError> {
    let ids: Vec<BodyId> = boxes.iter().map(|(id, _)| *id).collect();
    validate_bodies(&ids)?;

    let mut total: Option<AxisInterval> = None;
    for (body, bb) in boxes {
        if bb.is_empty() || !bb.is_finite() || !axis.is_finite() {
            return Err(ValidationError::NonFiniteBounds { body: *body });
        }
        let extent = bb.axis_extent(axis);
        total = Some(match total {
            Some(acc) => acc.union(&extent),
            None => extent,
        });
    }
    total.ok_or(ValidationError::EmptyBodySet)
}

/// Fetch every body's bounds from the host and aggregate them.
pub fn aggregate_bounds(
    query: &dyn BodyQuery,
    bodies: &[BodyId],
    axis: &Axis,
) -> Result<AxisInterval, OpError> {
    validate_bodies(bodies)?;
    let boxes = bodies
        .iter()
        .map(|&body| match query.body_bounds(body) {
            Ok(bb) => Ok((body, bb)),
            Err(HostError::BodyNotFound { .. }) => {
                Err(OpError::from(ValidationError::UnknownBody { body }))
            }
            Err(e) => Err(OpError::from(e)),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let interval = aggregate_extents(&boxes, axis)?;
    debug!(
        bodies = bodies.len(),
        min = interval.min,
        max = interval.max,
        axis = %axis.direction,
        "aggregated body extents"
    );
    Ok(interval)
}
