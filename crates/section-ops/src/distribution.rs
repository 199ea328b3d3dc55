use section_types::{AxisInterval, DistributionSpec, Tolerance};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::ValidationError;

/// Bounds on user-supplied distribution parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionLimits {
    pub max_count: u32,
    pub min_spacing: f64,
    pub max_spacing: f64,
    /// Upper bound on the planned offsets in either mode.
    pub max_sections: usize,
}

impl Default for DistributionLimits {
    fn default() -> Self {
        Self {
            max_count: 100,
            min_spacing: 0.1,
            max_spacing: 1000.0,
            max_sections: 1000,
        }
    }
}

/// Structural checks that hold regardless of configured limits.
fn check_spec(spec: &DistributionSpec) -> Result<(), ValidationError> {
    match *spec {
        DistributionSpec::Count { count } if count < 1 => {
            Err(ValidationError::InvalidCount { count })
        }
        DistributionSpec::Distance { spacing } if !spacing.is_finite() || spacing <= 0.0 => {
            Err(ValidationError::InvalidSpacing { spacing })
        }
        _ => Ok(()),
    }
}

/// Validate a distribution against structural rules and `limits`.
pub fn validate_spec(
    spec: &DistributionSpec,
    limits: &DistributionLimits,
) -> Result<(), ValidationError> {
    check_spec(spec)?;
    match *spec {
        DistributionSpec::Count { count } if count > limits.max_count => {
            Err(ValidationError::CountAboveLimit {
                count,
                max: limits.max_count,
            })
        }
        DistributionSpec::Distance { spacing }
            if spacing < limits.min_spacing || spacing > limits.max_spacing =>
        {
            Err(ValidationError::SpacingOutOfRange {
                spacing,
                min: limits.min_spacing,
                max: limits.max_spacing,
            })
        }
        _ => Ok(()),
    }
}

/// A finite arithmetic sequence of section offsets.
///
/// The plan is a few scalars; offsets are produced lazily by [`OffsetPlan::iter`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetPlan {
    start: f64,
    step: f64,
    len: usize,
    /// Replaces the computed last offset, so endpoints land exactly.
    last: Option<f64>,
}

impl OffsetPlan {
    fn single(at: f64) -> Self {
        Self {
            start: at,
            step: 0.0,
            len: 1,
            last: None,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Offset at position `i` (0-based), if any.
    pub fn get(&self, i: usize) -> Option<f64> {
        if i >= self.len {
            return None;
        }
        match self.last {
            Some(last) if i + 1 == self.len => Some(last),
            _ => Some(self.start + i as f64 * self.step),
        }
    }

    pub fn iter(&self) -> OffsetIter {
        OffsetIter {
            plan: *self,
            next: 0,
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.iter().collect()
    }
}

impl IntoIterator for OffsetPlan {
    type Item = f64;
    type IntoIter = OffsetIter;

    fn into_iter(self) -> OffsetIter {
        self.iter()
    }
}

/// Lazy iterator over an [`OffsetPlan`].
#[derive(Debug, Clone)]
pub struct OffsetIter {
    plan: OffsetPlan,
    next: usize,
}

impl Iterator for OffsetIter {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        let value = self.plan.get(self.next)?;
        self.next += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.plan.len - self.next.min(self.plan.len);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for OffsetIter {}

/// Plan the section offsets over `interval`.
///
/// Count mode spaces N offsets evenly with both ends included (the midpoint
/// when N is 1). Distance mode steps from `min` while the offset stays within
/// `max`; a step landing on `max` within tolerance is snapped to it and a
/// trailing partial step is dropped. A zero-length interval always yields a
/// single offset at `min`.
pub fn plan_offsets(
    spec: &DistributionSpec,
    interval: &AxisInterval,
    tolerance: &Tolerance,
) -> Result<OffsetPlan, ValidationError> {
    check_spec(spec)?;
    let length = interval.length();
    if tolerance.is_zero_length(length) {
        debug!(min = interval.min, "degenerate interval, single offset");
        return Ok(OffsetPlan::single(interval.min));
    }

    let plan = match *spec {
        DistributionSpec::Count { count: 1 } => OffsetPlan::single(interval.midpoint()),
        DistributionSpec::Count { count } => OffsetPlan {
            start: interval.min,
            step: length / f64::from(count - 1),
            len: count as usize,
            last: Some(interval.max),
        },
        DistributionSpec::Distance { spacing } => {
            let steps = (length / spacing + tolerance.parametric).floor();
            let end = interval.min + steps * spacing;
            let lands_on_max =
                (end - interval.max).abs() <= tolerance.parametric * spacing + tolerance.linear;
            OffsetPlan {
                start: interval.min,
                step: spacing,
                len: (steps as usize).saturating_add(1),
                last: lands_on_max.then_some(interval.max),
            }
        }
    };
    debug!(
        mode = spec.mode_name(),
        offsets = plan.len(),
        min = interval.min,
        max = interval.max,
        "planned offsets"
    );
    Ok(plan)
}

/// Validate `spec`, plan it and reject plans with more than
/// `limits.max_sections` offsets.
pub fn plan_within_limits(
    spec: &DistributionSpec,
    interval: &AxisInterval,
    tolerance: &Tolerance,
    limits: &DistributionLimits,
) -> Result<OffsetPlan, ValidationError> {
    validate_spec(spec, limits)?;
    let plan = plan_offsets(spec, interval, tolerance)?;
    if plan.len() > limits.max_sections {
        return Err(ValidationError::TooManySections {
            sections: plan.len(),
            max: limits.max_sections,
        });
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn plan(spec: DistributionSpec, min: f64, max: f64) -> Vec<f64> {
        plan_offsets(&spec, &AxisInterval::new(min, max), &Tolerance::default())
            .unwrap()
            .to_vec()
    }

    #[test]
    fn count_includes_both_ends() {
        let v = plan(DistributionSpec::Count { count: 5 }, 0.0, 10.0);
        assert_eq!(v, vec![0.0, 2.5, 5.0, 7.5, 10.0]);
    }

    #[test]
    fn count_one_is_midpoint() {
        assert_eq!(plan(DistributionSpec::Count { count: 1 }, 2.0, 6.0), vec![4.0]);
    }

    #[test]
    fn distance_lands_on_max() {
        let v = plan(DistributionSpec::Distance { spacing: 5.0 }, 0.0, 10.0);
        assert_eq!(v, vec![0.0, 5.0, 10.0]);
    }

    #[test]
    fn distance_drops_partial_step() {
        let v = plan(DistributionSpec::Distance { spacing: 3.0 }, 0.0, 10.0);
        assert_eq!(v, vec![0.0, 3.0, 6.0, 9.0]);
    }

    #[test]
    fn distance_snaps_rounding_error_to_max() {
        let v = plan(DistributionSpec::Distance { spacing: 0.1 }, 0.0, 0.3);
        assert_eq!(v.len(), 4);
        assert_eq!(*v.last().unwrap(), 0.3);
        assert_abs_diff_eq!(v[1], 0.1, epsilon = 1e-12);
    }

    #[test]
    fn spacing_longer_than_extent_gives_min_only() {
        assert_eq!(
            plan(DistributionSpec::Distance { spacing: 50.0 }, 1.0, 10.0),
            vec![1.0]
        );
    }

    #[test]
    fn degenerate_interval_single_offset() {
        assert_eq!(plan(DistributionSpec::Count { count: 7 }, 3.0, 3.0), vec![3.0]);
        assert_eq!(
            plan(DistributionSpec::Distance { spacing: 1.0 }, 3.0, 3.0),
            vec![3.0]
        );
    }

    #[test]
    fn invalid_specs_rejected_even_for_degenerate_interval() {
        let tol = Tolerance::default();
        let point = AxisInterval::point(0.0);
        assert_eq!(
            plan_offsets(&DistributionSpec::Count { count: 0 }, &point, &tol),
            Err(ValidationError::InvalidCount { count: 0 })
        );
        assert!(matches!(
            plan_offsets(&DistributionSpec::Distance { spacing: f64::NAN }, &point, &tol),
            Err(ValidationError::InvalidSpacing { .. })
        ));
        assert_eq!(
            plan_offsets(&DistributionSpec::Distance { spacing: -1.0 }, &point, &tol),
            Err(ValidationError::InvalidSpacing { spacing: -1.0 })
        );
    }

    #[test]
    fn limits() {
        let limits = DistributionLimits::default();
        assert!(validate_spec(&DistributionSpec::Count { count: 100 }, &limits).is_ok());
        assert_eq!(
            validate_spec(&DistributionSpec::Count { count: 101 }, &limits),
            Err(ValidationError::CountAboveLimit { count: 101, max: 100 })
        );
        assert!(matches!(
            validate_spec(&DistributionSpec::Distance { spacing: 0.05 }, &limits),
            Err(ValidationError::SpacingOutOfRange { .. })
        ));
        assert!(matches!(
            validate_spec(&DistributionSpec::Distance { spacing: 0.0 }, &limits),
            Err(ValidationError::InvalidSpacing { .. })
        ));
    }

    #[test]
    fn distance_plans_are_capped() {
        let limits = DistributionLimits::default();
        let tol = Tolerance::default();
        let spec = DistributionSpec::Distance { spacing: 0.1 };
        let within = |max: f64| plan_within_limits(&spec, &AxisInterval::new(0.0, max), &tol, &limits);

        assert!(matches!(
            within(1.0e6),
            Err(ValidationError::TooManySections { max: 1000, .. })
        ));
        // 0.0, 0.1, ..., 100.0 is one offset too many.
        assert_eq!(
            within(100.0),
            Err(ValidationError::TooManySections {
                sections: 1001,
                max: 1000
            })
        );
        assert_eq!(within(99.95).unwrap().len(), 1000);
    }

    #[test]
    fn iterator_is_exact_and_restartable() {
        let p = plan_offsets(
            &DistributionSpec::Count { count: 4 },
            &AxisInterval::new(0.0, 3.0),
            &Tolerance::default(),
        )
        .unwrap();
        let mut it = p.iter();
        assert_eq!(it.len(), 4);
        it.next();
        assert_eq!(it.len(), 3);
        assert_eq!(p.iter().collect::<Vec<_>>(), vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(p.get(4), None);
    }
}
