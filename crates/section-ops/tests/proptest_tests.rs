//! Property-based tests for offset planning and sectioning.

use proptest::prelude::*;

use host_kernel::primitives::make_box;
use section_ops::{intersect_body, plan_offsets};
use section_types::{
    Axis, AxisDirection, AxisInterval, BodyId, BodyKind, DistributionSpec, LoopOrientation,
    Tolerance,
};

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

fn arb_interval() -> impl Strategy<Value = AxisInterval> {
    (-1000.0f64..1000.0, 0.1f64..1000.0).prop_map(|(min, len)| AxisInterval::new(min, min + len))
}

fn arb_direction() -> impl Strategy<Value = AxisDirection> {
    prop_oneof![
        Just(AxisDirection::X),
        Just(AxisDirection::Y),
        Just(AxisDirection::Z)
    ]
}

fn scale_tol(interval: &AxisInterval) -> f64 {
    1e-9 * interval.max.abs().max(interval.min.abs()).max(1.0)
}

// ---------------------------------------------------------------------------
// 1. Count mode: endpoints included, strictly increasing, equal gaps
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn count_mode_spans_interval(interval in arb_interval(), count in 2u32..=100) {
        let offsets = plan_offsets(
            &DistributionSpec::Count { count },
            &interval,
            &Tolerance::default(),
        )
        .unwrap()
        .to_vec();

        prop_assert_eq!(offsets.len(), count as usize);
        prop_assert_eq!(offsets[0], interval.min);
        prop_assert_eq!(*offsets.last().unwrap(), interval.max);

        let gap = interval.length() / f64::from(count - 1);
        for w in offsets.windows(2) {
            prop_assert!(w[1] > w[0], "not increasing: {} then {}", w[0], w[1]);
            prop_assert!(((w[1] - w[0]) - gap).abs() <= 1e3 * scale_tol(&interval),
                "gap {} differs from {}", w[1] - w[0], gap);
        }
    }
}

// ---------------------------------------------------------------------------
// 2. Distance mode: offsets are min + k*d and never pass max
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn distance_mode_steps_from_min(interval in arb_interval(), spacing in 0.1f64..500.0) {
        let offsets = plan_offsets(
            &DistributionSpec::Distance { spacing },
            &interval,
            &Tolerance::default(),
        )
        .unwrap()
        .to_vec();

        prop_assert!(!offsets.is_empty());
        prop_assert_eq!(offsets[0], interval.min);
        for (k, offset) in offsets.iter().enumerate() {
            let expected = interval.min + k as f64 * spacing;
            prop_assert!((offset - expected).abs() <= 1e3 * scale_tol(&interval),
                "offset {} is not min + {}*d = {}", offset, k, expected);
            prop_assert!(*offset <= interval.max);
        }
        // No further whole step fits.
        let next = interval.min + offsets.len() as f64 * spacing;
        prop_assert!(next > interval.max - scale_tol(&interval));
    }
}

// ---------------------------------------------------------------------------
// 3. Planning a plan twice gives the same offsets
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn plan_is_restartable(interval in arb_interval(), count in 1u32..=50) {
        let plan = plan_offsets(
            &DistributionSpec::Count { count },
            &interval,
            &Tolerance::default(),
        )
        .unwrap();
        let first: Vec<f64> = plan.iter().collect();
        let second: Vec<f64> = plan.iter().collect();
        prop_assert_eq!(plan.iter().len(), first.len());
        prop_assert_eq!(first, second);
    }
}

// ---------------------------------------------------------------------------
// 4. Interior box section is one outer loop with the box's cross-section area
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn box_section_area(
        direction in arb_direction(),
        size in (0.5f64..50.0, 0.5f64..50.0, 0.5f64..50.0),
        corner in (-100.0f64..100.0, -100.0f64..100.0, -100.0f64..100.0),
        t in 0.05f64..0.95,
    ) {
        let min = [corner.0, corner.1, corner.2];
        let dims = [size.0, size.1, size.2];
        let max = [min[0] + dims[0], min[1] + dims[1], min[2] + dims[2]];
        let snapshot = make_box(min, max);

        let axis = Axis::through_origin(direction);
        let i = direction.index();
        let offset = min[i] + t * dims[i];
        let set = intersect_body(
            &snapshot,
            BodyId::new(),
            BodyKind::Solid,
            &axis,
            offset,
            &Tolerance::default(),
        )
        .unwrap();

        prop_assert_eq!(set.loops.len(), 1);
        prop_assert_eq!(set.loops[0].orientation, LoopOrientation::Outer);
        let (u, v) = direction.plane_components();
        let expected = dims[u] * dims[v];
        prop_assert!((set.loops[0].signed_area() - expected).abs() <= 1e-9 * expected.max(1.0));
    }
}
