pub mod bounds;
pub mod consolidate;
pub mod distribution;
pub mod intersect;
pub mod loops;
pub mod types;

pub use bounds::{aggregate_bounds, aggregate_extents, validate_bodies};
pub use consolidate::{consolidate, ConsolidatedSection, SectionProfile, UnitOutcome};
pub use distribution::{
    plan_offsets, plan_within_limits, validate_spec, DistributionLimits, OffsetIter, OffsetPlan,
};
pub use intersect::intersect_body;
pub use types::*;
