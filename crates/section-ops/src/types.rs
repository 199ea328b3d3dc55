use host_kernel::HostError;
use section_types::BodyId;
use serde::{Deserialize, Serialize};

/// Input validation errors. Always raised before any document mutation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("no bodies selected")]
    EmptyBodySet,

    #[error("body {body} is selected more than once")]
    DuplicateBody { body: BodyId },

    #[error("body {body} does not exist in the document")]
    UnknownBody { body: BodyId },

    #[error("bounds of body {body} are not finite")]
    NonFiniteBounds { body: BodyId },

    #[error("section count must be at least 1, got {count}")]
    InvalidCount { count: u32 },

    #[error("spacing must be positive and finite, got {spacing}")]
    InvalidSpacing { spacing: f64 },

    #[error("section count {count} exceeds the maximum of {max}")]
    CountAboveLimit { count: u32, max: u32 },

    #[error("spacing {spacing} is outside the allowed range [{min}, {max}]")]
    SpacingOutOfRange { spacing: f64, min: f64, max: f64 },

    #[error("distribution plans {sections} sections, more than the maximum of {max}")]
    TooManySections { sections: usize, max: usize },

    #[error("offset must be finite, got {offset}")]
    InvalidOffset { offset: f64 },

    #[error("offset {offset} must lie strictly between {lower} and {upper}")]
    OffsetOutOfOrder { offset: f64, lower: f64, upper: f64 },
}

/// Why one body could not be sectioned by one plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum IntersectionFailureKind {
    #[error("plane touches the body tangentially near {at:?}")]
    DegenerateTangency { at: [f64; 3] },

    #[error("section has a non-manifold junction near {at:?}")]
    NonManifoldJunction { at: [f64; 3] },

    #[error("section of a solid body does not close near {at:?}")]
    OpenSolidSection { at: [f64; 3] },

    #[error("invalid body geometry: {reason}")]
    InvalidGeometry { reason: String },
}

/// A recoverable failure for one (body, plane) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("body {body} at section {plane_index} (offset {offset}): {kind}")]
pub struct IntersectionFailure {
    pub body: BodyId,
    /// 1-based index of the section plane in its run.
    pub plane_index: usize,
    pub offset: f64,
    pub kind: IntersectionFailureKind,
}

/// Errors from operations that query the host.
#[derive(Debug, Clone, thiserror::Error)]
pub enum OpError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("host error: {0}")]
    Host(#[from] HostError),
}
