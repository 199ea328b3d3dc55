use serde::{Deserialize, Serialize};

use section_types::BodyId;

/// Handle to a container (component/folder) in the host document.
/// Valid only for the host session that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerHandle(pub u64);

/// Handle to a parametric construction plane in the host document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlaneHandle(pub u64);

/// Handle to a sketch in the host document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SketchHandle(pub u64);

/// Kind of host object, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Container,
    Plane,
    Sketch,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            EntityKind::Container => "container",
            EntityKind::Plane => "plane",
            EntityKind::Sketch => "sketch",
        })
    }
}

/// Errors reported by the host document.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HostError {
    #[error("body not found: {body}")]
    BodyNotFound { body: BodyId },

    #[error("{kind} not found: {id}")]
    EntityNotFound { kind: EntityKind, id: u64 },

    #[error("no transaction is open")]
    NoTransaction,

    #[error("transaction '{label}' is already open")]
    TransactionOpen { label: String },

    #[error("{operation} failed: {reason}")]
    OperationFailed { operation: String, reason: String },
}
