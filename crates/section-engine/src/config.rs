use section_ops::DistributionLimits;
use section_types::Tolerance;
use serde::{Deserialize, Serialize};

use crate::types::EngineError;

/// Engine-wide settings. Every field has a default, so partial JSON is
/// accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tolerance: Tolerance,
    pub limits: DistributionLimits,
    /// Maximum number of worker threads for intersection. 0 or 1 runs
    /// everything on the calling thread.
    pub concurrency_limit: usize,
    /// Minimum vertex count for a loop to be hosted as a circle.
    pub circle_min_points: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::default(),
            limits: DistributionLimits::default(),
            concurrency_limit: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            circle_min_points: 12,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json).map_err(|e| EngineError::Config {
            reason: e.to_string(),
        })
    }

    pub fn to_json_string(&self) -> Result<String, EngineError> {
        serde_json::to_string_pretty(self).map_err(|e| EngineError::Config {
            reason: e.to_string(),
        })
    }

    /// Same settings with intersection forced onto the calling thread.
    pub fn sequential(mut self) -> Self {
        self.concurrency_limit = 1;
        self
    }
}
