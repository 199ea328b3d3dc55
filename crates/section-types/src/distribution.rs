use serde::{Deserialize, Serialize};

/// How section planes are distributed along the axis.
///
/// Exactly one mode is active by construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DistributionSpec {
    /// `count` planes evenly spaced over the extent.
    Count { count: u32 },
    /// Planes every `spacing` units starting at the extent minimum.
    Distance { spacing: f64 },
}

impl DistributionSpec {
    /// Default for distance mode.
    pub fn default_distance() -> Self {
        DistributionSpec::Distance { spacing: 5.0 }
    }

    pub fn mode_name(&self) -> &'static str {
        match self {
            DistributionSpec::Count { .. } => "count",
            DistributionSpec::Distance { .. } => "distance",
        }
    }
}

impl Default for DistributionSpec {
    fn default() -> Self {
        DistributionSpec::Count { count: 6 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_uses_mode_tag() {
        let json = serde_json::to_string(&DistributionSpec::Count { count: 5 }).unwrap();
        assert_eq!(json, r#"{"mode":"count","count":5}"#);
        let back: DistributionSpec =
            serde_json::from_str(r#"{"mode":"distance","spacing":2.5}"#).unwrap();
        assert_eq!(back, DistributionSpec::Distance { spacing: 2.5 });
    }

    #[test]
    fn defaults() {
        assert_eq!(DistributionSpec::default(), DistributionSpec::Count { count: 6 });
        assert_eq!(DistributionSpec::default_distance().mode_name(), "distance");
    }
}
