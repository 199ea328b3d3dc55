//! Deterministic names for everything a run creates.
//!
//! Names depend only on the body label table and the 1-based section index,
//! so regenerating a section re-derives exactly the names it had.

use std::collections::BTreeSet;

use section_ops::ConsolidatedSection;
use section_types::{AxisDirection, NamedProfile};

use crate::types::EngineError;

pub fn plane_name(index: usize) -> String {
    format!("Section_Plane_{index:03}")
}

pub fn sketch_name(index: usize) -> String {
    format!("Section_Sketch_{index:03}")
}

pub fn profile_name(label: &str, index: usize) -> String {
    format!("{label}_Section_{index:03}")
}

/// Container name for `axis`, suffixed when the engine already used it.
pub fn container_name(axis: AxisDirection, used: &BTreeSet<String>) -> String {
    let base = format!("Cross_Sections_{}", axis.label());
    if !used.contains(&base) {
        return base;
    }
    (2..)
        .map(|n| format!("{base}_{n:03}"))
        .find(|name| !used.contains(name))
        .unwrap_or(base)
}

/// Turn raw host labels into unique, non-empty labels in selection order.
///
/// Labels are trimmed; an empty label becomes `Body{n}` (1-based position);
/// repeats become `Label_2`, `Label_3`, ...
pub fn label_table(raw: &[String]) -> Vec<String> {
    let mut taken: BTreeSet<String> = BTreeSet::new();
    let mut out = Vec::with_capacity(raw.len());
    for (position, label) in raw.iter().enumerate() {
        let trimmed = label.trim();
        let base = if trimmed.is_empty() {
            format!("Body{}", position + 1)
        } else {
            trimmed.to_string()
        };
        let unique = if taken.contains(&base) {
            (2..)
                .map(|n| format!("{base}_{n}"))
                .find(|candidate| !taken.contains(candidate))
                .unwrap_or_else(|| base.clone())
        } else {
            base
        };
        taken.insert(unique.clone());
        out.push(unique);
    }
    out
}

/// Names claimed by one operation. Claiming a name twice is an internal
/// invariant violation.
#[derive(Debug, Default)]
pub struct NameRegistry {
    names: BTreeSet<String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&mut self, name: impl Into<String>) -> Result<(), EngineError> {
        let name = name.into();
        if self.names.contains(&name) {
            return Err(EngineError::NamingCollision { name });
        }
        self.names.insert(name);
        Ok(())
    }

    /// Claim the plane, sketch and per-body profile names of one section.
    pub fn claim_section(&mut self, index: usize, labels: &[String]) -> Result<(), EngineError> {
        self.claim(plane_name(index))?;
        self.claim(sketch_name(index))?;
        for label in labels {
            self.claim(profile_name(label, index))?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Attach body-qualified names to a consolidated section's profiles.
pub fn name_profiles(section: &ConsolidatedSection, labels: &[String]) -> Vec<NamedProfile> {
    section
        .profiles
        .iter()
        .map(|p| {
            let label = labels
                .get(p.position)
                .cloned()
                .unwrap_or_else(|| format!("Body{}", p.position + 1));
            NamedProfile {
                name: profile_name(&label, section.plane_index),
                body: p.body,
                loops: p.loops.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn zero_padded_names() {
        assert_eq!(plane_name(1), "Section_Plane_001");
        assert_eq!(sketch_name(12), "Section_Sketch_012");
        assert_eq!(profile_name("Body1", 3), "Body1_Section_003");
        assert_eq!(plane_name(1000), "Section_Plane_1000");
    }

    #[test]
    fn container_suffix_when_used() {
        let mut used = BTreeSet::new();
        assert_eq!(container_name(AxisDirection::Z, &used), "Cross_Sections_Z");
        used.insert("Cross_Sections_Z".to_string());
        assert_eq!(container_name(AxisDirection::Z, &used), "Cross_Sections_Z_002");
        used.insert("Cross_Sections_Z_002".to_string());
        assert_eq!(container_name(AxisDirection::Z, &used), "Cross_Sections_Z_003");
        assert_eq!(container_name(AxisDirection::X, &used), "Cross_Sections_X");
    }

    #[test]
    fn labels_trimmed_defaulted_and_unique() {
        let labels = label_table(&strings(&["  Shaft ", "", "Shaft", "Shaft", "Shaft_2"]));
        assert_eq!(
            labels,
            strings(&["Shaft", "Body2", "Shaft_2", "Shaft_3", "Shaft_2_2"])
        );
    }

    #[test]
    fn registry_rejects_duplicates() {
        let mut reg = NameRegistry::new();
        reg.claim_section(1, &strings(&["A", "B"])).unwrap();
        assert_eq!(reg.len(), 4);
        assert!(matches!(
            reg.claim("A_Section_001"),
            Err(EngineError::NamingCollision { name }) if name == "A_Section_001"
        ));
    }
}
