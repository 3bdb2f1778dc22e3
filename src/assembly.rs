// src/assembly.rs

//! Final artifact assembly.
//!
//! Collects the recorded outputs of completed units, maps them to named
//! sections in a stable order, and runs a quality gate over the result.
//! Rendering the artifact into documents happens outside this crate.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::errors::Result;
use crate::exec::is_empty_output;
use crate::types::UnitId;

/// One section of the final artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub section_id: String,
    pub unit_id: UnitId,
    pub content: Value,
}

/// Assembled output of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifact {
    pub generated_at: DateTime<Utc>,
    pub sections: Vec<Section>,
}

impl Artifact {
    pub fn section(&self, section_id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.section_id == section_id)
    }
}

/// Turns unit outputs into an [`Artifact`].
pub trait Assembler: Send + Sync {
    /// `outputs` holds completed units in registration order.
    fn assemble(&self, outputs: &[(UnitId, Value)]) -> Result<Artifact>;
}

/// Default assembler: one section per mapped unit.
///
/// Sections named in `order` come first, in that order; the remaining ones
/// follow in registration order. With no mappings at all, every unit becomes
/// a section named after itself.
#[derive(Debug, Clone, Default)]
pub struct SectionAssembler {
    sections: HashMap<UnitId, String>,
    order: Vec<String>,
}

impl SectionAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_section(mut self, unit: impl Into<UnitId>, section_id: impl Into<String>) -> Self {
        self.sections.insert(unit.into(), section_id.into());
        self
    }

    pub fn with_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order = order.into_iter().map(Into::into).collect();
        self
    }

    fn section_for(&self, unit: &str) -> Option<String> {
        if self.sections.is_empty() {
            return Some(unit.to_string());
        }
        self.sections.get(unit).cloned()
    }
}

impl Assembler for SectionAssembler {
    fn assemble(&self, outputs: &[(UnitId, Value)]) -> Result<Artifact> {
        let mut sections: Vec<Section> = outputs
            .iter()
            .filter_map(|(unit, content)| {
                self.section_for(unit).map(|section_id| Section {
                    section_id,
                    unit_id: unit.clone(),
                    content: content.clone(),
                })
            })
            .collect();

        // Stable sort keeps registration order among unordered sections.
        sections.sort_by_key(|s| {
            self.order
                .iter()
                .position(|id| *id == s.section_id)
                .unwrap_or(self.order.len())
        });

        info!(sections = sections.len(), "artifact assembled");
        Ok(Artifact {
            generated_at: Utc::now(),
            sections,
        })
    }
}

/// Validates assembled sections.
pub trait QualityGate: Send + Sync {
    fn validate_section(&self, section: &Section) -> bool;

    /// Ids of every rejected section.
    fn rejected(&self, artifact: &Artifact) -> Vec<String> {
        artifact
            .sections
            .iter()
            .filter(|section| {
                let ok = self.validate_section(section);
                if ok {
                    info!(section = %section.section_id, "section passed quality validation");
                } else {
                    warn!(section = %section.section_id, "section failed quality validation");
                }
                !ok
            })
            .map(|section| section.section_id.clone())
            .collect()
    }
}

/// Accepts any section with non-empty content.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonEmptyGate;

impl QualityGate for NonEmptyGate {
    fn validate_section(&self, section: &Section) -> bool {
        !is_empty_output(&section.content)
    }
}
