// src/context/binding.rs

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::errors::{AgentdagError, Result};
use crate::types::UnitId;

/// Static description of how a unit's input is assembled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InputBinding {
    /// Shared-context fields to copy. `None` copies the whole shared context.
    #[serde(default)]
    pub shared: Option<Vec<String>>,

    /// Shared-context fields that must be present (and not null).
    #[serde(default)]
    pub required: Vec<String>,

    /// Input key for a prerequisite's output. Defaults to `<unit>_output`.
    #[serde(default)]
    pub aliases: BTreeMap<UnitId, String>,
}

impl InputBinding {
    pub fn output_key(&self, prerequisite: &str) -> String {
        self.aliases
            .get(prerequisite)
            .cloned()
            .unwrap_or_else(|| format!("{prerequisite}_output"))
    }
}

/// Per-unit bindings supplied by the surrounding system.
#[derive(Debug, Clone, Default)]
pub struct ContextBindings {
    by_unit: HashMap<UnitId, InputBinding>,
}

impl ContextBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, unit: impl Into<UnitId>, binding: InputBinding) {
        self.by_unit.insert(unit.into(), binding);
    }

    /// Binding for `unit`, or the default (whole shared context) if none.
    pub fn get(&self, unit: &str) -> InputBinding {
        self.by_unit.get(unit).cloned().unwrap_or_default()
    }
}

/// Build a unit's input from the shared context and its prerequisites'
/// recorded outputs.
///
/// Pure: the result depends only on the arguments.
pub fn build_unit_input(
    unit: &str,
    shared: &Map<String, Value>,
    upstream: &BTreeMap<UnitId, Value>,
    binding: &InputBinding,
) -> Result<Map<String, Value>> {
    for field in &binding.required {
        match shared.get(field) {
            Some(value) if !value.is_null() => {}
            _ => {
                return Err(AgentdagError::MissingInput {
                    unit: unit.to_string(),
                    field: field.clone(),
                });
            }
        }
    }

    let mut data = match &binding.shared {
        None => shared.clone(),
        Some(fields) => fields
            .iter()
            .filter_map(|f| shared.get(f).map(|v| (f.clone(), v.clone())))
            .collect(),
    };

    for (dep, output) in upstream {
        data.insert(binding.output_key(dep), output.clone());
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shared() -> Map<String, Value> {
        json!({
            "client_info": { "company_name": "Acme" },
            "engagement_details": { "timeline": "6 weeks" },
            "notes": null
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn default_binding_copies_everything() {
        let mut upstream = BTreeMap::new();
        upstream.insert("scope".to_string(), json!("S"));

        let data = build_unit_input("u", &shared(), &upstream, &InputBinding::default()).unwrap();
        assert_eq!(data["client_info"]["company_name"], "Acme");
        assert_eq!(data["scope_output"], "S");
        assert!(data.contains_key("engagement_details"));
    }

    #[test]
    fn selected_fields_and_aliases() {
        let binding = InputBinding {
            shared: Some(vec!["client_info".into(), "absent".into()]),
            required: vec![],
            aliases: BTreeMap::from([("approach".to_string(), "plan".to_string())]),
        };
        let upstream = BTreeMap::from([("approach".to_string(), json!("A"))]);

        let data = build_unit_input("u", &shared(), &upstream, &binding).unwrap();
        let keys: Vec<_> = data.keys().cloned().collect();
        assert_eq!(keys.len(), 2);
        assert_eq!(data["plan"], "A");
        assert!(!data.contains_key("absent"));
        assert!(!data.contains_key("engagement_details"));
    }

    #[test]
    fn missing_or_null_required_field_is_rejected() {
        for field in ["budget", "notes"] {
            let binding = InputBinding {
                required: vec![field.to_string()],
                ..Default::default()
            };
            let err = build_unit_input("pricing", &shared(), &BTreeMap::new(), &binding).unwrap_err();
            match err {
                AgentdagError::MissingInput { unit, field: f } => {
                    assert_eq!(unit, "pricing");
                    assert_eq!(f, field);
                }
                other => panic!("expected MissingInput, got {other:?}"),
            }
        }
    }

    #[test]
    fn bindings_fall_back_to_default() {
        let mut bindings = ContextBindings::new();
        bindings.insert("a", InputBinding {
            required: vec!["x".into()],
            ..Default::default()
        });
        assert_eq!(bindings.get("a").required, vec!["x".to_string()]);
        assert_eq!(bindings.get("b"), InputBinding::default());
    }
}
