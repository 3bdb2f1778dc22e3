// src/exec/template.rs

//! `template` units: render a string from `{path.to.field}` placeholders.

use std::sync::Arc;

use anyhow::anyhow;
use regex::Regex;
use serde_json::Value;

use crate::context::UnitInput;
use crate::errors::{AgentdagError, Result};
use crate::exec::{UnitCallback, UnitResult, unit_fn};

const PLACEHOLDER: &str = r"\{([A-Za-z0-9_\-]+(?:\.[A-Za-z0-9_\-]+)*)\}";

/// A compiled output template.
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
    pattern: Regex,
}

impl Template {
    pub fn new(source: impl Into<String>) -> Result<Self> {
        let pattern = Regex::new(PLACEHOLDER)
            .map_err(|e| AgentdagError::ConfigError(format!("invalid placeholder pattern: {e}")))?;
        Ok(Self {
            source: source.into(),
            pattern,
        })
    }

    /// Placeholder paths in order of appearance.
    pub fn placeholders(&self) -> Vec<&str> {
        self.pattern
            .captures_iter(&self.source)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect()
    }

    /// Substitute every placeholder from `input`. Fails on the first path
    /// that does not resolve.
    pub fn render(&self, input: &UnitInput) -> anyhow::Result<String> {
        let mut out = String::with_capacity(self.source.len());
        let mut last = 0;

        for caps in self.pattern.captures_iter(&self.source) {
            let (Some(whole), Some(path)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let value = resolve(&input.data, path.as_str()).ok_or_else(|| {
                anyhow!("template placeholder '{}' not found in input", path.as_str())
            })?;

            out.push_str(&self.source[last..whole.start()]);
            match value {
                Value::String(s) => out.push_str(s),
                other => out.push_str(&other.to_string()),
            }
            last = whole.end();
        }

        out.push_str(&self.source[last..]);
        Ok(out)
    }
}

fn resolve<'a>(data: &'a serde_json::Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = data.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Build a callback that renders `template` against the unit's input.
pub fn template_unit(template: Template) -> UnitCallback {
    let template = Arc::new(template);
    unit_fn(move |input| {
        let template = Arc::clone(&template);
        async move {
            let rendered = template.render(&input)?;
            Ok::<_, anyhow::Error>(UnitResult::new(rendered))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn input(data: Value) -> UnitInput {
        UnitInput {
            unit_id: "t".to_string(),
            data: data.as_object().cloned().unwrap(),
            upstream: BTreeMap::new(),
        }
    }

    #[test]
    fn renders_nested_paths_and_non_strings() {
        let t = Template::new("{client.name} needs {weeks} weeks: {goals.1}").unwrap();
        let rendered = t
            .render(&input(json!({
                "client": {"name": "Acme"},
                "weeks": 6,
                "goals": ["speed", "cost"]
            })))
            .unwrap();
        assert_eq!(rendered, "Acme needs 6 weeks: cost");
    }

    #[test]
    fn missing_placeholder_is_an_error() {
        let t = Template::new("L:{mid_output}").unwrap();
        let err = t.render(&input(json!({}))).unwrap_err();
        assert!(err.to_string().contains("mid_output"));
    }

    #[test]
    fn lists_placeholders() {
        let t = Template::new("{a} and {b.c} but not {not a path}").unwrap();
        assert_eq!(t.placeholders(), vec!["a", "b.c"]);
    }
}
