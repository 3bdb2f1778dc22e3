// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::context::InputBinding;
use crate::errors::{AgentdagError, Result};
use crate::exec::{Template, UnitCallback, command_unit, template_unit};

/// Pipeline file as deserialized from TOML, before validation.
///
/// ```toml
/// [config]
/// max_in_flight = 4
///
/// [assembly]
/// order = ["scope", "approach"]
///
/// [unit.scope]
/// template = "Scope for {client_info.company_name}"
/// shared = ["client_info"]
/// required = ["client_info"]
/// section = "scope"
///
/// [unit.approach]
/// cmd = "./approach.sh"
/// after = ["scope"]
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawPipelineConfig {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub assembly: AssemblySection,

    /// All units from `[unit.<name>]`, keyed by unit id.
    #[serde(default)]
    pub unit: BTreeMap<String, UnitConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigSection {
    /// Upper bound on concurrently executing units; unbounded if absent.
    #[serde(default)]
    pub max_in_flight: Option<usize>,
}

/// `[assembly]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AssemblySection {
    /// Section ids that lead the artifact, in this order.
    #[serde(default)]
    pub order: Vec<String>,
}

/// `[unit.<name>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct UnitConfig {
    /// Shell command; receives the input JSON on stdin.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Output template with `{path.to.field}` placeholders.
    #[serde(default)]
    pub template: Option<String>,

    /// Prerequisites: this unit waits for all units listed here.
    #[serde(default)]
    pub after: Vec<String>,

    /// Shared-context fields to include; all of them when absent.
    #[serde(default)]
    pub shared: Option<Vec<String>>,

    /// Shared-context fields that must be present at launch.
    #[serde(default)]
    pub required: Vec<String>,

    /// Input key per prerequisite output (default `<unit>_output`).
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,

    /// Section id of this unit's output in the artifact.
    #[serde(default)]
    pub section: Option<String>,
}

impl UnitConfig {
    pub fn binding(&self) -> InputBinding {
        InputBinding {
            shared: self.shared.clone(),
            required: self.required.clone(),
            aliases: self.aliases.clone(),
        }
    }

    /// Build the callback for this unit's kind.
    pub fn callback(&self) -> Result<UnitCallback> {
        match (&self.cmd, &self.template) {
            (Some(cmd), None) => Ok(command_unit(cmd.clone())),
            (None, Some(template)) => Ok(template_unit(Template::new(template.clone())?)),
            _ => Err(AgentdagError::ConfigError(
                "unit must set exactly one of `cmd` or `template`".to_string(),
            )),
        }
    }

    /// Short description for dry-run output.
    pub fn kind_label(&self) -> String {
        match (&self.cmd, &self.template) {
            (Some(cmd), _) => format!("cmd: {cmd}"),
            (None, Some(template)) => format!("template: {template}"),
            (None, None) => "<none>".to_string(),
        }
    }
}

/// Validated pipeline. Build it with `PipelineConfig::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub config: ConfigSection,
    pub assembly: AssemblySection,
    pub unit: BTreeMap<String, UnitConfig>,
    /// Unit ids in a dependency-respecting order.
    order: Vec<String>,
}

impl PipelineConfig {
    pub(crate) fn new_unchecked(raw: RawPipelineConfig, order: Vec<String>) -> Self {
        Self {
            config: raw.config,
            assembly: raw.assembly,
            unit: raw.unit,
            order,
        }
    }

    /// Unit ids with every unit after its prerequisites.
    pub fn unit_order(&self) -> &[String] {
        &self.order
    }

    /// Units without prerequisites.
    pub fn roots(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter(|name| self.unit.get(*name).is_some_and(|u| u.after.is_empty()))
            .map(String::as_str)
            .collect()
    }
}
