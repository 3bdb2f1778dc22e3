#![allow(dead_code)]

use std::collections::BTreeMap;

use agentdag::config::{
    AssemblySection, ConfigSection, PipelineConfig, RawPipelineConfig, UnitConfig,
};

/// Builder for `PipelineConfig` to simplify test setup.
pub struct PipelineConfigBuilder {
    config: RawPipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RawPipelineConfig {
                config: ConfigSection::default(),
                assembly: AssemblySection::default(),
                unit: BTreeMap::new(),
            },
        }
    }

    pub fn with_unit(mut self, name: &str, unit: UnitConfig) -> Self {
        self.config.unit.insert(name.to_string(), unit);
        self
    }

    pub fn max_in_flight(mut self, max: usize) -> Self {
        self.config.config.max_in_flight = Some(max);
        self
    }

    pub fn assembly_order(mut self, order: &[&str]) -> Self {
        self.config.assembly.order = order.iter().map(|s| s.to_string()).collect();
        self
    }

    /// The raw config, for tests that exercise validation failures.
    pub fn raw(self) -> RawPipelineConfig {
        self.config
    }

    pub fn build(self) -> PipelineConfig {
        PipelineConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for PipelineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `UnitConfig`.
pub struct UnitConfigBuilder {
    unit: UnitConfig,
}

impl UnitConfigBuilder {
    pub fn cmd(cmd: &str) -> Self {
        Self {
            unit: UnitConfig {
                cmd: Some(cmd.to_string()),
                ..UnitConfig::default()
            },
        }
    }

    pub fn template(template: &str) -> Self {
        Self {
            unit: UnitConfig {
                template: Some(template.to_string()),
                ..UnitConfig::default()
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.unit.after.push(dep.to_string());
        self
    }

    pub fn shared(mut self, field: &str) -> Self {
        let shared = self.unit.shared.get_or_insert(vec![]);
        shared.push(field.to_string());
        self
    }

    pub fn required(mut self, field: &str) -> Self {
        self.unit.required.push(field.to_string());
        self
    }

    pub fn alias(mut self, dep: &str, key: &str) -> Self {
        self.unit.aliases.insert(dep.to_string(), key.to_string());
        self
    }

    pub fn section(mut self, section: &str) -> Self {
        self.unit.section = Some(section.to_string());
        self
    }

    pub fn build(self) -> UnitConfig {
        self.unit
    }
}
