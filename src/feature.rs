//! Feature, strategy and segment definitions in the client-features JSON shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::constraint::Constraint;
use crate::variant::VariantDefinition;

/// Strategy parameters. Servers send strings, older ones sometimes numbers.
pub type Parameters = BTreeMap<String, Value>;

/// A reusable, named list of constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

/// One activation strategy attached to a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub segments: Vec<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<VariantDefinition>,
}

impl StrategyDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            title: None,
            disabled: false,
            parameters: Parameters::new(),
            constraints: Vec::new(),
            segments: Vec::new(),
            variants: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn with_segment(mut self, id: u64) -> Self {
        self.segments.push(id);
        self
    }

    pub fn with_variant(mut self, variant: VariantDefinition) -> Self {
        self.variants.push(variant);
        self
    }
}

fn default_true() -> bool {
    true
}

/// Requirement on a parent feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub feature: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<String>,
}

fn default_project() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureDefinition {
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_project")]
    pub project: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub stale: bool,
    #[serde(default)]
    pub impression_data: bool,
    #[serde(default)]
    pub strategies: Vec<StrategyDefinition>,
    #[serde(default)]
    pub variants: Vec<VariantDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
}

impl FeatureDefinition {
    pub fn new(name: impl Into<String>, enabled: bool) -> Self {
        Self {
            name: name.into(),
            enabled,
            project: default_project(),
            kind: None,
            stale: false,
            impression_data: false,
            strategies: Vec::new(),
            variants: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_strategy(mut self, strategy: StrategyDefinition) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn with_variant(mut self, variant: VariantDefinition) -> Self {
        self.variants.push(variant);
        self
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }
}

fn default_version() -> u32 {
    2
}

/// The document served to SDKs: every feature of one environment plus the
/// segments they reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientFeatures {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub features: Vec<FeatureDefinition>,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

impl Default for ClientFeatures {
    fn default() -> Self {
        Self {
            version: default_version(),
            features: Vec::new(),
            segments: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn client_features_defaults() {
        let doc: ClientFeatures = serde_json::from_value(json!({
            "features": [{
                "name": "checkout",
                "enabled": true,
                "strategies": [{ "name": "default" }],
                "dependencies": [{ "feature": "parent" }]
            }]
        }))
        .unwrap();
        assert_eq!(doc.version, 2);
        let feature = &doc.features[0];
        assert_eq!(feature.project, "default");
        assert!(feature.dependencies[0].enabled);
        assert!(!feature.strategies[0].disabled);
        assert!(doc.segments.is_empty());
    }

    #[test]
    fn numeric_parameters_are_kept() {
        let s: StrategyDefinition = serde_json::from_value(json!({
            "name": "flexibleRollout",
            "parameters": { "rollout": 50, "stickiness": "default" },
            "segments": [3]
        }))
        .unwrap();
        assert_eq!(s.parameters["rollout"], json!(50));
        assert_eq!(s.segments, vec![3]);
    }
}
