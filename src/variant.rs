use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::hashing::normalized_variant_value;

/// Context fields tried, in order, when stickiness is `default`.
const DEFAULT_STICKINESS_FIELDS: [&str; 3] = ["userId", "sessionId", "remoteAddress"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightType {
    #[default]
    Variable,
    Fix,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

/// Forces a variant for contexts whose field matches one of `values`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Override {
    pub context_name: String,
    #[serde(default)]
    pub values: Vec<String>,
}

fn default_stickiness() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantDefinition {
    pub name: String,
    #[serde(default)]
    pub weight: u32,
    #[serde(default)]
    pub weight_type: WeightType,
    #[serde(default = "default_stickiness")]
    pub stickiness: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<Override>,
}

impl VariantDefinition {
    pub fn new(name: impl Into<String>, weight: u32) -> Self {
        Self {
            name: name.into(),
            weight,
            weight_type: WeightType::Variable,
            stickiness: default_stickiness(),
            payload: None,
            overrides: Vec::new(),
        }
    }

    /// The variant handed to callers once this definition is selected.
    pub fn to_variant(&self) -> Variant {
        Variant {
            name: self.name.clone(),
            enabled: true,
            payload: self.payload.clone(),
            feature_enabled: true,
        }
    }

    fn overridden_for(&self, context: &Context) -> bool {
        self.overrides.iter().any(|o| match context.resolve(&o.context_name) {
            Some(current) => o.values.iter().any(|v| *v == current),
            None => false,
        })
    }
}

/// The variant a caller receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub name: String,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
    #[serde(default, alias = "feature_enabled")]
    pub feature_enabled: bool,
}

impl Variant {
    /// `{ name: "disabled", enabled: false }`, returned whenever no variant applies.
    pub fn disabled() -> Self {
        Self {
            name: "disabled".to_string(),
            enabled: false,
            payload: None,
            feature_enabled: false,
        }
    }
}

impl Default for Variant {
    fn default() -> Self {
        Self::disabled()
    }
}

fn random_seed() -> String {
    rand::thread_rng().gen_range(0..=100_000u32).to_string()
}

/// The hash input for `stickiness`; random when the context has nothing to stick to.
pub fn stickiness_seed(context: &Context, stickiness: &str) -> String {
    if stickiness != "default" {
        return context
            .resolve(stickiness)
            .map(|v| v.into_owned())
            .unwrap_or_else(random_seed);
    }
    DEFAULT_STICKINESS_FIELDS
        .iter()
        .find_map(|field| context.resolve(field))
        .map(|v| v.into_owned())
        .unwrap_or_else(random_seed)
}

/// Pick a variant: an override matching the context wins, otherwise the
/// stickiness hash lands in one of the weighted buckets. Zero-weight variants
/// are reachable only through overrides, and weights whose total does not fit
/// a `u32` select nothing.
pub fn select_variant_definition<'a>(
    group_id: &str,
    stickiness: &str,
    variants: &'a [VariantDefinition],
    context: &Context,
) -> Option<&'a VariantDefinition> {
    let total_weight = total_weight(variants).filter(|&total| total > 0)?;
    if let Some(forced) = variants.iter().find(|v| v.overridden_for(context)) {
        return Some(forced);
    }

    let seed = stickiness_seed(context, stickiness);
    let target = normalized_variant_value(&seed, group_id, total_weight);
    let mut counter = 0;
    variants.iter().filter(|v| v.weight > 0).find(|v| {
        counter += v.weight;
        counter >= target
    })
}

/// Sum of all weights, `None` on overflow.
pub(crate) fn total_weight(variants: &[VariantDefinition]) -> Option<u32> {
    variants.iter().try_fold(0u32, |acc, v| acc.checked_add(v.weight))
}

/// Feature-level selection: grouped by feature name, sticky on the first
/// variant's stickiness.
pub fn select_feature_variant<'a>(
    feature_name: &str,
    variants: &'a [VariantDefinition],
    context: &Context,
) -> Option<&'a VariantDefinition> {
    let stickiness = variants
        .first()
        .map(|v| v.stickiness.as_str())
        .unwrap_or("default");
    select_variant_definition(feature_name, stickiness, variants, context)
}
