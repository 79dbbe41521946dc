use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::comparison::parse_number;
use crate::constraint::{evaluate_all, Constraint, ConstraintResult};
use crate::context::Context;
use crate::errors::{EvalError, Result};
use crate::feature::{Parameters, Segment};
use crate::variant::{select_variant_definition, Variant, VariantDefinition};

pub mod builtins;

/// Three-valued evaluation result. Serializes as `true`, `false` or `"unknown"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "OutcomeRepr", into = "OutcomeRepr")]
pub enum Outcome {
    True,
    False,
    /// The evaluator cannot decide, e.g. a custom strategy it does not implement.
    Unknown,
}

impl Outcome {
    pub fn is_true(self) -> bool {
        self == Outcome::True
    }
}

impl From<bool> for Outcome {
    fn from(b: bool) -> Self {
        if b {
            Outcome::True
        } else {
            Outcome::False
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum OutcomeRepr {
    Bool(bool),
    Text(String),
}

impl From<Outcome> for OutcomeRepr {
    fn from(o: Outcome) -> Self {
        match o {
            Outcome::True => OutcomeRepr::Bool(true),
            Outcome::False => OutcomeRepr::Bool(false),
            Outcome::Unknown => OutcomeRepr::Text("unknown".into()),
        }
    }
}

impl TryFrom<OutcomeRepr> for Outcome {
    type Error = String;

    fn try_from(repr: OutcomeRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            OutcomeRepr::Bool(b) => Ok(b.into()),
            OutcomeRepr::Text(t) if t == "unknown" => Ok(Outcome::Unknown),
            OutcomeRepr::Text(t) => Err(format!("invalid evaluation result '{t}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationStatus {
    Complete,
    Incomplete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyResult {
    pub enabled: Outcome,
    pub evaluation_status: EvaluationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<Variant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variants: Option<Vec<VariantDefinition>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentResult {
    pub id: u64,
    pub name: String,
    pub result: bool,
    pub constraints: Vec<ConstraintResult>,
}

/// Everything one strategy evaluation produced, for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyEvaluation {
    pub result: StrategyResult,
    pub constraints: Vec<ConstraintResult>,
    pub segments: Vec<SegmentResult>,
}

/// What a strategy sees when evaluated for one feature.
#[derive(Debug, Clone, Copy)]
pub struct StrategyInput<'a> {
    pub parameters: &'a Parameters,
    pub context: &'a Context,
    pub constraints: &'a [Constraint],
    pub segments: &'a [&'a Segment],
    pub disabled: bool,
    pub variants: &'a [VariantDefinition],
}

/// A named rule deciding whether a feature is on for a context.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    /// The strategy's own decision, ignoring constraints and segments.
    fn is_enabled(&self, parameters: &Parameters, context: &Context) -> bool;

    /// Full evaluation: constraints, the strategy itself and segments must all
    /// pass. Disabled strategies are reported but never enable anything.
    fn evaluate(&self, input: &StrategyInput<'_>) -> StrategyEvaluation {
        let (constraints_passed, constraints) = evaluate_all(input.constraints, input.context);
        let strategy_passed = self.is_enabled(input.parameters, input.context);
        let (segments_passed, segments) = evaluate_segments(input.segments, input.context);

        let enabled = constraints_passed && strategy_passed && segments_passed && !input.disabled;
        let variant = if enabled { strategy_variant(input) } else { None };
        StrategyEvaluation {
            result: StrategyResult {
                enabled: enabled.into(),
                evaluation_status: EvaluationStatus::Complete,
                variants: variant.as_ref().map(|_| input.variants.to_vec()),
                variant,
            },
            constraints,
            segments,
        }
    }
}

/// Evaluate segments; all of them must pass. An empty list passes.
pub fn evaluate_segments(segments: &[&Segment], context: &Context) -> (bool, Vec<SegmentResult>) {
    let results: Vec<SegmentResult> = segments
        .iter()
        .map(|segment| {
            let (result, constraints) = evaluate_all(&segment.constraints, context);
            SegmentResult {
                id: segment.id,
                name: segment.name.clone(),
                result,
                constraints,
            }
        })
        .collect();
    let passed = results.iter().all(|s| s.result);
    (passed, results)
}

fn strategy_variant(input: &StrategyInput<'_>) -> Option<Variant> {
    let first = input.variants.first()?;
    let group_id = parameter(input.parameters, "groupId").unwrap_or_default();
    select_variant_definition(&group_id, &first.stickiness, input.variants, input.context)
        .map(VariantDefinition::to_variant)
}

/// A parameter as text; numbers and booleans are stringified.
pub fn parameter<'a>(parameters: &'a Parameters, key: &str) -> Option<Cow<'a, str>> {
    match parameters.get(key)? {
        Value::String(s) => Some(Cow::Borrowed(s.as_str())),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        Value::Bool(b) => Some(Cow::Owned(b.to_string())),
        _ => None,
    }
}

/// A numeric parameter such as `percentage` or `rollout`.
pub fn numeric_parameter(parameters: &Parameters, key: &str) -> Option<f64> {
    parameter(parameters, key).and_then(|v| parse_number(&v))
}

/// Split a comma-separated parameter list, trimming entries.
pub fn list_parameter(parameters: &Parameters, key: &str) -> Vec<String> {
    parameter(parameters, key)
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Thread-safe strategy registry.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<HashMap<String, Arc<dyn Strategy>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut map: HashMap<String, Arc<dyn Strategy>> = HashMap::new();
        let builtins: [Arc<dyn Strategy>; 8] = [
            Arc::new(builtins::Default),
            Arc::new(builtins::UserWithId),
            Arc::new(builtins::GradualRolloutUserId),
            Arc::new(builtins::GradualRolloutSessionId),
            Arc::new(builtins::GradualRolloutRandom),
            Arc::new(builtins::FlexibleRollout),
            Arc::new(builtins::RemoteAddress),
            Arc::new(builtins::Unknown),
        ];
        for strategy in builtins {
            map.insert(strategy.name().to_string(), strategy);
        }
        Self {
            inner: Arc::new(map),
        }
    }

    /// Add or replace a strategy. Names must be non-blank.
    pub fn register<S: Strategy + 'static>(&mut self, strategy: S) -> Result<()> {
        let name = strategy.name().trim().to_string();
        if name.is_empty() {
            return Err(EvalError::Unprocessable(
                "Invalid strategy data / interface: a strategy needs a name".into(),
            ));
        }
        let map = Arc::make_mut(&mut self.inner);
        map.insert(name, Arc::new(strategy));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Strategy>> {
        self.inner.get(name).cloned()
    }

    /// Strategy to run for `name`. `applicationHostname` depends on the host
    /// the SDK runs on, so it evaluates as unknown like unregistered names.
    pub fn resolve(&self, name: &str) -> Arc<dyn Strategy> {
        if name != "applicationHostname" {
            if let Some(strategy) = self.get(name) {
                return strategy;
            }
            warn!(strategy = name, "no implementation for strategy, result is unknown");
        }
        self.get("unknown")
            .unwrap_or_else(|| Arc::new(builtins::Unknown))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.inner.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
