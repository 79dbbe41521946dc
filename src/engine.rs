use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::context::Context;
use crate::feature::{FeatureDefinition, Parameters, Segment, StrategyDefinition};
use crate::repository::Repository;
use crate::strategy::{EvaluationStatus, Outcome, Registry, StrategyEvaluation, StrategyInput};
use crate::variant::{select_feature_variant, Variant, VariantDefinition};

/// One strategy of a feature together with how it evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatedStrategy {
    pub name: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub disabled: bool,
    pub parameters: Parameters,
    #[serde(flatten)]
    pub evaluation: StrategyEvaluation,
}

/// Outcome of evaluating one feature for one context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureEvaluation {
    pub result: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<Variant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variants: Option<Vec<VariantDefinition>>,
    pub strategies: Vec<EvaluatedStrategy>,
    #[serde(default)]
    pub has_unsatisfied_dependency: bool,
}

impl FeatureEvaluation {
    fn bare(result: Outcome) -> Self {
        Self {
            result,
            variant: None,
            variants: None,
            strategies: Vec::new(),
            has_unsatisfied_dependency: false,
        }
    }

    /// A precomputed result, for `Evaluator::force_get_variant`.
    pub fn forced(result: Outcome, variant: Option<Variant>) -> Self {
        Self {
            variant,
            ..Self::bare(result)
        }
    }
}

/// Evaluates features from a repository with a set of strategies.
#[derive(Clone)]
pub struct Evaluator {
    repository: Arc<dyn Repository>,
    registry: Registry,
}

impl Evaluator {
    pub fn new(repository: Arc<dyn Repository>, registry: Registry) -> Self {
        Self {
            repository,
            registry,
        }
    }

    /// Evaluator with only the built-in strategies.
    pub fn with_builtins(repository: impl Repository + 'static) -> Self {
        Self::new(Arc::new(repository), Registry::with_builtins())
    }

    pub fn repository(&self) -> &dyn Repository {
        self.repository.as_ref()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Evaluate `name`, reporting whether its parents are satisfied.
    /// `fallback` is the result for features the repository does not know.
    pub fn is_enabled(&self, name: &str, context: &Context, fallback: bool) -> FeatureEvaluation {
        let feature = self.repository.get_toggle(name);
        let satisfied = self.is_parent_dependency_satisfied(feature, context);
        let mut evaluation = self.is_feature_enabled(feature, context, fallback);
        evaluation.has_unsatisfied_dependency = !satisfied;
        evaluation
    }

    /// Evaluate a feature's strategies, ignoring its dependencies.
    pub fn is_feature_enabled(
        &self,
        feature: Option<&FeatureDefinition>,
        context: &Context,
        fallback: bool,
    ) -> FeatureEvaluation {
        let Some(feature) = feature else {
            return FeatureEvaluation::bare(fallback.into());
        };
        if feature.strategies.is_empty() {
            return FeatureEvaluation::bare(feature.enabled.into());
        }

        let strategies: Vec<EvaluatedStrategy> = feature
            .strategies
            .iter()
            .map(|definition| self.evaluate_strategy(feature, definition, context))
            .collect();

        let mut evaluation = FeatureEvaluation::bare(Outcome::False);
        // only the first enabled strategy is considered
        let decided = strategies
            .iter()
            .find(|s| s.evaluation.result.enabled == Outcome::True)
            .filter(|s| s.evaluation.result.evaluation_status == EvaluationStatus::Complete);
        if let Some(winner) = decided {
            evaluation.result = Outcome::True;
            evaluation.variant = winner.evaluation.result.variant.clone();
            evaluation.variants = winner.evaluation.result.variants.clone();
        } else if strategies
            .iter()
            .any(|s| s.evaluation.result.enabled == Outcome::Unknown)
        {
            evaluation.result = Outcome::Unknown;
        }
        debug!(feature = %feature.name, result = ?evaluation.result, "evaluated feature");
        evaluation.strategies = strategies;
        evaluation
    }

    fn evaluate_strategy(
        &self,
        feature: &FeatureDefinition,
        definition: &StrategyDefinition,
        context: &Context,
    ) -> EvaluatedStrategy {
        let strategy = self.registry.resolve(&definition.name);
        let segments: Vec<&Segment> = definition
            .segments
            .iter()
            .filter_map(|&id| {
                let segment = self.repository.get_segment(id);
                if segment.is_none() {
                    warn!(feature = %feature.name, segment = id, "strategy references a missing segment");
                }
                segment
            })
            .collect();
        let parameters = with_group_id(&definition.parameters, &feature.name);

        let evaluation = strategy.evaluate(&StrategyInput {
            parameters: &parameters,
            context,
            constraints: &definition.constraints,
            segments: &segments,
            disabled: definition.disabled,
            variants: &definition.variants,
        });

        EvaluatedStrategy {
            name: definition.name.clone(),
            id: definition.id.clone().unwrap_or_else(crate::random_id),
            title: definition.title.clone(),
            disabled: definition.disabled,
            parameters: definition.parameters.clone(),
            evaluation,
        }
    }

    /// True when every parent exists, has no parents itself, matches the
    /// required enabled flag and evaluates as required for `context`.
    pub fn is_parent_dependency_satisfied(
        &self,
        feature: Option<&FeatureDefinition>,
        context: &Context,
    ) -> bool {
        let Some(feature) = feature else {
            return true;
        };
        feature.dependencies.iter().all(|dependency| {
            let Some(parent) = self.repository.get_toggle(&dependency.feature) else {
                return false;
            };
            if !parent.dependencies.is_empty() || dependency.enabled != parent.enabled {
                return false;
            }
            if !dependency.enabled {
                return !self.is_enabled(&parent.name, context, false).result.is_true();
            }
            if dependency.variants.is_empty() {
                self.is_enabled(&parent.name, context, false).result.is_true()
            } else {
                let variant = self.get_variant(&parent.name, context, None);
                dependency.variants.contains(&variant.name)
            }
        })
    }

    /// The variant `context` receives for `name`, or the fallback variant.
    pub fn get_variant(&self, name: &str, context: &Context, fallback: Option<&Variant>) -> Variant {
        self.resolve_variant(name, context, fallback, None)
    }

    /// Like `get_variant`, but trusts an enabled result computed earlier so
    /// random rollouts are not rolled twice.
    pub fn force_get_variant(
        &self,
        name: &str,
        context: &Context,
        forced: &FeatureEvaluation,
        fallback: Option<&Variant>,
    ) -> Variant {
        self.resolve_variant(name, context, fallback, Some(forced))
    }

    fn resolve_variant(
        &self,
        name: &str,
        context: &Context,
        fallback: Option<&Variant>,
        forced: Option<&FeatureEvaluation>,
    ) -> Variant {
        let mut fallback_variant = fallback.cloned().unwrap_or_else(Variant::disabled);
        let feature = match self.repository.get_toggle(name) {
            Some(feature) if self.is_parent_dependency_satisfied(Some(feature), context) => feature,
            _ => return fallback_variant,
        };

        let computed;
        let evaluation = match forced {
            Some(forced) => forced,
            None => {
                let default = fallback.map(|v| v.enabled).unwrap_or(false);
                computed = self.is_feature_enabled(Some(feature), context, default);
                &computed
            }
        };
        let enabled = evaluation.result.is_true();
        if fallback.is_none() {
            fallback_variant.feature_enabled = enabled;
        }

        if !enabled {
            return fallback_variant;
        }
        if let Some(variant) = &evaluation.variant {
            return variant.clone();
        }
        if !feature.enabled || feature.variants.is_empty() {
            return fallback_variant;
        }
        select_feature_variant(&feature.name, &feature.variants, context)
            .map(VariantDefinition::to_variant)
            .unwrap_or(fallback_variant)
    }
}

/// Strategies without a `groupId` are grouped by their feature's name.
fn with_group_id<'a>(parameters: &'a Parameters, feature_name: &str) -> Cow<'a, Parameters> {
    let has_group = matches!(parameters.get("groupId"), Some(Value::String(s)) if !s.is_empty());
    if has_group {
        return Cow::Borrowed(parameters);
    }
    let mut owned = parameters.clone();
    owned.insert("groupId".to_string(), Value::String(feature_name.to_string()));
    Cow::Owned(owned)
}
