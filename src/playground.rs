//! Batch evaluation of every feature for a context, across environments.

use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::context::Context;
use crate::engine::{EvaluatedStrategy, Evaluator};
use crate::errors::{EvalError, Result};
use crate::feature::FeatureDefinition;
use crate::strategy::Outcome;
use crate::variant::{Variant, VariantDefinition};

/// Upper bound on environments × features × contexts for one query.
pub const DEFAULT_QUERY_LIMIT: usize = 15_000;

/// Every context obtained by splitting comma-separated top-level fields and
/// taking the cartesian product. Fields without commas are kept as they are;
/// a field made only of commas and blanks is dropped.
pub fn generate_context_combinations(context: &Context) -> Result<Vec<Context>> {
    let mut base = context.clone();
    let mut varying: Vec<(String, Vec<String>)> = Vec::new();
    for (field, value) in context.string_fields() {
        if !value.contains(',') {
            continue;
        }
        let parts: Vec<String> = value
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect();
        clear_field(&mut base, &field);
        if !parts.is_empty() {
            varying.push((field, parts));
        }
    }
    if varying.is_empty() {
        return Ok(vec![base]);
    }

    varying
        .iter()
        .map(|(_, parts)| parts.iter())
        .multi_cartesian_product()
        .map(|combination| -> Result<Context> {
            let mut ctx = base.clone();
            for ((field, _), value) in varying.iter().zip(combination) {
                ctx.set(field, value.as_str())?;
            }
            Ok(ctx)
        })
        .collect()
}

fn clear_field(context: &mut Context, field: &str) {
    match field {
        "userId" => context.user_id = None,
        "sessionId" => context.session_id = None,
        "remoteAddress" => context.remote_address = None,
        "environment" => context.environment = None,
        "appName" => context.app_name = None,
        other => {
            context.extra.remove(other);
        }
    }
}

/// Reject queries that would evaluate more than `limit` feature/context pairs.
pub fn validate_query_complexity(
    environments: usize,
    features: usize,
    contexts: usize,
    limit: usize,
) -> Result<()> {
    let total = environments.saturating_mul(features).saturating_mul(contexts);
    if total > limit {
        return Err(EvalError::BadData(format!(
            "Rejecting evaluation as it would generate {total} combinations exceeding {limit} limit. \
             Please reduce the number of selected environments ({environments}), \
             features ({features}) or context field combinations ({contexts})."
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategiesSummary {
    pub result: Outcome,
    pub data: Vec<EvaluatedStrategy>,
}

/// How one feature evaluated in one environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaygroundFeature {
    pub name: String,
    pub project_id: String,
    pub is_enabled: bool,
    pub is_enabled_in_current_environment: bool,
    pub has_unsatisfied_dependency: bool,
    pub strategies: StrategiesSummary,
    pub variant: Variant,
    pub variants: Vec<VariantDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentFeature {
    #[serde(flatten)]
    pub feature: PlaygroundFeature,
    pub environment: String,
    pub context: Context,
}

/// One feature's results, grouped by environment in the order the
/// environments were requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedFeature {
    pub name: String,
    pub project_id: String,
    pub environments: IndexMap<String, Vec<EnvironmentFeature>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancedInput {
    pub environments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<String>>,
    pub context: Context,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvancedResponse {
    pub input: AdvancedInput,
    pub features: Vec<AdvancedFeature>,
}

/// Evaluators for named environments.
#[derive(Clone)]
pub struct Playground {
    environments: HashMap<String, Evaluator>,
    limit: usize,
}

impl Default for Playground {
    fn default() -> Self {
        Self::new(DEFAULT_QUERY_LIMIT)
    }
}

impl Playground {
    pub fn new(limit: usize) -> Self {
        Self {
            environments: HashMap::new(),
            limit,
        }
    }

    pub fn with_environment(mut self, name: impl Into<String>, evaluator: Evaluator) -> Self {
        self.add_environment(name, evaluator);
        self
    }

    pub fn add_environment(&mut self, name: impl Into<String>, evaluator: Evaluator) {
        self.environments.insert(name.into(), evaluator);
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    fn evaluator(&self, environment: &str) -> Result<&Evaluator> {
        self.environments
            .get(environment)
            .ok_or_else(|| EvalError::NotFound(format!("Could not find environment {environment}")))
    }

    /// Evaluate every feature of `environment` (limited to `projects` when
    /// given) for one context.
    pub fn evaluate_query(
        &self,
        environment: &str,
        projects: Option<&[String]>,
        context: &Context,
    ) -> Result<Vec<PlaygroundFeature>> {
        let evaluator = self.evaluator(environment)?;
        Ok(evaluate_features(evaluator, projects, context))
    }

    /// Evaluate every feature for every context combination in every
    /// environment, grouped by feature and then environment.
    pub fn evaluate_advanced_query(
        &self,
        environments: &[String],
        projects: Option<&[String]>,
        context: &Context,
    ) -> Result<AdvancedResponse> {
        let evaluators = environments
            .iter()
            .map(|env| self.evaluator(env).map(|ev| (env, ev)))
            .collect::<Result<Vec<_>>>()?;
        let contexts = generate_context_combinations(context)?;
        let feature_count = evaluators
            .first()
            .map(|(_, ev)| selected_features(ev, projects).len())
            .unwrap_or(0);
        validate_query_complexity(environments.len(), feature_count, contexts.len(), self.limit)?;
        info!(
            environments = environments.len(),
            features = feature_count,
            contexts = contexts.len(),
            "evaluating advanced playground query"
        );

        let items: Vec<EnvironmentFeature> = evaluators
            .iter()
            .flat_map(|(env, evaluator)| {
                contexts.iter().flat_map(move |ctx| {
                    evaluate_features(evaluator, projects, ctx)
                        .into_iter()
                        .map(move |feature| EnvironmentFeature {
                            feature,
                            environment: env.to_string(),
                            context: ctx.clone(),
                        })
                })
            })
            .collect();

        let order: Vec<String> = items.iter().map(|i| i.feature.name.clone()).unique().collect();
        let mut by_name = items.into_iter().into_group_map_by(|i| i.feature.name.clone());
        let features = order
            .into_iter()
            .filter_map(|name| {
                let entries = by_name.remove(&name)?;
                let project_id = entries.first()?.feature.project_id.clone();
                let mut environments: IndexMap<String, Vec<EnvironmentFeature>> = IndexMap::new();
                for entry in entries {
                    environments.entry(entry.environment.clone()).or_default().push(entry);
                }
                Some(AdvancedFeature {
                    name,
                    project_id,
                    environments,
                })
            })
            .collect();

        Ok(AdvancedResponse {
            input: AdvancedInput {
                environments: environments.to_vec(),
                projects: projects.map(<[String]>::to_vec),
                context: context.clone(),
            },
            features,
        })
    }
}

fn selected_features<'a>(
    evaluator: &'a Evaluator,
    projects: Option<&[String]>,
) -> Vec<&'a FeatureDefinition> {
    evaluator
        .repository()
        .get_toggles()
        .into_iter()
        .filter(|f| projects.map_or(true, |ps| ps.iter().any(|p| *p == f.project)))
        .collect()
}

fn evaluate_features(
    evaluator: &Evaluator,
    projects: Option<&[String]>,
    context: &Context,
) -> Vec<PlaygroundFeature> {
    selected_features(evaluator, projects)
        .into_iter()
        .map(|feature| {
            let evaluation = evaluator.is_enabled(&feature.name, context, false);
            let variant = evaluator.get_variant(&feature.name, context, None);
            let is_enabled = evaluation.result.is_true()
                && feature.enabled
                && !evaluation.has_unsatisfied_dependency;
            debug!(feature = %feature.name, is_enabled, "playground evaluation");
            PlaygroundFeature {
                name: feature.name.clone(),
                project_id: feature.project.clone(),
                is_enabled,
                is_enabled_in_current_environment: feature.enabled,
                has_unsatisfied_dependency: evaluation.has_unsatisfied_dependency,
                strategies: StrategiesSummary {
                    result: evaluation.result,
                    data: evaluation.strategies,
                },
                variant,
                variants: feature.variants.clone(),
            }
        })
        .collect()
}
