pub mod errors;
pub mod context;
pub mod constraint;
pub mod feature;
pub mod variant;
pub mod strategy;  // plugin model
pub mod repository;
pub mod engine;
pub mod playground;
pub mod validation;
pub mod config;
pub mod hashing;
mod comparison;
mod semver;

use rand::Rng;

use errors::Result;
use repository::InMemoryRepository;

pub use context::Context;
pub use constraint::{Constraint, Operator};
pub use engine::{EvaluatedStrategy, Evaluator, FeatureEvaluation};
pub use errors::EvalError;
pub use feature::{ClientFeatures, Dependency, FeatureDefinition, Segment, StrategyDefinition};
pub use playground::Playground;
pub use repository::Repository;
pub use strategy::{Outcome, Registry, Strategy};
pub use variant::{Variant, VariantDefinition};

/// Convenience: evaluate one feature of a client-features JSON document with
/// the built-in strategies.
pub fn is_enabled(features_json: &str, name: &str, context: &Context) -> Result<Outcome> {
    let evaluator = Evaluator::with_builtins(InMemoryRepository::from_json(features_json)?);
    Ok(evaluator.is_enabled(name, context, false).result)
}

/// Like [`is_enabled`], resolving the variant instead.
pub fn get_variant(features_json: &str, name: &str, context: &Context) -> Result<Variant> {
    let evaluator = Evaluator::with_builtins(InMemoryRepository::from_json(features_json)?);
    Ok(evaluator.get_variant(name, context, None))
}

/// 128 random bits as lowercase hex, for strategy and error ids.
pub(crate) fn random_id() -> String {
    format!("{:032x}", rand::thread_rng().gen::<u128>())
}
