//! Admin-side checks run before definitions are stored.
//!
//! Evaluation is lenient: a malformed constraint simply evaluates to `false`.
//! These checks are where malformed input gets rejected instead, with the
//! message an admin API would return.

use regex::Regex;
use serde_json::Value;

use crate::comparison::{parse_date, parse_number};
use crate::constraint::{Constraint, Operator};
use crate::errors::{EvalError, Result};
use crate::feature::StrategyDefinition;
use crate::semver;
use crate::variant::{total_weight, VariantDefinition, WeightType};

/// Total weight every variant list is normalised to.
pub const TOTAL_VARIANT_WEIGHT: u32 = 1000;

/// Check that a constraint's values fit its operator and, when the context
/// field declares legal values, that only those are used.
pub fn validate_constraint(constraint: &Constraint, legal_values: &[String]) -> Result<()> {
    let operator = &constraint.operator;
    let value = constraint.value.as_deref().unwrap_or("").trim();

    if operator.is_numeric() && (value.is_empty() || parse_number(value).is_none()) {
        return Err(EvalError::BadData(format!("{value} is not a number!")));
    }
    if operator.is_date() && parse_date(value).is_none() {
        return Err(EvalError::BadData(format!("{value} is not a valid date!")));
    }
    if operator.is_semver() && semver::parse(value).is_err() {
        return Err(EvalError::BadData(format!(
            "the provided value is not a valid semver format. The value provided was: {value}"
        )));
    }
    if *operator == Operator::Regex && Regex::new(value).is_err() {
        return Err(EvalError::BadData(format!("{value} is not a valid regex string")));
    }
    if operator.is_string() && constraint.cleaned_values().is_empty() {
        return Err(EvalError::BadData(format!(
            "{} needs at least one value",
            operator.as_str()
        )));
    }

    if legal_values.is_empty() {
        return Ok(());
    }
    let is_legal = |v: &str| legal_values.iter().any(|legal| legal == v);
    if operator.is_single_value() {
        if !is_legal(value) {
            return Err(EvalError::BadData(format!(
                "{value} is not specified as a legal value on this context field"
            )));
        }
    } else if let Some(illegal) = constraint.values.iter().find(|v| !is_legal(v.as_str())) {
        return Err(EvalError::BadData(format!(
            "{illegal} is not specified as a legal value on this context field"
        )));
    }
    Ok(())
}

pub fn validate_constraints(constraints: &[Constraint], legal_values: &[String]) -> Result<()> {
    constraints
        .iter()
        .try_for_each(|c| validate_constraint(c, legal_values))
}

/// Spread the traffic left over by `fix` variants evenly across the
/// `variable` ones; the first variants absorb the remainder. Returns the
/// variants sorted by name.
pub fn fix_variant_weights(variants: Vec<VariantDefinition>) -> Result<Vec<VariantDefinition>> {
    if variants.is_empty() {
        return Ok(variants);
    }
    let (mut variable, fixed): (Vec<_>, Vec<_>) = variants
        .into_iter()
        .partition(|v| v.weight_type == WeightType::Variable);
    if variable.is_empty() {
        return Err(EvalError::BadData(
            "There must be at least one \"variable\" variant".into(),
        ));
    }

    let fixed_weight = match total_weight(&fixed) {
        Some(weight) if weight <= TOTAL_VARIANT_WEIGHT => weight,
        _ => {
            return Err(EvalError::BadData(
                "The traffic distribution total must equal 100%".into(),
            ))
        }
    };

    let available = TOTAL_VARIANT_WEIGHT - fixed_weight;
    let count = variable.len() as u32;
    let (average, mut remainder) = (available / count, available % count);
    for v in &mut variable {
        v.weight = average;
        if remainder > 0 {
            v.weight += 1;
            remainder -= 1;
        }
    }

    variable.extend(fixed);
    variable.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(variable)
}

/// A strategy may omit `stickiness` but must not set it to an empty string.
pub fn validate_stickiness(strategy: &StrategyDefinition) -> Result<()> {
    match strategy.parameters.get("stickiness") {
        Some(Value::String(s)) if s.trim().is_empty() => Err(EvalError::InvalidOperation(
            "You can not have an empty string for stickiness.".into(),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn message(err: EvalError) -> String {
        err.to_string()
    }

    #[test]
    fn typed_operators_need_typed_values() {
        let num = Constraint::new("age", Operator::NumGt).with_value("ten");
        assert!(message(validate_constraint(&num, &[]).unwrap_err()).contains("is not a number"));
        let num = Constraint::new("age", Operator::NumGt).with_value("inf");
        assert!(message(validate_constraint(&num, &[]).unwrap_err()).contains("is not a number"));
        let num = Constraint::new("age", Operator::NumGt).with_value("10.5");
        assert!(validate_constraint(&num, &[]).is_ok());

        let date = Constraint::new("currentTime", Operator::DateAfter).with_value("yesterday");
        assert!(validate_constraint(&date, &[]).is_err());
        let date = Constraint::new("currentTime", Operator::DateAfter).with_value("2024-01-01T00:00:00Z");
        assert!(validate_constraint(&date, &[]).is_ok());

        let ver = Constraint::new("version", Operator::SemverGt).with_value("1.2");
        assert!(message(validate_constraint(&ver, &[]).unwrap_err()).contains("not a valid semver"));
    }

    #[test]
    fn regex_must_compile() {
        let bad = Constraint::new("email", Operator::Regex).with_value("(unclosed");
        let err = validate_constraint(&bad, &[]).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(message(err).contains("not a valid regex string"));
        let good = Constraint::new("email", Operator::Regex).with_value(r".*@example\.com$");
        assert!(validate_constraint(&good, &[]).is_ok());
    }

    #[test]
    fn string_operators_need_values() {
        let empty = Constraint::new("email", Operator::StrContains).with_values([" "]);
        assert!(validate_constraint(&empty, &[]).is_err());
    }

    #[test]
    fn legal_values_are_enforced() {
        let legal = vec!["web".to_string(), "ios".to_string()];
        let ok = Constraint::new("appName", Operator::In).with_values(["web", "ios"]);
        assert!(validate_constraint(&ok, &legal).is_ok());

        let bad = Constraint::new("appName", Operator::In).with_values(["web", "android"]);
        let err = validate_constraint(&bad, &legal).unwrap_err();
        assert!(message(err).contains("is not specified as a legal value"));

        let numbers = vec!["1".to_string(), "2".to_string()];
        let single = Constraint::new("tier", Operator::NumEq).with_value("3");
        assert!(validate_constraint(&single, &numbers).is_err());
        let single = Constraint::new("tier", Operator::NumEq).with_value("2");
        assert!(validate_constraints(&[single], &numbers).is_ok());
    }

    fn fixed(name: &str, weight: u32) -> VariantDefinition {
        VariantDefinition {
            weight_type: WeightType::Fix,
            ..VariantDefinition::new(name, weight)
        }
    }

    #[test]
    fn variable_variants_share_the_rest() {
        let variants = vec![
            VariantDefinition::new("c", 0),
            fixed("a", 100),
            VariantDefinition::new("b", 0),
            VariantDefinition::new("d", 0),
        ];
        let fixed_up = fix_variant_weights(variants).unwrap();
        let weights: Vec<(&str, u32)> = fixed_up.iter().map(|v| (v.name.as_str(), v.weight)).collect();
        // 900 over three variable variants; no remainder
        assert_eq!(weights, vec![("a", 100), ("b", 300), ("c", 300), ("d", 300)]);
    }

    #[test]
    fn remainder_goes_to_the_first_variable_variants() {
        let variants = vec![
            VariantDefinition::new("x", 0),
            VariantDefinition::new("y", 0),
            VariantDefinition::new("z", 0),
        ];
        let weights: Vec<u32> = fix_variant_weights(variants)
            .unwrap()
            .iter()
            .map(|v| v.weight)
            .collect();
        assert_eq!(weights, vec![334, 333, 333]);
        assert_eq!(weights.iter().sum::<u32>(), TOTAL_VARIANT_WEIGHT);
    }

    #[test]
    fn invalid_variant_sets() {
        let err = fix_variant_weights(vec![fixed("a", 1000)]).unwrap_err();
        assert!(message(err).contains("at least one \"variable\" variant"));
        let err = fix_variant_weights(vec![fixed("a", 800), fixed("b", 300), VariantDefinition::new("c", 0)])
            .unwrap_err();
        assert!(message(err).contains("must equal 100%"));
        assert!(fix_variant_weights(vec![]).unwrap().is_empty());
    }

    #[test]
    fn overflowing_fixed_weights_are_rejected() {
        let variants = vec![fixed("a", u32::MAX), fixed("b", 2), VariantDefinition::new("c", 0)];
        let err = fix_variant_weights(variants).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(message(err).contains("must equal 100%"));
    }

    #[test]
    fn empty_stickiness_is_rejected() {
        let s = StrategyDefinition::new("flexibleRollout").with_parameter("stickiness", "");
        let err = validate_stickiness(&s).unwrap_err();
        assert_eq!(err.status_code(), 403);
        let s = StrategyDefinition::new("flexibleRollout").with_parameter("stickiness", "userId");
        assert!(validate_stickiness(&s).is_ok());
    }
}
