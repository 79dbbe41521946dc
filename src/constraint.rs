use chrono::Utc;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use tracing::warn;

use crate::comparison::{cmp_dates, cmp_numbers, cmp_versions};
use crate::context::Context;

/// Constraint operator. Unrecognised names are kept as `Unknown` so a newer
/// server can send operators this evaluator does not implement yet; those
/// never match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    In,
    NotIn,
    StrContains,
    StrStartsWith,
    StrEndsWith,
    NumEq,
    NumGt,
    NumGte,
    NumLt,
    NumLte,
    DateAfter,
    DateBefore,
    SemverEq,
    SemverGt,
    SemverLt,
    Regex,
    Unknown(String),
}

impl Operator {
    /// Every operator this evaluator implements.
    pub const ALL: [Operator; 16] = [
        Operator::In,
        Operator::NotIn,
        Operator::StrContains,
        Operator::StrStartsWith,
        Operator::StrEndsWith,
        Operator::NumEq,
        Operator::NumGt,
        Operator::NumGte,
        Operator::NumLt,
        Operator::NumLte,
        Operator::DateAfter,
        Operator::DateBefore,
        Operator::SemverEq,
        Operator::SemverGt,
        Operator::SemverLt,
        Operator::Regex,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Operator::In => "IN",
            Operator::NotIn => "NOT_IN",
            Operator::StrContains => "STR_CONTAINS",
            Operator::StrStartsWith => "STR_STARTS_WITH",
            Operator::StrEndsWith => "STR_ENDS_WITH",
            Operator::NumEq => "NUM_EQ",
            Operator::NumGt => "NUM_GT",
            Operator::NumGte => "NUM_GTE",
            Operator::NumLt => "NUM_LT",
            Operator::NumLte => "NUM_LTE",
            Operator::DateAfter => "DATE_AFTER",
            Operator::DateBefore => "DATE_BEFORE",
            Operator::SemverEq => "SEMVER_EQ",
            Operator::SemverGt => "SEMVER_GT",
            Operator::SemverLt => "SEMVER_LT",
            Operator::Regex => "REGEX",
            Operator::Unknown(name) => name,
        }
    }

    pub fn is_in(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }

    pub fn is_string(&self) -> bool {
        matches!(
            self,
            Operator::StrContains | Operator::StrStartsWith | Operator::StrEndsWith
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Operator::NumEq | Operator::NumGt | Operator::NumGte | Operator::NumLt | Operator::NumLte
        )
    }

    pub fn is_date(&self) -> bool {
        matches!(self, Operator::DateAfter | Operator::DateBefore)
    }

    pub fn is_semver(&self) -> bool {
        matches!(self, Operator::SemverEq | Operator::SemverGt | Operator::SemverLt)
    }

    /// Operators compared against the single `value` field.
    pub fn is_single_value(&self) -> bool {
        self.is_numeric() || self.is_date() || self.is_semver() || *self == Operator::Regex
    }

    /// Operators compared against the `values` list.
    pub fn is_multi_value(&self) -> bool {
        self.is_in() || self.is_string()
    }
}

impl From<String> for Operator {
    fn from(name: String) -> Self {
        Operator::ALL
            .iter()
            .find(|op| op.as_str() == name)
            .cloned()
            .unwrap_or(Operator::Unknown(name))
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.as_str().to_string()
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a constraint with this operator compares text case-sensitively.
/// `IN`/`NOT_IN` always match exactly; string operators and `REGEX` honour
/// the `caseInsensitive` flag; the remaining operators do not compare text.
pub fn is_case_sensitive(operator: &Operator, case_insensitive: bool) -> bool {
    if operator.is_in() {
        return true;
    }
    if operator.is_string() || *operator == Operator::Regex {
        return !case_insensitive;
    }
    false
}

/// A predicate on one context field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    pub context_name: String,
    pub operator: Operator,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default)]
    pub inverted: bool,
    #[serde(default)]
    pub case_insensitive: bool,
}

/// A constraint together with how it evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintResult {
    #[serde(flatten)]
    pub constraint: Constraint,
    pub result: bool,
}

impl Constraint {
    pub fn new(context_name: impl Into<String>, operator: Operator) -> Self {
        Self {
            context_name: context_name.into(),
            operator,
            values: Vec::new(),
            value: None,
            inverted: false,
            case_insensitive: false,
        }
    }

    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn inverted(mut self) -> Self {
        self.inverted = true;
        self
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    /// `values` with blanks dropped and whitespace trimmed.
    pub fn cleaned_values(&self) -> Vec<&str> {
        self.values
            .iter()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .collect()
    }

    pub fn is_satisfied(&self, context: &Context) -> bool {
        let outcome = match &self.operator {
            Operator::In | Operator::NotIn => self.check_in(context),
            Operator::StrContains | Operator::StrStartsWith | Operator::StrEndsWith => {
                self.check_string(context)
            }
            Operator::NumEq => self.check_number(context, |o| o == Ordering::Equal),
            Operator::NumGt => self.check_number(context, |o| o == Ordering::Greater),
            Operator::NumGte => self.check_number(context, |o| o != Ordering::Less),
            Operator::NumLt => self.check_number(context, |o| o == Ordering::Less),
            Operator::NumLte => self.check_number(context, |o| o != Ordering::Greater),
            Operator::DateAfter => self.check_date(context, |o| o == Ordering::Greater),
            Operator::DateBefore => self.check_date(context, |o| o == Ordering::Less),
            Operator::SemverEq => self.check_semver(context, |o| o == Ordering::Equal),
            Operator::SemverGt => self.check_semver(context, |o| o == Ordering::Greater),
            Operator::SemverLt => self.check_semver(context, |o| o == Ordering::Less),
            Operator::Regex => self.check_regex(context),
            Operator::Unknown(name) => {
                warn!(operator = %name, context_name = %self.context_name, "unsupported constraint operator");
                false
            }
        };
        if self.inverted {
            !outcome
        } else {
            outcome
        }
    }

    pub fn evaluate(&self, context: &Context) -> ConstraintResult {
        ConstraintResult {
            constraint: self.clone(),
            result: self.is_satisfied(context),
        }
    }

    fn check_in(&self, context: &Context) -> bool {
        let is_in = match context.resolve(&self.context_name) {
            Some(current) => self.cleaned_values().iter().any(|v| *v == current),
            None => false,
        };
        match self.operator {
            Operator::NotIn => !is_in,
            _ => is_in,
        }
    }

    fn check_string(&self, context: &Context) -> bool {
        let Some(current) = context.resolve(&self.context_name) else {
            return false;
        };
        let (current, values): (String, Vec<String>) = if self.case_insensitive {
            (
                current.to_lowercase(),
                self.cleaned_values().iter().map(|v| v.to_lowercase()).collect(),
            )
        } else {
            (
                current.into_owned(),
                self.cleaned_values().iter().map(|v| v.to_string()).collect(),
            )
        };
        values.iter().any(|v| match self.operator {
            Operator::StrStartsWith => current.starts_with(v.as_str()),
            Operator::StrEndsWith => current.ends_with(v.as_str()),
            _ => current.contains(v.as_str()),
        })
    }

    fn check_number(&self, context: &Context, pred: impl Fn(Ordering) -> bool) -> bool {
        match (context.resolve(&self.context_name), self.value.as_deref()) {
            (Some(current), Some(value)) => cmp_numbers(&current, value, pred),
            _ => false,
        }
    }

    fn check_date(&self, context: &Context, pred: impl Fn(Ordering) -> bool) -> bool {
        let Some(value) = self.value.as_deref() else {
            return false;
        };
        let now = context.current_time.unwrap_or_else(Utc::now);
        cmp_dates(now, value, pred)
    }

    fn check_semver(&self, context: &Context, pred: impl Fn(Ordering) -> bool) -> bool {
        match (context.resolve(&self.context_name), self.value.as_deref()) {
            (Some(current), Some(value)) => cmp_versions(&current, value, pred),
            _ => false,
        }
    }

    fn check_regex(&self, context: &Context) -> bool {
        let (Some(current), Some(pattern)) =
            (context.resolve(&self.context_name), self.value.as_deref())
        else {
            return false;
        };
        match RegexBuilder::new(pattern)
            .case_insensitive(self.case_insensitive)
            .build()
        {
            Ok(re) => re.is_match(&current),
            Err(e) => {
                warn!(pattern, error = %e, "constraint regex does not compile");
                false
            }
        }
    }
}

/// Evaluate every constraint, without short-circuiting, and report whether all
/// of them passed. An empty list passes.
pub fn evaluate_all(constraints: &[Constraint], context: &Context) -> (bool, Vec<ConstraintResult>) {
    let results: Vec<ConstraintResult> = constraints.iter().map(|c| c.evaluate(context)).collect();
    let passed = results.iter().all(|r| r.result);
    (passed, results)
}
