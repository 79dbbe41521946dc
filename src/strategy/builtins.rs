//! The activation strategies every SDK ships with.

use rand::Rng;
use std::net::IpAddr;

use super::*;
use crate::hashing::normalized_strategy_value;

fn random_percent() -> f64 {
    f64::from(rand::thread_rng().gen_range(1..=100u32))
}

/// `pct > 0 && bucket(id, group) <= pct`.
fn in_rollout(id: &str, group_id: &str, percentage: f64) -> bool {
    percentage > 0.0 && f64::from(normalized_strategy_value(id, group_id)) <= percentage
}

pub struct Default;
impl Strategy for Default {
    fn name(&self) -> &str { "default" }
    fn is_enabled(&self, _: &Parameters, _: &Context) -> bool { true }
}

pub struct UserWithId;
impl Strategy for UserWithId {
    fn name(&self) -> &str { "userWithId" }
    fn is_enabled(&self, parameters: &Parameters, context: &Context) -> bool {
        let Some(user_id) = context.resolve("userId") else {
            return false;
        };
        list_parameter(parameters, "userIds")
            .iter()
            .any(|id| *id == user_id)
    }
}

pub struct GradualRolloutUserId;
impl Strategy for GradualRolloutUserId {
    fn name(&self) -> &str { "gradualRolloutUserId" }
    fn is_enabled(&self, parameters: &Parameters, context: &Context) -> bool {
        rollout_on(parameters, context, "userId")
    }
}

pub struct GradualRolloutSessionId;
impl Strategy for GradualRolloutSessionId {
    fn name(&self) -> &str { "gradualRolloutSessionId" }
    fn is_enabled(&self, parameters: &Parameters, context: &Context) -> bool {
        rollout_on(parameters, context, "sessionId")
    }
}

fn rollout_on(parameters: &Parameters, context: &Context, field: &str) -> bool {
    let Some(id) = context.resolve(field) else {
        return false;
    };
    let percentage = numeric_parameter(parameters, "percentage").unwrap_or(0.0);
    let group_id = parameter(parameters, "groupId").unwrap_or_default();
    in_rollout(&id, &group_id, percentage)
}

pub struct GradualRolloutRandom;
impl Strategy for GradualRolloutRandom {
    fn name(&self) -> &str { "gradualRolloutRandom" }
    fn is_enabled(&self, parameters: &Parameters, _: &Context) -> bool {
        numeric_parameter(parameters, "percentage")
            .map(|pct| pct >= random_percent())
            .unwrap_or(false)
    }
}

/// Percentage rollout sticky on a configurable context field.
pub struct FlexibleRollout;
impl Strategy for FlexibleRollout {
    fn name(&self) -> &str { "flexibleRollout" }
    fn is_enabled(&self, parameters: &Parameters, context: &Context) -> bool {
        let group_id = parameter(parameters, "groupId").unwrap_or_default();
        let percentage = numeric_parameter(parameters, "rollout").unwrap_or(0.0);
        let stickiness = parameter(parameters, "stickiness")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "default".into());

        let random = || rand::thread_rng().gen_range(1..=10_000u32).to_string();
        let id = match stickiness.as_ref() {
            "default" => context
                .resolve("userId")
                .or_else(|| context.resolve("sessionId"))
                .map(|v| v.into_owned())
                .unwrap_or_else(random),
            "random" => random(),
            field => match context.resolve(field) {
                Some(v) => v.into_owned(),
                None => return false,
            },
        };
        in_rollout(&id, &group_id, percentage)
    }
}

/// Matches the context's remote address against IPs and CIDR ranges.
pub struct RemoteAddress;
impl Strategy for RemoteAddress {
    fn name(&self) -> &str { "remoteAddress" }
    fn is_enabled(&self, parameters: &Parameters, context: &Context) -> bool {
        let Some(address) = context.resolve("remoteAddress") else {
            return false;
        };
        list_parameter(parameters, "IPs")
            .iter()
            .any(|range| *range == address || cidr_contains(range, &address))
    }
}

fn cidr_contains(range: &str, address: &str) -> bool {
    let Some((network, bits)) = range.split_once('/') else {
        return false;
    };
    let (Ok(network), Ok(bits), Ok(address)) = (
        network.trim().parse::<IpAddr>(),
        bits.trim().parse::<u32>(),
        address.trim().parse::<IpAddr>(),
    ) else {
        return false;
    };
    match (network, address) {
        (IpAddr::V4(n), IpAddr::V4(a)) if bits <= 32 => {
            let mask = u32::MAX.checked_shl(32 - bits).unwrap_or(0);
            u32::from(n) & mask == u32::from(a) & mask
        }
        (IpAddr::V6(n), IpAddr::V6(a)) if bits <= 128 => {
            let mask = u128::MAX.checked_shl(128 - bits).unwrap_or(0);
            u128::from(n) & mask == u128::from(a) & mask
        }
        _ => false,
    }
}

/// Stand-in for strategies this evaluator cannot run.
pub struct Unknown;
impl Strategy for Unknown {
    fn name(&self) -> &str { "unknown" }
    fn is_enabled(&self, _: &Parameters, _: &Context) -> bool { false }

    // Constraints and segments still decide whether the answer is `false`.
    fn evaluate(&self, input: &StrategyInput<'_>) -> StrategyEvaluation {
        let (constraints_passed, constraints) = evaluate_all(input.constraints, input.context);
        let (segments_passed, segments) = evaluate_segments(input.segments, input.context);
        let enabled = if constraints_passed && segments_passed && !input.disabled {
            Outcome::Unknown
        } else {
            Outcome::False
        };
        StrategyEvaluation {
            result: StrategyResult {
                enabled,
                evaluation_status: EvaluationStatus::Incomplete,
                variant: None,
                variants: None,
            },
            constraints,
            segments,
        }
    }
}
