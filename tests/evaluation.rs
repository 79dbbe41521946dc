use feature_evaluator::repository::InMemoryRepository;
use feature_evaluator::{ClientFeatures, Context, Evaluator, Outcome};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn evaluator(features: Value) -> Evaluator {
    let doc: ClientFeatures = serde_json::from_value(json!({ "version": 2, "features": features })).unwrap();
    Evaluator::with_builtins(InMemoryRepository::new(doc).unwrap())
}

fn app(name: &str) -> Context {
    Context::new().with_app_name(name)
}

fn ab_variants() -> Value {
    json!([
        { "name": "a", "weight": 500, "weightType": "variable", "stickiness": "default", "overrides": [] },
        { "name": "b", "weight": 500, "weightType": "variable", "stickiness": "default", "overrides": [] }
    ])
}

#[test]
fn test_default_strategy_is_on() {
    let ev = evaluator(json!([{
        "name": "toggle-name", "project": "default", "enabled": true,
        "strategies": [{ "name": "default" }], "variants": [], "type": "", "stale": false
    }]));
    let ctx = app("other-app").with_environment("default");
    assert_eq!(ev.is_enabled("toggle-name", &ctx, false).result, Outcome::True);
}

#[test]
fn test_constrains_on_app_name() {
    let constrained = |name: &str, app_name: &str| {
        json!({
            "name": name, "enabled": true,
            "strategies": [{
                "name": "default",
                "constraints": [{ "contextName": "appName", "operator": "IN", "values": [app_name] }]
            }]
        })
    };
    let ev = evaluator(json!([constrained("toggle-name", "app-name"), constrained("other-toggle", "otherApp")]));
    let ctx = app("app-name");
    assert_eq!(ev.is_enabled("toggle-name", &ctx, false).result, Outcome::True);
    assert_eq!(ev.is_enabled("other-toggle", &ctx, false).result, Outcome::False);
}

#[test]
fn test_disabled_feature_with_default_strategy_evaluates_true() {
    let ev = evaluator(json!([{
        "name": "toggle-name", "enabled": false, "type": "experiment",
        "strategies": [{ "name": "default" }], "variants": ab_variants()
    }]));
    assert_eq!(ev.is_enabled("toggle-name", &app("client-test"), false).result, Outcome::True);
    // the variant still respects the environment flag
    assert_eq!(ev.get_variant("toggle-name", &app("client-test"), None).name, "disabled");
}

#[test]
fn test_disabled_variant_when_toggle_is_off() {
    let ev = evaluator(json!([{
        "name": "toggle-name", "enabled": false, "strategies": [], "variants": ab_variants()
    }]));
    let ctx = app("client-test");
    assert_eq!(ev.is_enabled("toggle-name", &ctx, false).result, Outcome::False);
    let variant = ev.get_variant("toggle-name", &ctx, None);
    assert_eq!(variant.name, "disabled");
    assert!(!variant.enabled);
}

#[test]
fn test_disabled_variant_without_variants() {
    let ev = evaluator(json!([{
        "name": "toggle-name", "enabled": true,
        "strategies": [{ "name": "default", "constraints": [] }], "variants": []
    }]));
    let ctx = Context::new();
    let variant = ev.get_variant("toggle-name", &ctx, None);
    assert_eq!(variant.name, "disabled");
    assert!(!variant.enabled);
    assert_eq!(ev.is_enabled("toggle-name", &ctx, false).result, Outcome::True);
}

#[test]
fn test_strategy_variant_over_feature_variant() {
    let strategy = |app_name: &str, variant: &str| {
        json!({
            "name": "default",
            "constraints": [{
                "values": [app_name], "inverted": false, "operator": "IN",
                "contextName": "appName", "caseInsensitive": false
            }],
            "variants": [{ "name": variant, "weightType": "variable", "weight": 1000, "stickiness": "default" }]
        })
    };
    let ev = evaluator(json!([{
        "name": "toggle-name", "enabled": true,
        "strategies": [
            strategy("my-app-name", "ignoreNonMatchingStrategyVariant"),
            strategy("client-test", "strategyVariant")
        ],
        "variants": [{ "name": "ignoreFeatureStrategyVariant", "weightType": "variable", "weight": 1000, "stickiness": "default" }]
    }]));
    let ctx = app("client-test");
    let variant = ev.get_variant("toggle-name", &ctx, None);
    assert_eq!(variant.name, "strategyVariant");
    assert!(variant.enabled);
    assert_eq!(ev.is_enabled("toggle-name", &ctx, false).result, Outcome::True);
}

#[test]
fn test_unknown_for_unimplemented_strategies() {
    for strategy in ["unimplemented-custom-strategy", "applicationHostname"] {
        let ev = evaluator(json!([{
            "name": "toggle-name", "enabled": true,
            "strategies": [{ "name": strategy, "constraints": [] }]
        }]));
        let evaluation = ev.is_enabled("toggle-name", &app("client-test"), false);
        assert!(evaluation
            .strategies
            .iter()
            .all(|s| s.evaluation.result.enabled == Outcome::Unknown));
        assert_eq!(evaluation.result, Outcome::Unknown);
        assert_eq!(serde_json::to_value(evaluation.result).unwrap(), json!("unknown"));
    }
}

#[test]
fn test_strategies_keep_their_order() {
    let strategies = json!([
        { "name": "default", "constraints": [], "parameters": {} },
        {
            "name": "default", "parameters": {},
            "constraints": [{ "values": ["my-app-name"], "operator": "IN", "contextName": "appName" }]
        },
        { "name": "applicationHostname", "parameters": { "hostNames": "myhostname.com" } },
        { "name": "flexibleRollout", "parameters": { "groupId": "killer", "rollout": "34", "stickiness": "userId" } },
        { "name": "remoteAddress", "parameters": { "IPs": "196.6.6.05" } }
    ]);
    let ev = evaluator(json!([{
        "name": "featureName", "enabled": true, "type": "kill-switch",
        "strategies": strategies,
        "variants": [
            { "name": "a", "weight": 334, "payload": { "type": "json", "value": "{\"hello\": \"world\"}" } },
            { "name": "b", "weight": 333, "payload": { "type": "string", "value": "ueoau" } },
            { "name": "c", "weight": 333, "payload": { "type": "csv", "value": "1,2,3" } }
        ]
    }]));
    let names: Vec<String> = ev
        .is_enabled("featureName", &app("client-test"), false)
        .strategies
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(
        names,
        ["default", "default", "applicationHostname", "flexibleRollout", "remoteAddress"]
    );
}

#[test]
fn test_segments_gate_strategies() {
    let doc: ClientFeatures = serde_json::from_value(json!({
        "features": [{
            "name": "beta", "enabled": true,
            "strategies": [{ "name": "default", "segments": [1] }]
        }],
        "segments": [{
            "id": 1, "name": "beta-testers",
            "constraints": [{ "contextName": "tier", "operator": "IN", "values": ["beta"] }]
        }]
    }))
    .unwrap();
    let ev = Evaluator::with_builtins(InMemoryRepository::new(doc).unwrap());

    let tester = Context::new().with_property("tier", "beta");
    let evaluation = ev.is_enabled("beta", &tester, false);
    assert_eq!(evaluation.result, Outcome::True);
    assert_eq!(evaluation.strategies[0].evaluation.segments[0].name, "beta-testers");
    assert_eq!(ev.is_enabled("beta", &Context::new(), false).result, Outcome::False);
}

#[test]
fn test_dependency_on_parent_variant() {
    let ev = evaluator(json!([
        {
            "name": "parent", "enabled": true,
            "strategies": [{ "name": "default" }],
            "variants": [{ "name": "blue", "weight": 1000 }]
        },
        {
            "name": "child", "enabled": true,
            "strategies": [{ "name": "default" }],
            "variants": [{ "name": "child-variant", "weight": 1000 }],
            "dependencies": [{ "feature": "parent", "variants": ["blue"] }]
        },
        {
            "name": "needs-red", "enabled": true,
            "strategies": [{ "name": "default" }],
            "dependencies": [{ "feature": "parent", "variants": ["red"] }]
        }
    ]));
    let ctx = Context::new().with_user_id("42");
    let child = ev.is_enabled("child", &ctx, false);
    assert!(!child.has_unsatisfied_dependency);
    assert_eq!(ev.get_variant("child", &ctx, None).name, "child-variant");

    let needs_red = ev.is_enabled("needs-red", &ctx, false);
    assert!(needs_red.has_unsatisfied_dependency);
    // strategies alone still say yes; the dependency is reported separately
    assert_eq!(needs_red.result, Outcome::True);
    assert_eq!(ev.get_variant("needs-red", &ctx, None).name, "disabled");
}

#[test]
fn test_evaluation_serializes_in_camel_case() {
    let ev = evaluator(json!([{
        "name": "toggle-name", "enabled": true,
        "strategies": [{ "name": "default", "id": "s1" }]
    }]));
    let value = serde_json::to_value(ev.is_enabled("toggle-name", &Context::new(), false)).unwrap();
    assert_eq!(value["result"], json!(true));
    assert_eq!(value["hasUnsatisfiedDependency"], json!(false));
    assert_eq!(
        value["strategies"][0],
        json!({
            "name": "default",
            "id": "s1",
            "disabled": false,
            "parameters": {},
            "result": { "enabled": true, "evaluationStatus": "complete" },
            "constraints": [],
            "segments": []
        })
    );
}

#[test]
fn test_oversized_variant_weights_fall_back_to_disabled() {
    let ev = evaluator(json!([{
        "name": "toggle-name", "enabled": true,
        "strategies": [{ "name": "default" }],
        "variants": [{ "name": "a", "weight": 4294967295u32 }, { "name": "b", "weight": 1 }]
    }]));
    let ctx = Context::new().with_user_id("42");
    let variant = ev.get_variant("toggle-name", &ctx, None);
    assert_eq!(variant.name, "disabled");
    assert!(variant.feature_enabled);
}
