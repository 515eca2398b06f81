// tests/integration_tests.rs
//! Integration tests for the AML rule engine

use aml_rule_engine::{
    ActionRequest, ActionSink, ActionType, AmlEngine, AmlRule, ConditionOperator, DataType,
    EngineConfig, EvaluationContext, LogicalOperator, RuleAction, RuleCondition, RuleError,
    RuleParameter, RuleRegistry, RuleStatus, RuleVersion, Severity, Value,
};
use chrono::{TimeZone, Utc};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Test double for the external action executor
#[derive(Default)]
struct RecordingSink {
    calls: AtomicUsize,
}

impl ActionSink for RecordingSink {
    fn execute(&self, _request: &ActionRequest) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn amount_rule(status: RuleStatus) -> AmlRule {
    AmlRule::new("R-LARGE", "Large transaction", "Single transaction above 10,000")
        .with_status(status)
        .with_severity(Severity::High)
        .with_condition(RuleCondition::new("c1", "amount", ConditionOperator::Gt, 10000))
        .with_action(RuleAction::new("a1", ActionType::Alert).with_parameter("queue", "aml-l1"))
        .with_action(RuleAction::new("a2", ActionType::Block))
}

#[test]
fn test_end_to_end_amount_threshold() {
    let engine = AmlEngine::default();
    let rule = amount_rule(RuleStatus::Active);

    let high = EvaluationContext::new("txn-1", json!({"amount": 15000}));
    let low = EvaluationContext::new("txn-2", json!({"amount": 5000}));

    assert!(engine.evaluate(&rule, &high).fired);
    assert!(!engine.evaluate(&rule, &low).fired);
}

#[test]
fn test_evaluation_is_idempotent() {
    let engine = AmlEngine::default();
    let rule = amount_rule(RuleStatus::Active)
        .with_condition(
            RuleCondition::new("c2", "country", ConditionOperator::In, vec!["PA", "KY"])
                .joined_by(LogicalOperator::Or),
        );
    let ctx = EvaluationContext::new("txn-1", json!({"amount": 900, "country": "KY"}));

    let first = engine.evaluate(&rule, &ctx);
    let second = engine.evaluate(&rule, &ctx);
    assert_eq!(first, second);
    assert!(first.fired);
}

fn flag_rule(ops: [LogicalOperator; 3]) -> AmlRule {
    ["a", "b", "c"]
        .iter()
        .zip(ops)
        .fold(AmlRule::new("R-FOLD", "Fold", "Fold order"), |rule, (name, op)| {
            rule.with_condition(
                RuleCondition::new(*name, format!("flags.{}", name), ConditionOperator::Eq, true)
                    .joined_by(op),
            )
        })
}

#[test]
fn test_fold_is_strictly_left_to_right() {
    let engine = AmlEngine::new(EngineConfig {
        short_circuit: false,
        ..EngineConfig::default()
    });
    let ctx = EvaluationContext::new("s", json!({"flags": {"a": true, "b": false, "c": true}}));

    // (T AND F) OR T = T
    let and_or = flag_rule([LogicalOperator::And, LogicalOperator::And, LogicalOperator::Or]);
    assert!(engine.evaluate(&and_or, &ctx).fired);

    // (T OR F) AND T = T
    let or_and = flag_rule([LogicalOperator::And, LogicalOperator::Or, LogicalOperator::And]);
    assert!(engine.evaluate(&or_and, &ctx).fired);
}

#[test]
fn test_between_inclusivity() {
    let engine = AmlEngine::default();
    let rule = AmlRule::new("R-BAND", "Band", "Amount in band").with_condition(RuleCondition::new(
        "c1",
        "amount",
        ConditionOperator::Between,
        vec![10, 20],
    ));

    let fires = |amount: i64| {
        engine
            .evaluate(&rule, &EvaluationContext::new("s", json!({ "amount": amount })))
            .fired
    };
    assert!(fires(10));
    assert!(fires(20));
    assert!(!fires(9));
    assert!(!fires(21));
}

#[test]
fn test_missing_field_fails_open_to_false() {
    let engine = AmlEngine::default();
    let rule = AmlRule::new("R-ISO", "Isolation", "Missing field in OR chain")
        .with_condition(RuleCondition::new("ghost", "beneficiary.country", ConditionOperator::Eq, "IR"))
        .with_condition(
            RuleCondition::new("amount", "amount", ConditionOperator::Gt, 100)
                .joined_by(LogicalOperator::Or),
        );

    let verdict = engine.evaluate(&rule, &EvaluationContext::new("s", json!({"amount": 500})));

    assert!(verdict.fired);
    assert!(!verdict.trace[0].result);
    assert!(verdict.trace[0].warning.is_some());
    assert!(verdict.trace[1].result);
}

#[test]
fn test_zero_condition_rule_never_fires() {
    let engine = AmlEngine::default();
    let rule = AmlRule::new("R-EMPTY", "Empty", "No conditions").with_status(RuleStatus::Active);

    for subject in [json!({}), json!({"amount": 1_000_000}), json!([1, 2, 3])] {
        assert!(!engine.evaluate(&rule, &EvaluationContext::new("s", subject)).fired);
    }
}

#[test]
fn test_effectiveness_math() {
    let engine = AmlEngine::default();
    engine.registry().upsert(amount_rule(RuleStatus::Active)).unwrap();

    for i in 0..10 {
        let ctx = EvaluationContext::new(format!("txn-{}", i), json!({"amount": 20000 + i}));
        engine.screen_now(&ctx);
    }
    for _ in 0..7 {
        engine.record_outcome("R-LARGE", true).unwrap();
    }
    for _ in 0..3 {
        engine.record_outcome("R-LARGE", false).unwrap();
    }

    let stats = engine.effectiveness("R-LARGE").unwrap();
    assert_eq!(stats.total_triggers, 10);
    assert!((stats.efficiency().unwrap() - 0.7).abs() < 1e-12);
    assert!(stats.last_triggered.is_some());
}

#[test]
fn test_outcome_for_unknown_rule() {
    let engine = AmlEngine::default();
    assert_eq!(
        engine.record_outcome("R-NONE", true),
        Err(RuleError::UnknownRule("R-NONE".to_string()))
    );
}

#[test]
fn test_system_rule_protection() {
    let registry = RuleRegistry::default();
    registry.upsert(amount_rule(RuleStatus::Active).system()).unwrap();
    let before = registry.list();

    assert_eq!(
        registry.delete("R-LARGE"),
        Err(RuleError::SystemRuleProtected("R-LARGE".to_string()))
    );
    assert_eq!(registry.list(), before);
    assert!(registry.get("R-LARGE").is_some());
}

#[test]
fn test_testing_status_isolation() {
    let engine = AmlEngine::default();
    engine.registry().upsert(amount_rule(RuleStatus::Testing)).unwrap();
    let sink = RecordingSink::default();

    let result = engine.screen_now(&EvaluationContext::new("txn-1", json!({"amount": 50000})));
    let summary = result.route(&sink);

    assert_eq!(result.actions.len(), 2);
    assert!(result.actions.iter().all(|a| a.simulated));
    assert_eq!(summary.forwarded, 0);
    assert_eq!(summary.simulated, 2);
    assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_active_rules_reach_the_sink() {
    let engine = AmlEngine::default();
    engine.registry().upsert(amount_rule(RuleStatus::Active)).unwrap();
    let sink = RecordingSink::default();

    let result = engine.screen_now(&EvaluationContext::new("txn-1", json!({"amount": 50000})));
    result.route(&sink);

    assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
    assert_eq!(result.actions[0].action_type, ActionType::Alert);
    assert_eq!(result.actions[0].parameters.get("queue"), Some(&Value::from("aml-l1")));
}

#[test]
fn test_trigger_event_carries_trace() {
    let engine = AmlEngine::default();
    engine.registry().upsert(amount_rule(RuleStatus::Active)).unwrap();
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();

    let result = engine.screen(&EvaluationContext::new("txn-9", json!({"amount": 12000})), at);

    let event = &result.triggers[0];
    assert_eq!(event.rule_id, "R-LARGE");
    assert_eq!(event.subject_id, "txn-9");
    assert_eq!(event.fired_at, at);
    assert_eq!(event.condition_trace[0].left, Some(Value::Number(12000.0)));
    assert_eq!(event.condition_trace[0].right, Some(Value::Number(10000.0)));
    assert_eq!(engine.effectiveness("R-LARGE").unwrap().last_triggered, Some(at));
}

#[test]
fn test_parameter_and_dynamic_operands() {
    let engine = AmlEngine::default();
    let rule = AmlRule::new("R-SPIKE", "Spike", "Amount far above account average")
        .with_status(RuleStatus::Active)
        .with_parameter(RuleParameter::new("floor", DataType::Number, 1000.0))
        .with_condition(RuleCondition::against_parameter("c1", "amount", ConditionOperator::Gte, "floor"))
        .with_condition(RuleCondition::against_dynamic(
            "c2",
            "amount",
            ConditionOperator::Gt,
            "account_average_x5",
        ));
    engine.registry().upsert(rule).unwrap();

    let resolved = EvaluationContext::new("t", json!({"amount": 6000})).with_dynamic("account_average_x5", 5000.0);
    assert_eq!(engine.screen_now(&resolved).triggers.len(), 1);

    // Unresolved dynamic value: the condition is false, nothing fires
    let unresolved = EvaluationContext::new("t", json!({"amount": 6000}));
    let result = engine.screen_now(&unresolved);
    assert!(result.triggers.is_empty());
    assert!(result.verdicts[0].trace[1].warning.is_some());
}

#[test]
fn test_rules_from_json() {
    let rules = r#"[
        {
            "id": "R-STRUCT",
            "name": "Structuring",
            "description": "Cash deposit just below the reporting threshold",
            "ruleType": "transaction_monitoring",
            "category": "structuring",
            "status": "active",
            "severity": "high",
            "parameters": [
                {"id": "p1", "name": "band", "dataType": "list", "value": [9000, 9999]},
                {"id": "p2", "name": "channels", "dataType": "list", "value": ["cash", "atm"]}
            ],
            "conditions": [
                {"id": "c1", "field": "amount", "operator": "between", "value": "band", "valueType": "parameter"},
                {"id": "c2", "field": "channel", "operator": "in", "value": "channels", "valueType": "parameter", "logicalOperator": "AND"},
                {"id": "c3", "field": "memo", "operator": "regex", "value": "(?i)split|smurf", "logicalOperator": "OR"}
            ],
            "actions": [
                {"id": "a1", "actionType": "escalate", "parameters": {"team": "fiu"}},
                {"id": "a2", "actionType": "reduce-limits", "parameters": {"factor": 0.5}}
            ],
            "isSystemRule": true
        },
        {
            "id": "R-SANCTIONS",
            "name": "Sanctioned country",
            "description": "Counterparty in a sanctioned jurisdiction",
            "ruleType": "sanctions",
            "category": "geography",
            "status": "testing",
            "severity": "critical",
            "conditions": [
                {"id": "c1", "field": "counterparty.country", "operator": "in", "value": ["IR", "KP", "SY"]}
            ],
            "actions": [{"id": "a1", "actionType": "block"}]
        }
    ]"#;

    let engine = AmlEngine::from_json(rules, EngineConfig::default()).unwrap();
    assert_eq!(engine.registry().len(), 2);

    let cash = EvaluationContext::new("t1", json!({"amount": 9500, "channel": "cash", "memo": "deposit"}));
    let result = engine.screen_now(&cash);
    assert_eq!(result.metadata.fired_rules, vec!["R-STRUCT".to_string()]);
    assert_eq!(result.actions[1].action_type, ActionType::ReduceLimits);

    let memo_only = EvaluationContext::new(
        "t2",
        json!({"amount": 20, "channel": "wire", "memo": "Smurfing run", "counterparty": {"country": "KP"}}),
    );
    let result = engine.screen_now(&memo_only);
    assert_eq!(result.metadata.evaluated_rules.len(), 2);
    assert_eq!(result.metadata.fired_rules.len(), 2);
    assert_eq!(result.actions.iter().filter(|a| a.simulated).count(), 1);
}

#[test]
fn test_invalid_rule_json_is_reported() {
    let bad = r#"[{"id": "R", "name": "n", "description": "d", "ruleType": "t", "category": "c",
                   "severity": "low",
                   "conditions": [{"id": "c1", "field": "amount", "operator": "between", "value": [1, 2, 3]}]}]"#;
    assert!(matches!(
        AmlEngine::from_json(bad, EngineConfig::default()),
        Err(RuleError::ValidationFailed { .. })
    ));
    assert!(matches!(
        AmlEngine::from_json("not json", EngineConfig::default()),
        Err(RuleError::Parse(_))
    ));
}

#[test]
fn test_versioning_through_engine() {
    let engine = AmlEngine::default();
    let registry = engine.registry();
    assert_eq!(registry.upsert(amount_rule(RuleStatus::Inactive)).unwrap(), RuleVersion::new(1, 0));

    let edited = amount_rule(RuleStatus::Inactive).with_severity(Severity::Critical);
    assert_eq!(registry.upsert(edited).unwrap(), RuleVersion::new(1, 1));
    assert_eq!(registry.get("R-LARGE").unwrap().version.to_string(), "1.1");
}

#[test]
fn test_concurrent_screening_and_registry_writes() {
    let engine = AmlEngine::default();
    engine.registry().upsert(amount_rule(RuleStatus::Active)).unwrap();

    let workers: Vec<_> = (0..4)
        .map(|w| {
            let engine = engine.clone();
            std::thread::spawn(move || {
                for i in 0..100 {
                    let ctx = EvaluationContext::new(format!("{}-{}", w, i), json!({"amount": 11000}));
                    engine.screen_now(&ctx);
                }
            })
        })
        .collect();

    let writer = {
        let engine = engine.clone();
        std::thread::spawn(move || {
            for _ in 0..20 {
                engine
                    .registry()
                    .upsert(amount_rule(RuleStatus::Active).with_severity(Severity::Critical))
                    .unwrap();
            }
        })
    };

    for handle in workers {
        handle.join().unwrap();
    }
    writer.join().unwrap();

    assert_eq!(engine.effectiveness("R-LARGE").unwrap().total_triggers, 400);
    assert_eq!(engine.registry().get("R-LARGE").unwrap().version, RuleVersion::new(1, 20));
}

#[test]
fn test_engine_restored_from_snapshots() {
    let engine = AmlEngine::default();
    engine.registry().upsert(amount_rule(RuleStatus::Active)).unwrap();
    engine.screen_now(&EvaluationContext::new("t", json!({"amount": 99999})));

    let rules = engine.registry().export_snapshot().unwrap();
    let stats = engine.tracker().export_snapshot().unwrap();

    let restored = AmlEngine::with_stores(
        EngineConfig::default(),
        RuleRegistry::import_snapshot(&rules, EngineConfig::default()).unwrap(),
        aml_rule_engine::EffectivenessTracker::import_snapshot(&stats).unwrap(),
    );

    restored.record_outcome("R-LARGE", true).unwrap();
    assert_eq!(restored.effectiveness("R-LARGE").unwrap().efficiency(), Some(1.0));
    assert_eq!(restored.screen_now(&EvaluationContext::new("t2", json!({"amount": 99999}))).triggers.len(), 1);
}
