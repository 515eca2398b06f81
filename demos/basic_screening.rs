// demos/basic_screening.rs
//! Basic usage of the AML rule engine
//!
//! Run with: RUST_LOG=aml_rule_engine=debug cargo run --example basic_screening

use aml_rule_engine::{
    ActionRequest, ActionSink, AmlEngine, EngineConfig, EvaluationContext, RuleStatus,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

const RULES: &str = r#"[
    {
        "id": "R-LARGE-CASH",
        "name": "Large cash deposit",
        "description": "Cash deposit at or above the reporting threshold",
        "ruleType": "transaction_monitoring",
        "category": "threshold",
        "status": "active",
        "severity": "high",
        "parameters": [
            {"id": "p1", "name": "threshold", "dataType": "number", "value": 10000, "minValue": 0}
        ],
        "conditions": [
            {"id": "c1", "field": "amount", "operator": ">=", "value": "threshold", "valueType": "parameter"},
            {"id": "c2", "field": "channel", "operator": "=", "value": "cash", "logicalOperator": "AND"}
        ],
        "actions": [
            {"id": "a1", "actionType": "alert", "parameters": {"queue": "ctr"}}
        ],
        "isSystemRule": true
    },
    {
        "id": "R-STRUCTURING",
        "name": "Possible structuring",
        "description": "Deposits just under the threshold or with a telling memo",
        "ruleType": "transaction_monitoring",
        "category": "structuring",
        "status": "active",
        "severity": "medium",
        "conditions": [
            {"id": "c1", "field": "amount", "operator": "between", "value": [9000, 9999]},
            {"id": "c2", "field": "memo", "operator": "regex", "value": "(?i)split|part \\d+", "logicalOperator": "OR"}
        ],
        "actions": [
            {"id": "a1", "actionType": "escalate", "parameters": {"team": "fiu"}},
            {"id": "a2", "actionType": "reduce_limits", "parameters": {"factor": 0.5}}
        ]
    },
    {
        "id": "R-HIGH-RISK-GEO",
        "name": "High-risk jurisdiction",
        "description": "Counterparty located in a monitored jurisdiction",
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

struct PrintingSink;

impl ActionSink for PrintingSink {
    fn execute(&self, request: &ActionRequest) {
        println!(
            "  [ACTION] {:?} from {} for {} ({:?})",
            request.action_type, request.rule_id, request.subject_id, request.severity
        );
    }
}

fn screen(engine: &AmlEngine, title: &str, ctx: EvaluationContext) {
    println!("{}", title);

    let result = engine.screen_now(&ctx);
    println!("  Evaluated rules: {:?}", result.metadata.evaluated_rules);
    println!("  Fired rules: {:?}", result.metadata.fired_rules);

    for verdict in &result.verdicts {
        for trace in verdict.warnings() {
            println!(
                "  Warning in {}/{}: {}",
                verdict.rule_id,
                trace.condition_id,
                trace.warning.as_deref().unwrap_or_default()
            );
        }
    }

    let summary = result.route(&PrintingSink);
    println!(
        "  Forwarded {} action(s), simulated {}",
        summary.forwarded, summary.simulated
    );
    println!("  Duration: {:?}\n", result.metadata.total_duration);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== AML Rule Engine - Basic Screening ===\n");

    let engine = AmlEngine::from_json(RULES, EngineConfig::default()).expect("Failed to load rules");
    for meta in engine.registry().list() {
        println!("Loaded {} v{} [{}]", meta.id, meta.version, meta.status);
    }
    println!();

    screen(
        &engine,
        "Example 1: Ordinary card payment",
        EvaluationContext::new(
            "txn-001",
            json!({"amount": 120.0, "channel": "card", "memo": "groceries",
                   "counterparty": {"country": "US"}}),
        ),
    );

    screen(
        &engine,
        "Example 2: Large cash deposit",
        EvaluationContext::new(
            "txn-002",
            json!({"amount": 15000.0, "channel": "cash", "memo": "sale proceeds",
                   "counterparty": {"country": "US"}}),
        ),
    );

    screen(
        &engine,
        "Example 3: Structured deposit to a monitored jurisdiction",
        EvaluationContext::from_record(
            json!({"id": "txn-003", "amount": 9500.0, "channel": "wire", "memo": "part 2 of 3",
                   "counterparty": {"country": "IR"}}),
            "id",
        ),
    );

    // Analyst feedback on the structuring alerts
    engine.record_outcome("R-STRUCTURING", true).expect("pending trigger");

    println!("=== Effectiveness ===");
    for stats in engine.tracker().all() {
        match stats.efficiency() {
            Some(efficiency) => println!(
                "  {}: {} trigger(s), efficiency {:.2}",
                stats.rule_id,
                stats.total_triggers,
                efficiency
            ),
            None => println!("  {}: no triggers", stats.rule_id),
        }
    }

    // Promote the testing rule once it looks useful
    engine
        .registry()
        .set_status("R-HIGH-RISK-GEO", RuleStatus::Active)
        .expect("known rule");
    println!("\nActive rules: {}", engine.registry().active_rules().len());
}
