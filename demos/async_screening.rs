// demos/async_screening.rs
//! Integrating the rule engine with async I/O
//!
//! Screening itself is synchronous and cheap; fetching subjects and
//! executing actions happen around it on the tokio runtime.

use aml_rule_engine::{
    ActionRequest, ActionType, AmlEngine, AmlRule, ConditionOperator, EffectivenessTracker,
    EngineConfig, EvaluationContext, LogicalOperator, RuleAction, RuleCondition, RuleRegistry,
    RuleStatus, Severity,
};
use serde_json::json;
use std::time::Duration;

// Simulated async customer store
struct Database;

impl Database {
    async fn load_transaction(&self, txn_id: &str, amount: f64, country: &str) -> EvaluationContext {
        tokio::time::sleep(Duration::from_micros(100)).await;

        EvaluationContext::new(
            txn_id,
            json!({
                "amount": amount,
                "channel": "wire",
                "counterparty": {"country": country},
                "account": {"opened": "2026-09-30"}
            }),
        )
        .with_dynamic("average_amount", 800.0)
    }
}

// Simulated downstream case management
struct ActionExecutor;

impl ActionExecutor {
    async fn execute(&self, requests: Vec<ActionRequest>) {
        for request in requests {
            if request.simulated {
                println!("  [SIMULATED] {:?} from {}", request.action_type, request.rule_id);
                continue;
            }
            match request.action_type {
                ActionType::Block => {
                    tokio::time::sleep(Duration::from_micros(30)).await;
                    println!("  [ACTION] Blocked {}", request.subject_id);
                }
                ActionType::Alert | ActionType::Escalate => {
                    tokio::time::sleep(Duration::from_micros(20)).await;
                    println!(
                        "  [ACTION] Case opened for {} ({:?}, {})",
                        request.subject_id, request.severity, request.rule_id
                    );
                }
                other => println!("  [ACTION] {:?} for {}", other, request.subject_id),
            }
        }
    }
}

struct ScreeningService {
    engine: AmlEngine,
    database: Database,
    executor: ActionExecutor,
}

impl ScreeningService {
    fn new(engine: AmlEngine) -> Self {
        Self {
            engine,
            database: Database,
            executor: ActionExecutor,
        }
    }

    async fn process(&self, txn_id: String, amount: f64, country: &str) {
        // Step 1: fetch subject (async)
        let ctx = self.database.load_transaction(&txn_id, amount, country).await;

        // Step 2: screen (sync)
        let result = self.engine.screen_now(&ctx);
        println!(
            "{}: fired {:?} in {:?}",
            txn_id, result.metadata.fired_rules, result.metadata.total_duration
        );

        // Step 3: execute actions (async)
        if !result.actions.is_empty() {
            self.executor.execute(result.actions).await;
        }
    }
}

fn rules() -> Vec<AmlRule> {
    vec![
        AmlRule::new("R-SPIKE", "Amount spike", "Amount far above the account average")
            .with_status(RuleStatus::Active)
            .with_severity(Severity::Medium)
            .with_condition(RuleCondition::against_dynamic(
                "c1",
                "amount",
                ConditionOperator::Gt,
                "average_amount",
            ))
            .with_condition(
                RuleCondition::new("c2", "amount", ConditionOperator::Gte, 5000.0)
                    .joined_by(LogicalOperator::And),
            )
            .with_action(RuleAction::new("a1", ActionType::Alert).with_parameter("queue", "review")),
        AmlRule::new("R-NEW-ACCOUNT", "New account wire", "Wire from an account opened recently")
            .with_status(RuleStatus::Testing)
            .with_severity(Severity::Low)
            .with_condition(RuleCondition::new(
                "c1",
                "account.opened",
                ConditionOperator::Gt,
                "2026-09-01",
            ))
            .with_action(RuleAction::new("a1", ActionType::Verify)),
        AmlRule::new("R-GEO", "Monitored jurisdiction", "Counterparty in a monitored jurisdiction")
            .with_status(RuleStatus::Active)
            .with_severity(Severity::Critical)
            .with_condition(RuleCondition::new(
                "c1",
                "counterparty.country",
                ConditionOperator::In,
                vec!["IR", "KP", "SY"],
            ))
            .with_action(RuleAction::new("a1", ActionType::Block)),
    ]
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== AML Rule Engine - Async Screening ===\n");

    let engine = AmlEngine::new(EngineConfig::default());
    for rule in rules() {
        engine.registry().upsert(rule).expect("valid rule");
    }

    let service = std::sync::Arc::new(ScreeningService::new(engine));
    let test_cases = vec![
        ("txn-001", 300.0, "US"),
        ("txn-002", 7500.0, "US"),
        ("txn-003", 450.0, "KP"),
        ("txn-004", 9100.0, "SY"),
    ];

    let mut handles = vec![];
    for (txn_id, amount, country) in test_cases {
        let service = std::sync::Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service.process(txn_id.to_string(), amount, country).await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    println!("\n=== Effectiveness ===");
    for stats in service.engine.tracker().all() {
        println!("  {}: {} trigger(s)", stats.rule_id, stats.total_triggers);
    }

    // Hot reload: persist both stores and bring up a new engine from them
    println!("\n=== Restoring from snapshot ===\n");

    let rules_snapshot = service.engine.registry().export_snapshot().unwrap();
    let stats_snapshot = service.engine.tracker().export_snapshot().unwrap();
    let config = service.engine.config().clone();
    let restored = AmlEngine::with_stores(
        config.clone(),
        RuleRegistry::import_snapshot(&rules_snapshot, config).unwrap(),
        EffectivenessTracker::import_snapshot(&stats_snapshot).unwrap(),
    );

    let restored = ScreeningService::new(restored);
    restored.process("txn-005".to_string(), 12000.0, "IR").await;

    let geo = restored.engine.effectiveness("R-GEO").unwrap();
    println!("\nR-GEO triggers after restore: {}", geo.total_triggers);
}
