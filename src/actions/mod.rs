// src/actions/mod.rs
//! Actions requested by fired rules
//!
//! The engine never performs side effects itself. Fired rules are expanded
//! into [`ActionRequest`]s and handed to an [`ActionSink`] owned by the
//! caller. Requests from `testing` rules are marked simulated and are only
//! logged, never forwarded.

use crate::model::{AmlRule, RuleStatus, Severity};
use crate::Value;
use ahash::HashMap;
use serde::{Deserialize, Serialize};

pub use crate::model::ActionType;

/// Normalized side-effect request for an external executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action_id: String,
    pub action_type: ActionType,
    /// Copied verbatim from the rule definition
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    pub rule_id: String,
    pub subject_id: String,
    pub severity: Severity,
    /// Set for requests from `testing` rules
    pub simulated: bool,
}

/// External collaborator that executes action requests
/// (alerting, blocking, limit changes, ...)
pub trait ActionSink {
    fn execute(&self, request: &ActionRequest);
}

/// Counts from routing a batch of requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoutingSummary {
    pub forwarded: usize,
    pub simulated: usize,
}

pub struct ActionDispatcher;

impl ActionDispatcher {
    /// Expand a fired rule's actions in declaration order.
    ///
    /// Only `active` and `testing` rules dispatch; for any other status the
    /// result is empty.
    pub fn dispatch(rule: &AmlRule, subject_id: &str) -> Vec<ActionRequest> {
        let simulated = match rule.status {
            RuleStatus::Active => false,
            RuleStatus::Testing => true,
            status => {
                tracing::debug!(rule_id = %rule.id, %status, "Rule not dispatchable");
                return Vec::new();
            }
        };

        rule.actions
            .iter()
            .map(|action| ActionRequest {
                action_id: action.id.clone(),
                action_type: action.action_type,
                parameters: action.parameters.clone(),
                rule_id: rule.id.clone(),
                subject_id: subject_id.to_string(),
                severity: rule.severity,
                simulated,
            })
            .collect()
    }

    /// Hand real requests to the sink and log simulated ones
    pub fn route<S: ActionSink + ?Sized>(requests: &[ActionRequest], sink: &S) -> RoutingSummary {
        let mut summary = RoutingSummary::default();

        for request in requests {
            if request.simulated {
                tracing::info!(
                    rule_id = %request.rule_id,
                    subject_id = %request.subject_id,
                    action = ?request.action_type,
                    "Simulated action not forwarded"
                );
                summary.simulated += 1;
            } else {
                sink.execute(request);
                summary.forwarded += 1;
            }
        }

        summary
    }
}
