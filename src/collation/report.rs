//! Activity logs produced while applying Rules.
//!
//! An [ActionLog] records one Action on one matched element, a [RuleLog] aggregates the Action
//! logs of one Rule application, and [ApplyReport] collects [RuleReport]s across Rulesets so the
//! caller can tell "not run", "ran with failures" and "ran successfully" apart.

use crate::{
    collation::model::{RuleId, RulesetId},
    error::CollationError,
    properties::{ElementKind, ElementRef, SeqKey},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter},
};

/// Keys of touched elements, deduplicated and partitioned by kind.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedElements {
    pub institutions: BTreeSet<SeqKey>,
    pub nodes: BTreeSet<SeqKey>,
    pub links: BTreeSet<SeqKey>,
}

impl AffectedElements {
    pub fn insert(&mut self, element: ElementRef) {
        self.of_kind_mut(element.kind).insert(element.key);
    }

    pub fn extend<I: IntoIterator<Item = ElementRef>>(&mut self, elements: I) {
        for element in elements {
            self.insert(element);
        }
    }

    pub fn union(&mut self, other: &AffectedElements) {
        self.institutions.extend(other.institutions.iter().copied());
        self.nodes.extend(other.nodes.iter().copied());
        self.links.extend(other.links.iter().copied());
    }

    pub fn of_kind(&self, kind: ElementKind) -> &BTreeSet<SeqKey> {
        match kind {
            ElementKind::Institution => &self.institutions,
            ElementKind::Node => &self.nodes,
            ElementKind::Link => &self.links,
        }
    }

    fn of_kind_mut(&mut self, kind: ElementKind) -> &mut BTreeSet<SeqKey> {
        match kind {
            ElementKind::Institution => &mut self.institutions,
            ElementKind::Node => &mut self.nodes,
            ElementKind::Link => &mut self.links,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.institutions.is_empty() && self.nodes.is_empty() && self.links.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLog {
    /// Name of the ActionType that ran.
    pub action: String,
    pub element: ElementRef,
    /// `log_str` of the element captured before the Action ran; it may no longer exist.
    pub element_log: String,
    pub succeeded: bool,
    pub message: String,
    pub affected: AffectedElements,
}

impl ActionLog {
    pub fn new(action: String, element: ElementRef, element_log: String) -> Self {
        ActionLog {
            action,
            element,
            element_log,
            succeeded: false,
            message: String::new(),
            affected: AffectedElements::default(),
        }
    }

    /// Record a resolution failure. Nothing was changed, so nothing is listed as affected.
    pub fn abort(&mut self, message: String) {
        tracing::warn!("{}", message);
        self.succeeded = false;
        self.message = message;
        self.affected = AffectedElements::default();
    }

    pub fn result(&mut self, message: String, affected: AffectedElements) {
        tracing::debug!("{}", message);
        self.succeeded = true;
        self.message = message;
        self.affected = affected;
    }
}

/// Everything one application of one Rule did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleLog {
    pub rule_id: RuleId,
    pub rule_name: String,
    pub element_kind: ElementKind,
    pub matched: Vec<SeqKey>,
    pub action_logs: Vec<ActionLog>,
}

impl RuleLog {
    pub fn new(rule_id: RuleId, rule_name: &str, element_kind: ElementKind, matched: Vec<SeqKey>) -> Self {
        tracing::info!(
            "Rule {} [{}] running Actions on {} {}.",
            rule_name,
            rule_id,
            matched.len(),
            element_kind.plural()
        );
        RuleLog {
            rule_id,
            rule_name: rule_name.to_string(),
            element_kind,
            matched,
            action_logs: Vec::new(),
        }
    }

    pub fn push(&mut self, action_log: ActionLog) {
        self.action_logs.push(action_log);
    }

    pub fn affected(&self) -> AffectedElements {
        let mut affected = AffectedElements::default();
        for action_log in self.action_logs.iter() {
            affected.union(&action_log.affected);
        }
        affected
    }

    pub fn aborted_actions(&self) -> usize {
        self.action_logs.iter().filter(|a| !a.succeeded).count()
    }

    pub fn admin_message(&self) -> String {
        let affected = self.affected();
        format!(
            "Applied Rule {} successfully. Elements affected: {} Link(s), {} Node(s), {} \
             Institution(s).",
            self.rule_name,
            affected.links.len(),
            affected.nodes.len(),
            affected.institutions.len()
        )
    }

    pub fn api_message(&self) -> JsonValue {
        let affected = self.affected();
        let actions: Vec<JsonValue> = self
            .action_logs
            .iter()
            .map(|a| {
                json!({
                    "action": a.action,
                    "element": a.element_log,
                    "message": a.message,
                })
            })
            .collect();
        json!({
            "rule": { "key": self.rule_id, "name": self.rule_name },
            "matched_elements": {
                "type": self.element_kind,
                "quantity": self.matched.len(),
                "primary_keys": self.matched,
            },
            "actions": actions,
            "affected": {
                "institutions": affected.institutions,
                "nodes": affected.nodes,
                "links": affected.links,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RuleOutcome {
    /// Validation failed; nothing was matched or changed.
    NotRun(CollationError),
    /// An unexpected error stopped the Rule. Its changes were rolled back.
    Failed(CollationError),
    Completed(RuleLog),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleStatus {
    ValidationFailed,
    RanWithFailures,
    Succeeded,
}

impl Display for RuleStatus {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let text = match self {
            RuleStatus::ValidationFailed => "validation failed, not run",
            RuleStatus::RanWithFailures => "ran with failures",
            RuleStatus::Succeeded => "ran successfully",
        };
        write!(f, "{text}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleReport {
    pub ruleset: Option<RulesetId>,
    pub rule_id: RuleId,
    pub rule_name: String,
    pub outcome: RuleOutcome,
}

impl RuleReport {
    pub fn status(&self) -> RuleStatus {
        match &self.outcome {
            RuleOutcome::NotRun(_) => RuleStatus::ValidationFailed,
            RuleOutcome::Failed(_) => RuleStatus::RanWithFailures,
            RuleOutcome::Completed(log) if log.aborted_actions() > 0 => {
                RuleStatus::RanWithFailures
            }
            RuleOutcome::Completed(_) => RuleStatus::Succeeded,
        }
    }

    pub fn log(&self) -> Option<&RuleLog> {
        match &self.outcome {
            RuleOutcome::Completed(log) => Some(log),
            _ => None,
        }
    }

    pub fn message(&self) -> String {
        match &self.outcome {
            RuleOutcome::NotRun(e) => format!("Rule {} was not run: {}", self.rule_name, e),
            RuleOutcome::Failed(e) => format!("Rule {} failed: {}", self.rule_name, e),
            RuleOutcome::Completed(log) => log.admin_message(),
        }
    }
}

/// Reports of every Rule considered by one apply call, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub rules: Vec<RuleReport>,
}

impl ApplyReport {
    pub fn push(&mut self, report: RuleReport) {
        self.rules.push(report);
    }

    pub fn extend(&mut self, other: ApplyReport) {
        self.rules.extend(other.rules);
    }

    pub fn count(&self, status: RuleStatus) -> usize {
        self.rules.iter().filter(|r| r.status() == status).count()
    }

    pub fn affected(&self) -> AffectedElements {
        let mut affected = AffectedElements::default();
        for log in self.rules.iter().filter_map(|r| r.log()) {
            affected.union(&log.affected());
        }
        affected
    }

    pub fn api_message(&self) -> JsonValue {
        JsonValue::Array(
            self.rules
                .iter()
                .map(|r| match &r.outcome {
                    RuleOutcome::Completed(log) => log.api_message(),
                    _ => json!({
                        "rule": { "key": r.rule_id, "name": r.rule_name },
                        "status": r.status().to_string(),
                        "message": r.message(),
                    }),
                })
                .collect(),
        )
    }
}

impl Display for ApplyReport {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        for report in self.rules.iter() {
            writeln!(f, "[{}] {}", report.status(), report.message())?;
        }
        Ok(())
    }
}
