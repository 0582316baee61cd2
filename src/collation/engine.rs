use crate::{
    collation::{
        action_types::ActionOutcome,
        model::{Info, Rule, RuleBook, RuleId, Ruleset, RulesetId},
        report::{ApplyReport, RuleLog, RuleOutcome, RuleReport},
    },
    error::CollationError,
    properties::{ElementKind, ElementKindSet, ElementRef},
    store::TopologyStore,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// True when every required key appears exactly once, no optional key repeats, and nothing
/// outside the two lists was supplied.
pub fn validate_input(required: &[&str], optional: &[&str], infos: &[Info]) -> bool {
    let count = |key: &str| infos.iter().filter(|info| info.key == key).count();
    required.iter().all(|key| count(key) == 1)
        && optional.iter().all(|key| count(key) <= 1)
        && infos
            .iter()
            .all(|info| required.contains(&info.key.as_str()) || optional.contains(&info.key.as_str()))
}

/// Check a Rule is safe to apply. Returns the one element kind all its parts agree on.
pub fn validate_rule(rule: &Rule) -> Result<ElementKind, CollationError> {
    if rule.match_criteria.is_empty() {
        return Err(CollationError::NoMatchCriteria(rule.log_str()));
    }
    if rule.actions.is_empty() {
        return Err(CollationError::NoActions(rule.log_str()));
    }
    let kinds: ElementKindSet = rule
        .match_criteria
        .iter()
        .map(|c| c.match_type.element_kind())
        .chain(rule.actions.iter().map(|a| a.action_type.element_kind()))
        .collect();
    let kind = match (kinds.len(), kinds.iter().next()) {
        (1, Some(kind)) => kind,
        _ => return Err(CollationError::ConflictingElementKinds(rule.log_str())),
    };
    for criterion in rule.match_criteria.iter() {
        let required = criterion.match_type.required_info();
        if !validate_input(required, &[], &criterion.infos) {
            return Err(CollationError::IncorrectMatchInfos {
                match_type: criterion.match_type.name(),
                required: required.join(", "),
            });
        }
    }
    for action in rule.actions.iter() {
        if !action.action_type.is_supported() {
            return Err(CollationError::UnsupportedActionType {
                action: rule.log_str(),
                name: action.action_type.name(),
            });
        }
        let required = action.action_type.required_info();
        if !validate_input(required, action.action_type.optional_info(), &action.infos) {
            return Err(CollationError::IncorrectActionInfos {
                action_type: action.action_type.name(),
                required: required.join(", "),
            });
        }
    }
    Ok(kind)
}

/// Match and act, without validation or rollback.
fn run_rule(
    store: &mut TopologyStore,
    rule: &Rule,
    kind: ElementKind,
) -> Result<RuleLog, CollationError> {
    let mut matched = store.keys(kind);
    for criterion in rule.match_criteria.iter() {
        matched = criterion
            .match_type
            .filter(store, &matched, &criterion.infos)?;
    }
    let mut log = RuleLog::new(rule.id, &rule.name, kind, matched.clone());

    for element in matched {
        let mut current = element;
        for action in rule.actions.iter() {
            // An earlier element's Actions may have removed this one already.
            if !store.contains(ElementRef::new(kind, current)) {
                tracing::debug!(
                    "[engine::run_rule] {} [{}] no longer exists, skipping",
                    kind,
                    current
                );
                break;
            }
            let (outcome, action_log) = action
                .action_type
                .apply(store, current, &action.infos)?;
            log.push(action_log);
            match outcome {
                ActionOutcome::Continue(next) => current = next,
                ActionOutcome::Stopped(_) => break,
            }
        }
    }
    Ok(log)
}

/// Validate and apply one Rule. An unexpected error rolls the Rule's changes back and is
/// reported, never raised.
pub fn apply_rule(store: &mut TopologyStore, rule: &Rule, ruleset: Option<RulesetId>) -> RuleReport {
    let outcome = match validate_rule(rule) {
        Err(e) => {
            tracing::warn!("Rule misconfiguration detected: {}", e);
            RuleOutcome::NotRun(e)
        }
        Ok(kind) => match store.transaction(|store| run_rule(store, rule, kind)) {
            Ok(log) => {
                tracing::info!("{}", log.admin_message());
                RuleOutcome::Completed(log)
            }
            Err(e) => {
                tracing::error!("Rule {} failed and was rolled back: {}", rule.log_str(), e);
                RuleOutcome::Failed(e)
            }
        },
    };
    RuleReport {
        ruleset,
        rule_id: rule.id,
        rule_name: rule.name.clone(),
        outcome,
    }
}

/// Apply the enabled Rules of a Ruleset by ascending priority.
pub fn apply_ruleset(store: &mut TopologyStore, ruleset: &Ruleset) -> ApplyReport {
    let mut report = ApplyReport::default();
    tracing::debug!(
        "[engine::apply_ruleset] {} [{}]: {} enabled Rule(s)",
        ruleset.name,
        ruleset.id,
        ruleset.ordered_rules().len()
    );
    for rule in ruleset.ordered_rules() {
        report.push(apply_rule(store, rule, Some(ruleset.id)));
    }
    report
}

/// Readiness of one Rule, as returned by the health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleHealth {
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesetHealth {
    pub ready: bool,
    /// Failure message per misconfigured Rule.
    pub detail: BTreeMap<RuleId, String>,
}

pub fn rule_health(rule: &Rule) -> RuleHealth {
    match validate_rule(rule) {
        Ok(_) => RuleHealth {
            ready: true,
            detail: None,
        },
        Err(e) => RuleHealth {
            ready: false,
            detail: Some(e.to_string()),
        },
    }
}

/// A Ruleset is ready when every enabled Rule is.
pub fn ruleset_health(ruleset: &Ruleset) -> RulesetHealth {
    let mut ready = true;
    let mut detail = BTreeMap::new();
    for rule in ruleset.rules.iter() {
        if let Err(e) = validate_rule(rule) {
            ready &= !rule.enabled;
            detail.insert(rule.id, e.to_string());
        }
    }
    RulesetHealth { ready, detail }
}

impl RuleBook {
    pub fn apply_rule(
        &self,
        store: &mut TopologyStore,
        id: RuleId,
    ) -> Result<RuleReport, CollationError> {
        let (ruleset, rule) = self
            .rule(id)
            .ok_or_else(|| CollationError::NotFound(format!("Rule [{id}]")))?;
        Ok(apply_rule(store, rule, Some(ruleset.id)))
    }

    pub fn apply_ruleset(
        &self,
        store: &mut TopologyStore,
        id: RulesetId,
    ) -> Result<ApplyReport, CollationError> {
        let ruleset = self
            .ruleset(id)
            .ok_or_else(|| CollationError::NotFound(format!("Ruleset [{id}]")))?;
        Ok(apply_ruleset(store, ruleset))
    }

    /// Apply every enabled Ruleset by ascending priority.
    pub fn apply_all(&self, store: &mut TopologyStore) -> ApplyReport {
        let mut report = ApplyReport::default();
        for ruleset in self.ordered_rulesets() {
            report.extend(apply_ruleset(store, ruleset));
        }
        report
    }

    pub fn rule_status(&self, id: RuleId) -> Result<RuleHealth, CollationError> {
        self.rule(id)
            .map(|(_, rule)| rule_health(rule))
            .ok_or_else(|| CollationError::NotFound(format!("Rule [{id}]")))
    }

    pub fn ruleset_status(&self, id: RulesetId) -> Result<RulesetHealth, CollationError> {
        self.ruleset(id)
            .map(ruleset_health)
            .ok_or_else(|| CollationError::NotFound(format!("Ruleset [{id}]")))
    }
}
