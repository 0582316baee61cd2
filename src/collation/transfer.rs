//! Bulk Ruleset transfer as a self-describing JSON document.
//!
//! The document is a list of Rulesets with nested Rules, match criteria and actions. Match and
//! action types are written by name (e.g. `"Match Duplicate Nodes"`, `"Keep Newest Node"`).

use crate::{
    collation::model::{
        Action, MatchCriterion, Rule, RuleBook, RuleId, Ruleset, RulesetId, DEFAULT_PRIORITY,
    },
    error::CollationError,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

fn default_enabled() -> bool {
    true
}

fn default_priority() -> i16 {
    DEFAULT_PRIORITY
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDocument {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_priority")]
    pub priority: i16,
    #[serde(default)]
    pub match_criteria: Vec<MatchCriterion>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesetDocument {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_priority")]
    pub priority: i16,
    #[serde(default)]
    pub rules: Vec<RuleDocument>,
}

impl From<&Ruleset> for RulesetDocument {
    fn from(ruleset: &Ruleset) -> Self {
        RulesetDocument {
            name: ruleset.name.clone(),
            enabled: ruleset.enabled,
            priority: ruleset.priority,
            rules: ruleset
                .rules
                .iter()
                .map(|rule| RuleDocument {
                    name: rule.name.clone(),
                    enabled: rule.enabled,
                    priority: rule.priority,
                    match_criteria: rule.match_criteria.clone(),
                    actions: rule.actions.clone(),
                })
                .collect(),
        }
    }
}

impl From<RulesetDocument> for Ruleset {
    fn from(document: RulesetDocument) -> Self {
        Ruleset {
            id: RulesetId::default(),
            name: document.name,
            enabled: document.enabled,
            priority: document.priority,
            rules: document
                .rules
                .into_iter()
                .map(|rule| Rule {
                    id: RuleId::default(),
                    name: rule.name,
                    enabled: rule.enabled,
                    priority: rule.priority,
                    match_criteria: rule.match_criteria,
                    actions: rule.actions,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidRuleset {
    pub document: JsonValue,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferResult {
    pub created: Vec<RulesetId>,
    pub invalid: Vec<InvalidRuleset>,
}

/// Serialize the given Rulesets (all of them when `ids` is `None`) to pretty JSON.
pub fn export_rulesets(
    book: &RuleBook,
    ids: Option<&[RulesetId]>,
) -> Result<String, CollationError> {
    let documents: Vec<RulesetDocument> = book
        .rulesets()
        .iter()
        .filter(|r| ids.map_or(true, |ids| ids.contains(&r.id)))
        .map(RulesetDocument::from)
        .collect();
    Ok(serde_json::to_string_pretty(&documents)?)
}

/// Create the Rulesets described by a transfer document.
///
/// A document that is not JSON, not a list, or holds a non-object item is rejected outright.
/// Otherwise each Ruleset replaces any Ruleset of the same name; a Ruleset that fails to
/// deserialize or to insert leaves the RuleBook as it was and is listed in
/// [TransferResult::invalid].
pub fn import_rulesets(book: &mut RuleBook, document: &str) -> Result<TransferResult, CollationError> {
    let data: JsonValue = serde_json::from_str(document)
        .map_err(|e| CollationError::RulesetParse(e.to_string()))?;
    let JsonValue::Array(items) = data else {
        tracing::warn!("ruleset document did not deserialize to a list");
        return Err(CollationError::RulesetParse(
            "expected a list of Rulesets".to_string(),
        ));
    };
    if !items.iter().all(JsonValue::is_object) {
        tracing::warn!("at least one item in the rulesets list is not an object");
        return Err(CollationError::RulesetParse(
            "every Ruleset must be an object".to_string(),
        ));
    }

    let mut result = TransferResult::default();
    for item in items {
        match import_one(book, &item) {
            Ok(id) => result.created.push(id),
            Err(e) => {
                tracing::debug!("[transfer::import_rulesets] invalid ruleset: {}", e);
                result.invalid.push(InvalidRuleset {
                    document: item,
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok(result)
}

fn import_one(book: &mut RuleBook, item: &JsonValue) -> Result<RulesetId, CollationError> {
    let document: RulesetDocument = serde_json::from_value(item.clone())?;
    let snapshot = book.clone();
    if let Some(existing) = book.ruleset_by_name(&document.name).map(|r| r.id) {
        book.remove_ruleset(existing)?;
        tracing::debug!(
            "[transfer::import_one] deleted existing ruleset {}",
            document.name
        );
    }
    let name = document.name.clone();
    match book.insert_ruleset(document.into()) {
        Ok(id) => {
            tracing::debug!("[transfer::import_one] created ruleset {}", name);
            Ok(id)
        }
        Err(e) => {
            *book = snapshot;
            Err(e)
        }
    }
}
