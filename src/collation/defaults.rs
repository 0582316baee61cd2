//! Built-in ID collision resolution.
//!
//! The custom Ruleset runs first and starts empty, leaving room for administrator Rules. The
//! default Ruleset collapses every duplicated GRENML ID onto its newest element.

use crate::{
    collation::{
        action_types::ActionType,
        match_types::MatchType,
        model::{Action, MatchCriterion, Rule, RuleBook, Ruleset, RulesetId},
    },
    error::CollationError,
    properties::ElementKind,
};

pub const CUSTOM_RULESET_NAME: &str = "Custom ID Collision Resolution";
pub const DEFAULT_RULESET_NAME: &str = "Default ID Collision Resolution";

pub fn default_rule_name(kind: ElementKind) -> String {
    format!("Default {kind} ID Collision Resolution")
}

pub fn custom_ruleset() -> Ruleset {
    Ruleset::new(CUSTOM_RULESET_NAME).with_priority(-1)
}

pub fn default_ruleset() -> Ruleset {
    ElementKind::all()
        .iter()
        .fold(Ruleset::new(DEFAULT_RULESET_NAME).with_priority(0), |ruleset, kind| {
            ruleset.with_rule(
                Rule::new(&default_rule_name(*kind))
                    .with_priority(0)
                    .with_criterion(MatchCriterion::new(MatchType::ByIdDuplicate(*kind)))
                    .with_action(Action::new(ActionType::KeepNewest(*kind))),
            )
        })
}

impl RuleBook {
    /// A RuleBook holding only the two default Rulesets.
    pub fn with_defaults() -> Result<RuleBook, CollationError> {
        let mut book = RuleBook::new();
        book.restore_defaults()?;
        Ok(book)
    }

    /// Delete both default Rulesets, whatever they currently contain, and create them afresh.
    pub fn restore_defaults(&mut self) -> Result<(RulesetId, RulesetId), CollationError> {
        tracing::info!("Populating default ID collision Rulesets");
        for name in [CUSTOM_RULESET_NAME, DEFAULT_RULESET_NAME] {
            if let Some(id) = self.ruleset_by_name(name).map(|r| r.id) {
                self.remove_ruleset(id)?;
            }
        }
        let custom = self.insert_ruleset(custom_ruleset())?;
        let default = self.insert_ruleset(default_ruleset())?;
        Ok((custom, default))
    }
}
