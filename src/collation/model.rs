use crate::{
    collation::{action_types::ActionType, match_types::MatchType},
    error::CollationError,
};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub const DEFAULT_PRIORITY: i16 = 1000;

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RulesetId(pub u64);

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RuleId(pub u64);

impl Display for RulesetId {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for RuleId {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One key/value parameter of a MatchCriterion or Action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    pub key: String,
    pub value: String,
}

impl Info {
    pub fn new(key: &str, value: &str) -> Self {
        Info {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// Value of the first Info with `key`, if any.
pub fn info_value<'a>(infos: &'a [Info], key: &str) -> Option<&'a str> {
    infos
        .iter()
        .find(|info| info.key == key)
        .map(|info| info.value.as_str())
}

pub(crate) fn require_info<'a>(infos: &'a [Info], key: &str) -> Result<&'a str, CollationError> {
    info_value(infos, key).ok_or_else(|| {
        CollationError::Custom(format!("Required parameter \"{key}\" was not supplied"))
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCriterion {
    pub match_type: MatchType,
    #[serde(default, rename = "matchinfo_set")]
    pub infos: Vec<Info>,
}

impl MatchCriterion {
    pub fn new(match_type: MatchType) -> Self {
        MatchCriterion {
            match_type,
            infos: Vec::new(),
        }
    }

    pub fn with_info(mut self, key: &str, value: &str) -> Self {
        self.infos.push(Info::new(key, value));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub action_type: ActionType,
    #[serde(default, rename = "actioninfo_set")]
    pub infos: Vec<Info>,
}

impl Action {
    pub fn new(action_type: ActionType) -> Self {
        Action {
            action_type,
            infos: Vec::new(),
        }
    }

    pub fn with_info(mut self, key: &str, value: &str) -> Self {
        self.infos.push(Info::new(key, value));
        self
    }
}

/// Match criteria narrowing one element kind, and the Actions run on each match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub id: RuleId,
    pub name: String,
    pub enabled: bool,
    pub priority: i16,
    #[serde(default)]
    pub match_criteria: Vec<MatchCriterion>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl Rule {
    pub fn new(name: &str) -> Self {
        Rule {
            id: RuleId::default(),
            name: name.to_string(),
            enabled: true,
            priority: DEFAULT_PRIORITY,
            match_criteria: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: i16) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_criterion(mut self, criterion: MatchCriterion) -> Self {
        self.match_criteria.push(criterion);
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn log_str(&self) -> String {
        format!("{} [{}]", self.name, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ruleset {
    #[serde(default)]
    pub id: RulesetId,
    pub name: String,
    pub enabled: bool,
    pub priority: i16,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl Ruleset {
    pub fn new(name: &str) -> Self {
        Ruleset {
            id: RulesetId::default(),
            name: name.to_string(),
            enabled: true,
            priority: DEFAULT_PRIORITY,
            rules: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: i16) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Enabled Rules by ascending priority. Equal priorities keep creation order.
    pub fn ordered_rules(&self) -> Vec<&Rule> {
        let mut rules: Vec<&Rule> = self.rules.iter().filter(|r| r.enabled).collect();
        rules.sort_by_key(|r| r.priority);
        rules
    }

    pub fn enable_all(&mut self) {
        self.rules.iter_mut().for_each(|r| r.enabled = true);
    }

    pub fn disable_all(&mut self) {
        self.rules.iter_mut().for_each(|r| r.enabled = false);
    }
}

/// Every Ruleset known to a session. Ruleset and Rule names are unique within a RuleBook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleBook {
    next_id: u64,
    rulesets: Vec<Ruleset>,
}

impl RuleBook {
    pub fn new() -> Self {
        RuleBook::default()
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn rulesets(&self) -> &[Ruleset] {
        &self.rulesets
    }

    /// Enabled Rulesets by ascending priority. Equal priorities keep creation order.
    pub fn ordered_rulesets(&self) -> Vec<&Ruleset> {
        let mut rulesets: Vec<&Ruleset> = self.rulesets.iter().filter(|r| r.enabled).collect();
        rulesets.sort_by_key(|r| r.priority);
        rulesets
    }

    pub fn ruleset(&self, id: RulesetId) -> Option<&Ruleset> {
        self.rulesets.iter().find(|r| r.id == id)
    }

    pub fn ruleset_mut(&mut self, id: RulesetId) -> Option<&mut Ruleset> {
        self.rulesets.iter_mut().find(|r| r.id == id)
    }

    pub fn ruleset_by_name(&self, name: &str) -> Option<&Ruleset> {
        self.rulesets.iter().find(|r| r.name == name)
    }

    pub fn rule(&self, id: RuleId) -> Option<(&Ruleset, &Rule)> {
        self.rulesets
            .iter()
            .find_map(|rs| rs.rules.iter().find(|r| r.id == id).map(|r| (rs, r)))
    }

    pub fn rule_mut(&mut self, id: RuleId) -> Option<&mut Rule> {
        self.rulesets
            .iter_mut()
            .find_map(|rs| rs.rules.iter_mut().find(|r| r.id == id))
    }

    pub fn rule_by_name(&self, name: &str) -> Option<&Rule> {
        self.rulesets
            .iter()
            .find_map(|rs| rs.rules.iter().find(|r| r.name == name))
    }

    fn require_ruleset_mut(&mut self, id: RulesetId) -> Result<&mut Ruleset, CollationError> {
        self.ruleset_mut(id)
            .ok_or_else(|| CollationError::NotFound(format!("Ruleset [{id}]")))
    }

    /// Store a Ruleset (and any Rules it already carries), assigning fresh ids.
    pub fn insert_ruleset(&mut self, mut ruleset: Ruleset) -> Result<RulesetId, CollationError> {
        if self.ruleset_by_name(&ruleset.name).is_some() {
            return Err(CollationError::Store(format!(
                "A Ruleset named \"{}\" already exists",
                ruleset.name
            )));
        }
        let mut seen = Vec::new();
        for rule in ruleset.rules.iter() {
            if self.rule_by_name(&rule.name).is_some() || seen.contains(&&rule.name) {
                return Err(CollationError::Store(format!(
                    "A Rule named \"{}\" already exists",
                    rule.name
                )));
            }
            seen.push(&rule.name);
        }
        ruleset.id = RulesetId(self.next_id());
        for rule in ruleset.rules.iter_mut() {
            self.next_id += 1;
            rule.id = RuleId(self.next_id);
        }
        let id = ruleset.id;
        tracing::debug!(
            "[RuleBook::insert_ruleset] {} [{}] with {} Rule(s)",
            ruleset.name,
            id,
            ruleset.rules.len()
        );
        self.rulesets.push(ruleset);
        Ok(id)
    }

    pub fn remove_ruleset(&mut self, id: RulesetId) -> Result<Ruleset, CollationError> {
        match self.rulesets.iter().position(|r| r.id == id) {
            Some(index) => Ok(self.rulesets.remove(index)),
            None => Err(CollationError::NotFound(format!("Ruleset [{id}]"))),
        }
    }

    pub fn add_rule(&mut self, ruleset: RulesetId, mut rule: Rule) -> Result<RuleId, CollationError> {
        if self.rule_by_name(&rule.name).is_some() {
            return Err(CollationError::Store(format!(
                "A Rule named \"{}\" already exists",
                rule.name
            )));
        }
        self.require_ruleset_mut(ruleset)?;
        rule.id = RuleId(self.next_id());
        let id = rule.id;
        self.require_ruleset_mut(ruleset)?.rules.push(rule);
        Ok(id)
    }

    pub fn remove_rule(&mut self, id: RuleId) -> Result<Rule, CollationError> {
        for ruleset in self.rulesets.iter_mut() {
            if let Some(index) = ruleset.rules.iter().position(|r| r.id == id) {
                return Ok(ruleset.rules.remove(index));
            }
        }
        Err(CollationError::NotFound(format!("Rule [{id}]")))
    }

    /// Copy a Rule, criteria, actions and parameters included, into its own Ruleset under the
    /// name `"{name} {n}"`, n counting the Rules whose name starts with the original name.
    pub fn clone_rule(&mut self, id: RuleId) -> Result<RuleId, CollationError> {
        let (ruleset, original) = self
            .rule(id)
            .map(|(rs, r)| (rs.id, r.clone()))
            .ok_or_else(|| CollationError::NotFound(format!("Rule [{id}]")))?;
        let mut n = self
            .rulesets
            .iter()
            .flat_map(|rs| rs.rules.iter())
            .filter(|r| r.name.starts_with(&original.name))
            .count();
        let mut name = format!("{} {}", original.name, n);
        while self.rule_by_name(&name).is_some() {
            n += 1;
            name = format!("{} {}", original.name, n);
        }
        let copy = Rule {
            name,
            ..original
        };
        self.add_rule(ruleset, copy)
    }

    pub fn enable_all(&mut self) {
        self.rulesets.iter_mut().for_each(|r| r.enabled = true);
    }

    pub fn disable_all(&mut self) {
        self.rulesets.iter_mut().for_each(|r| r.enabled = false);
    }
}
