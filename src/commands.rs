use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::{
    collation::{
        engine::{RuleHealth, RulesetHealth},
        ApplyReport, RuleId, RuleReport, RulesetId, TransferResult,
    },
    import::{ImportLog, ParsedTopology},
    properties::SeqKey,
};

/// Command interface between a host and a [crate::session::CollationSession].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// Serialize Rulesets to the JSON transfer format; all of them when no ids are given.
    ExportRulesets(Option<Vec<RulesetId>>),
    /// Create Rulesets from a JSON transfer document.
    ImportRulesets(String),
    /// Recreate the two default ID collision Rulesets.
    RestoreDefaults,
    RuleStatus(RuleId),
    RulesetStatus(RulesetId),
    ApplyRule(RuleId),
    ApplyRuleset(RulesetId),
    /// Apply every enabled Ruleset by priority.
    ApplyAll,
    CloneRule(RuleId),
    /// Enable the Rules of one Ruleset, or every Ruleset when none is given.
    EnableAll(Option<RulesetId>),
    DisableAll(Option<RulesetId>),
    /// Import a parsed Topology tree, optionally beneath an existing Topology.
    Import {
        document: ParsedTopology,
        parent: Option<SeqKey>,
    },
    /// Export a Topology tree; the main Topology when none is given.
    Export(Option<SeqKey>),
}

fn opt_key<T: Display>(key: &Option<T>) -> String {
    key.as_ref()
        .map(|k| k.to_string())
        .unwrap_or_else(|| "all".to_string())
}

impl Display for Op {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Op::ExportRulesets(ids) => write!(
                f,
                "ExportRulesets({})",
                ids.as_ref()
                    .map(|ids| ids
                        .iter()
                        .map(|id| id.to_string())
                        .collect::<Vec<String>>()
                        .join(", "))
                    .unwrap_or_else(|| "all".to_string())
            ),
            Op::ImportRulesets(doc) => write!(f, "ImportRulesets({} bytes)", doc.len()),
            Op::RestoreDefaults => write!(f, "RestoreDefaults"),
            Op::RuleStatus(id) => write!(f, "RuleStatus({id})"),
            Op::RulesetStatus(id) => write!(f, "RulesetStatus({id})"),
            Op::ApplyRule(id) => write!(f, "ApplyRule({id})"),
            Op::ApplyRuleset(id) => write!(f, "ApplyRuleset({id})"),
            Op::ApplyAll => write!(f, "ApplyAll"),
            Op::CloneRule(id) => write!(f, "CloneRule({id})"),
            Op::EnableAll(id) => write!(f, "EnableAll({})", opt_key(id)),
            Op::DisableAll(id) => write!(f, "DisableAll({})", opt_key(id)),
            Op::Import { document, parent } => write!(
                f,
                "Import({} under {})",
                document.id,
                parent
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "root".to_string())
            ),
            Op::Export(root) => write!(
                f,
                "Export({})",
                root.map(|r| r.to_string())
                    .unwrap_or_else(|| "main".to_string())
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OpResult {
    Ok,
    Rulesets(String),
    Transfer(TransferResult),
    Defaults(RulesetId, RulesetId),
    RuleHealth(RuleHealth),
    RulesetHealth(RulesetHealth),
    Rule(RuleReport),
    Applied(ApplyReport),
    RuleCloned(RuleId),
    Imported(ImportLog),
    Exported(ParsedTopology),
}

impl Display for OpResult {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            OpResult::Ok => write!(f, "Ok"),
            OpResult::Rulesets(doc) => write!(f, "Rulesets({} bytes)", doc.len()),
            OpResult::Transfer(result) => write!(
                f,
                "Transfer(created: {}, invalid: {})",
                result.created.len(),
                result.invalid.len()
            ),
            OpResult::Defaults(custom, default) => write!(f, "Defaults({custom}, {default})"),
            OpResult::RuleHealth(health) => write!(f, "RuleHealth(ready: {})", health.ready),
            OpResult::RulesetHealth(health) => write!(
                f,
                "RulesetHealth(ready: {}, failing: {})",
                health.ready,
                health.detail.len()
            ),
            OpResult::Rule(report) => write!(f, "Rule({}: {})", report.rule_name, report.status()),
            OpResult::Applied(report) => write!(f, "Applied({} rules)", report.rules.len()),
            OpResult::RuleCloned(id) => write!(f, "RuleCloned({id})"),
            OpResult::Imported(log) => write!(f, "Imported({})", log.status()),
            OpResult::Exported(parsed) => write!(
                f,
                "Exported({}, {} sub-topologies)",
                parsed.id,
                parsed.iter().count() - 1
            ),
        }
    }
}
