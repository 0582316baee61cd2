//! A store, its RuleBook and configuration bundled for hosts and the CLI.

use crate::{
    collation::{export_rulesets, import_rulesets, RuleBook, Ruleset, RulesetId},
    commands::{Op, OpResult},
    config::{get_content, set_content, CollationConfig},
    error::CollationError,
    export::Exporter,
    import::{ImportLog, Importer, ParsedTopology},
    properties::SeqKey,
    store::TopologyStore,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{path::Path, sync::Arc};

/// Persisted half of a session. The config lives in its own TOML file.
#[derive(Debug, Deserialize)]
struct SessionState {
    store: TopologyStore,
    rules: RuleBook,
}

#[derive(Debug, Serialize)]
struct SessionStateRef<'a> {
    store: &'a TopologyStore,
    rules: &'a RuleBook,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollationSession {
    pub store: TopologyStore,
    pub rules: RuleBook,
    pub config: CollationConfig,
}

pub type SharedSession = Arc<RwLock<CollationSession>>;

impl CollationSession {
    /// An empty store with the Rulesets the config asks for.
    pub fn new(config: CollationConfig) -> Result<Self, CollationError> {
        Ok(CollationSession {
            store: TopologyStore::new(),
            rules: config.load_rules()?,
            config,
        })
    }

    /// Load a JSON session file, or start afresh when the file does not exist yet.
    pub fn load<P: AsRef<Path>>(path: P, config: CollationConfig) -> Result<Self, CollationError> {
        if !path.as_ref().exists() {
            tracing::debug!(
                "[CollationSession::load] {:?} not found, starting a new session",
                path.as_ref()
            );
            return CollationSession::new(config);
        }
        let state: SessionState = serde_json::from_str(&get_content(path)?)?;
        for problem in state.store.built_in_test() {
            tracing::warn!("Loaded store failed integrity check: {}", problem);
        }
        Ok(CollationSession {
            store: state.store,
            rules: state.rules,
            config,
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CollationError> {
        let state = SessionStateRef {
            store: &self.store,
            rules: &self.rules,
        };
        set_content(path, &serde_json::to_string_pretty(&state)?)
    }

    pub fn into_shared(self) -> SharedSession {
        Arc::new(RwLock::new(self))
    }

    pub fn import(&mut self, document: &ParsedTopology, parent: Option<SeqKey>) -> ImportLog {
        Importer::new(&self.config)
            .with_rules(&self.rules)
            .import(&mut self.store, document, parent)
    }

    pub fn export(&self, root: Option<SeqKey>) -> Result<ParsedTopology, CollationError> {
        Exporter::new(&self.store, &self.config).export_topology(root)
    }

    pub fn execute(&mut self, op: Op) -> Result<OpResult, CollationError> {
        tracing::debug!("[CollationSession::execute] {}", op);
        let result = match op {
            Op::ExportRulesets(ids) => {
                OpResult::Rulesets(export_rulesets(&self.rules, ids.as_deref())?)
            }
            Op::ImportRulesets(document) => {
                OpResult::Transfer(import_rulesets(&mut self.rules, &document)?)
            }
            Op::RestoreDefaults => {
                let (custom, default) = self.rules.restore_defaults()?;
                OpResult::Defaults(custom, default)
            }
            Op::RuleStatus(id) => OpResult::RuleHealth(self.rules.rule_status(id)?),
            Op::RulesetStatus(id) => OpResult::RulesetHealth(self.rules.ruleset_status(id)?),
            Op::ApplyRule(id) => OpResult::Rule(self.rules.apply_rule(&mut self.store, id)?),
            Op::ApplyRuleset(id) => {
                OpResult::Applied(self.rules.apply_ruleset(&mut self.store, id)?)
            }
            Op::ApplyAll => OpResult::Applied(self.rules.apply_all(&mut self.store)),
            Op::CloneRule(id) => OpResult::RuleCloned(self.rules.clone_rule(id)?),
            Op::EnableAll(None) => {
                self.rules.enable_all();
                OpResult::Ok
            }
            Op::EnableAll(Some(id)) => {
                self.ruleset_mut(id)?.enable_all();
                OpResult::Ok
            }
            Op::DisableAll(None) => {
                self.rules.disable_all();
                OpResult::Ok
            }
            Op::DisableAll(Some(id)) => {
                self.ruleset_mut(id)?.disable_all();
                OpResult::Ok
            }
            Op::Import { document, parent } => OpResult::Imported(self.import(&document, parent)),
            Op::Export(root) => OpResult::Exported(self.export(root)?),
        };
        tracing::debug!("[CollationSession::execute] -> {}", result);
        Ok(result)
    }

    fn ruleset_mut(&mut self, id: RulesetId) -> Result<&mut Ruleset, CollationError> {
        self.rules
            .ruleset_mut(id)
            .ok_or_else(|| CollationError::NotFound(format!("Ruleset [{id}]")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::ParsedInstitution;
    use test_log::test;

    fn document(name: &str) -> ParsedTopology {
        let mut doc = ParsedTopology::new("t1", "Backbone");
        doc.primary_owner = Some("i1".to_string());
        doc.institutions.push(ParsedInstitution::new("i1", name));
        doc
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let mut session = CollationSession::new(CollationConfig::default()).unwrap();
        let log = session.import(&document("Institution One"), None);
        assert!(log.errors.is_empty(), "{log}");
        session.save(&path).unwrap();

        let loaded = CollationSession::load(&path, CollationConfig::default()).unwrap();
        assert_eq!(loaded.store, session.store);
        assert_eq!(loaded.rules, session.rules);
    }

    #[test]
    fn test_execute_dispatches_ops() {
        let mut session = CollationSession::new(CollationConfig::default()).unwrap();
        let result = session
            .execute(Op::Import {
                document: document("Institution One"),
                parent: None,
            })
            .unwrap();
        assert_eq!(result.to_string(), "Imported(Import complete)");

        let OpResult::Exported(parsed) = session.execute(Op::Export(None)).unwrap() else {
            panic!("expected an export");
        };
        assert_eq!(parsed.institutions.len(), 1);

        session.execute(Op::DisableAll(None)).unwrap();
        let OpResult::Applied(report) = session.execute(Op::ApplyAll).unwrap() else {
            panic!("expected an apply report");
        };
        assert!(report.rules.is_empty());

        let err = session.execute(Op::ApplyRule(crate::collation::RuleId(999)));
        assert!(matches!(err, Err(CollationError::NotFound(_))));
    }

    #[test]
    fn test_shared_session_serializes_access() {
        let shared = CollationSession::new(CollationConfig::default())
            .unwrap()
            .into_shared();
        let handle = {
            let shared = shared.clone();
            std::thread::spawn(move || shared.write().import(&document("Threaded"), None))
        };
        let log = handle.join().unwrap();
        assert!(log.errors.is_empty());
        assert_eq!(shared.read().store.institutions().count(), 1);
    }
}
