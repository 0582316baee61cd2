//! Per-import activity log: what was parsed, what was stored, and what went wrong.

use crate::{
    collation::ApplyReport, error::CollationError, import::cross_topology::CrossTopologyReport,
    properties::{ElementKind, SeqKey},
};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportStatus {
    InProgress,
    Completed,
    Warning,
    Aborted,
}

impl Display for ImportStatus {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let phrase = match self {
            ImportStatus::InProgress => "Import in progress",
            ImportStatus::Completed => "Import complete",
            ImportStatus::Warning => "Import completed, with warnings",
            ImportStatus::Aborted => "Import aborted",
        };
        write!(f, "{phrase}")
    }
}

/// One parsed record. `key` is set once the record has been stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportElementLog {
    pub id: String,
    pub key: Option<SeqKey>,
    pub info_messages: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportKindLog {
    pub entries: Vec<ImportElementLog>,
}

impl ImportKindLog {
    pub fn log_skipped(&mut self, id: &str, warnings: Vec<String>) {
        self.entries.push(ImportElementLog {
            id: id.to_string(),
            key: None,
            info_messages: Vec::new(),
            warnings,
        });
    }

    pub fn log_imported(&mut self, id: &str, key: SeqKey, info_messages: Vec<String>) {
        self.entries.push(ImportElementLog {
            id: id.to_string(),
            key: Some(key),
            info_messages,
            warnings: Vec::new(),
        });
    }

    /// Append to the most recent entry for `id`, creating it if the record was never logged.
    pub fn update_log(
        &mut self,
        id: &str,
        key: Option<SeqKey>,
        info_messages: Vec<String>,
        warnings: Vec<String>,
    ) {
        match self.entries.iter_mut().rev().find(|e| e.id == id) {
            Some(entry) => {
                if key.is_some() {
                    entry.key = key;
                }
                entry.info_messages.extend(info_messages);
                entry.warnings.extend(warnings);
            }
            None => self.entries.push(ImportElementLog {
                id: id.to_string(),
                key,
                info_messages,
                warnings,
            }),
        }
    }

    pub fn encountered(&self) -> usize {
        self.entries.len()
    }

    pub fn imported(&self) -> usize {
        self.entries.iter().filter(|e| e.key.is_some()).count()
    }

    pub fn info_messages(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .flat_map(|e| e.info_messages.iter().map(String::as_str))
    }

    pub fn warning_messages(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .flat_map(|e| e.warnings.iter().map(String::as_str))
    }

    fn has_warnings(&self) -> bool {
        self.entries.iter().any(|e| !e.warnings.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportLog {
    pub topologies: ImportKindLog,
    pub institutions: ImportKindLog,
    pub nodes: ImportKindLog,
    pub links: ImportKindLog,
    pub complete: bool,
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_topology: Option<CrossTopologyReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<ApplyReport>,
}

impl ImportLog {
    pub fn new() -> Self {
        ImportLog::default()
    }

    pub fn kind(&self, kind: ElementKind) -> &ImportKindLog {
        match kind {
            ElementKind::Institution => &self.institutions,
            ElementKind::Node => &self.nodes,
            ElementKind::Link => &self.links,
        }
    }

    pub fn kind_mut(&mut self, kind: ElementKind) -> &mut ImportKindLog {
        match kind {
            ElementKind::Institution => &mut self.institutions,
            ElementKind::Node => &mut self.nodes,
            ElementKind::Link => &mut self.links,
        }
    }

    pub fn status(&self) -> ImportStatus {
        if !self.errors.is_empty() {
            ImportStatus::Aborted
        } else if !self.complete {
            ImportStatus::InProgress
        } else if self.sections().iter().any(|(_, log)| log.has_warnings()) {
            ImportStatus::Warning
        } else {
            ImportStatus::Completed
        }
    }

    pub fn finish(&mut self) {
        self.complete = true;
        tracing::info!("{}", self.status());
    }

    pub fn abort(&mut self, error: &CollationError) {
        tracing::error!("Import aborted: {}", error);
        self.errors.push(error.to_string());
    }

    fn sections(&self) -> [(&'static str, &ImportKindLog); 4] {
        [
            ("Topologies", &self.topologies),
            ("Institutions", &self.institutions),
            ("Nodes", &self.nodes),
            ("Links", &self.links),
        ]
    }
}

impl Display for ImportLog {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Status: {}\n\n", self.status())?;
        for (label, log) in self.sections() {
            writeln!(
                f,
                "{}: {} parsed, {} imported",
                label,
                log.encountered(),
                log.imported()
            )?;
            for msg in log.info_messages() {
                writeln!(f, "....{}", msg.replace('\t', "...."))?;
            }
            for msg in log.warning_messages() {
                writeln!(f, "....WARNING: {}", msg.replace('\t', "...."))?;
            }
            writeln!(f)?;
        }
        if !self.errors.is_empty() {
            writeln!(f, "ERRORS:")?;
            for error in self.errors.iter() {
                writeln!(f, "{error}")?;
            }
        }
        Ok(())
    }
}
