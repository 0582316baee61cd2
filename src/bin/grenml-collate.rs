//! grenml-collate CLI tool
//!
//! Maintains a JSON session file (store plus Rulesets) and runs collation against it.
//!
//! ## Commands
//!
//! - `rules export|import|validate|apply`: Ruleset transfer and application
//! - `import <parsed.json>`: Import a parsed Topology tree
//! - `export [topology-id]`: Export a Topology tree as parsed JSON
//! - `restore-defaults`: Recreate the default ID collision Rulesets

use clap::{Parser, Subcommand};
use grenml_collation::{
    collation::{RuleId, RulesetId},
    commands::{Op, OpResult},
    config::{current_config, get_content, set_config_provider, set_content, TomlConfigProvider},
    error::CollationError,
    import::ParsedTopology,
    properties::SeqKey,
    session::CollationSession,
};
use std::{path::PathBuf, sync::Arc};

#[derive(Parser)]
#[command(name = "grenml-collate")]
#[command(author, version, about = "Reconcile overlapping GRENML topology imports", long_about = None)]
struct Cli {
    /// Session file holding the store and Rulesets
    #[arg(short, long, default_value = "grenml-session.json")]
    session: PathBuf,

    /// Configuration file path
    #[arg(short, long, default_value = "grenml-collation.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ruleset management
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },

    /// Import a parsed Topology tree (JSON)
    Import {
        path: PathBuf,

        /// GRENML ID of an existing Topology to import beneath
        #[arg(short, long)]
        parent: Option<String>,
    },

    /// Export a Topology tree as parsed JSON; the main Topology by default
    Export {
        topology_id: Option<String>,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Delete and recreate the default ID collision Rulesets
    RestoreDefaults,
}

#[derive(Subcommand)]
enum RulesCommands {
    /// Write Rulesets in the JSON transfer format
    Export {
        /// Only these Ruleset ids
        #[arg(long)]
        id: Vec<u64>,

        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Create Rulesets from a JSON transfer document
    Import { path: PathBuf },

    /// Report Ruleset and Rule readiness
    Validate,

    /// Apply one Rule, one Ruleset, or every enabled Ruleset
    Apply {
        #[arg(long, conflicts_with = "ruleset")]
        rule: Option<u64>,

        #[arg(long)]
        ruleset: Option<u64>,
    },
}

fn topology_key(session: &CollationSession, grenml_id: &str) -> Result<SeqKey, CollationError> {
    session
        .store
        .topology_by_grenml_id(grenml_id)
        .map(|t| t.key)
        .ok_or_else(|| CollationError::NotFound(format!("Topology <{grenml_id}>")))
}

fn write_output(out: Option<PathBuf>, text: &str) -> Result<(), CollationError> {
    match out {
        Some(path) => set_content(path, text),
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    set_config_provider(Arc::new(TomlConfigProvider::new(cli.config.clone())))?;
    let config = current_config()?;
    let mut session = CollationSession::load(&cli.session, config)?;

    let mutated = match cli.command {
        Commands::Rules { command } => match command {
            RulesCommands::Export { id, out } => {
                let ids = (!id.is_empty()).then(|| id.into_iter().map(RulesetId).collect());
                if let OpResult::Rulesets(doc) = session.execute(Op::ExportRulesets(ids))? {
                    write_output(out, &doc)?;
                }
                false
            }
            RulesCommands::Import { path } => {
                let result = session.execute(Op::ImportRulesets(get_content(&path)?))?;
                if let OpResult::Transfer(transfer) = &result {
                    for invalid in transfer.invalid.iter() {
                        eprintln!("Invalid Ruleset: {}", invalid.reason);
                    }
                }
                println!("{result}");
                true
            }
            RulesCommands::Validate => {
                let ids: Vec<RulesetId> = session.rules.rulesets().iter().map(|r| r.id).collect();
                for id in ids {
                    let name = session
                        .rules
                        .ruleset(id)
                        .map(|r| r.name.clone())
                        .unwrap_or_default();
                    if let OpResult::RulesetHealth(health) = session.execute(Op::RulesetStatus(id))? {
                        println!("{} [{}]: ready={}", name, id, health.ready);
                        for (rule, detail) in health.detail.iter() {
                            println!("    Rule [{rule}]: {detail}");
                        }
                    }
                }
                false
            }
            RulesCommands::Apply { rule, ruleset } => {
                let op = match (rule, ruleset) {
                    (Some(rule), _) => Op::ApplyRule(RuleId(rule)),
                    (None, Some(ruleset)) => Op::ApplyRuleset(RulesetId(ruleset)),
                    (None, None) => Op::ApplyAll,
                };
                match session.execute(op)? {
                    OpResult::Rule(report) => println!("{}", report.message()),
                    OpResult::Applied(report) => println!("{report}"),
                    other => println!("{other}"),
                }
                true
            }
        },
        Commands::Import { path, parent } => {
            let document: ParsedTopology = serde_json::from_str(&get_content(&path)?)?;
            let parent = parent
                .map(|id| topology_key(&session, &id))
                .transpose()?;
            if let OpResult::Imported(log) = session.execute(Op::Import { document, parent })? {
                println!("{log}");
            }
            true
        }
        Commands::Export { topology_id, out } => {
            let root = topology_id
                .map(|id| topology_key(&session, &id))
                .transpose()?;
            if let OpResult::Exported(parsed) = session.execute(Op::Export(root))? {
                write_output(out, &serde_json::to_string_pretty(&parsed)?)?;
            }
            false
        }
        Commands::RestoreDefaults => {
            println!("{}", session.execute(Op::RestoreDefaults)?);
            true
        }
    };

    if mutated {
        session.save(&cli.session)?;
    }
    Ok(())
}
