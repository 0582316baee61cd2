use crate::{collation::RuleBook, error::CollationError};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::{
    fs::{read_to_string, write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

/// Global static variable to hold the config provider.
pub static CONFIG_PROVIDER: OnceCell<Mutex<Arc<dyn CollationConfigProvider>>> = OnceCell::new();

pub const EXTERNAL_TOPOLOGY_PROPERTY_KEY: &str = "!-from_topology";
pub const EXTERNAL_TOPOLOGY_PROPERTY_DELIMITER: &str = ",";

fn default_external_property_key() -> String {
    EXTERNAL_TOPOLOGY_PROPERTY_KEY.to_string()
}

fn default_external_property_delimiter() -> String {
    EXTERNAL_TOPOLOGY_PROPERTY_DELIMITER.to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollationConfig {
    /// Property name marking an exported element as belonging to other Topologies.
    #[serde(default = "default_external_property_key")]
    pub external_property_key: String,
    #[serde(default = "default_external_property_delimiter")]
    pub external_property_delimiter: String,
    /// Skips cross-topology resolution after an import.
    #[serde(default)]
    pub test_mode: bool,
    #[serde(default = "default_true")]
    pub apply_rules_on_import: bool,
    /// JSON Ruleset transfer document loaded in place of the default Rulesets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ruleset_file: Option<PathBuf>,
}

impl Default for CollationConfig {
    fn default() -> Self {
        CollationConfig {
            external_property_key: default_external_property_key(),
            external_property_delimiter: default_external_property_delimiter(),
            test_mode: false,
            apply_rules_on_import: true,
            ruleset_file: None,
        }
    }
}

impl CollationConfig {
    /// The default Rulesets, plus everything in `ruleset_file` when one is configured.
    pub fn load_rules(&self) -> Result<RuleBook, CollationError> {
        let mut book = RuleBook::with_defaults()?;
        if let Some(path) = self.ruleset_file.as_ref() {
            let result = crate::collation::import_rulesets(&mut book, &get_content(path)?)?;
            for invalid in result.invalid.iter() {
                tracing::warn!(
                    "Skipping invalid Ruleset from {:?}: {}",
                    path,
                    invalid.reason
                );
            }
        }
        Ok(book)
    }
}

pub trait CollationConfigProvider: Send + Sync {
    fn get_config(&self) -> Result<CollationConfig, CollationError>;
    fn set_config(&self, config: &CollationConfig) -> Result<(), CollationError>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TomlConfigProvider {
    path: PathBuf,
}

impl TomlConfigProvider {
    pub fn new(path: PathBuf) -> Self {
        TomlConfigProvider { path }
    }
}

impl CollationConfigProvider for TomlConfigProvider {
    fn get_config(&self) -> Result<CollationConfig, CollationError> {
        tracing::debug!("Attempting to read config from: {:?}", &self.path);
        if !self.path.exists() {
            tracing::debug!("Config file not found, using defaults.");
            return Ok(CollationConfig::default());
        }
        let content = read_to_string(&self.path)?;
        Ok(toml::from_str(&content)?)
    }

    fn set_config(&self, config: &CollationConfig) -> Result<(), CollationError> {
        tracing::debug!("Attempting to write config to: {:?}", &self.path);
        let toml_string = toml::to_string(config)?;
        write(&self.path, toml_string)?;
        Ok(())
    }
}

/// Install `provider` as the process-wide config source. Replaces any earlier provider.
pub fn set_config_provider(
    provider: Arc<dyn CollationConfigProvider>,
) -> Result<(), CollationError> {
    let slot = CONFIG_PROVIDER.get_or_init(|| Mutex::new(provider.clone()));
    let mut current = slot
        .lock()
        .map_err(|e| CollationError::Config(format!("config provider poisoned: {e}")))?;
    *current = provider;
    Ok(())
}

/// Read the config from the installed provider, or defaults when none is installed.
pub fn current_config() -> Result<CollationConfig, CollationError> {
    match CONFIG_PROVIDER.get() {
        None => Ok(CollationConfig::default()),
        Some(slot) => {
            let provider = slot
                .lock()
                .map_err(|e| CollationError::Config(format!("config provider poisoned: {e}")))?
                .clone();
            provider.get_config()
        }
    }
}

pub fn get_content<P: AsRef<Path>>(path: P) -> Result<String, CollationError> {
    tracing::debug!("Reading {:?}", path.as_ref());
    Ok(read_to_string(path)?)
}

pub fn set_content<P: AsRef<Path>>(path: P, text: &str) -> Result<(), CollationError> {
    tracing::debug!("Writing {:?}", path.as_ref());
    Ok(write(path, text)?)
}
