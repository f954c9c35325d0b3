use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use pop_core::{FieldValue, Filter};
use serde::{Deserialize, Serialize};

use crate::CliError;

pub const SETTINGS_FILE: &str = "pop.toml";
pub const DEFAULT_LOG_FILE: &str = "pop.log.ndjson";
pub const DEFAULT_DEFAULTS_DIR: &str = "defaults";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PopSettings {
    pub seed: Option<u64>,
    pub interactive: bool,
    pub catalog: Option<PathBuf>,
    pub defaults_dir: Option<PathBuf>,
    pub fetch_limit: usize,
    pub log_file: PathBuf,
    pub report: Option<PathBuf>,
    /// Extra equality terms for bulk fetches of existing entities.
    pub entity_filters: BTreeMap<String, Filter>,
}

impl Default for PopSettings {
    fn default() -> Self {
        Self {
            seed: None,
            interactive: true,
            catalog: None,
            defaults_dir: None,
            fetch_limit: pop_generate::cache::DEFAULT_FETCH_LIMIT,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            report: None,
            entity_filters: builtin_entity_filters(),
        }
    }
}

/// Templates are not real events, so they are never referenced.
fn builtin_entity_filters() -> BTreeMap<String, Filter> {
    let mut event = Filter::new();
    event.insert("is_template".to_string(), FieldValue::Bool(false));
    BTreeMap::from([("Event".to_string(), event)])
}

impl PopSettings {
    pub fn parse(content: &str) -> Result<Self, CliError> {
        let mut settings: PopSettings = toml::from_str(content)?;
        for (entity, filter) in builtin_entity_filters() {
            settings.entity_filters.entry(entity).or_insert(filter);
        }
        Ok(settings)
    }

    /// Directory holding `default.yml` and `<Entity>.yml` files.
    pub fn defaults_dir(&self) -> PathBuf {
        self.defaults_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DEFAULTS_DIR))
    }
}

/// Read `explicit`, or `pop.toml` in the working directory when it exists.
pub fn load_settings(explicit: Option<&Path>) -> Result<PopSettings, CliError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = PathBuf::from(SETTINGS_FILE);
            if !path.exists() {
                return Ok(PopSettings::default());
            }
            path
        }
    };
    let content = std::fs::read_to_string(&path)
        .map_err(|err| CliError::InvalidConfig(format!("{}: {err}", path.display())))?;
    PopSettings::parse(&content)
}
