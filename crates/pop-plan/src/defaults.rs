use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use tracing::debug;

use crate::errors::{Result, SpecError};
use crate::fields::parse_fields;
use crate::model::{FieldSpecs, Instruction, PopulatorKind};

/// File holding the lowest-precedence defaults inside a defaults directory.
pub const GLOBAL_DEFAULTS_FILE: &str = "default.yml";

/// The `fields`/`children`/`populators` block of a defaults file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefaultBlock {
    pub fields: FieldSpecs,
    pub children: Vec<Instruction>,
    pub populators: Vec<PopulatorKind>,
}

impl DefaultBlock {
    pub fn parse(value: &Value, origin: &str) -> Result<Self> {
        let invalid = |reason: String| SpecError::InvalidDefaults {
            path: origin.to_string(),
            reason,
        };

        let map = match value {
            Value::Null => return Ok(Self::default()),
            Value::Mapping(map) => map,
            _ => return Err(invalid("defaults must be a mapping".to_string())),
        };

        let mut block = Self::default();
        for (key, value) in map {
            match key.as_str() {
                Some("fields") => block.fields = parse_fields(value)?,
                Some("children") => match value {
                    Value::Null => {}
                    Value::Sequence(items) => {
                        block.children = items.iter().cloned().map(Instruction::new).collect();
                    }
                    _ => return Err(invalid("children must be a sequence".to_string())),
                },
                Some("populators") => {
                    block.populators = parse_populator_names(value).map_err(invalid)?;
                }
                _ => return Err(invalid(format!("unexpected key {key:?}"))),
            }
        }
        Ok(block)
    }

    pub fn from_yaml(source: &str, origin: &str) -> Result<Self> {
        let value: Value =
            serde_yaml::from_str(source).map_err(|err| SpecError::InvalidDefaults {
                path: origin.to_string(),
                reason: err.to_string(),
            })?;
        Self::parse(&value, origin)
    }
}

fn parse_populator_names(value: &Value) -> std::result::Result<Vec<PopulatorKind>, String> {
    let items = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Sequence(items) => items,
        _ => return Err("populators must be a sequence of names".to_string()),
    };
    items
        .iter()
        .map(|item| {
            let name = item
                .as_str()
                .ok_or_else(|| format!("populator name {item:?} must be a string"))?;
            PopulatorKind::from_name(name).ok_or_else(|| format!("could not find populator '{name}'"))
        })
        .collect()
}

/// Entity-specific and global defaults used for backfilling.
///
/// Entity files (`<Entity>.yml`) are read lazily on first use; a missing
/// file is treated as an empty block.
#[derive(Debug, Clone, Default)]
pub struct EntityDefaults {
    dir: Option<PathBuf>,
    global: DefaultBlock,
    entities: HashMap<String, DefaultBlock>,
}

impl EntityDefaults {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_dir(dir: &Path) -> Result<Self> {
        let global = read_block(&dir.join(GLOBAL_DEFAULTS_FILE))?.unwrap_or_default();
        Ok(Self {
            dir: Some(dir.to_path_buf()),
            global,
            entities: HashMap::new(),
        })
    }

    pub fn with_global(mut self, block: DefaultBlock) -> Self {
        self.global = block;
        self
    }

    pub fn with_entity(mut self, entity: impl Into<String>, block: DefaultBlock) -> Self {
        self.entities.insert(entity.into(), block);
        self
    }

    pub fn global(&self) -> &DefaultBlock {
        &self.global
    }

    pub fn entity(&mut self, entity: &str) -> Result<&DefaultBlock> {
        if !self.entities.contains_key(entity) {
            let block = match &self.dir {
                Some(dir) => read_block(&dir.join(format!("{entity}.yml")))?.unwrap_or_default(),
                None => DefaultBlock::default(),
            };
            self.entities.insert(entity.to_string(), block);
        }
        Ok(self.entities.entry(entity.to_string()).or_default())
    }
}

fn read_block(path: &Path) -> Result<Option<DefaultBlock>> {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no defaults file");
            return Ok(None);
        }
        Err(err) => {
            return Err(SpecError::InvalidDefaults {
                path: path.display().to_string(),
                reason: err.to_string(),
            });
        }
    };
    let block = DefaultBlock::from_yaml(&source, &path.display().to_string())?;
    debug!(
        path = %path.display(),
        fields = block.fields.len(),
        children = block.children.len(),
        "defaults loaded"
    );
    Ok(Some(block))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_block() {
        let block = DefaultBlock::from_yaml(
            "fields:\n  source: import\nchildren:\n  - Email: 1\npopulators:\n  - contact_name\n",
            "Individual.yml",
        )
        .expect("block");
        assert_eq!(block.fields.len(), 1);
        assert_eq!(block.children.len(), 1);
        assert_eq!(block.populators, vec![PopulatorKind::ContactName]);
    }

    #[test]
    fn unknown_populator_in_defaults_is_fatal() {
        let err = DefaultBlock::from_yaml("populators: [make_magic]", "Contact.yml")
            .expect_err("unknown populator");
        assert!(matches!(err, SpecError::InvalidDefaults { .. }));
    }

    #[test]
    fn missing_entity_file_is_empty() {
        let dir = std::env::temp_dir().join("pop_defaults_missing_dir");
        let mut defaults = EntityDefaults::from_dir(&dir).expect("defaults");
        assert_eq!(defaults.entity("Event").expect("event"), &DefaultBlock::default());
    }
}
