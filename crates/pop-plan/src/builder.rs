use std::collections::BTreeSet;

use pop_core::{CONTACT_ALIASES, EntityApi, backend_entity};
use regex::Regex;
use serde_yaml::Value;
use tracing::debug;

use crate::catalog::FieldCatalog;
use crate::defaults::EntityDefaults;
use crate::errors::{Result, SpecError};
use crate::fields::{merge_fields, parse_fields};
use crate::model::{Count, Definition, Instruction, PopulatorKind};

const FIELDS_KEY: &str = "fields";
const CHILDREN_KEY: &str = "children";
const POPULATORS_KEY: &str = "populators";
const COUNT_PATTERN: &str = r"^(\d+)(?:-(\d+))?$";

/// Deepest child nesting allowed below a top-level instruction.
pub const MAX_DEPTH: usize = 16;

/// Turns raw instructions into backfilled definitions.
#[derive(Debug)]
pub struct DefinitionBuilder {
    entity_types: BTreeSet<String>,
    defaults: EntityDefaults,
    catalog: FieldCatalog,
}

impl DefinitionBuilder {
    /// Build against the backend's entity types plus the contact aliases.
    pub fn new(api: &dyn EntityApi, defaults: EntityDefaults) -> Result<Self> {
        Ok(Self::with_entity_types(api.list_entity_types()?, defaults))
    }

    pub fn with_entity_types(entity_types: BTreeSet<String>, defaults: EntityDefaults) -> Self {
        let mut entity_types = entity_types;
        entity_types.extend(CONTACT_ALIASES.iter().map(|alias| alias.to_string()));
        Self {
            entity_types,
            defaults,
            catalog: FieldCatalog::new(),
        }
    }

    pub fn entity_types(&self) -> &BTreeSet<String> {
        &self.entity_types
    }

    pub fn catalog_mut(&mut self) -> &mut FieldCatalog {
        &mut self.catalog
    }

    /// Validate an instruction and normalize it into a definition.
    pub fn translate(&self, instruction: &Instruction) -> Result<Definition> {
        let malformed = || SpecError::MalformedInstruction {
            instruction: instruction.to_yaml(),
        };

        let Value::Mapping(map) = instruction.value() else {
            return Err(malformed());
        };
        let mut map = map.clone();

        let fields = parse_fields(&map.remove(FIELDS_KEY).unwrap_or(Value::Null))?;
        let children = match map.remove(CHILDREN_KEY).unwrap_or(Value::Null) {
            Value::Null => Vec::new(),
            Value::Sequence(items) => items.into_iter().map(Instruction::new).collect(),
            _ => return Err(malformed()),
        };
        let populators = match map.remove(POPULATORS_KEY).unwrap_or(Value::Null) {
            Value::Null => Vec::new(),
            Value::Sequence(items) => {
                let mut populators = Vec::with_capacity(items.len());
                for item in items {
                    let name = item.as_str().ok_or_else(malformed)?;
                    let kind = PopulatorKind::from_name(name).ok_or_else(|| {
                        SpecError::UnknownPopulator {
                            name: name.to_string(),
                            instruction: instruction.to_yaml(),
                        }
                    })?;
                    populators.push(kind);
                }
                populators
            }
            _ => return Err(malformed()),
        };

        // What is left must be the single `Entity: count` pair.
        if map.len() != 1 {
            return Err(malformed());
        }
        let Some((entity, count)) = map.into_iter().next() else {
            return Err(malformed());
        };
        let Some(entity) = entity.as_str().map(str::to_string) else {
            return Err(malformed());
        };

        if !self.entity_types.contains(&entity) {
            return Err(SpecError::UnknownEntity {
                entity,
                instruction: instruction.to_yaml(),
            });
        }

        let raw_count = match &count {
            Value::Null => "1".to_string(),
            Value::Number(number) => number.to_string(),
            Value::String(text) => text.clone(),
            other => format!("{other:?}"),
        };
        let count = parse_count(&raw_count).ok_or_else(|| SpecError::InvalidCount {
            count: raw_count.clone(),
            instruction: instruction.to_yaml(),
        })?;

        Ok(Definition {
            entity,
            count,
            fields,
            children,
            populators,
        })
    }

    /// Merge defaults into a definition and drop fields the entity cannot accept.
    ///
    /// Precedence, lowest first: global defaults, entity defaults, the
    /// definition's own fields. Default children and populators are appended
    /// when not already present, so backfilling twice changes nothing.
    pub fn backfill(&mut self, api: &dyn EntityApi, definition: Definition) -> Result<Definition> {
        let Definition {
            entity,
            count,
            fields,
            mut children,
            mut populators,
        } = definition;

        let entity_defaults = self.defaults.entity(&entity)?.clone();
        let fields = merge_fields(&entity_defaults.fields, fields);
        let mut fields = merge_fields(&self.defaults.global().fields, fields);

        let creatable: BTreeSet<String> = self
            .catalog
            .creatable(api, &entity)?
            .iter()
            .map(|field| field.name.clone())
            .collect();
        fields.retain(|name, _| {
            let keep = creatable.contains(name);
            if !keep {
                debug!(entity = %entity, field = %name, "dropping field not accepted by entity");
            }
            keep
        });

        for child in entity_defaults.children {
            if !children.contains(&child) {
                children.push(child);
            }
        }
        for populator in entity_defaults.populators {
            if !populators.contains(&populator) {
                populators.push(populator);
            }
        }

        Ok(Definition {
            entity,
            count,
            fields,
            children,
            populators,
        })
    }

    pub fn build(&mut self, api: &dyn EntityApi, instruction: &Instruction) -> Result<Definition> {
        let definition = self.translate(instruction)?;
        self.backfill(api, definition)
    }

    /// Ensure `child` has the `<parent>_id` field its parent link is written to.
    pub fn check_parent_link(
        &mut self,
        api: &dyn EntityApi,
        child: &Definition,
        parent_entity: &str,
    ) -> Result<()> {
        let field = parent_link_field(parent_entity);
        if self.catalog.accepts(api, &child.entity, &field)? {
            Ok(())
        } else {
            Err(SpecError::MissingParentLink {
                entity: child.entity.clone(),
                field,
            })
        }
    }

    /// Translate and backfill a whole instruction tree without creating anything.
    ///
    /// Every fake generator a definition names must pass `supports`.
    /// Returns the number of definitions visited.
    pub fn check_tree(
        &mut self,
        api: &dyn EntityApi,
        instructions: &[Instruction],
        max_depth: usize,
        supports: &dyn Fn(&str) -> bool,
    ) -> Result<usize> {
        let mut visited = 0;
        for instruction in instructions {
            visited += self.check_node(api, instruction, None, 0, max_depth, supports)?;
        }
        Ok(visited)
    }

    fn check_node(
        &mut self,
        api: &dyn EntityApi,
        instruction: &Instruction,
        parent: Option<&str>,
        depth: usize,
        max_depth: usize,
        supports: &dyn Fn(&str) -> bool,
    ) -> Result<usize> {
        let definition = self.build(api, instruction)?;
        if let Some(parent) = parent {
            self.check_parent_link(api, &definition, parent)?;
        }
        check_generators(&definition, supports)?;
        check_depth(&definition, depth, max_depth)?;

        let entity = backend_entity(&definition.entity).to_string();
        let mut visited = 1;
        for child in &definition.children {
            visited += self.check_node(api, child, Some(&entity), depth + 1, max_depth, supports)?;
        }
        Ok(visited)
    }
}

/// Fail on the first fake generator of `definition` that `supports` rejects.
pub fn check_generators(definition: &Definition, supports: &dyn Fn(&str) -> bool) -> Result<()> {
    for (field, name) in definition.fake_generators() {
        if !supports(name) {
            return Err(SpecError::UnknownGenerator {
                entity: definition.entity.clone(),
                field: field.to_string(),
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

/// Fail when a definition at `depth` would still descend into children.
pub fn check_depth(definition: &Definition, depth: usize, max_depth: usize) -> Result<()> {
    if depth >= max_depth && !definition.children.is_empty() {
        return Err(SpecError::TooDeep {
            entity: definition.entity.clone(),
            limit: max_depth,
        });
    }
    Ok(())
}

/// Name of the field a child uses to point at its parent, e.g. `contact_id`.
pub fn parent_link_field(parent_entity: &str) -> String {
    format!("{}_id", parent_entity.to_lowercase())
}

fn parse_count(raw: &str) -> Option<Count> {
    let re = Regex::new(COUNT_PATTERN).ok()?;
    let caps = re.captures(raw)?;
    let first: u64 = caps.get(1)?.as_str().parse().ok()?;
    match caps.get(2) {
        None => Some(Count::Fixed(first)),
        Some(second) => {
            let second: u64 = second.as_str().parse().ok()?;
            Some(Count::Range {
                min: first.min(second),
                max: first.max(second),
            })
        }
    }
}
