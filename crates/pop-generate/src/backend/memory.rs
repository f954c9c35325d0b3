use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use pop_core::{EntityApi, EntityId, Error, FieldDescriptor, FieldValue, FieldValues, Filter, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Sandbox backend description: entity types, their fields and pre-existing rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Catalog {
    pub entities: BTreeMap<String, EntityCatalog>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct EntityCatalog {
    #[serde(default)]
    pub fields: Vec<CatalogField>,
    #[serde(default)]
    pub existing: Vec<ExistingRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CatalogField {
    #[serde(flatten)]
    pub descriptor: FieldDescriptor,
    /// Valid keys of a pseudoconstant field.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldValue>,
}

/// A row that exists before the run, either a bare id or an id with field values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ExistingRecord {
    Id(EntityId),
    Record {
        id: EntityId,
        #[serde(default)]
        fields: FieldValues,
    },
}

impl ExistingRecord {
    fn into_stored(self) -> StoredRecord {
        match self {
            ExistingRecord::Id(id) => StoredRecord {
                id,
                fields: FieldValues::new(),
            },
            ExistingRecord::Record { id, fields } => StoredRecord { id, fields },
        }
    }
}

impl Catalog {
    /// Read a catalog from YAML or JSON.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let catalog: Catalog = serde_yaml::from_str(raw)?;
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<()> {
        for (entity, spec) in &self.entities {
            let mut names = BTreeSet::new();
            for field in &spec.fields {
                let name = &field.descriptor.name;
                if !names.insert(name.as_str()) {
                    return Err(Error::InvalidCatalog(format!(
                        "'{entity}.{name}' is declared twice"
                    )));
                }
                if let Some(target) = &field.descriptor.fk_entity
                    && !self.entities.contains_key(target)
                {
                    return Err(Error::InvalidCatalog(format!(
                        "'{entity}.{name}' references unknown entity '{target}'"
                    )));
                }
                if !field.options.is_empty() && !field.descriptor.pseudoconstant {
                    return Err(Error::InvalidCatalog(format!(
                        "'{entity}.{name}' lists options but is not pseudoconstant"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// JSON Schema of the catalog document.
pub fn catalog_json_schema() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(Catalog)).unwrap_or(serde_json::Value::Null)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRecord {
    pub id: EntityId,
    pub fields: FieldValues,
}

/// An [`EntityApi`] held entirely in memory.
///
/// Creation enforces the catalog the way a real backend would: unknown
/// fields, missing required fields, invalid options and dangling foreign
/// keys are rejected. Ids are handed out from one counter that starts after
/// the highest pre-existing id.
#[derive(Debug)]
pub struct MemoryBackend {
    catalog: Catalog,
    records: BTreeMap<String, Vec<StoredRecord>>,
    created: BTreeMap<String, Vec<StoredRecord>>,
    attempts: Vec<(String, FieldValues)>,
    next_id: i64,
}

impl MemoryBackend {
    pub fn new(catalog: Catalog) -> Self {
        let mut records = BTreeMap::new();
        let mut highest = 0;
        for (entity, spec) in &catalog.entities {
            let rows: Vec<StoredRecord> = spec
                .existing
                .iter()
                .cloned()
                .map(ExistingRecord::into_stored)
                .collect();
            highest = rows.iter().map(|row| row.id.0).fold(highest, i64::max);
            records.insert(entity.clone(), rows);
        }
        Self {
            catalog,
            records,
            created: BTreeMap::new(),
            attempts: Vec::new(),
            next_id: highest + 1,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(Self::new(Catalog::from_path(path)?))
    }

    /// Every create call in order, successful or not.
    pub fn attempts(&self) -> &[(String, FieldValues)] {
        &self.attempts
    }

    /// Records created through this backend, per entity type.
    pub fn created(&self) -> &BTreeMap<String, Vec<StoredRecord>> {
        &self.created
    }

    pub fn records(&self, entity: &str) -> &[StoredRecord] {
        self.records.get(entity).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn created_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.created)?)
    }

    fn entity(&self, entity: &str) -> Result<&EntityCatalog> {
        self.catalog
            .entities
            .get(entity)
            .ok_or_else(|| Error::UnknownEntity(entity.to_string()))
    }

    fn check(&self, entity: &str, fields: &FieldValues) -> Result<()> {
        let spec = self.entity(entity)?;
        for (name, value) in fields {
            let Some(field) = spec.fields.iter().find(|field| field.descriptor.name == *name) else {
                return Err(Error::Api(format!("'{entity}' has no field '{name}'")));
            };
            if value.is_null() {
                continue;
            }
            if field.descriptor.pseudoconstant
                && !field.options.is_empty()
                && !field.options.iter().any(|option| same_value(option, value))
            {
                return Err(Error::Api(format!(
                    "'{value}' is not a valid option for '{entity}.{name}'"
                )));
            }
            if let Some(target) = &field.descriptor.fk_entity {
                let exists = value
                    .as_i64()
                    .is_some_and(|id| self.records(target).iter().any(|row| row.id.0 == id));
                if !exists {
                    return Err(Error::Api(format!(
                        "'{entity}.{name}' points at missing {target} '{value}'"
                    )));
                }
            }
        }

        let missing: Vec<&str> = spec
            .fields
            .iter()
            .filter(|field| field.descriptor.required)
            .filter(|field| fields.get(&field.descriptor.name).is_none_or(FieldValue::is_null))
            .map(|field| field.descriptor.name.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(Error::Api(format!(
                "mandatory values missing from {entity} create: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }
}

fn same_value(left: &FieldValue, right: &FieldValue) -> bool {
    left == right || left.to_string() == right.to_string()
}

impl EntityApi for MemoryBackend {
    fn list_entity_types(&self) -> Result<BTreeSet<String>> {
        Ok(self.catalog.entities.keys().cloned().collect())
    }

    fn creatable_fields(&self, entity: &str) -> Result<Vec<FieldDescriptor>> {
        Ok(self
            .entity(entity)?
            .fields
            .iter()
            .map(|field| field.descriptor.clone())
            .collect())
    }

    fn valid_options(&self, entity: &str, field: &str) -> Result<Vec<FieldValue>> {
        self.entity(entity)?
            .fields
            .iter()
            .find(|candidate| candidate.descriptor.name == field)
            .map(|candidate| candidate.options.clone())
            .ok_or_else(|| Error::Api(format!("'{entity}' has no field '{field}'")))
    }

    fn fetch_existing(&self, entity: &str, filter: &Filter, limit: usize) -> Result<Vec<EntityId>> {
        self.entity(entity)?;
        Ok(self
            .records(entity)
            .iter()
            .filter(|row| {
                filter.iter().all(|(key, expected)| {
                    row.fields
                        .get(key)
                        .is_some_and(|actual| same_value(actual, expected))
                })
            })
            .take(limit)
            .map(|row| row.id)
            .collect())
    }

    fn create(&mut self, entity: &str, fields: &FieldValues) -> Result<EntityId> {
        self.attempts.push((entity.to_string(), fields.clone()));
        self.check(entity, fields)?;

        let id = EntityId(self.next_id);
        self.next_id += 1;
        let record = StoredRecord {
            id,
            fields: fields.clone(),
        };
        self.records
            .entry(entity.to_string())
            .or_default()
            .push(record.clone());
        self.created.entry(entity.to_string()).or_default().push(record);
        debug!(entity = %entity, id = %id, "sandbox record stored");
        Ok(id)
    }
}
