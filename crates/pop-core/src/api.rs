use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::value::{EntityId, FieldValue, FieldValues, Filter};

/// Backend entity that stores individuals, households and organizations.
pub const CONTACT_ENTITY: &str = "Contact";

/// Pseudo entity types that are created as `Contact` with a `contact_type`.
pub const CONTACT_ALIASES: [&str; 3] = ["Individual", "Household", "Organization"];

pub fn is_contact_alias(entity: &str) -> bool {
    CONTACT_ALIASES.contains(&entity)
}

/// Entity type the backend actually knows for `entity`.
pub fn backend_entity(entity: &str) -> &str {
    if is_contact_alias(entity) {
        CONTACT_ENTITY
    } else {
        entity
    }
}

/// A field accepted by the backend's create operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FieldDescriptor {
    pub name: String,
    /// The backend refuses to create the entity without this field.
    #[serde(default)]
    pub required: bool,
    /// Entity type whose ids are valid values for this field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fk_entity: Option<String>,
    /// Valid values come from a fixed option list.
    #[serde(default)]
    pub pseudoconstant: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
            fk_entity: None,
            pseudoconstant: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn references(mut self, entity: impl Into<String>) -> Self {
        self.fk_entity = Some(entity.into());
        self
    }

    pub fn pseudoconstant(mut self) -> Self {
        self.pseudoconstant = true;
        self
    }
}

/// The external entity store records are created in.
///
/// Every call is blocking. Only `create` mutates backend state.
pub trait EntityApi {
    fn list_entity_types(&self) -> Result<BTreeSet<String>>;

    fn creatable_fields(&self, entity: &str) -> Result<Vec<FieldDescriptor>>;

    /// Option keys for an enumerated field, in backend order.
    fn valid_options(&self, entity: &str, field: &str) -> Result<Vec<FieldValue>>;

    /// Ids of existing entities matching `filter`, at most `limit` of them.
    fn fetch_existing(&self, entity: &str, filter: &Filter, limit: usize) -> Result<Vec<EntityId>>;

    fn create(&mut self, entity: &str, fields: &FieldValues) -> Result<EntityId>;
}
