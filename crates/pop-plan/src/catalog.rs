use std::collections::HashMap;

use pop_core::{EntityApi, FieldDescriptor, backend_entity};

use crate::errors::Result;

/// Memoized creatable-field lists, keyed by backend entity type.
#[derive(Debug, Default)]
pub struct FieldCatalog {
    fields: HashMap<String, Vec<FieldDescriptor>>,
}

impl FieldCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fields accepted when creating `entity`. Contact aliases share `Contact`'s fields.
    pub fn creatable(&mut self, api: &dyn EntityApi, entity: &str) -> Result<&[FieldDescriptor]> {
        let key = backend_entity(entity);
        if !self.fields.contains_key(key) {
            let fields = api.creatable_fields(key)?;
            self.fields.insert(key.to_string(), fields);
        }
        Ok(self.fields.get(key).map(Vec::as_slice).unwrap_or(&[]))
    }

    pub fn required(&mut self, api: &dyn EntityApi, entity: &str) -> Result<Vec<FieldDescriptor>> {
        Ok(self
            .creatable(api, entity)?
            .iter()
            .filter(|field| field.required)
            .cloned()
            .collect())
    }

    pub fn accepts(&mut self, api: &dyn EntityApi, entity: &str, field: &str) -> Result<bool> {
        Ok(self
            .creatable(api, entity)?
            .iter()
            .any(|descriptor| descriptor.name == field))
    }
}
