use pop_core::FieldValues;
use serde::Serialize;
use thiserror::Error;

/// Failure to produce a value while resolving one entity's fields.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("no existing '{entity}' entities to reference")]
    NoEntities { entity: String },
    #[error("no valid options for '{entity}.{field}'")]
    NoOptions { entity: String, field: String },
    #[error("no selectable choice for field '{field}'")]
    NoChoice { field: String },
    #[error("generator '{name}' failed: {reason}")]
    Generator { name: String, reason: String },
    #[error("could not read fields of '{entity}': {reason}")]
    Fields { entity: String, reason: String },
    #[error("backend error: {0}")]
    Api(#[from] pop_core::Error),
}

impl LookupError {
    pub fn generator(name: &str, reason: impl Into<String>) -> Self {
        LookupError::Generator {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// One entity instance that could not be created. The run carries on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreationFailure {
    pub entity: String,
    /// Field values resolved before the failure, as far as resolution got.
    pub fields: FieldValues,
    pub message: String,
}
