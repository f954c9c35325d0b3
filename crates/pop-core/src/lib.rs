//! Core contracts shared across the pop crates.
//!
//! This crate defines the scalar value model, entity identifiers, field
//! descriptors and the `EntityApi` boundary that every backend implements.

pub mod api;
pub mod error;
pub mod value;

pub use api::{
    CONTACT_ALIASES, CONTACT_ENTITY, EntityApi, FieldDescriptor, backend_entity, is_contact_alias,
};
pub use error::{Error, Result};
pub use value::{EntityId, FieldValue, FieldValues, Filter, filter_key};
