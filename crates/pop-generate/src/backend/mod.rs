//! In-process entity backends.

mod memory;

pub use memory::{Catalog, CatalogField, EntityCatalog, ExistingRecord, MemoryBackend, StoredRecord, catalog_json_schema};
