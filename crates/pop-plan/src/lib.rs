//! Instruction model and definition building.
//!
//! Raw instructions are parsed from YAML, validated and normalized into
//! [`Definition`]s, then backfilled with entity-specific and global defaults.
//! Every failure here is fatal to the run.

pub mod builder;
pub mod catalog;
pub mod defaults;
pub mod errors;
pub mod fields;
pub mod loader;
pub mod model;

pub use builder::{DefinitionBuilder, MAX_DEPTH};
pub use catalog::FieldCatalog;
pub use defaults::{DefaultBlock, EntityDefaults};
pub use errors::SpecError;
pub use loader::{load_instructions, parse_instructions};
pub use model::{
    Count, Definition, FieldSpec, FieldSpecs, Instruction, Modifier, PopulatorKind,
    WeightedOption,
};
