//! Recursive entity creation for pop.
//!
//! This crate walks backfilled definitions, resolves field specs into
//! concrete values (weighted choices, references, options, fake values),
//! creates entities through an [`pop_core::EntityApi`] and keeps the run
//! summary.

pub mod backend;
pub mod cache;
pub mod engine;
pub mod errors;
pub mod generators;
pub mod output;
pub mod populators;
pub mod resolver;
pub mod summary;

pub use backend::{Catalog, MemoryBackend};
pub use cache::{EntityCache, OptionCache};
pub use engine::{EntityCreator, EntityHandle, RunContext};
pub use errors::{CreationFailure, LookupError};
pub use generators::{FakerValueGenerator, GeneratedValue, ValueGenerator};
pub use output::{BufferedOutput, ConsoleOutput, OutputChannel, SilentOutput};
pub use resolver::{FieldResolver, weighted_select};
pub use summary::{EntitySummary, FailureRecord, SummaryReporter};
