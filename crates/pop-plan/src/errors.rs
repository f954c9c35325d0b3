use thiserror::Error;

/// Fatal specification errors. Any of these aborts the whole run.
///
/// Variants raised for a particular instruction carry it rendered back to
/// YAML so the offending node can be logged verbatim.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("could not load specification '{path}': {reason}")]
    Load { path: String, reason: String },
    #[error("badly formatted instruction")]
    MalformedInstruction { instruction: String },
    #[error("could not find entity: {entity}")]
    UnknownEntity { entity: String, instruction: String },
    #[error("invalid value for count: {count}")]
    InvalidCount { count: String, instruction: String },
    #[error("could not find populator '{name}'")]
    UnknownPopulator { name: String, instruction: String },
    #[error("invalid spec for field '{field}': {reason}")]
    InvalidFieldSpec { field: String, reason: String },
    #[error("'{entity}' has no '{field}' field to link it to its parent")]
    MissingParentLink { entity: String, field: String },
    #[error("unknown value generator '{name}' for field '{field}' of '{entity}'")]
    UnknownGenerator {
        entity: String,
        field: String,
        name: String,
    },
    #[error("invalid defaults in '{path}': {reason}")]
    InvalidDefaults { path: String, reason: String },
    #[error("instruction tree deeper than {limit} levels below '{entity}'")]
    TooDeep { entity: String, limit: usize },
    #[error("backend error: {0}")]
    Api(#[from] pop_core::Error),
}

impl SpecError {
    /// The offending instruction as YAML, when the error stems from one.
    pub fn instruction(&self) -> Option<&str> {
        match self {
            SpecError::MalformedInstruction { instruction }
            | SpecError::UnknownEntity { instruction, .. }
            | SpecError::InvalidCount { instruction, .. }
            | SpecError::UnknownPopulator { instruction, .. } => Some(instruction.as_str()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SpecError>;
