use thiserror::Error;

/// Core error type shared by backends and lookups.
#[derive(Debug, Error)]
pub enum Error {
    /// The backend rejected or failed a request.
    #[error("api error: {0}")]
    Api(String),
    /// The entity type is not known to the backend.
    #[error("unknown entity type: {0}")]
    UnknownEntity(String),
    /// A backend catalog document is inconsistent.
    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Convenience alias for results returned by pop crates.
pub type Result<T> = std::result::Result<T, Error>;
